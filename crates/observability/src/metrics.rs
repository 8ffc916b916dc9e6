//! 运行指标收集模块
//!
//! 记录帧渲染、丢帧、控制指令与状态切换，并在内存中聚合运行统计。

use std::collections::BTreeMap;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// 记录一帧成功渲染
///
/// `latency_ms` 为解码、贴图与呈现的耗时，不含帧在通道中排队的时间。
pub fn record_frame_rendered(sensor_id: &str, latency_ms: f64) {
    counter!(
        "carla_overtake_frames_rendered_total",
        "sensor_id" => sensor_id.to_string()
    )
    .increment(1);
    histogram!("carla_overtake_frame_latency_ms").record(latency_ms);
}

/// 记录一帧因无法解码而跳过
pub fn record_frame_skipped(sensor_id: &str, reason: &str) {
    counter!(
        "carla_overtake_frames_skipped_total",
        "sensor_id" => sensor_id.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录一帧因通道已满而丢弃
pub fn record_frame_dropped(sensor_id: &str) {
    counter!(
        "carla_overtake_frames_dropped_total",
        "sensor_id" => sensor_id.to_string()
    )
    .increment(1);
}

/// 记录一次控制指令下发
pub fn record_control_issued(state: &str, throttle: f32, steer: f32, brake: f32) {
    counter!(
        "carla_overtake_controls_issued_total",
        "state" => state.to_string()
    )
    .increment(1);
    gauge!("carla_overtake_throttle").set(throttle as f64);
    gauge!("carla_overtake_steer").set(steer as f64);
    gauge!("carla_overtake_brake").set(brake as f64);
}

/// 记录状态切换
pub fn record_state_transition(from: &str, to: &str) {
    counter!(
        "carla_overtake_state_transitions_total",
        "from" => from.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

/// 运行指标聚合器
///
/// 在内存中聚合指标，便于运行结束时输出摘要。
#[derive(Debug, Clone, Default)]
pub struct RunMetricsAggregator {
    /// 渲染成功帧数
    pub frames_rendered: u64,

    /// 解码失败跳过的帧数
    pub frames_skipped: u64,

    /// 通道满时丢弃的帧数
    pub frames_dropped: u64,

    /// 控制指令数
    pub controls_issued: u64,

    /// 每个状态的进入时间（相对运行开始）
    pub state_entries: BTreeMap<String, Duration>,

    /// 帧延迟统计（毫秒）
    pub latency_stats: RunningStats,
}

impl RunMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录帧渲染
    pub fn on_rendered(&mut self, latency_ms: f64) {
        self.frames_rendered += 1;
        self.latency_stats.push(latency_ms);
    }

    /// 记录跳过的帧
    pub fn on_skipped(&mut self) {
        self.frames_skipped += 1;
    }

    /// 记录进入某状态
    pub fn on_state_entered(&mut self, state: &str, elapsed: Duration) {
        self.state_entries.entry(state.to_string()).or_insert(elapsed);
    }

    /// 生成摘要报告
    pub fn summary(&self, elapsed: Duration) -> RunSummary {
        let offered = self.frames_rendered + self.frames_skipped;
        RunSummary {
            elapsed,
            frames_rendered: self.frames_rendered,
            frames_skipped: self.frames_skipped,
            frames_dropped: self.frames_dropped,
            controls_issued: self.controls_issued,
            skip_rate: if offered > 0 {
                self.frames_skipped as f64 / offered as f64 * 100.0
            } else {
                0.0
            },
            render_fps: if elapsed.as_secs_f64() > 0.0 {
                self.frames_rendered as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            },
            frame_latency_ms: StatsSummary::from(&self.latency_stats),
            state_entries: self.state_entries.clone(),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub elapsed: Duration,
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub frames_dropped: u64,
    pub controls_issued: u64,
    pub skip_rate: f64,
    pub render_fps: f64,
    pub frame_latency_ms: StatsSummary,
    pub state_entries: BTreeMap<String, Duration>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Run Summary ===")?;
        writeln!(f, "Elapsed: {:.2}s", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "Frames rendered: {} ({:.1} fps)",
            self.frames_rendered, self.render_fps
        )?;
        writeln!(
            f,
            "Frames skipped: {} ({:.2}%)",
            self.frames_skipped, self.skip_rate
        )?;
        writeln!(f, "Frames dropped: {}", self.frames_dropped)?;
        writeln!(f, "Controls issued: {}", self.controls_issued)?;
        writeln!(f, "Frame latency (ms): {}", self.frame_latency_ms)?;

        if !self.state_entries.is_empty() {
            writeln!(f, "State entered at:")?;
            for (state, at) in &self.state_entries {
                writeln!(f, "  {}: {:.2}s", state, at.as_secs_f64())?;
            }
        }

        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(value);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_summary() {
        let mut aggregator = RunMetricsAggregator::new();
        aggregator.on_rendered(2.0);
        aggregator.on_rendered(4.0);
        aggregator.on_rendered(6.0);
        aggregator.on_skipped();
        aggregator.frames_dropped = 3;
        aggregator.on_state_entered("approach", Duration::from_millis(500));
        aggregator.on_state_entered("approach", Duration::from_secs(9));

        let summary = aggregator.summary(Duration::from_secs(3));

        assert_eq!(summary.frames_rendered, 3);
        assert!((summary.skip_rate - 25.0).abs() < 1e-10);
        assert!((summary.render_fps - 1.0).abs() < 1e-10);
        assert!((summary.frame_latency_ms.mean - 4.0).abs() < 1e-10);
        // first entry wins
        assert_eq!(
            summary.state_entries.get("approach"),
            Some(&Duration::from_millis(500))
        );
    }

    #[test]
    fn test_summary_display() {
        let summary = RunSummary {
            elapsed: Duration::from_secs(10),
            frames_rendered: 200,
            frames_skipped: 2,
            frames_dropped: 5,
            controls_issued: 4,
            skip_rate: 0.99,
            render_fps: 20.0,
            frame_latency_ms: StatsSummary {
                count: 200,
                min: 1.0,
                max: 9.0,
                mean: 3.0,
                std_dev: 1.5,
            },
            state_entries: BTreeMap::from([("realign".to_string(), Duration::from_secs(6))]),
        };

        let output = format!("{}", summary);
        assert!(output.contains("Frames rendered: 200 (20.0 fps)"));
        assert!(output.contains("0.99%"));
        assert!(output.contains("realign: 6.00s"));
    }

    #[test]
    fn test_record_functions_without_recorder() {
        // no global recorder installed: calls are no-ops
        record_frame_rendered("cam_1", 1.0);
        record_frame_skipped("cam_1", "malformed");
        record_frame_dropped("cam_1");
        record_control_issued("approach", 0.3, -0.1, 0.0);
        record_state_transition("approach", "realign");
    }
}
