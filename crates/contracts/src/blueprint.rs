//! ScenarioBlueprint - fixed overtake scenario description
//!
//! 描述整个演示场景：地图、天气、两辆车、相机以及显示窗口。
//! 场景是固定的，不从配置文件读取。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{ActorRole, ControlCommand};

/// 目标地图
pub const TARGET_MAP: &str = "Town04";

/// 相机蓝图
pub const CAMERA_BLUEPRINT: &str = "sensor.camera.rgb";

/// 清理旧车辆时使用的过滤器
pub const STALE_VEHICLE_FILTER: &str = "vehicle.*";

/// 完整的场景蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioBlueprint {
    /// 世界设置
    pub world: WorldConfig,

    /// 车辆定义 (按 spawn 顺序)
    pub vehicles: Vec<VehicleSpec>,

    /// 相机定义 (按 spawn 顺序)
    pub cameras: Vec<CameraSpec>,

    /// 显示窗口
    pub display: DisplayConfig,
}

/// 世界配置：地图、天气
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// 期望的地图名称 (e.g., "Town04")
    pub map: String,

    /// 天气参数
    pub weather: WeatherParams,

    /// spawn 前需要销毁的旧 actor 过滤器
    pub stale_actor_filter: String,
}

/// 天气参数 (角度单位：度)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherParams {
    pub sun_azimuth_angle: f32,
    pub sun_altitude_angle: f32,
    pub wind_intensity: f32,
}

/// 车辆配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSpec {
    /// 场景角色
    pub role: ActorRole,

    /// 蓝图过滤关键字 (e.g., "audi")，从匹配结果中随机选择
    pub blueprint_filter: String,

    /// 车身颜色 "r,g,b"，蓝图不支持 color 属性时忽略
    pub color: Option<String>,

    /// 初始位姿
    pub spawn_point: Transform,

    /// spawn 后立即下发的控制指令
    pub initial_control: ControlCommand,
}

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraSpec {
    /// 唯一标识符
    pub id: String,

    /// 父车辆角色
    pub parent: ActorRole,

    /// 相对于父 actor 的挂载位姿
    pub transform: Transform,

    /// 图像宽度
    pub image_width: u32,

    /// 图像高度
    pub image_height: u32,

    /// 其余蓝图属性
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// 是否将画面推送到显示窗口
    pub stream_to_display: bool,
}

impl CameraSpec {
    /// All blueprint attributes, including the image size
    pub fn blueprint_attributes(&self) -> HashMap<String, String> {
        let mut attributes = self.attributes.clone();
        attributes.insert("image_size_x".into(), self.image_width.to_string());
        attributes.insert("image_size_y".into(), self.image_height.to_string());
        attributes
    }
}

/// 显示窗口配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
}

/// 3D 变换：位置 + 旋转
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// 位置 (x, y, z) 单位：米
    pub location: Location,

    /// 旋转 (pitch, yaw, roll) 单位：度
    pub rotation: Rotation,
}

/// Live vehicle pose as reported by the simulator
pub type Pose = Transform;

impl Transform {
    pub fn new(location: Location, rotation: Rotation) -> Self {
        Self { location, rotation }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Location {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl Rotation {
    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }
}

impl ScenarioBlueprint {
    /// The overtake demonstration on Town04
    ///
    /// A red lead vehicle is parked with its brake on; a dark trailing vehicle
    /// spawns 2.6m to its side and drifts towards it. Two cameras ride on the
    /// lead vehicle, the second one looks back at the trailing vehicle and is
    /// streamed to the display.
    pub fn overtake() -> Self {
        let camera_attributes = HashMap::from([
            ("fov".to_string(), "120".to_string()),
            ("lens_circle_multiplier".to_string(), "0".to_string()),
            ("lens_k".to_string(), "0.0".to_string()),
        ]);

        Self {
            world: WorldConfig {
                map: TARGET_MAP.to_string(),
                weather: WeatherParams {
                    sun_azimuth_angle: 30.0,
                    sun_altitude_angle: 30.0,
                    wind_intensity: 30.0,
                },
                stale_actor_filter: STALE_VEHICLE_FILTER.to_string(),
            },
            vehicles: vec![
                VehicleSpec {
                    role: ActorRole::LeadVehicle,
                    blueprint_filter: "audi".to_string(),
                    color: Some("255,50,50".to_string()),
                    spawn_point: Transform::new(
                        Location::new(-120.4, 13.0, 10.0),
                        Rotation::new(0.0, 180.0, 0.0),
                    ),
                    initial_control: ControlCommand::FULL_BRAKE,
                },
                VehicleSpec {
                    role: ActorRole::TrailVehicle,
                    blueprint_filter: "audi".to_string(),
                    color: Some("30,30,30".to_string()),
                    spawn_point: Transform::new(
                        Location::new(-120.4, 15.6, 10.0),
                        Rotation::new(0.0, 180.0, 0.0),
                    ),
                    initial_control: ControlCommand::new(0.3, 0.12, 0.0),
                },
            ],
            cameras: vec![
                CameraSpec {
                    id: "cam_0".to_string(),
                    parent: ActorRole::LeadVehicle,
                    transform: Transform::new(
                        Location::new(1.5, 0.0, 2.4),
                        Rotation::new(0.0, 0.0, 0.0),
                    ),
                    image_width: 1080,
                    image_height: 1080,
                    attributes: camera_attributes.clone(),
                    stream_to_display: false,
                },
                CameraSpec {
                    id: "cam_1".to_string(),
                    parent: ActorRole::LeadVehicle,
                    transform: Transform::new(
                        Location::new(1.5, -0.8, 1.2),
                        Rotation::new(-15.0, -75.0, 0.0),
                    ),
                    image_width: 1080,
                    image_height: 1080,
                    attributes: camera_attributes,
                    stream_to_display: true,
                },
            ],
            display: DisplayConfig {
                width: 1080,
                height: 1080,
            },
        }
    }

    /// Find vehicle spec by role
    pub fn vehicle(&self, role: ActorRole) -> Option<&VehicleSpec> {
        self.vehicles.iter().find(|v| v.role == role)
    }

    /// Camera whose frames go to the display
    pub fn display_camera(&self) -> Option<&CameraSpec> {
        self.cameras.iter().find(|c| c.stream_to_display)
    }

    /// Number of actors the scenario spawns
    pub fn actor_count(&self) -> usize {
        self.vehicles.len() + self.cameras.len()
    }
}
