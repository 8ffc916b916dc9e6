//! 窗口显示表面
//!
//! `WindowSurface` 把呈现后的图像交给一个独立的显示线程，由 winit 事件循环
//! 持有窗口，wgpu 把图像作为纹理画满整个窗口。
//!
//! 渲染任务与显示线程之间只有一个"最新帧"槽位：事件循环来不及画的旧帧会被
//! 新帧直接覆盖，队列不会增长。

use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use image::buffer::ConvertBuffer;
use image::{RgbImage, RgbaImage};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use crate::error::FrameError;
use crate::surface::{DisplaySurface, FrameSurface};

/// 全屏三角形采样纹理
const BLIT_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}

@group(0) @binding(0) var frame_texture: texture_2d<f32>;
@group(0) @binding(1) var frame_sampler: sampler;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(frame_texture, frame_sampler, in.uv);
}
"#;

/// 发给显示线程的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayEvent {
    /// 槽位里有新帧
    FrameReady,
    /// 关闭窗口并退出事件循环
    Close,
}

/// 渲染任务写、显示线程取的单帧槽位
#[derive(Debug, Clone, Default)]
struct FrameSlot {
    latest: Arc<Mutex<Option<RgbaImage>>>,
}

impl FrameSlot {
    /// 放入新帧；返回被覆盖（未显示）的旧帧是否存在
    fn put(&self, image: RgbaImage) -> bool {
        self.latest.lock().unwrap().replace(image).is_some()
    }

    fn take(&self) -> Option<RgbaImage> {
        self.latest.lock().unwrap().take()
    }
}

/// RGB 转为不透明的 RGBA，供纹理上传
fn to_rgba(image: &RgbImage) -> RgbaImage {
    image.convert()
}

/// Display surface backed by an OS window
///
/// Frames go through an in-memory `FrameSurface` first, so `blit`/`present`
/// keep its semantics; the presented image is then handed to the window.
pub struct WindowSurface {
    inner: FrameSurface,
    slot: FrameSlot,
    proxy: EventLoopProxy<DisplayEvent>,
    closed: bool,
}

impl WindowSurface {
    /// Open a fixed-size window titled `title` on a dedicated display thread
    pub fn open(title: &str, width: u32, height: u32) -> Result<Self, FrameError> {
        let slot = FrameSlot::default();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread_slot = slot.clone();
        let title = title.to_string();
        thread::Builder::new()
            .name("display".into())
            .spawn(move || run_display(title, width, height, thread_slot, ready_tx))
            .map_err(|e| surface_error(format!("failed to start display thread: {e}")))?;

        let proxy = ready_rx
            .recv()
            .map_err(|_| surface_error("display thread exited before the window opened"))?
            .map_err(surface_error)?;

        info!(width, height, "display window opened");
        Ok(Self {
            inner: FrameSurface::new(width, height),
            slot,
            proxy,
            closed: false,
        })
    }

    /// In-memory copy of the presented image
    pub fn frames(&self) -> &FrameSurface {
        &self.inner
    }
}

impl DisplaySurface for WindowSurface {
    fn size(&self) -> (u32, u32) {
        self.inner.size()
    }

    fn blit(&mut self, image: &RgbImage) -> Result<(), FrameError> {
        self.inner.blit(image)
    }

    fn present(&mut self) -> Result<(), FrameError> {
        self.inner.present()?;
        if self.closed {
            return Ok(());
        }

        if self.slot.put(to_rgba(self.inner.snapshot())) {
            debug!("display lagging, replaced an undrawn frame");
        }

        // 窗口被用户关掉后场景照常跑完，只是不再显示
        if self.proxy.send_event(DisplayEvent::FrameReady).is_err() {
            warn!("display window closed, frames are no longer shown");
            self.closed = true;
        }
        Ok(())
    }
}

impl Drop for WindowSurface {
    fn drop(&mut self) {
        let _ = self.proxy.send_event(DisplayEvent::Close);
    }
}

fn surface_error(message: impl Into<String>) -> FrameError {
    FrameError::Surface {
        message: message.into(),
    }
}

type ReadySender = mpsc::SyncSender<Result<EventLoopProxy<DisplayEvent>, String>>;

/// 显示线程主体：建事件循环，交回 proxy，然后一直跑到窗口关闭
fn run_display(title: String, width: u32, height: u32, slot: FrameSlot, ready: ReadySender) {
    let event_loop = match build_event_loop() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    if ready.send(Ok(event_loop.create_proxy())).is_err() {
        return;
    }

    let mut app = DisplayApp {
        title,
        size: (width, height),
        slot,
        gpu: None,
    };
    if let Err(e) = event_loop.run_app(&mut app) {
        warn!(error = %e, "display event loop failed");
    }
    debug!("display thread stopped");
}

#[cfg(target_os = "macos")]
fn build_event_loop() -> Result<EventLoop<DisplayEvent>, String> {
    Err("the display window needs the main thread on macOS, use --headless".into())
}

#[cfg(not(target_os = "macos"))]
fn build_event_loop() -> Result<EventLoop<DisplayEvent>, String> {
    let mut builder = EventLoop::<DisplayEvent>::with_user_event();

    // 事件循环不在主线程上
    #[cfg(all(unix, not(target_os = "android"), not(target_os = "ios")))]
    winit::platform::x11::EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    #[cfg(windows)]
    winit::platform::windows::EventLoopBuilderExtWindows::with_any_thread(&mut builder, true);

    builder
        .build()
        .map_err(|e| format!("failed to create event loop: {e}"))
}

struct DisplayApp {
    title: String,
    size: (u32, u32),
    slot: FrameSlot,
    gpu: Option<GpuState>,
}

impl ApplicationHandler<DisplayEvent> for DisplayApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }

        let (width, height) = self.size;
        let window = match event_loop.create_window(
            Window::default_attributes()
                .with_title(self.title.clone())
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(false),
        ) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                warn!(error = %e, "failed to create display window");
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(GpuState::new(window, width, height)) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                warn!(error = %e, "failed to initialise display");
                event_loop.exit();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: DisplayEvent) {
        match event {
            DisplayEvent::FrameReady => {
                if let Some(gpu) = &self.gpu {
                    gpu.window.request_redraw();
                }
            }
            DisplayEvent::Close => event_loop.exit(),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(gpu) = &mut self.gpu else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => gpu.resize(size),
            WindowEvent::RedrawRequested => {
                if let Some(image) = self.slot.take() {
                    gpu.upload(&image);
                }
                if let Err(e) = gpu.draw() {
                    warn!(error = %e, "display redraw failed");
                }
            }
            _ => {}
        }
    }
}

/// 窗口上的 wgpu 资源
struct GpuState {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    texture: wgpu::Texture,
}

impl GpuState {
    async fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| format!("failed to create surface: {e}"))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| format!("no suitable adapter: {e}"))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Display Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                experimental_features: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| format!("failed to create device: {e}"))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or("surface reports no formats")?;

        let window_size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Display Frame Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Display Frame Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Display Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Display Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Display Shader"),
            source: wgpu::ShaderSource::Wgsl(BLIT_SHADER.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Display Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Display Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            pipeline,
            bind_group,
            texture,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn upload(&self, image: &RgbaImage) {
        let size = self.texture.size();
        if image.dimensions() != (size.width, size.height) {
            warn!(
                image = ?image.dimensions(),
                texture = ?(size.width, size.height),
                "frame does not match display texture"
            );
            return;
        }

        self.queue.write_texture(
            self.texture.as_image_copy(),
            image.as_raw(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }

    fn draw(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(e),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Display Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Display Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn test_rgba_conversion_is_opaque() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([10, 20, 30]));
        image.put_pixel(1, 0, Rgb([200, 100, 0]));

        let rgba = to_rgba(&image);
        assert_eq!(rgba.dimensions(), (2, 1));
        assert_eq!(rgba.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));
        assert_eq!(rgba.get_pixel(1, 0), &Rgba([200, 100, 0, 255]));
        assert_eq!(rgba.as_raw().len(), 2 * 4);
    }

    #[test]
    fn test_slot_keeps_latest_frame_only() {
        let slot = FrameSlot::default();
        assert!(slot.take().is_none());

        assert!(!slot.put(RgbaImage::from_pixel(1, 1, Rgba([1, 1, 1, 255]))));
        // 第二帧覆盖未显示的第一帧
        assert!(slot.put(RgbaImage::from_pixel(1, 1, Rgba([2, 2, 2, 255]))));

        let shown = slot.take().unwrap();
        assert_eq!(shown.get_pixel(0, 0), &Rgba([2, 2, 2, 255]));
        assert!(slot.take().is_none());
    }

    #[test]
    fn test_window_surface_is_a_display_surface() {
        fn assert_surface<T: DisplaySurface + 'static>() {}
        assert_surface::<WindowSurface>();
    }
}
