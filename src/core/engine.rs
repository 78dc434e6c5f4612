//! 演示主循环
//!
//! 启动顺序：日志、窗口、渲染设备、模型、网格渲染器、粒子系统（一次性播种），
//! 然后进入 winit 事件循环。
//!
//! 逐帧状态全部放在 [`AppState`] 中并显式传入帧更新，没有进程级可变状态。
//! 点击次数达到阈值之前绘制光照网格；之后每帧记录一次模拟步进和一次绘制。

use super::error::{EngineError, EngineResult};
use super::time::{FpsTracker, FrameClock};
use crate::config::{DemoConfig, LoggingConfig, ModelConfig};
use crate::platform::winit::{capture_cursor, create_window};
use crate::platform::InputState;
use crate::render::particles::{
    FrameTargets, GpuParticleSystem, ParticleSource, ParticleSystemDescriptor, StepParams,
    ViewParams,
};
use crate::render::{MeshFrame, MeshRenderer, Renderer, DEPTH_FORMAT};
use crate::scene::{Camera, Model};
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{error, info, warn};
use winit::event::{DeviceEvent, ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::Window;

/// 当前绘制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoMode {
    /// 光照网格
    Mesh,
    /// GPU 粒子
    Particles,
}

/// 逐帧应用状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub camera: Camera,
    pub input: InputState,
    pub clock: FrameClock,
    pub fps: FpsTracker,
    mode: DemoMode,
}

impl AppState {
    pub fn new(config: &DemoConfig) -> Self {
        let input = InputState::new(config.particles.explode_after_clicks);
        let mode = if input.threshold_reached() {
            DemoMode::Particles
        } else {
            DemoMode::Mesh
        };
        Self {
            camera: Camera::from_config(&config.camera),
            input,
            clock: FrameClock::new(),
            fps: FpsTracker::new(),
            mode,
        }
    }

    pub fn mode(&self) -> DemoMode {
        self.mode
    }

    /// 推进 `dt` 秒：移动相机、统计 FPS、检查引爆阈值
    ///
    /// 返回本帧是否刚切换到粒子模式。
    pub fn advance(&mut self, dt: f32) -> bool {
        self.camera.update(self.input.move_intent(), dt);
        if let Some(fps) = self.fps.record(dt) {
            info!(target: "engine", fps, "Frame rate");
        }

        if self.mode == DemoMode::Mesh && self.input.threshold_reached() {
            self.mode = DemoMode::Particles;
            info!(target: "engine", clicks = self.input.clicks(), "Switching to particle mode");
            return true;
        }
        false
    }
}

/// GPU 资源与场景常量
struct Demo {
    window: Arc<Window>,
    renderer: Renderer,
    mesh_renderer: MeshRenderer,
    particles: GpuParticleSystem,
    model_center: Vec3,
    config: DemoConfig,
}

impl Demo {
    fn new(window: Arc<Window>, config: DemoConfig) -> EngineResult<Self> {
        let renderer = pollster::block_on(Renderer::new(window.clone(), config.graphics.vsync))?;
        let model = load_model(&config.model)?;

        let mesh_renderer = MeshRenderer::new(
            renderer.device(),
            renderer.queue(),
            &model,
            renderer.format(),
            DEPTH_FORMAT,
        );

        let pool = model.vertex_pool();
        let capacity = match config.particles.capacity {
            Some(capacity) => capacity,
            None => u32::try_from(pool.len()).map_err(|_| {
                EngineError::Init(format!("model has too many vertices: {}", pool.len()))
            })?,
        };
        let mut rng = match config.particles.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let seed = config.particles.seed_params();
        let particles = GpuParticleSystem::new(
            renderer.device(),
            ParticleSystemDescriptor {
                source: ParticleSource {
                    pool: &pool,
                    diffuse: model.diffuse(),
                },
                capacity,
                seed: &seed,
                color_format: renderer.format(),
                depth_format: DEPTH_FORMAT,
            },
            &mut rng,
        )?;
        for failure in particles.store().report().failures() {
            warn!(target: "particles", "{}", failure);
        }

        Ok(Self {
            window,
            renderer,
            mesh_renderer,
            particles,
            model_center: model.center(),
            config,
        })
    }

    /// 绘制一帧；表面暂不可用时跳过
    fn render_frame(&mut self, state: &AppState, dt: f32) -> EngineResult<()> {
        let Some(frame) = self.renderer.acquire()? else {
            return Ok(());
        };
        let mut encoder = self
            .renderer
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let (width, height) = self.renderer.size();
        let view = state.camera.view_matrix();
        let projection = state.camera.projection_matrix(self.renderer.aspect_ratio());
        let targets = FrameTargets {
            color: &frame.view,
            depth: self.renderer.depth_view(),
            clear: self.config.graphics.clear_color(),
        };

        match state.mode() {
            DemoMode::Mesh => self.mesh_renderer.render(
                self.renderer.queue(),
                &mut encoder,
                targets,
                MeshFrame {
                    view,
                    projection,
                    camera_pos: state.camera.position,
                    implosion_counter: state.input.clicks(),
                    model_center: self.model_center,
                    lighting: &self.config.lighting,
                },
            )?,
            DemoMode::Particles => {
                self.particles.update(StepParams {
                    delta_time: dt,
                    model_center: self.model_center,
                })?;
                self.particles.draw(ViewParams {
                    point_size: self.config.particles.point_size,
                    projection,
                    view,
                    viewport: Vec2::new(width as f32, height as f32),
                })?;
                self.particles
                    .encode(self.renderer.queue(), &mut encoder, targets);
            }
        }

        self.renderer
            .queue()
            .submit(std::iter::once(encoder.finish()));
        frame.texture.present();
        Ok(())
    }
}

pub struct Engine;

impl Engine {
    /// 运行演示直到窗口关闭或按下 Escape
    pub fn run(config: DemoConfig) -> EngineResult<()> {
        Self::initialize_logging(&config.logging);
        if let Some(source) = &config.source {
            info!(target: "config", "Loaded configuration from {:?}", source);
        }

        let event_loop = EventLoop::new()
            .map_err(|e| EngineError::EventLoop(format!("Failed to create event loop: {}", e)))?;
        let window = create_window(&event_loop, &config.graphics)?;
        capture_cursor(&window);

        let mut state = AppState::new(&config);
        let mut demo = Demo::new(window, config)?;
        let mut failure: Option<EngineError> = None;

        let result = event_loop.run(|event, elwt| match event {
            Event::WindowEvent { event, .. } => {
                if let Err(e) = Self::handle_window_event(&event, &mut demo, &mut state, elwt) {
                    error!(target: "engine", "Frame failed: {}", e);
                    failure = Some(e);
                    elwt.exit();
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => state.camera.apply_mouse(delta.0 as f32, delta.1 as f32),
            Event::AboutToWait => demo.window.request_redraw(),
            _ => {}
        });

        if let Some(summary) = state.fps.summary() {
            info!(
                target: "engine",
                mean = summary.mean,
                min = summary.min,
                max = summary.max,
                samples = summary.samples,
                "FPS summary"
            );
        }
        info!(target: "engine", "Demo shutting down");

        result.map_err(|e| EngineError::EventLoop(format!("Event loop error: {}", e)))?;
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// 初始化日志；`RUST_LOG` 优先于配置中的级别
    fn initialize_logging(config: &LoggingConfig) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_filter()));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        info!(target: "engine", "Demo starting");
    }

    fn handle_window_event(
        event: &WindowEvent,
        demo: &mut Demo,
        state: &mut AppState,
        elwt: &EventLoopWindowTarget<()>,
    ) -> EngineResult<()> {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => demo.renderer.resize(*size),
            WindowEvent::Focused(false) => state.input.clear_keys(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    match event.state {
                        ElementState::Pressed if code == KeyCode::Escape => elwt.exit(),
                        ElementState::Pressed => state.input.key_down(code),
                        ElementState::Released => state.input.key_up(code),
                    }
                }
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                if state.input.mouse_button(*button_state == ElementState::Pressed) {
                    info!(target: "input", clicks = state.input.clicks(), "Click");
                }
            }
            WindowEvent::RedrawRequested => {
                let dt = state.clock.tick();
                state.advance(dt);
                demo.render_frame(state, dt)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// 按配置加载模型：指定了文件时导入 glTF，否则生成砖墙
fn load_model(config: &ModelConfig) -> EngineResult<Model> {
    let model = match &config.path {
        #[cfg(feature = "gltf")]
        Some(path) => Model::from_gltf(path)?,
        #[cfg(not(feature = "gltf"))]
        Some(path) => {
            warn!(
                target: "assets",
                "glTF support disabled, ignoring {:?} and using the brick wall", path
            );
            Model::brick_wall(&config.wall)?
        }
        None => Model::brick_wall(&config.wall)?,
    };
    info!(
        target: "assets",
        model = model.name(),
        vertices = model.total_vertices(),
        "Model loaded"
    );
    Ok(model)
}
