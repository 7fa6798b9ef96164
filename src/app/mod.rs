use crate::assets::FileMeshSource;
use crate::config::{AppConfig, AppConfigOverrides};
use crate::content::StageContent;
use crate::lifecycle::{Orchestrator, PhaseHost};
use crate::renderer::window_surface::WindowSurface;
use crate::renderer::StageRenderer;
use crate::stage::Stage;
use crate::theme::{self, ThemeState};
use crate::time::Time;
use crate::ui;
use crate::input::InputState;
use anyhow::{Context, Result};
use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{Key, NamedKey};

// egui
use egui::Context as EguiCtx;
use egui_wgpu::{Renderer as EguiRenderer, RendererOptions, ScreenDescriptor};
use egui_winit::State as EguiWinit;

const CONFIG_PATH: &str = "config/app.json";
const MODELS_DIR: &str = "assets/models";
const ORBIT_SENSITIVITY: f32 = 0.005;

pub async fn run() -> Result<()> {
    run_with_overrides(AppConfigOverrides::default()).await
}

pub async fn run_with_overrides(overrides: AppConfigOverrides) -> Result<()> {
    let mut config = AppConfig::load_or_default(CONFIG_PATH);
    config.apply_overrides(&overrides);
    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut app = App::new(config);
    event_loop.run_app(&mut app).context("Event loop execution failed")?;
    Ok(())
}

pub struct App {
    surface: WindowSurface,
    renderer: Option<StageRenderer>,
    stage: Stage,
    orchestrator: Orchestrator,
    time: Time,
    input: InputState,
    should_close: bool,

    // egui
    egui_ctx: EguiCtx,
    egui_winit: Option<EguiWinit>,
    egui_renderer: Option<EguiRenderer>,
    egui_screen: Option<ScreenDescriptor>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let content = StageContent::load_or_builtin(config.content_path.as_deref());
        let theme = ThemeState::load_or_default(theme::DEFAULT_THEME_PATH);
        let stage = Stage::new(
            content,
            config.stage.clone(),
            config.shadow.clone(),
            theme,
            Box::new(FileMeshSource::new(MODELS_DIR)),
        );
        let surface = WindowSurface::new(&config.window);
        Self {
            surface,
            renderer: None,
            stage,
            orchestrator: Orchestrator::new(),
            time: Time::new(),
            input: InputState::new(),
            should_close: false,
            egui_ctx: EguiCtx::default(),
            egui_winit: None,
            egui_renderer: None,
            egui_screen: None,
        }
    }

    fn init_egui(&mut self) {
        if self.egui_winit.is_none() {
            if let Some(window) = self.surface.window() {
                let state = EguiWinit::new(
                    self.egui_ctx.clone(),
                    egui::ViewportId::ROOT,
                    window,
                    Some(self.surface.pixels_per_point()),
                    window.theme(),
                    None,
                );
                self.egui_winit = Some(state);
            }
        }
        if self.egui_renderer.is_none() {
            match (self.surface.device(), self.surface.surface_format()) {
                (Ok(device), Ok(format)) => {
                    self.egui_renderer =
                        Some(EguiRenderer::new(device, format, RendererOptions::default()));
                }
                (Err(err), _) | (_, Err(err)) => {
                    eprintln!("[app] unable to initialize egui renderer: {err:?}");
                    self.should_close = true;
                    return;
                }
            }
        }
        let size = self.surface.size();
        self.egui_screen = Some(ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point: self.surface.pixels_per_point(),
        });
    }

    fn render_frame(&mut self) {
        let viewport = self.surface.size();
        if viewport.width == 0 || viewport.height == 0 {
            return;
        }

        let raw_input = match (self.surface.window(), self.egui_winit.as_mut()) {
            (Some(window), Some(state)) => state.take_egui_input(window),
            _ => egui::RawInput::default(),
        };
        let full_output =
            self.egui_ctx.run(raw_input, |ctx| ui::draw(ctx, &mut self.stage, viewport));
        let egui::FullOutput { platform_output, textures_delta, shapes, .. } = full_output;
        if let (Some(window), Some(state)) = (self.surface.window(), self.egui_winit.as_mut()) {
            state.handle_platform_output(window, platform_output);
        }

        let frame = match self.surface.acquire_surface_frame() {
            Ok(frame) => frame,
            Err(err) => {
                eprintln!("[app] {err:?}");
                return;
            }
        };
        let (Ok(device), Ok(queue)) = (self.surface.device(), self.surface.queue()) else {
            return;
        };
        let Ok(depth_view) = self.surface.depth_view() else { return };
        let Some(renderer) = self.renderer.as_mut() else { return };

        let mut encoder = device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame Encoder") });
        if let Err(err) =
            renderer.render(device, queue, &mut encoder, frame.view(), depth_view, &self.stage, viewport)
        {
            eprintln!("[app] stage pass failed: {err:?}");
        }

        if let (Some(painter), Some(screen)) = (self.egui_renderer.as_mut(), self.egui_screen.as_ref())
        {
            for (id, delta) in &textures_delta.set {
                painter.update_texture(device, queue, *id, delta);
            }
            let paint_jobs = self.egui_ctx.tessellate(shapes, screen.pixels_per_point);
            let mut extra_cmd =
                painter.update_buffers(device, queue, &mut encoder, &paint_jobs, screen);
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Egui Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: frame.view(),
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                let pass = unsafe {
                    std::mem::transmute::<&mut wgpu::RenderPass<'_>, &mut wgpu::RenderPass<'static>>(
                        &mut pass,
                    )
                };
                painter.render(pass, &paint_jobs, screen);
            }
            extra_cmd.push(encoder.finish());
            queue.submit(extra_cmd);
            for id in &textures_delta.free {
                painter.free_texture(id);
            }
        } else {
            queue.submit(Some(encoder.finish()));
        }
        frame.present();
    }
}

/// Bridges the orchestrator onto the app: engine phases touch the surface and
/// renderer, scene phases delegate to the stage.
struct AppHost<'a> {
    surface: &'a mut WindowSurface,
    renderer: &'a mut Option<StageRenderer>,
    stage: &'a mut Stage,
}

impl PhaseHost for AppHost<'_> {
    fn start_engine(&mut self) -> Result<()> {
        let (device, format) = (self.surface.device()?, self.surface.surface_format()?);
        *self.renderer = Some(StageRenderer::new(device, format));
        Ok(())
    }

    fn build_scene(&mut self) -> Result<()> {
        self.stage.build_scene()
    }

    fn setup_lighting(&mut self) -> Result<()> {
        self.stage.setup_lighting()
    }

    fn load_assets(&mut self) -> Result<()> {
        self.stage.load_assets()
    }

    fn process_assets(&mut self) -> Result<()> {
        self.stage.process_assets()
    }

    fn configure_shadows(&mut self) -> Result<()> {
        self.stage.configure_shadows()
    }

    fn start_render_loop(&mut self) -> Result<()> {
        let (device, queue) = self.surface.device_and_queue()?;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.upload_meshes(device, queue, &self.stage.meshes)?;
        }
        self.stage.start_presentation();
        if let Some(window) = self.surface.window() {
            window.request_redraw();
        }
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.surface.ensure_window(event_loop) {
            eprintln!("[app] window init failed: {err:?}");
            self.should_close = true;
            return;
        }
        self.init_egui();

        // Copy out so the host can borrow the rest of the app mutably.
        let mut orchestrator = self.orchestrator;
        let mut host = AppHost {
            surface: &mut self.surface,
            renderer: &mut self.renderer,
            stage: &mut self.stage,
        };
        if let Err(err) = orchestrator.drive(&mut host) {
            eprintln!("[lifecycle] startup failed: {err:?}");
            self.should_close = true;
        }
        self.orchestrator = orchestrator;
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, id: winit::window::WindowId, event: WindowEvent) {
        // egui gets the event first; consumed events stop here.
        let mut consumed = false;
        if let (Some(window), Some(state)) = (self.surface.window(), self.egui_winit.as_mut()) {
            if id == window.id() {
                let resp = state.on_window_event(window, &event);
                consumed = resp.consumed;
            }
        }
        if consumed && !matches!(event, WindowEvent::RedrawRequested | WindowEvent::Resized(_)) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::Resized(size) => {
                self.surface.resize(size);
                if let Some(screen) = self.egui_screen.as_mut() {
                    screen.size_in_pixels = [size.width, size.height];
                    screen.pixels_per_point = self.surface.pixels_per_point();
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { logical_key: Key::Named(NamedKey::Escape), state, .. },
                ..
            } => {
                if state == ElementState::Pressed {
                    self.should_close = true;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let cursor = Vec2::new(position.x as f32, position.y as f32);
                if let Some(delta) = self.input.cursor_moved(cursor) {
                    self.stage.camera.yaw -= delta.x * ORBIT_SENSITIVITY;
                    self.stage.camera.pitch = (self.stage.camera.pitch - delta.y * ORBIT_SENSITIVITY)
                        .clamp(0.05, std::f32::consts::PI - 0.05);
                } else if self.orchestrator.is_running() {
                    self.stage.handle_cursor(cursor, self.surface.size());
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.input.cursor_left();
                self.stage.clear_hover();
            }
            WindowEvent::MouseInput { state, button, .. } => match button {
                MouseButton::Left => {
                    if state == ElementState::Pressed && self.orchestrator.is_running() {
                        if let Some(cursor) = self.input.cursor() {
                            self.stage.handle_click(cursor, self.surface.size());
                        }
                    }
                }
                MouseButton::Right => {
                    self.input.set_dragging(state == ElementState::Pressed);
                }
                _ => {}
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
                self.stage.camera.radius =
                    (self.stage.camera.radius * (1.0 - lines * 0.1)).clamp(0.5, 60.0);
            }
            WindowEvent::RedrawRequested => self.render_frame(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        self.time.tick();
        let dt = self.time.delta_seconds();

        self.stage.apply_commands(self.orchestrator.is_running());
        self.stage.tick(dt, self.surface.size());

        // The sketch board repaints its texture in place.
        let dirty = self
            .stage
            .sketch
            .as_mut()
            .map(|sketch| (sketch.take_dirty(), sketch.mesh_index))
            .filter(|(dirty, _)| *dirty);
        if let Some((_, mesh_index)) = dirty {
            if let (Ok(queue), Some(renderer), Some(sketch)) =
                (self.surface.queue(), self.renderer.as_mut(), self.stage.sketch.as_ref())
            {
                if let Err(err) = renderer.update_texture(queue, mesh_index, sketch.texture()) {
                    eprintln!("[app] sketch texture update failed: {err:?}");
                }
            }
        }

        if let Some(window) = self.surface.window() {
            window.request_redraw();
        }
    }
}
