//! JVSC engine demo: gravitating circles, optionally over a field-line grid.
//!
//! Usage: `jvsc [config.toml]`. Without an argument `jvsc.toml` in the
//! working directory is used if present, built-in defaults otherwise.

mod demo;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec2;
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::WindowId;

use jvsc_core::{EngineConfig, FrameClock};
use jvsc_platform::Window;
use jvsc_renderer::{Mesh, Renderer, SimpleRenderSystem, circle_vertices, square_vertices};
use jvsc_rhi::RhiResult;
use jvsc_rhi::device::Device;
use jvsc_scene::{EntityId, EntityTable, GravityPhysicsSystem, MeshId, Vec2FieldSystem};

/// Where build.rs put the compiled shaders.
const SHADER_DIR: &str = env!("JVSC_SHADER_DIR");

const CIRCLE_MESH: MeshId = MeshId(0);
const SQUARE_MESH: MeshId = MeshId(1);

/// Everything that exists while the window is open.
///
/// Field order is drop order: GPU objects go before the renderer that
/// owns their device, the window goes last.
struct Running {
    render_system: SimpleRenderSystem,
    meshes: Vec<Mesh>,
    renderer: Renderer,
    window: Window,
    scene: EntityTable,
    field: Vec<EntityId>,
    gravity: GravityPhysicsSystem,
    field_system: Vec2FieldSystem,
    clock: FrameClock,
    substeps: u32,
}

impl Running {
    fn new(event_loop: &ActiveEventLoop, config: &EngineConfig) -> Result<Self> {
        let window = Window::new(event_loop, &config.window).context("creating window")?;
        let renderer =
            Renderer::new(&window, &config.renderer).context("initializing Vulkan renderer")?;

        let sim = &config.simulation;
        let meshes = create_meshes(renderer.device(), sim.circle_sides, sim.show_vector_field)
            .context("creating meshes")?;

        let (vertex_shader, fragment_shader) =
            config.renderer.shader_paths(Path::new(SHADER_DIR));
        let render_system = SimpleRenderSystem::new(
            renderer.device().clone(),
            renderer.render_pass_handle(),
            &vertex_shader,
            &fragment_shader,
        )
        .context("creating render system")?;

        let mut scene = EntityTable::new();
        let bodies = demo::spawn_bodies(&mut scene, sim, CIRCLE_MESH, &mut rand::thread_rng());
        let field = if sim.show_vector_field {
            demo::spawn_vector_field(&mut scene, sim.field_grid, SQUARE_MESH)
        } else {
            Vec::new()
        };
        info!(
            "Scene ready: {} bodies, {} field lines",
            bodies.len(),
            field.len()
        );

        Ok(Self {
            render_system,
            meshes,
            renderer,
            window,
            scene,
            field,
            gravity: GravityPhysicsSystem::new(sim.gravity_strength),
            field_system: Vec2FieldSystem::new(),
            clock: FrameClock::new(sim.fixed_dt),
            substeps: sim.substeps,
        })
    }

    fn simulate(&mut self) {
        let steps = self.clock.tick();
        for _ in 0..steps {
            self.gravity
                .update(&mut self.scene, self.clock.fixed_dt(), self.substeps);
        }
        if steps > 0 && !self.field.is_empty() {
            self.field_system
                .update(&self.gravity, &mut self.scene, &self.field);
        }
    }

    fn draw_frame(&mut self) -> RhiResult<()> {
        let Some(cmd) = self.renderer.begin_frame(&self.window)? else {
            return Ok(());
        };

        self.renderer.begin_render_pass(&cmd)?;
        self.render_system.render(
            &cmd,
            self.renderer.drawable_extent(),
            &self.scene,
            &self.meshes,
        );
        self.renderer.end_render_pass(&cmd)?;
        self.renderer.end_frame(&cmd, &self.window)
    }

    /// Release GPU objects explicitly, then drop the rest in field order.
    fn shutdown(mut self) {
        if let Err(e) = self.renderer.wait_idle() {
            error!("wait_idle failed during shutdown: {}", e);
        }
        for mesh in &mut self.meshes {
            mesh.destroy();
        }
        self.render_system.destroy();
        info!("Shutdown complete");
    }
}

fn create_meshes(device: &Arc<Device>, circle_sides: u32, with_square: bool) -> RhiResult<Vec<Mesh>> {
    let mut meshes = vec![Mesh::new(device.clone(), &circle_vertices(circle_sides)?)?];
    if with_square {
        // Offset so the line starts at the entity's position.
        meshes.push(Mesh::new(
            device.clone(),
            &square_vertices(Vec2::new(0.5, 0.0)),
        )?);
    }
    Ok(meshes)
}

struct App {
    config: EngineConfig,
    running: Option<Running>,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            running: None,
        }
    }

    fn stop(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.take() {
            running.shutdown();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match Running::new(event_loop, &self.config) {
            Ok(running) => {
                info!("Initialization complete, entering main loop");
                self.running = Some(running);
            }
            Err(e) => {
                error!("Startup failed: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down");
                self.stop(event_loop);
            }
            WindowEvent::Resized(size) => {
                if let Some(running) = self.running.as_mut() {
                    debug!("Window resized to {}x{}", size.width, size.height);
                    running.renderer.notify_resized();
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(running) = self.running.as_mut() else {
                    return;
                };
                // Nothing to draw into; the event loop keeps running so the
                // window can be restored.
                if running.window.is_minimized() {
                    return;
                }

                running.simulate();
                if let Err(e) = running.draw_frame() {
                    error!("Render error: {}", e);
                    self.stop(event_loop);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.as_ref() {
            running.window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = self.running.take() {
            running.shutdown();
        }
    }
}

fn main() -> Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = EngineConfig::load(path.as_deref()).context("loading configuration")?;

    match config.renderer.log_filter.as_deref() {
        Some(filter) => jvsc_core::init_logging_with_filter(filter),
        None => jvsc_core::init_logging(),
    }
    info!("Starting JVSC engine");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
