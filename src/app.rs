use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, anyhow};
use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{CursorGrabMode, Window, WindowId},
};

use crate::config::{DEFAULT_CONFIG_PATH, PlotterConfig};
use crate::density::{CpuDensityKernel, DensityEngine, DensityKernel, GpuDensityKernel, KernelKind};
use crate::error::PlotError;
use crate::input::{InputState, MovementKeys, ViewerCommand};
use crate::plot::catalog::DatasetCatalog;
use crate::plot::loader::{CsvDirectory, DatasetSource};
use crate::plot::procedural::ProceduralSource;
use crate::plot::session::{PlotSession, SessionState};
use crate::rendering::Renderer;

type ViewerSession = PlotSession<Box<dyn DensityKernel>, Box<dyn DatasetSource>>;

// Everything that needs the window and its GPU device
struct Viewer {
    renderer: Renderer,
    session: ViewerSession,
}

pub struct App {
    config: PlotterConfig,
    datasets: Option<(DatasetCatalog, Box<dyn DatasetSource>)>,
    viewer: Option<Viewer>,
    input: InputState,
    movement: MovementKeys,
    last_frame: Instant,
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: PlotterConfig) -> Result<Self, PlotError> {
        let datasets = dataset_source(&config)?;
        Ok(Self {
            config,
            datasets: Some(datasets),
            viewer: None,
            input: InputState::default(),
            movement: MovementKeys::default(),
            last_frame: Instant::now(),
            failure: None,
        })
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attributes = Window::default_attributes()
            .with_title("N-Body Flythrough")
            .with_inner_size(LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("creating window")?,
        );

        let renderer = pollster::block_on(Renderer::new(window.clone(), self.config.point_size))
            .context("initializing renderer")?;

        let kernel: Box<dyn DensityKernel> = match self.config.density_kernel {
            KernelKind::Gpu => Box::new(GpuDensityKernel::new(renderer.device(), renderer.queue())),
            KernelKind::Cpu => Box::new(CpuDensityKernel),
        };
        let engine = DensityEngine::new(kernel, self.config.neighbour_radius);

        let (catalog, source) = self
            .datasets
            .take()
            .ok_or_else(|| anyhow!("viewer already started"))?;
        let mut session = PlotSession::new(catalog, source, engine);

        // A bad first dataset leaves the session inactive; the user can cycle away
        let _ = session.start();

        let viewer = Viewer { renderer, session };
        viewer.update_title();
        self.viewer = Some(viewer);
        self.set_look(self.input.look_enabled());

        window.request_redraw();
        Ok(())
    }

    fn handle_command(&mut self, event_loop: &ActiveEventLoop, command: ViewerCommand) {
        let Some(viewer) = self.viewer.as_mut() else {
            return;
        };

        // Session failures are logged by the session and leave it inactive
        match command {
            ViewerCommand::Quit => {
                info!("Escape pressed; stopping");
                event_loop.exit();
            }
            ViewerCommand::SetLookEnabled(enabled) => self.set_look(enabled),
            ViewerCommand::ToggleMovementOnly => {
                info!("Movement only: {}", self.input.movement_only());
            }
            ViewerCommand::DoubleRadius => {
                let _ = viewer.session.double_radius();
                viewer.update_title();
            }
            ViewerCommand::HalveRadius => {
                let _ = viewer.session.halve_radius();
                viewer.update_title();
            }
            ViewerCommand::SwitchDataset(direction) => {
                let _ = viewer.session.switch_dataset(direction);
                viewer.update_title();
            }
        }
    }

    fn set_look(&self, enabled: bool) {
        let Some(viewer) = self.viewer.as_ref() else {
            return;
        };
        let window = viewer.renderer.window();
        let grab = if enabled {
            window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            window.set_cursor_grab(CursorGrabMode::None)
        };
        if let Err(e) = grab {
            warn!("Could not change cursor grab: {e}");
        }
        window.set_cursor_visible(!enabled);
    }

    fn redraw(&mut self) -> Result<(), PlotError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        let Some(viewer) = self.viewer.as_mut() else {
            return Ok(());
        };
        if !self.movement.is_idle() {
            viewer.renderer.camera_mut().fly(self.movement.velocity(), dt);
        }

        let frame = match viewer.session.state() {
            SessionState::Presenting => Some(viewer.session.render()?),
            _ => None,
        };
        match viewer.renderer.render(frame) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                viewer.renderer.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(PlotError::Gpu("surface out of memory".into()));
            }
            Err(e) => warn!("Skipping frame: {e}"),
        }
        viewer.renderer.window().request_redraw();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.failure = Some(err);
        event_loop.exit();
    }
}

impl Viewer {
    fn update_title(&self) {
        let dataset = self
            .session
            .active_dataset()
            .map_or("no dataset", |id| id.as_str());
        self.renderer.window().set_title(&format!(
            "N-Body Flythrough - {dataset} - radius {}",
            self.session.radius()
        ));
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.viewer.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("The close button was pressed; stopping");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e.into());
                }
            }
            WindowEvent::Resized(size) => {
                if let Some(viewer) = self.viewer.as_mut() {
                    viewer.renderer.resize(size);
                }
            }
            WindowEvent::Focused(false) => self.movement = MovementKeys::default(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: key_state,
                        repeat,
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;
                if self.movement.set(key_code, pressed) || !pressed || repeat {
                    return;
                }
                if let Some(command) = self.input.press(key_code) {
                    self.handle_command(event_loop, command);
                }
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if !self.input.look_enabled() {
                return;
            }
            if let Some(viewer) = self.viewer.as_mut() {
                viewer
                    .renderer
                    .camera_mut()
                    .look(delta.0 as f32, delta.1 as f32);
            }
        }
    }
}

/// The catalog and source the config asks for: a generated distribution, or
/// every CSV file in the data directory.
fn dataset_source(
    config: &PlotterConfig,
) -> Result<(DatasetCatalog, Box<dyn DatasetSource>), PlotError> {
    if let Some(distribution) = config.distribution {
        let source = ProceduralSource {
            distribution,
            count: config.num_bodies,
            params: config.procedural_params(),
        };
        let catalog = DatasetCatalog::new(vec![source.dataset_id()]).ok_or_else(|| {
            PlotError::NoDatasets {
                dir: config.data_dir.clone(),
            }
        })?;
        return Ok((catalog, Box::new(source)));
    }

    let catalog = DatasetCatalog::scan(&config.data_dir)?;
    info!(
        "Found {} datasets in {}",
        catalog.len(),
        config.data_dir.display()
    );
    let source = CsvDirectory::new(&config.data_dir, config.load_options());
    Ok((catalog, Box::new(source)))
}

pub fn run() -> anyhow::Result<()> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = PlotterConfig::load_or_default(&config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;

    let mut app = App::new(config).context("enumerating datasets")?;

    let event_loop = EventLoop::new().context("creating event loop")?;
    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut app).context("running event loop")?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
