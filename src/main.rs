use std::collections::HashSet;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use tilecaster::scaler::{ScaleLut, blit_bilinear_stretch, build_scale_lut};
use tilecaster::world::DEFAULT_MAP;
use tilecaster::{
    Config, ControlInput, FrameBuffer, FrameScheduler, PlayerIntegrator, PlayerState,
    RenderContext, WorldGrid,
};

/// First-person tile-grid raycaster.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// JSON configuration file; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Text map, one row per line (' ' empty, 'P' start, letters are walls)
    #[arg(long)]
    map: Option<PathBuf>,

    /// Render worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// Internal render width in pixels
    #[arg(long)]
    width: Option<usize>,

    /// Internal render height in pixels
    #[arg(long)]
    height: Option<usize>,
}

struct App {
    window: Option<Rc<Window>>,
    surface: Option<softbuffer::Surface<Rc<Window>, Rc<Window>>>,

    ctx: RenderContext,
    scheduler: FrameScheduler,
    frame: FrameBuffer,
    scale_lut: ScaleLut,

    // HUD
    frame_counter: u32,
    last_fps_print: Instant,

    // Input and movement
    player: PlayerState,
    integrator: PlayerIntegrator,
    keys_down: HashSet<KeyCode>,
    input: ControlInput,
    last_tick: Instant,

    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(ctx: RenderContext, scheduler: FrameScheduler, config: &Config, start: PlayerState) -> Self {
        Self {
            window: None,
            surface: None,
            frame: FrameBuffer::new(config.width, config.height),
            ctx,
            scheduler,
            scale_lut: ScaleLut::empty(),

            frame_counter: 0,
            last_fps_print: Instant::now(),

            player: start,
            integrator: PlayerIntegrator::from_config(config),
            keys_down: HashSet::new(),
            input: ControlInput::default(),
            last_tick: Instant::now(),

            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn create_surface(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let attributes = Window::default_attributes()
            .with_title("tilecaster")
            .with_inner_size(LogicalSize::new(
                self.frame.width() as f64,
                self.frame.height() as f64,
            ));
        let window = Rc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );

        let context = softbuffer::Context::new(window.clone())
            .map_err(|e| presentation_error("create softbuffer context", e))?;
        let surface = softbuffer::Surface::new(&context, window.clone())
            .map_err(|e| presentation_error("create softbuffer surface", e))?;

        // Relative mouse look
        if window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
            .is_err()
        {
            log::warn!("cursor grab unavailable; mouse look may drift out of the window");
        }
        window.set_cursor_visible(false);

        let size = window.inner_size();
        self.rebuild_lut(size.width as usize, size.height as usize);

        self.surface = Some(surface);
        self.window = Some(window.clone());
        self.last_tick = Instant::now();
        window.request_redraw();
        Ok(())
    }

    fn tick(&mut self) {
        // Compute dt with cap to avoid huge jumps if the app was paused
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).min(Duration::from_millis(100));
        self.last_tick = now;

        let down = |k: KeyCode| self.keys_down.contains(&k);
        self.input.forward = down(KeyCode::KeyW);
        self.input.back = down(KeyCode::KeyS);
        self.input.strafe_left = down(KeyCode::KeyA);
        self.input.strafe_right = down(KeyCode::KeyD);
        self.input.turn_left = down(KeyCode::ArrowLeft);
        self.input.turn_right = down(KeyCode::ArrowRight);

        self.player = self
            .integrator
            .advance(self.player, &self.input, dt.as_secs_f64());
        self.input.end_frame();
    }

    fn draw(&mut self, id: WindowId) -> anyhow::Result<()> {
        let (window, surface) = match (&self.window, &mut self.surface) {
            (Some(w), Some(s)) if w.id() == id => (w, s),
            _ => return Ok(()),
        };

        let size = window.inner_size();
        let (Some(dw), Some(dh)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height))
        else {
            return Ok(()); // Minimized window, skip drawing
        };
        if self.scale_lut.dst_size() != (size.width as usize, size.height as usize) {
            self.scale_lut = build_scale_lut(
                size.width as usize,
                size.height as usize,
                self.frame.width(),
                self.frame.height(),
            );
        }

        // Set softbuffer to window size
        surface
            .resize(dw, dh)
            .map_err(|e| presentation_error("resize surface", e))?;

        self.scheduler
            .render_frame(&self.ctx, self.player, &mut self.frame);

        let mut buf = surface
            .buffer_mut()
            .map_err(|e| presentation_error("map surface buffer", e))?;
        blit_bilinear_stretch(&mut buf, &self.frame, &self.scale_lut);
        buf.present()
            .map_err(|e| presentation_error("present frame", e))?;

        self.frame_counter += 1;
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_fps_print).as_secs_f32();
        if elapsed >= 1.0 {
            log::debug!(
                "FPS: {:.1} at ({:.1}, {:.1}) facing {:.2}",
                self.frame_counter as f32 / elapsed,
                self.player.position.x,
                self.player.position.y,
                self.player.angle
            );
            self.frame_counter = 0;
            self.last_fps_print = now;
        }

        window.request_redraw();
        Ok(())
    }

    fn rebuild_lut(&mut self, dst_w: usize, dst_h: usize) {
        self.scale_lut = build_scale_lut(dst_w, dst_h, self.frame.width(), self.frame.height());
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.create_surface(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested; stopping");
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => match state {
                ElementState::Pressed if code == KeyCode::Escape => event_loop.exit(),
                ElementState::Pressed => {
                    self.keys_down.insert(code);
                }
                ElementState::Released => {
                    self.keys_down.remove(&code);
                }
            },

            WindowEvent::RedrawRequested => {
                self.tick();
                if let Err(err) = self.draw(id) {
                    self.fail(event_loop, err);
                }
            }

            WindowEvent::Resized(new_size) => {
                self.rebuild_lut(new_size.width as usize, new_size.height as usize);
            }
            _ => (),
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, _) } = event {
            self.input.mouse_dx += dx;
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

// softbuffer errors are not `Send`, so they are flattened to text.
fn presentation_error(what: &str, err: softbuffer::SoftBufferError) -> anyhow::Error {
    anyhow::anyhow!("failed to {what}: {err}")
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(workers) = cli.workers {
        config.workers = workers;
    }
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let map_text = match &cli.map {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read map {}", path.display()))?,
        None => DEFAULT_MAP.to_owned(),
    };
    let world = WorldGrid::parse(&map_text, config.world_scale).context("invalid map")?;
    let start = world
        .find_start_position()
        .context("cannot place the player")?;
    log::info!(
        "Map {}x{} tiles, scale {}, start at ({}, {})",
        world.width(),
        world.height(),
        world.scale(),
        start.x,
        start.y
    );

    let scheduler = FrameScheduler::new(config.workers)?;
    log::info!(
        "Rendering {}x{} on {} workers",
        config.width,
        config.height,
        scheduler.workers()
    );

    let ctx = RenderContext::new(world, &config);
    let mut app = App::new(ctx, scheduler, &config, PlayerState::new(start, 0.0));

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
