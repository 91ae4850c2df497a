use ab_glyph::FontVec;
use anyhow::{Context, Result, anyhow};
use quartet_core::Key;
use quartet_engine::output::{save_constant, save_limits, save_profile};
use quartet_engine::{EngineError, MonitorConfig, OutputPaths, Session, SessionConfig, SessionEvent};
use quartet_render::{RenderSettings, SkiaRenderer};
use quartet_timing::{Clock, HighPrecisionClock};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key as WinitKey, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    session: Session<HighPrecisionClock>,
    renderer: Option<SkiaRenderer>,
    font: Option<FontVec>,
    monitor: MonitorConfig,
    paths: OutputPaths,
    refresh_rate: Option<f64>,
    last_present_ns: Option<u64>,

    aborted: bool,
    should_exit: bool,
}

impl App {
    pub fn new(
        config: SessionConfig,
        monitor: MonitorConfig,
        paths: OutputPaths,
        font: Option<FontVec>,
    ) -> Self {
        let clock = HighPrecisionClock::new();
        let session = Session::new(config, clock, &mut rand::rng());

        Self {
            window: None,
            pixels: None,
            session,
            renderer: None,
            font,
            monitor,
            paths,
            refresh_rate: None,
            last_present_ns: None,
            aborted: false,
            should_exit: false,
        }
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            platform = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "event loop ready"
        );
        event_loop.run_app(&mut self)?;
        self.outcome()
    }

    /// An aborted session is an error for the caller, so the process exit
    /// status tells it apart from a completed one.
    fn outcome(&self) -> Result<()> {
        if self.aborted {
            return Err(EngineError::AbortRequested.into());
        }
        Ok(())
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title(self.session.config().session.experiment_name.clone())
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();

        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = window.scale_factor(),
            refresh_hz = ?self.refresh_rate,
            "display configuration"
        );
        if physical_size.width != self.monitor.width_px || physical_size.height != self.monitor.height_px {
            warn!(
                preset_width = self.monitor.width_px,
                preset_height = self.monitor.height_px,
                width = physical_size.width,
                height = physical_size.height,
                "window size differs from the monitor preset"
            );
        }
        if let Some(hz) = self.refresh_rate {
            if (hz - self.monitor.refresh_hz).abs() > 1.0 {
                warn!(preset_hz = self.monitor.refresh_hz, hz, "refresh rate differs from the monitor preset");
            }
        }

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let settings = self.render_settings(physical_size);
        self.renderer = Some(SkiaRenderer::new(settings, self.font.take())?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render_settings(&self, size: PhysicalSize<u32>) -> RenderSettings {
        let stimulus = &self.session.config().stimulus;
        RenderSettings {
            width: size.width,
            height: size.height,
            pixels_per_degree: self.monitor.pixels_per_degree() as f32,
            square_size_deg: stimulus.square_size_deg as f32,
            fixation_radius_deg: stimulus.fixation_radius_deg as f32,
            text_height_deg: stimulus.text_height_deg as f32,
            background_rgb: stimulus.background_rgb,
            square_rgb: stimulus.square_rgb,
        }
    }

    /// One display frame: deadlines, draw, present, then the key poll.
    fn frame(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let Some(mut events) = self.advance_session()? else {
            self.cleanup_and_exit(event_loop);
            return Ok(());
        };

        let screen = self.session.screen();
        let pix = self.pixels.as_mut().context("no surface")?;
        let renderer = self.renderer.as_mut().context("no renderer")?;
        let stats = renderer.render_frame(&screen, pix.frame_mut())?;
        pix.render()?;

        let presented = self.session.clock().now();
        if let Some(prev) = self.last_present_ns.replace(presented) {
            self.session
                .clock_mut()
                .record_frame(Duration::from_nanos(presented.saturating_sub(prev)));
        }
        debug!(
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            "frame"
        );

        events.extend(self.session.handle_input());
        for event in events {
            self.on_session_event(event, event_loop)?;
        }
        Ok(())
    }

    /// Deadlines for this frame. `None` once the abort key has been seen.
    fn advance_session(&mut self) -> Result<Option<Vec<SessionEvent>>> {
        match self.session.advance() {
            Ok(events) => Ok(Some(events)),
            Err(EngineError::AbortRequested) => {
                warn!("session aborted by the subject or experimenter");
                self.aborted = true;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn on_session_event(&mut self, event: SessionEvent, event_loop: &ActiveEventLoop) -> Result<()> {
        match event {
            SessionEvent::LimitsComplete => {
                save_limits(&self.paths, self.session.limits_records())?;
            }
            SessionEvent::ProfileReady => {
                let profile = self
                    .session
                    .profile()
                    .context("profile event without a profile")?;
                save_profile(&self.paths, profile, self.session.limits_records())?;
            }
            SessionEvent::ConstantComplete => {
                save_constant(&self.paths, self.session.constant_records())?;
            }
            SessionEvent::Finished => self.cleanup_and_exit(event_loop),
            // a clock reset invalidates the previous present timestamp
            SessionEvent::PhaseStarted(_) => self.last_present_ns = None,
            other => debug!(?other, "session event"),
        }
        Ok(())
    }

    fn handle_input(&mut self, key: &WinitKey) {
        if let Some(key) = map_key(key) {
            self.session.key_pressed(key);
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                error!("failed to resize surface: {e}");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                error!("failed to resize buffer: {e}");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                error!("failed to resize canvas: {e:#}");
            }
        }
        info!(width = new_size.width, height = new_size.height, "display resized");
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }

        let stats = self.session.clock().calibration_stats();
        info!(
            samples = stats.samples,
            mean_ms = stats.average_frame_time_ns / 1e6,
            jitter_ms = stats.jitter_ns / 1e6,
            min_ms = stats.min_frame_time_ns / 1e6,
            max_ms = stats.max_frame_time_ns / 1e6,
            fps = stats.effective_fps,
            "frame timing"
        );
        if let Some(renderer) = &self.renderer {
            let draw = renderer.draw_stats();
            info!(
                mean_ms = draw.average_frame_time_ns / 1e6,
                max_ms = draw.max_frame_time_ns / 1e6,
                "draw timing"
            );
        }
        info!(output = %self.paths.output_dir().display(), "session closed");

        self.should_exit = true;
        event_loop.exit();
    }
}

/// Keyboard keys the session understands. Letters are folded to lower case.
fn map_key(key: &WinitKey) -> Option<Key> {
    match key {
        WinitKey::Named(NamedKey::Space) => Some(Key::Space),
        WinitKey::Named(NamedKey::Escape) => Some(Key::Escape),
        WinitKey::Named(NamedKey::Enter) => Some(Key::Return),
        WinitKey::Character(s) => s.chars().next().map(|c| Key::Char(c.to_ascii_lowercase())),
        _ => None,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                error!("failed to create window and surface: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.cleanup_and_exit(event_loop),
            WindowEvent::RedrawRequested => {
                if self.should_exit {
                    return;
                }
                if let Err(e) = self.frame(event_loop) {
                    error!("frame failed: {e:#}");
                    self.cleanup_and_exit(event_loop);
                    return;
                }
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() && !event.repeat => {
                self.handle_input(&event.logical_key);
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}
