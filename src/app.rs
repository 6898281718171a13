use crate::cli::Run;
use crate::eyetracker::MessageFileTracker;
use crate::keys::{key_name, KeyQueue};
use anyhow::{anyhow, Result};
use bistable_core::StimulusIndex;
use bistable_experiment::{
    CollaboratorError, EyeTracker, ExperimentConfig, InputSource, OutputPaths, Session,
    SessionStatus, Settings, Surface,
};
use bistable_render::SkiaRenderer;
use bistable_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowId},
};

const OUTPUT_ROOT: &str = "./output_data";

/// Session surface over the renderer. Presentation happens once per redraw,
/// after the session has drawn, so `flip` has nothing left to do.
struct FrameSurface<'a> {
    renderer: &'a mut SkiaRenderer,
}

impl Surface for FrameSurface<'_> {
    fn draw_stimulus(&mut self, index: StimulusIndex) -> Result<(), CollaboratorError> {
        Ok(self.renderer.draw_stimulus(index)?)
    }

    fn draw_text(&mut self, text: &str) -> Result<(), CollaboratorError> {
        Ok(self.renderer.draw_text(text)?)
    }

    fn flip(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn save_frame(&mut self, path: &Path) -> Result<(), CollaboratorError> {
        Ok(self.renderer.save_png(path)?)
    }
}

pub struct App {
    settings: Settings,
    session: Session,
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    renderer: Option<SkiaRenderer>,
    input: KeyQueue,
    timer: HighPrecisionTimer,
    last_flip: Option<u64>,
    current_size: Option<PhysicalSize<u32>>,
    refresh_rate: Option<f64>,
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(run: Run) -> Result<Self> {
        let settings_file = run.task.settings_file();
        let settings = Settings::load(&settings_file)?;
        let config = ExperimentConfig::from_settings(&settings, run.task, run.subject_id)?;
        info!(
            settings = %settings_file.display(),
            refresh_hz = config.timing.refresh_rate,
            screenticks_per_frame = config.timing.screenticks_per_frame,
            "settings loaded"
        );

        let output = OutputPaths::prepare(OUTPUT_ROOT, &run.output_str, run.task, config.screenshots)?;
        let tracker: Option<Box<dyn EyeTracker>> = if run.eyetracker {
            Some(Box::new(MessageFileTracker::new(output.eyetracker_file())))
        } else {
            None
        };

        let mut rng = config.rng();
        let session = Session::new(config, output, tracker, &mut rng)?;

        Ok(Self {
            settings,
            session,
            window: None,
            pixels: None,
            renderer: None,
            input: KeyQueue::new(),
            timer: HighPrecisionTimer::new(),
            last_flip: None,
            current_size: None,
            refresh_rate: None,
            failure: None,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        info!(
            start = %self.session.config().keys.start,
            exit = %self.session.config().keys.exit,
            "waiting for the window"
        );
        event_loop.run_app(&mut self)?;

        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        self.session.check_refresh(&self.timer);
        if let Some(renderer) = &self.renderer {
            renderer.log_component_stats();
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
        let expected = self.session.config().timing.refresh_rate;
        match self.refresh_rate {
            Some(hz) if (hz - expected).abs() > 1.0 => warn!(
                monitor_hz = hz,
                configured_hz = expected,
                "monitor refresh rate does not match `Monitor refreshrate`"
            ),
            Some(hz) => info!(monitor_hz = hz, "refresh rate"),
            None => warn!("monitor does not report its refresh rate"),
        }

        let fullscreen = self.settings.window.fullscreen.unwrap_or(true);
        let window_attributes = Window::default_attributes()
            .with_title("Bistable perception")
            .with_fullscreen(fullscreen.then(|| Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        info!(
            width = physical_size.width,
            height = physical_size.height,
            scale_factor = window.scale_factor(),
            "display configuration"
        );
        self.current_size = Some(physical_size);

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let mut renderer = SkiaRenderer::new(physical_size.width, physical_size.height)?;
        if let Some(font) = &self.settings.window.font_path {
            renderer.load_font(font)?;
        } else {
            warn!("no `Font path` configured, text screens stay blank");
        }
        renderer.load_stimuli(
            self.session.catalog().iter().map(|(_, _, asset)| asset),
            self.settings.window.pixels_per_degree,
        )?;
        self.renderer = Some(renderer);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    /// One display tick: the session draws, the frame is presented and timed.
    fn render(&mut self) -> Result<SessionStatus> {
        let (Some(pixels), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(SessionStatus::Running);
        };

        renderer.begin_frame();
        let events = self.input.released_keys();
        let now = self.timer.now_secs();
        let status = self
            .session
            .tick(now, &events, &mut FrameSurface { renderer: &mut *renderer })?;
        let stats = renderer.present(pixels.frame_mut())?;
        pixels.render()?;

        let flipped = self.timer.now();
        if let Some(last) = self.last_flip {
            self.timer
                .record_frame(Duration::from_nanos(flipped.saturating_sub(last)));
        }
        self.last_flip = Some(flipped);

        trace!(
            clear_ms = stats.clear.as_secs_f64() * 1e3,
            draw_ms = stats.draw.as_secs_f64() * 1e3,
            copy_ms = stats.copy.as_secs_f64() * 1e3,
            total_ms = stats.total.as_secs_f64() * 1e3,
            dirty = stats.dirty_count,
            "frame"
        );
        Ok(status)
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) -> Result<()> {
        if self.current_size == Some(new_size) {
            return Ok(());
        }
        self.current_size = Some(new_size);
        if let Some(pixels) = &mut self.pixels {
            pixels.resize_surface(new_size.width, new_size.height)?;
            pixels.resize_buffer(new_size.width, new_size.height)?;
        }
        if let Some(renderer) = &mut self.renderer {
            renderer.resize(new_size.width, new_size.height)?;
        }
        debug!(width = new_size.width, height = new_size.height, "display resized");
        Ok(())
    }

    /// Closes the session (saving its log) and leaves the event loop.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop, failure: Option<anyhow::Error>) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        if let Err(e) = self.session.close() {
            error!(error = %e, "failed to close session");
            self.failure.get_or_insert(e.into());
        }
        if let Some(e) = failure {
            error!(error = %e, "experiment stopped");
            self.failure = Some(e);
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.shutdown(event_loop, Some(e));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop, None),
            WindowEvent::RedrawRequested => match self.render() {
                Ok(SessionStatus::Running) => {
                    if let Some(win) = &self.window {
                        win.request_redraw();
                    }
                }
                Ok(status) => {
                    info!(?status, trials = self.session.trials().len(), "experiment over");
                    self.shutdown(event_loop, None);
                }
                Err(e) => self.shutdown(event_loop, Some(e)),
            },
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(name) = key_name(event.physical_key) else {
                    return;
                };
                let now = self.timer.now_secs();
                match event.state {
                    ElementState::Pressed => self.input.press(name, now),
                    ElementState::Released => self.input.release(name, now),
                }
            }
            WindowEvent::Resized(size) => {
                if let Err(e) = self.handle_resize(size) {
                    self.shutdown(event_loop, Some(e));
                }
            }
            _ => {}
        }
    }
}
