//! Drives a whole run: calibration, instructions, the trial list and the debrief screen.

use crate::builder::build_trial_list;
use crate::catalog::StimulusCatalog;
use crate::config::ExperimentConfig;
use crate::error::SessionError;
use crate::log::{ResponseButton, ResponseCounters, RunLog, SessionState};
use crate::output::OutputPaths;
use crate::runtime::{advance, Action, RuntimeContext, TrialCursor};
use bistable_core::{KeyEvent, SessionStage, StimulusIndex, Trial};
use bistable_timing::Timer;
use rand::Rng;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

const DEBRIEF_TEXT: &str = "End. \n Well done!:)";
/// Allowed relative deviation of the measured refresh rate.
const REFRESH_TOLERANCE: f64 = 0.05;

/// Something stimuli and text can be drawn onto, shown on `flip`.
pub trait Surface {
    fn draw_stimulus(&mut self, index: StimulusIndex) -> Result<(), CollaboratorError>;
    fn draw_text(&mut self, text: &str) -> Result<(), CollaboratorError>;
    fn flip(&mut self) -> Result<(), CollaboratorError>;
    fn save_frame(&mut self, path: &Path) -> Result<(), CollaboratorError>;
}

pub trait InputSource {
    /// Keys released since the previous call.
    fn released_keys(&mut self) -> Vec<KeyEvent>;
}

pub trait EyeTracker {
    fn calibrate(&mut self) -> Result<(), CollaboratorError>;
    fn start_recording(&mut self) -> Result<(), CollaboratorError>;
    fn send_message(&mut self, message: &str) -> Result<(), CollaboratorError>;
    fn stop_recording(&mut self) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished,
    Aborted,
}

fn collaborator(what: &'static str) -> impl FnOnce(CollaboratorError) -> SessionError {
    move |source| SessionError::Collaborator { what, source }
}

pub struct Session {
    config: ExperimentConfig,
    catalog: StimulusCatalog,
    trials: Vec<Trial>,
    output: OutputPaths,
    tracker: Option<Box<dyn EyeTracker>>,
    state: SessionState,
    stage: SessionStage,
    current: usize,
    cursor: TrialCursor,
    clock_origin: f64,
    paused: bool,
    last_drawn: Option<StimulusIndex>,
    status: SessionStatus,
}

impl Session {
    /// Builds the catalog and the trial list and draws the response-button mapping.
    pub fn new<R: Rng>(
        config: ExperimentConfig,
        output: OutputPaths,
        tracker: Option<Box<dyn EyeTracker>>,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let catalog = StimulusCatalog::for_config(&config)?;
        let response_button = ResponseButton::draw(rng);
        let trials = build_trial_list(&config, &catalog, rng)?;
        info!(
            subject = config.subject_id,
            task = %config.task,
            response_button = %response_button,
            trials = trials.len(),
            "session created"
        );
        Ok(Self::from_parts(
            config,
            catalog,
            trials,
            output,
            tracker,
            response_button,
        ))
    }

    pub fn from_parts(
        config: ExperimentConfig,
        catalog: StimulusCatalog,
        trials: Vec<Trial>,
        output: OutputPaths,
        tracker: Option<Box<dyn EyeTracker>>,
        response_button: ResponseButton,
    ) -> Self {
        Self {
            config,
            catalog,
            trials,
            output,
            tracker,
            state: SessionState::new(response_button),
            stage: SessionStage::default(),
            current: 0,
            cursor: TrialCursor::new(),
            clock_origin: 0.0,
            paused: false,
            last_drawn: None,
            status: SessionStatus::Running,
        }
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn catalog(&self) -> &StimulusCatalog {
        &self.catalog
    }

    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    pub fn output(&self) -> &OutputPaths {
        &self.output
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn log(&self) -> &RunLog {
        &self.state.log
    }

    pub fn counters(&self) -> ResponseCounters {
        self.state.counters
    }

    pub fn response_button(&self) -> ResponseButton {
        self.state.response_button
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Index into the trial list of the trial on screen.
    pub fn current_trial(&self) -> usize {
        self.current
    }

    pub fn instructions(&self) -> String {
        self.state
            .response_button
            .instructions(&self.config.stimulus_names)
    }

    /// Runs one display tick. `now` and the event times are seconds on the same clock.
    pub fn tick(
        &mut self,
        now: f64,
        events: &[KeyEvent],
        surface: &mut dyn Surface,
    ) -> Result<SessionStatus, SessionError> {
        if self.stage.is_closed() {
            return Ok(self.status);
        }

        if self.stage.requires_calibration() {
            if let Some(tracker) = self.tracker.as_mut() {
                info!("calibrating eye tracker");
                tracker.calibrate().map_err(collaborator("eye-tracker calibration"))?;
                tracker
                    .start_recording()
                    .map_err(collaborator("eye-tracker recording"))?;
            }
            self.next_stage();
        }

        if !self.stage.is_running() && events.iter().any(|e| e.is(&self.config.keys.exit)) {
            return self.abort(surface);
        }

        let start_pressed = self.stage.waits_for_start_key()
            && events.iter().any(|e| e.is(&self.config.keys.start));
        match self.stage {
            SessionStage::Instructions => {
                surface
                    .draw_text(&self.instructions())
                    .map_err(collaborator("drawing instructions"))?;
                if start_pressed {
                    self.clock_origin = now;
                    self.next_stage();
                    info!(trials = self.trials.len(), "experiment started");
                }
            }
            SessionStage::Trials => return self.tick_trials(now, events, surface),
            SessionStage::Debrief => {
                surface
                    .draw_text(DEBRIEF_TEXT)
                    .map_err(collaborator("drawing debrief"))?;
                if start_pressed {
                    self.close()?;
                    self.status = SessionStatus::Finished;
                    return Ok(self.status);
                }
            }
            SessionStage::Calibration | SessionStage::Closed => {}
        }
        Ok(SessionStatus::Running)
    }

    fn tick_trials(
        &mut self,
        now: f64,
        events: &[KeyEvent],
        surface: &mut dyn Surface,
    ) -> Result<SessionStatus, SessionError> {
        if self.paused {
            if events.iter().any(|e| e.is(&self.config.keys.exit)) {
                return self.abort(surface);
            }
            if events.iter().any(|e| e.is(&self.config.keys.resume)) {
                info!("resumed");
                self.paused = false;
            }
            if let Some(index) = self.last_drawn {
                surface
                    .draw_stimulus(index)
                    .map_err(collaborator("drawing stimulus"))?;
            }
            return Ok(SessionStatus::Running);
        }

        let ctx = RuntimeContext {
            keys: &self.config.keys,
            screenshots: self.config.screenshots,
            clock_origin: self.clock_origin,
        };
        // a trial that finished on the previous tick hands over to the next one
        // within the same tick, so no frame goes blank
        let step = loop {
            let Some(trial) = self.trials.get(self.current) else {
                info!("all trials done");
                self.next_stage();
                surface
                    .draw_text(DEBRIEF_TEXT)
                    .map_err(collaborator("drawing debrief"))?;
                return Ok(SessionStatus::Running);
            };
            let step = advance(trial, &mut self.cursor, now, events, ctx, &mut self.state);
            if step.draw.is_none() && step.trial_done {
                self.current += 1;
                self.cursor = TrialCursor::new();
                continue;
            }
            break step;
        };

        if let Some(tracker) = self.tracker.as_mut() {
            for marker in &step.markers {
                tracker
                    .send_message(marker)
                    .map_err(collaborator("eye-tracker message"))?;
            }
        }
        if let Some(index) = step.draw {
            surface
                .draw_stimulus(index)
                .map_err(collaborator("drawing stimulus"))?;
            self.last_drawn = Some(index);
        }

        for action in &step.actions {
            match action {
                Action::Screenshot { trial_type } => {
                    if let Some(path) = self.output.screenshot(&format!("_{trial_type}")) {
                        surface
                            .save_frame(&path)
                            .map_err(collaborator("saving screenshot"))?;
                        info!(path = %path.display(), "screenshot saved");
                    }
                }
                Action::Pause => {
                    info!(resume = %self.config.keys.resume, "paused");
                    self.paused = true;
                }
                Action::Quit => return self.abort(surface),
            }
        }

        if step.trial_done {
            self.current += 1;
            self.cursor = TrialCursor::new();
        }
        Ok(SessionStatus::Running)
    }

    fn next_stage(&mut self) {
        self.stage = self.stage.next().unwrap_or(SessionStage::Closed);
    }

    /// Exit key: keep what is on screen if screenshots are enabled, then close.
    fn abort(&mut self, surface: &mut dyn Surface) -> Result<SessionStatus, SessionError> {
        warn!(stage = ?self.stage, trial = self.current, "experiment aborted");
        if let Some(path) = self.output.screenshot("") {
            surface
                .save_frame(&path)
                .map_err(collaborator("saving screenshot"))?;
        }
        self.close()?;
        self.status = SessionStatus::Aborted;
        Ok(self.status)
    }

    /// Saves the run log and stops the eye tracker. Calling it again does nothing.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.stage.is_closed() {
            return Ok(());
        }
        self.stage = SessionStage::Closed;
        self.state.log.save_json(&self.output.events_file())?;
        if let Some(tracker) = self.tracker.as_mut() {
            tracker
                .stop_recording()
                .map_err(collaborator("stopping eye tracker"))?;
        }
        let counters = self.state.counters;
        info!(
            ambiguous = counters.ambiguous_responses,
            unambiguous = counters.unambiguous_responses,
            total = counters.total_responses,
            "session closed"
        );
        Ok(())
    }

    /// Ticks until the session finishes or is aborted, flipping after every tick.
    pub fn run<T: Timer>(
        &mut self,
        surface: &mut dyn Surface,
        input: &mut dyn InputSource,
        timer: &mut T,
    ) -> Result<SessionStatus, SessionError> {
        let mut last = timer.now();
        loop {
            let now = timer.now_secs();
            let events = input.released_keys();
            let status = self.tick(now, &events, surface)?;
            if status != SessionStatus::Running {
                self.check_refresh(&*timer);
                return Ok(status);
            }
            surface.flip().map_err(collaborator("flip"))?;
            let flipped = timer.now();
            timer.record_frame(Duration::from_nanos(flipped.saturating_sub(last)));
            last = flipped;
        }
    }

    /// Warns when the measured frame rate does not match the configured refresh rate.
    pub fn check_refresh<T: Timer>(&self, timer: &T) {
        let stats = timer.refresh_stats();
        let expected = self.config.timing.refresh_rate;
        if stats.deviates_from(expected, REFRESH_TOLERANCE) {
            warn!(
                measured_hz = stats.effective_hz,
                expected_hz = expected,
                jitter_ns = stats.jitter_ns,
                "measured refresh rate differs from the configured one"
            );
        } else {
            info!(measured_hz = stats.effective_hz, frames = timer.frame_count(), "refresh rate ok");
        }
    }
}
