//! Per-trial phase stepping and response handling.

use crate::config::KeyBindings;
use crate::log::SessionState;
use bistable_core::{KeyEvent, LogRow, StimulusIndex, Trial, TrialType};
use tracing::{debug, info};

/// Progress through the trial currently on screen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialCursor {
    pub phase: usize,
    pub ticks_in_phase: u32,
    /// Ticks shown since the trial started.
    pub ticks: u32,
    pub exit_phase: bool,
    /// Experiment-clock time of the first tick, set on that tick.
    pub onset: Option<f64>,
}

impl TrialCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, trial: &Trial) -> bool {
        self.exit_phase || self.phase >= trial.phase_count()
    }
}

/// Side effects the runtime asks the session to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Screenshot { trial_type: TrialType },
    Pause,
    Quit,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    pub draw: Option<StimulusIndex>,
    pub actions: Vec<Action>,
    /// Eye-tracker messages produced on this tick.
    pub markers: Vec<String>,
    pub trial_done: bool,
}

/// Session-wide inputs that stay fixed while a trial runs.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeContext<'a> {
    pub keys: &'a KeyBindings,
    pub screenshots: bool,
    /// Timestamp at which the experiment clock was reset.
    pub clock_origin: f64,
}

/// Runs one display tick of `trial`: picks the stimulus for the current phase,
/// handles the keys released since the previous tick, then moves the phase
/// counter on.
pub fn advance(
    trial: &Trial,
    cursor: &mut TrialCursor,
    now: f64,
    events: &[KeyEvent],
    ctx: RuntimeContext<'_>,
    state: &mut SessionState,
) -> Step {
    let mut step = Step::default();
    if cursor.is_done(trial) {
        step.trial_done = true;
        return step;
    }

    let trial_onset = match cursor.onset {
        Some(onset) => onset,
        None => {
            let onset = now - ctx.clock_origin;
            cursor.onset = Some(onset);
            info!(
                trial_nr = trial.trial_nr,
                block_id = trial.block_id,
                trial_type = %trial.trial_type,
                onset,
                "trial started"
            );
            step.markers.push(format!(
                "start_type-{}_trial-{}_phase-0",
                trial.trial_type, trial.trial_nr
            ));
            onset
        }
    };

    step.draw = trial.stimulus_at(cursor.phase);

    for event in events {
        if event.is(&ctx.keys.exit) {
            info!(trial_nr = trial.trial_nr, "exit key pressed");
            step.actions.push(Action::Quit);
            return step;
        }
        if ctx.screenshots && event.is(&ctx.keys.screenshot) {
            step.actions.push(Action::Screenshot {
                trial_type: trial.trial_type,
            });
            continue;
        }

        let onset = event.time - ctx.clock_origin;
        state.counters.record(trial.block_type);
        state.log.append(LogRow {
            event_type: trial.trial_type.to_string(),
            trial_nr: trial.trial_nr,
            onset,
            reaction_time: Some(onset - trial_onset),
            key_duration: event.duration,
            phase: cursor.phase,
            response: event.name.clone(),
            response_button: state.response_button.as_str().to_string(),
            nr_frames: cursor.ticks,
            block_type: trial.block_type.to_string(),
            trial_type: trial.trial_type.to_string(),
            block_id: trial.block_id,
            color_comb: trial.label.to_string(),
            phase_length: trial.phase_count(),
        });
        info!(
            trial_nr = trial.trial_nr,
            phase = cursor.phase,
            key = %event.name,
            onset,
            "response"
        );
        step.markers.push(format!(
            "start_type-{}_trial-{}_phase-{}_key-{}_time-{}_duration-{}",
            trial.trial_type,
            trial.trial_nr,
            cursor.phase,
            event.name,
            onset,
            event.duration.unwrap_or(f64::NAN),
        ));

        if ctx.keys.pauses(&event.name) {
            step.actions.push(Action::Pause);
        }
        if ctx.keys.advances(&event.name) {
            debug!(trial_nr = trial.trial_nr, "advance key ends the trial");
            cursor.exit_phase = true;
        }
    }

    cursor.ticks += 1;
    cursor.ticks_in_phase += 1;
    if let Some(length) = trial.phase_durations().get(cursor.phase) {
        if cursor.ticks_in_phase >= length {
            cursor.phase += 1;
            cursor.ticks_in_phase = 0;
        }
    }
    step.trial_done = cursor.is_done(trial);
    step
}
