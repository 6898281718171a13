//! Builds the ordered trial list of a run: one break before every numbered block,
//! block types alternating by subject parity.

mod rivalry;
mod sphere;

pub use rivalry::ColorPool;
pub use sphere::RotationCursor;

use crate::catalog::{tracking_test_name, StimulusCatalog, TRACKING_TARGETS};
use crate::config::{ExperimentConfig, TaskStimuli};
use crate::durations::{plan_percepts, repeat_ticks};
use crate::error::BuildError;
use bistable_core::{
    BlockType, PhaseDurations, StimulusIndex, Trial, TrialLabel, TrialType,
};
use rand::Rng;
use tracing::{debug, info};

pub fn build_trial_list<R: Rng>(
    config: &ExperimentConfig,
    catalog: &StimulusCatalog,
    rng: &mut R,
) -> Result<Vec<Trial>, BuildError> {
    TrialListBuilder::new(config, catalog, rng)?.build()
}

pub(crate) struct TrialListBuilder<'a, R: Rng> {
    config: &'a ExperimentConfig,
    catalog: &'a StimulusCatalog,
    rng: &'a mut R,
    trials: Vec<Trial>,
    /// Number handed to the next non-break trial.
    trial_nr: u32,
    break_index: StimulusIndex,
    ambiguous_colors: ColorPool,
    unambiguous_colors: ColorPool,
}

impl<'a, R: Rng> TrialListBuilder<'a, R> {
    pub(crate) fn new(
        config: &'a ExperimentConfig,
        catalog: &'a StimulusCatalog,
        rng: &'a mut R,
    ) -> Result<Self, BuildError> {
        let break_index = catalog.index(&config.stimuli.break_name)?;
        let ambiguous_colors = ColorPool::new(config.n_blocks, rng);
        let unambiguous_colors = ColorPool::new(config.n_blocks, rng);
        Ok(Self {
            config,
            catalog,
            rng,
            trials: Vec::new(),
            trial_nr: 1,
            break_index,
            ambiguous_colors,
            unambiguous_colors,
        })
    }

    pub(crate) fn build(mut self) -> Result<Vec<Trial>, BuildError> {
        let config = self.config;
        if config.test_eyetracker && self.catalog.contains(&tracking_test_name(0)) {
            self.push_tracking_test()?;
        }

        for block_id in 1..=config.n_blocks {
            self.push_break()?;
            let block_type = config.block_type(block_id);
            let before = self.trials.len();
            match (block_type, &config.stimuli.task) {
                (BlockType::Ambiguous, TaskStimuli::Rivalry(_)) => {
                    self.rivalry_ambiguous(block_id)?
                }
                (BlockType::Ambiguous, TaskStimuli::Sphere(s)) => {
                    self.sphere_ambiguous(block_id, s.nr_frames)?
                }
                (_, TaskStimuli::Rivalry(r)) => {
                    let percepts = self.percepts()?;
                    self.rivalry_unambiguous(block_id, &percepts, r)?
                }
                (_, TaskStimuli::Sphere(s)) => {
                    let percepts = self.percepts()?;
                    self.sphere_unambiguous(block_id, &percepts, s.nr_frames)?
                }
            }
            info!(
                block_id,
                block_type = %block_type,
                trials = self.trials.len() - before,
                "block created"
            );
        }

        info!(
            trials = self.trials.len(),
            blocks = config.n_blocks,
            "trial list built"
        );
        Ok(self.trials)
    }

    fn next_trial_nr(&mut self) -> u32 {
        let nr = self.trial_nr;
        self.trial_nr += 1;
        nr
    }

    /// Percept durations for one unambiguous block. Entries of zero ticks carry no trial.
    fn percepts(&mut self) -> Result<Vec<u32>, BuildError> {
        let planned = plan_percepts(&self.config.timing.percept, self.rng)?;
        let percepts: Vec<u32> = planned.iter().filter(|&t| t > 0).collect();
        if percepts.len() != planned.len() {
            debug!(dropped = planned.len() - percepts.len(), "dropped empty percepts");
        }
        Ok(percepts)
    }

    /// Duration sequence of the whole ambiguous phase.
    fn ambiguous_phases(&self) -> PhaseDurations {
        repeat_ticks(
            self.config.timing.ambiguous_ticks,
            self.config.timing.screenticks_per_frame,
        )
    }

    fn push(&mut self, trial: Trial) {
        debug!(
            trial_nr = trial.trial_nr,
            block_id = trial.block_id,
            trial_type = %trial.trial_type,
            label = %trial.label,
            phases = trial.phase_count(),
            ticks = trial.total_ticks(),
            "trial created"
        );
        self.trials.push(trial);
    }

    fn push_break(&mut self) -> Result<(), BuildError> {
        let durations = repeat_ticks(
            self.config.timing.break_ticks,
            self.config.timing.screenticks_per_frame,
        );
        let indices = vec![self.break_index; durations.len()];
        let trial = Trial::new(
            0,
            0,
            BlockType::Break,
            TrialType::Break,
            TrialLabel::Break,
            durations,
            indices,
        )?;
        self.push(trial);
        Ok(())
    }

    /// Cycles the corner targets once over the break duration.
    fn push_tracking_test(&mut self) -> Result<(), BuildError> {
        let timing = &self.config.timing;
        let per_target = repeat_ticks(
            timing.break_ticks / TRACKING_TARGETS.len() as u32,
            timing.screenticks_per_frame,
        );
        let mut durations = PhaseDurations::default();
        let mut indices = Vec::new();
        for i in 0..TRACKING_TARGETS.len() {
            let index = self.catalog.index(&tracking_test_name(i))?;
            for ticks in per_target.iter() {
                durations.push(ticks);
                indices.push(index);
            }
        }
        let trial = Trial::new(
            0,
            0,
            BlockType::Break,
            TrialType::TrackingTest,
            TrialLabel::None,
            durations,
            indices,
        )?;
        self.push(trial);
        Ok(())
    }
}
