use super::TrialListBuilder;
use crate::durations::split_ticks;
use crate::error::BuildError;
use bistable_core::{BlockType, Trial, TrialLabel, TrialType};
use rand::Rng;

/// Tracks the animation frame last put on screen so that a rotation picks up
/// where the previous one stopped.
///
/// Frames are counted in the order of the right-rotation files; the left
/// rotation walks the same frames backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationCursor {
    frames: usize,
    last: usize,
}

impl RotationCursor {
    pub fn new(frames: usize) -> Self {
        Self { frames, last: 0 }
    }

    pub fn last_frame(&self) -> usize {
        self.last
    }

    /// The next `phases` frames in the given direction; the cursor ends on the last one.
    pub fn advance(&mut self, rightwards: bool, phases: usize) -> Vec<usize> {
        if self.frames == 0 {
            return Vec::new();
        }
        let n = self.frames;
        let frames: Vec<usize> = (1..=phases)
            .map(|k| {
                let k = k % n;
                if rightwards {
                    (self.last + k) % n
                } else {
                    (self.last + n - k) % n
                }
            })
            .collect();
        if let Some(&last) = frames.last() {
            self.last = last;
        }
        frames
    }

    /// Catalog name showing frame `frame` while rotating in the given direction.
    pub fn stimulus_name(&self, rightwards: bool, frame: usize) -> String {
        if rightwards {
            format!("unambiguous_right_{frame}")
        } else {
            format!("unambiguous_left_{}", self.frames - 1 - frame)
        }
    }
}

impl<R: Rng> TrialListBuilder<'_, R> {
    /// One trial stepping through the ambiguous animation, one frame per phase.
    pub(super) fn sphere_ambiguous(&mut self, block_id: u32, frames: usize) -> Result<(), BuildError> {
        let durations = self.ambiguous_phases();
        let indices = (0..durations.len())
            .map(|phase| {
                self.catalog
                    .index(&format!("ambiguous_{}", (phase + 1) % frames.max(1)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let trial = Trial::new(
            self.next_trial_nr(),
            block_id,
            BlockType::Ambiguous,
            TrialType::Ambiguous,
            TrialLabel::None,
            durations,
            indices,
        )?;
        self.push(trial);
        Ok(())
    }

    /// Alternating left/right rotation trials, one per percept.
    pub(super) fn sphere_unambiguous(
        &mut self,
        block_id: u32,
        percepts: &[u32],
        frames: usize,
    ) -> Result<(), BuildError> {
        let spf = self.config.timing.screenticks_per_frame;
        let mut cursor = RotationCursor::new(frames);
        for &percept_ticks in percepts {
            let trial_nr = self.next_trial_nr();
            let rightwards = trial_nr % 2 == 0;
            let trial_type = if rightwards {
                TrialType::Right
            } else {
                TrialType::Left
            };
            let durations = split_ticks(percept_ticks, spf);
            let indices = cursor
                .advance(rightwards, durations.len())
                .into_iter()
                .map(|frame| self.catalog.index(&cursor.stimulus_name(rightwards, frame)))
                .collect::<Result<Vec<_>, _>>()?;
            let trial = Trial::new(
                trial_nr,
                block_id,
                BlockType::Unambiguous,
                trial_type,
                TrialLabel::None,
                durations,
                indices,
            )?;
            self.push(trial);
        }
        Ok(())
    }
}
