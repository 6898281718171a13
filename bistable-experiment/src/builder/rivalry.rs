use super::TrialListBuilder;
use crate::config::RivalryStimuli;
use crate::durations::split_ticks;
use crate::error::{BuildError, CatalogError};
use bistable_core::{
    BlockType, ColorCombination, PhaseDurations, Trial, TrialLabel, TrialType,
};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// Shuffled colour combinations, one drawn per block; refilled once used up.
#[derive(Debug, Clone)]
pub struct ColorPool {
    size: usize,
    odd_blocks: bool,
    remaining: Vec<ColorCombination>,
}

impl ColorPool {
    /// Half as many entries as blocks, alternating combinations. With an odd block
    /// count the last entry is picked at random.
    pub fn new<R: Rng>(n_blocks: u32, rng: &mut R) -> Self {
        let mut pool = Self {
            size: (n_blocks as usize).div_ceil(2).max(1),
            odd_blocks: n_blocks % 2 != 0,
            remaining: Vec::new(),
        };
        pool.refill(rng);
        pool
    }

    fn refill<R: Rng>(&mut self, rng: &mut R) {
        self.remaining = (0..self.size)
            .map(|i| {
                if self.odd_blocks && i == self.size - 1 {
                    ColorCombination::ALL[usize::from(rng.random_bool(0.5))]
                } else {
                    ColorCombination::ALL[i % 2]
                }
            })
            .collect();
    }

    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> ColorCombination {
        if self.remaining.is_empty() {
            debug!(size = self.size, "colour pool exhausted, refilling");
            self.refill(rng);
        }
        self.remaining.shuffle(rng);
        self.remaining.remove(0)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

fn percept_type(trial_nr: u32) -> TrialType {
    if trial_nr % 2 == 0 {
        TrialType::House
    } else {
        TrialType::Face
    }
}

impl<R: Rng> TrialListBuilder<'_, R> {
    /// One trial showing the dichoptic composite for the whole ambiguous duration.
    pub(super) fn rivalry_ambiguous(&mut self, block_id: u32) -> Result<(), BuildError> {
        let color = self.ambiguous_colors.draw(self.rng);
        let index = self.catalog.index(&color.rivalry_name())?;
        let durations = self.ambiguous_phases();
        let indices = vec![index; durations.len()];
        let trial = Trial::new(
            self.next_trial_nr(),
            block_id,
            BlockType::Ambiguous,
            TrialType::Ambiguous,
            TrialLabel::Rivalry(color),
            durations,
            indices,
        )?;
        self.push(trial);
        Ok(())
    }

    /// One static trial per percept, each followed by a fading trial into the
    /// other image when fading is configured.
    ///
    /// A fading transition borrows half its length from the percept before it
    /// and half from the percept after it, so the block keeps its total duration.
    pub(super) fn rivalry_unambiguous(
        &mut self,
        block_id: u32,
        percepts: &[u32],
        rivalry: &RivalryStimuli,
    ) -> Result<(), BuildError> {
        let color = self.unambiguous_colors.draw(self.rng);
        let spf = self.config.timing.screenticks_per_frame;
        let images = rivalry.fading_images(spf) as usize;
        let fading = images > 0;
        let transition = rivalry.transition_length;
        let (cut_before, cut_after) = (transition / 2, transition - transition / 2);

        let mut percepts = percepts.to_vec();
        if fading {
            fold_short_tail(&mut percepts, cut_before);
        }

        let last = percepts.len().saturating_sub(1);
        for (i, &percept_ticks) in percepts.iter().enumerate() {
            let trial_nr = self.next_trial_nr();
            let trial_type = percept_type(trial_nr);
            let static_name = color
                .static_name(trial_type)
                .ok_or_else(|| CatalogError::Unknown(format!("{}_{}", trial_type, color.as_str())))?;
            let static_index = self.catalog.index(static_name)?;

            let static_ticks = if fading {
                let mut cut = 0;
                if i > 0 {
                    cut += cut_before;
                }
                if i < last {
                    cut += cut_after;
                }
                if percept_ticks <= cut {
                    return Err(BuildError::TransitionTooLong {
                        trial_nr,
                        percept_ticks,
                        cut_ticks: cut,
                    });
                }
                percept_ticks - cut
            } else {
                percept_ticks
            };
            let durations = split_ticks(static_ticks, spf);
            let indices = vec![static_index; durations.len()];
            let trial = Trial::new(
                trial_nr,
                block_id,
                BlockType::Unambiguous,
                trial_type,
                TrialLabel::Color(color),
                durations,
                indices,
            )?;
            self.push(trial);

            if fading && i < last {
                let direction = color.fading_from(trial_type).ok_or_else(|| {
                    CatalogError::Unknown(format!("fading_{}_{}", trial_type, color.as_str()))
                })?;
                let indices = (0..images)
                    .map(|step| self.catalog.index(&direction.step_name(step)))
                    .collect::<Result<Vec<_>, _>>()?;
                let durations =
                    PhaseDurations::repeat(rivalry.fading_length.phase_ticks(spf), images);
                let trial = Trial::new(
                    trial_nr,
                    block_id,
                    BlockType::Unambiguous,
                    trial_type,
                    TrialLabel::Fading(direction),
                    durations,
                    indices,
                )?;
                self.push(trial);
            }
        }
        Ok(())
    }
}

/// A closing percept too short to give up its share of the last transition is
/// merged into the percept before it.
fn fold_short_tail(percepts: &mut Vec<u32>, cut_before: u32) {
    if percepts.len() < 2 {
        return;
    }
    if let Some(&tail) = percepts.last() {
        if tail <= cut_before {
            percepts.pop();
            if let Some(prev) = percepts.last_mut() {
                *prev += tail;
            }
            debug!(tail, "short closing percept merged into the previous one");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn colour_pool_alternates_and_refills() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut pool = ColorPool::new(4, &mut rng);
        assert_eq!(pool.remaining(), 2);
        let mut drawn = vec![pool.draw(&mut rng), pool.draw(&mut rng)];
        drawn.sort_by_key(|c| c.as_str());
        assert_eq!(drawn, vec![ColorCombination::RedFace, ColorCombination::RedHouse]);

        assert_eq!(pool.remaining(), 0);
        pool.draw(&mut rng);
        assert_eq!(pool.remaining(), 1);
    }

    #[test]
    fn odd_block_counts_round_the_pool_up() {
        let mut rng = StdRng::seed_from_u64(1);
        let pool = ColorPool::new(5, &mut rng);
        assert_eq!(pool.remaining(), 3);
        let single = ColorPool::new(1, &mut rng);
        assert_eq!(single.remaining(), 1);
    }

    #[test]
    fn short_tail_is_folded() {
        let mut percepts = vec![200, 230, 7];
        fold_short_tail(&mut percepts, 10);
        assert_eq!(percepts, vec![200, 237]);

        let mut percepts = vec![200, 230, 70];
        fold_short_tail(&mut percepts, 10);
        assert_eq!(percepts, vec![200, 230, 70]);
    }

    #[test]
    fn percept_type_alternates_on_trial_number() {
        assert_eq!(percept_type(1), TrialType::Face);
        assert_eq!(percept_type(2), TrialType::House);
    }
}
