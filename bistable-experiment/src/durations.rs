//! Turns subject-level timing parameters into tick sequences.

use crate::error::BuildError;
use bistable_core::PhaseDurations;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

/// How the percept durations of an unambiguous block are produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PerceptPlan {
    /// Fixed durations, already in ticks, presented in shuffled order.
    Predefined(Vec<u32>),
    /// Mean percept duration plus uniform jitter, filling `budget_ticks` exactly.
    Jittered {
        percept_ticks: u32,
        jitter_ticks: u32,
        budget_ticks: u32,
    },
}

/// `total / step` phases of `step` ticks; a partial trailing step is dropped.
pub fn repeat_ticks(total: u32, step: u32) -> PhaseDurations {
    if step == 0 {
        return PhaseDurations::default();
    }
    PhaseDurations::repeat(step, (total / step) as usize)
}

/// Phases of `step` ticks summing to exactly `total`; the remainder lands on the last phase.
pub fn split_ticks(total: u32, step: u32) -> PhaseDurations {
    if total == 0 || step == 0 {
        return PhaseDurations::default();
    }
    let count = (total / step).max(1) as usize;
    let mut ticks = vec![step; count];
    let used = step.saturating_mul(count as u32);
    if let Some(last) = ticks.last_mut() {
        if used > total {
            *last = total;
        } else {
            *last += total - used;
        }
    }
    PhaseDurations::new(ticks)
}

/// Draws the percept durations for one unambiguous block.
pub fn plan_percepts<R: Rng>(plan: &PerceptPlan, rng: &mut R) -> Result<PhaseDurations, BuildError> {
    let durations = match plan {
        PerceptPlan::Predefined(ticks) => {
            let mut ticks = ticks.clone();
            ticks.shuffle(rng);
            PhaseDurations::new(ticks)
        }
        PerceptPlan::Jittered {
            percept_ticks,
            jitter_ticks,
            budget_ticks,
        } => jittered(*percept_ticks, *jitter_ticks, *budget_ticks, rng)?,
    };
    debug!(
        total = durations.total(),
        len = durations.len(),
        ticks = ?durations.ticks(),
        "planned unambiguous percepts"
    );
    Ok(durations)
}

fn jittered<R: Rng>(
    percept_ticks: u32,
    jitter_ticks: u32,
    budget_ticks: u32,
    rng: &mut R,
) -> Result<PhaseDurations, BuildError> {
    let jitter = jitter_ticks as i64;
    let budget = budget_ticks as u64;
    let mut sum = 0u64;
    let mut durations = PhaseDurations::default();
    loop {
        let draw = percept_ticks as i64 + rng.random_range(-jitter..=jitter);
        if draw <= 0 || draw > u32::MAX as i64 {
            return Err(BuildError::TickOverflow { ticks: draw });
        }
        if sum + draw as u64 > budget {
            break;
        }
        sum += draw as u64;
        durations.push(draw as u32);
    }
    durations.push((budget - sum) as u32);
    Ok(durations)
}
