//! Trial lists for both phases, counterbalanced within each run.

use crate::config::{ConstantConfig, LimitsConfig};
use quartet_core::{ConditionLabel, ConstantCondition, LimitsCondition, QuartetPair, RatioDirection};
use rand::Rng;
use rand::seq::SliceRandom;

/// `n` items cycling through `levels`, shuffled. Counts differ by at most one
/// between levels.
pub fn balanced<T: Copy, R: Rng>(levels: &[T], n: usize, rng: &mut R) -> Vec<T> {
    if levels.is_empty() {
        return Vec::new();
    }
    let mut items: Vec<T> = (0..n).map(|i| levels[i % levels.len()]).collect();
    items.shuffle(rng);
    items
}

fn global_trial(trial: usize, trials_per_run: usize, run: usize) -> usize {
    trial + trials_per_run * (run - 1)
}

pub fn limits_conditions<R: Rng>(cfg: &LimitsConfig, rng: &mut R) -> Vec<LimitsCondition> {
    let mut out = Vec::with_capacity(cfg.runs * cfg.trials_per_run);
    for run in 1..=cfg.runs {
        let orders = balanced(&QuartetPair::ALL, cfg.trials_per_run, rng);
        let directions = balanced(&RatioDirection::ALL, cfg.trials_per_run, rng);
        for (i, (quartet_order, direction)) in orders.into_iter().zip(directions).enumerate() {
            out.push(LimitsCondition {
                trial: global_trial(i + 1, cfg.trials_per_run, run),
                run,
                flip_ms: cfg.flip_ms,
                response_delay_ms: cfg.response_delay_ms,
                feedback_ms: cfg.feedback_ms,
                iti_ms: cfg.iti_ms,
                quartet_order,
                direction,
            });
        }
    }
    out
}

/// Practice trials: random start pair and direction, not tied to any run.
pub fn practice_conditions<R: Rng>(cfg: &LimitsConfig, rng: &mut R) -> Vec<LimitsCondition> {
    (1..=cfg.practice_trials)
        .map(|trial| LimitsCondition {
            trial,
            run: 0,
            flip_ms: cfg.flip_ms,
            response_delay_ms: cfg.response_delay_ms,
            feedback_ms: cfg.feedback_ms,
            iti_ms: cfg.iti_ms,
            quartet_order: QuartetPair::ALL[rng.random_range(0..2)],
            direction: RatioDirection::ALL[rng.random_range(0..2)],
        })
        .collect()
}

pub fn constant_conditions<R: Rng>(
    cfg: &ConstantConfig,
    rng: &mut R,
) -> Vec<ConstantCondition> {
    let mut out = Vec::with_capacity(cfg.runs * cfg.trials_per_run);
    for run in 1..=cfg.runs {
        let labels = balanced(&ConditionLabel::ALL, cfg.trials_per_run, rng);
        let orders = balanced(&QuartetPair::ALL, cfg.trials_per_run, rng);
        for (i, (condition, quartet_order)) in labels.into_iter().zip(orders).enumerate() {
            out.push(ConstantCondition {
                trial: global_trial(i + 1, cfg.trials_per_run, run),
                run,
                first_frame_ms: cfg.first_frame_ms,
                flip_ms: cfg.flip_ms,
                cycles: cfg.cycles,
                response_delay_ms: cfg.response_delay_ms,
                report_timeout_ms: cfg.report_timeout_ms,
                feedback_ms: cfg.feedback_ms,
                iti_ms: cfg.iti_ms,
                condition,
                quartet_order,
            });
        }
    }
    out
}
