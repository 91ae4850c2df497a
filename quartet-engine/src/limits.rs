//! Phase 1 controller: method of limits.
//!
//! The quartet alternates every `flip_ms`; after every full cycle (two
//! alternations) the displayed ratio moves one step along the assigned
//! ascending or descending list. The trial ends on the first qualifying key
//! press or when the list runs out.

use crate::scheduler::AlternationScheduler;
use quartet_core::{
    Key, KeyPress, LimitsCondition, LimitsRecord, LimitsResponse, QuartetFrame, QuartetPair,
    RatioSequence,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LimitsStep {
    Presenting,
    Responded(LimitsResponse),
    /// The ratio list ran out before any qualifying key.
    Exhausted,
}

impl LimitsStep {
    pub fn is_finished(&self) -> bool {
        !matches!(self, LimitsStep::Presenting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitsState {
    pub pair: QuartetPair,
    pub n_flip: u32,
    pub n_step: usize,
    /// Ratio currently on screen.
    pub ratio: f64,
}

#[derive(Debug, Clone)]
pub struct LimitsTrial {
    ratios: Arc<[f64]>,
    scheduler: AlternationScheduler,
    response_key: Key,
    response_delay_ns: u64,
    radius: f64,
    state: LimitsState,
    finished: Option<LimitsStep>,
}

impl LimitsTrial {
    pub fn new(
        condition: &LimitsCondition,
        sequence: &RatioSequence,
        response_key: Key,
        radius: f64,
        start_ns: u64,
    ) -> Self {
        let ratios = sequence.list(condition.direction);
        let first = ratios.first().copied().unwrap_or(f64::NAN);
        Self {
            scheduler: AlternationScheduler::new(
                start_ns,
                Duration::from_millis(condition.flip_ms),
            ),
            ratios,
            response_key,
            response_delay_ns: condition.response_delay_ms * 1_000_000,
            radius,
            state: LimitsState {
                pair: condition.quartet_order,
                n_flip: 0,
                n_step: 0,
                ratio: first,
            },
            finished: None,
        }
    }

    /// Deadline check for this frame. At most one alternation per call.
    pub fn advance(&mut self, now_ns: u64) -> LimitsStep {
        if let Some(done) = self.finished {
            return done;
        }
        if let Some(flips) = self.scheduler.poll(now_ns) {
            self.state.pair = self.state.pair.toggled();
            self.state.n_flip = flips;
            if flips % 2 == 0 {
                let Some(&ratio) = self.ratios.get(self.state.n_step) else {
                    debug!(flips, steps = self.state.n_step, "ratio list exhausted");
                    self.finished = Some(LimitsStep::Exhausted);
                    return LimitsStep::Exhausted;
                };
                self.state.ratio = ratio;
                self.state.n_step += 1;
            }
        }
        LimitsStep::Presenting
    }

    /// Offers this frame's key events. The first press of the response key
    /// that lands strictly after the response delay ends the trial.
    pub fn offer(&mut self, presses: &[KeyPress]) -> LimitsStep {
        if let Some(done) = self.finished {
            return done;
        }
        let start = self.scheduler.start_ns();
        let accepted = presses.iter().find(|p| {
            p.key == self.response_key && p.timestamp_ns.saturating_sub(start) > self.response_delay_ns
        });
        match accepted {
            Some(press) => {
                let response = LimitsResponse {
                    key: press.key,
                    response_time_ns: press.timestamp_ns - start,
                    ratio: self.state.ratio,
                    flip: self.state.n_flip,
                };
                self.finished = Some(LimitsStep::Responded(response));
                LimitsStep::Responded(response)
            }
            None => LimitsStep::Presenting,
        }
    }

    pub fn frame(&self) -> QuartetFrame {
        QuartetFrame::at_ratio(self.state.pair, self.state.ratio, self.radius)
    }

    pub fn state(&self) -> &LimitsState {
        &self.state
    }

    pub fn start_ns(&self) -> u64 {
        self.scheduler.start_ns()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    pub fn response(&self) -> Option<LimitsResponse> {
        match self.finished {
            Some(LimitsStep::Responded(r)) => Some(r),
            _ => None,
        }
    }

    pub fn into_record(self, condition: LimitsCondition) -> LimitsRecord {
        LimitsRecord {
            response: self.response(),
            condition,
        }
    }
}
