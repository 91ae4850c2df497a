//! Phase 2 controller: method of constant stimuli.
//!
//! A trial shows one personalized ratio for a fixed number of full cycles and
//! then opens a report window for a two-way forced choice.

use crate::scheduler::AlternationScheduler;
use quartet_core::{
    ConstantCondition, ConstantRecord, ConstantResponse, Key, KeyPress, PerceptLabel,
    QuartetFrame, QuartetPair, Screen,
};
use std::time::Duration;
use tracing::debug;

/// Keys mapped to the two percept labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerceptKeys {
    pub vertical: Key,
    pub horizontal: Key,
}

impl PerceptKeys {
    pub fn new(vertical: Key, horizontal: Key) -> Self {
        Self {
            vertical,
            horizontal,
        }
    }

    pub fn label_for(&self, key: Key) -> Option<PerceptLabel> {
        if key == self.vertical {
            Some(PerceptLabel::Vertical)
        } else if key == self.horizontal {
            Some(PerceptLabel::Horizontal)
        } else {
            None
        }
    }

    pub fn keys(&self) -> [Key; 2] {
        [self.vertical, self.horizontal]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantStep {
    Presenting,
    /// The last alternation has been shown. Pending key events should be
    /// discarded before the report window is polled.
    PresentationComplete,
    AwaitingReport,
    Reported(ConstantResponse),
    /// Only reachable when a report timeout is configured.
    TimedOut,
}

impl ConstantStep {
    pub fn is_finished(&self) -> bool {
        matches!(self, ConstantStep::Reported(_) | ConstantStep::TimedOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Presentation,
    Report { opened_ns: u64 },
    Done(Option<ConstantResponse>),
}

#[derive(Debug, Clone)]
pub struct ConstantStimuliTrial {
    scheduler: AlternationScheduler,
    total_flips: u32,
    pair: QuartetPair,
    ratio: f64,
    radius: f64,
    response_delay_ns: u64,
    report_timeout_ns: Option<u64>,
    keys: PerceptKeys,
    stage: Stage,
}

impl ConstantStimuliTrial {
    pub fn new(
        condition: &ConstantCondition,
        ratio: f64,
        radius: f64,
        keys: PerceptKeys,
        start_ns: u64,
    ) -> Self {
        Self {
            scheduler: AlternationScheduler::with_first_interval(
                start_ns,
                Duration::from_millis(condition.first_frame_ms),
                Duration::from_millis(condition.flip_ms),
            ),
            total_flips: condition.cycles * 2,
            pair: condition.quartet_order,
            ratio,
            radius,
            response_delay_ns: condition.response_delay_ms * 1_000_000,
            report_timeout_ns: condition.report_timeout_ms.map(|ms| ms * 1_000_000),
            keys,
            stage: Stage::Presentation,
        }
    }

    pub fn advance(&mut self, now_ns: u64) -> ConstantStep {
        match self.stage {
            Stage::Presentation => {
                if self.scheduler.flips() < self.total_flips
                    && self.scheduler.poll(now_ns).is_some()
                {
                    self.pair = self.pair.toggled();
                }
                if self.scheduler.flips() >= self.total_flips {
                    debug!(flips = self.scheduler.flips(), "presentation complete");
                    self.stage = Stage::Report { opened_ns: now_ns };
                    return ConstantStep::PresentationComplete;
                }
                ConstantStep::Presenting
            }
            Stage::Report { opened_ns } => match self.report_timeout_ns {
                Some(limit) if now_ns.saturating_sub(opened_ns) > limit => {
                    debug!(limit_ns = limit, "report window expired");
                    self.stage = Stage::Done(None);
                    ConstantStep::TimedOut
                }
                _ => ConstantStep::AwaitingReport,
            },
            Stage::Done(outcome) => Self::finished(outcome),
        }
    }

    /// Offers this frame's key events. Ignored outside the report window.
    pub fn offer(&mut self, presses: &[KeyPress]) -> ConstantStep {
        let opened_ns = match self.stage {
            Stage::Presentation => return ConstantStep::Presenting,
            Stage::Done(outcome) => return Self::finished(outcome),
            Stage::Report { opened_ns } => opened_ns,
        };
        let accepted = presses.iter().find_map(|p| {
            let label = self.keys.label_for(p.key)?;
            let latency = p.timestamp_ns.saturating_sub(opened_ns);
            (latency > self.response_delay_ns).then_some(ConstantResponse {
                key: p.key,
                response_time_ns: latency,
                label,
            })
        });
        match accepted {
            Some(response) => {
                self.stage = Stage::Done(Some(response));
                ConstantStep::Reported(response)
            }
            None => ConstantStep::AwaitingReport,
        }
    }

    fn finished(outcome: Option<ConstantResponse>) -> ConstantStep {
        match outcome {
            Some(r) => ConstantStep::Reported(r),
            None => ConstantStep::TimedOut,
        }
    }

    pub fn screen(&self) -> Screen {
        match self.stage {
            Stage::Presentation => Screen::Quartet(self.frame()),
            _ => Screen::ReportPrompt,
        }
    }

    pub fn frame(&self) -> QuartetFrame {
        QuartetFrame::at_ratio(self.pair, self.ratio, self.radius)
    }

    /// Alternations shown so far.
    pub fn toggles(&self) -> u32 {
        self.scheduler.flips()
    }

    pub fn in_report_window(&self) -> bool {
        matches!(self.stage, Stage::Report { .. })
    }

    pub fn response(&self) -> Option<ConstantResponse> {
        match self.stage {
            Stage::Done(outcome) => outcome,
            _ => None,
        }
    }

    pub fn into_record(self, condition: ConstantCondition) -> ConstantRecord {
        ConstantRecord {
            ratio: self.ratio,
            response: self.response(),
            condition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quartet_core::ConditionLabel;

    const MS: u64 = 1_000_000;

    fn condition(cycles: u32, timeout: Option<u64>) -> ConstantCondition {
        ConstantCondition {
            trial: 1,
            run: 1,
            first_frame_ms: 500,
            flip_ms: 500,
            cycles,
            response_delay_ms: 150,
            report_timeout_ms: timeout,
            feedback_ms: 1000,
            iti_ms: 1000,
            condition: ConditionLabel::Parity,
            quartet_order: QuartetPair::RightTilted,
        }
    }

    fn keys() -> PerceptKeys {
        PerceptKeys::new(Key::Char('v'), Key::Char('h'))
    }

    /// Runs the presentation with the given frame gaps until the report
    /// window opens, returning the time it opened and the observed toggles.
    fn present(t: &mut ConstantStimuliTrial, gaps_ms: impl Iterator<Item = u64>) -> (u64, u32) {
        let mut now = 0;
        let mut toggles = 0;
        let mut last = t.frame().pair;
        for gap in gaps_ms {
            now += gap * MS;
            let step = t.advance(now);
            if t.frame().pair != last {
                toggles += 1;
                last = t.frame().pair;
            }
            if step == ConstantStep::PresentationComplete {
                return (now, toggles);
            }
        }
        panic!("presentation never completed");
    }

    #[test]
    fn presentation_toggles_exactly_twice_per_cycle_under_jitter() {
        for cycles in 1..=4 {
            let mut t = ConstantStimuliTrial::new(&condition(cycles, None), 1.0, 3.0, keys(), 0);
            let gaps = (0..).map(|i: u64| (i * 13 + 5) % 41 + 1);
            let (_, toggles) = present(&mut t, gaps);
            assert_eq!(toggles, cycles * 2);
            assert_eq!(t.toggles(), cycles * 2);
            // even number of toggles returns to the starting pair
            assert_eq!(t.frame().pair, QuartetPair::RightTilted);
        }
    }

    #[test]
    fn multi_second_stall_still_toggles_exactly_twice_per_cycle() {
        let mut t = ConstantStimuliTrial::new(&condition(2, None), 1.0, 3.0, keys(), 0);
        // 3 s freeze on the second frame skips every deadline
        let gaps = [10, 3_000].into_iter().chain(std::iter::repeat(10));
        let (opened, toggles) = present(&mut t, gaps);
        assert_eq!(toggles, 4);
        assert_eq!(t.toggles(), 4);
        // one toggle on each of frames 2 to 5
        assert_eq!(opened, 3_040 * MS);
        assert_eq!(t.frame().pair, QuartetPair::RightTilted);

        // the window opens at the catch-up frame, not at the stalled deadline
        let early = t.offer(&[KeyPress::new(Key::Char('v'), opened + 100 * MS)]);
        assert_eq!(early, ConstantStep::AwaitingReport);
    }

    #[test]
    fn stall_never_toggles_twice_in_one_poll() {
        let mut t = ConstantStimuliTrial::new(&condition(3, None), 1.0, 3.0, keys(), 0);
        let mut seen = 0;
        loop {
            let step = t.advance(10_000 * MS);
            assert_eq!(t.toggles(), seen + 1);
            seen = t.toggles();
            if step == ConstantStep::PresentationComplete {
                break;
            }
        }
        assert_eq!(seen, 6);
    }

    #[test]
    fn first_frame_can_be_held_longer() {
        let mut c = condition(1, None);
        c.first_frame_ms = 800;
        c.flip_ms = 200;
        let mut t = ConstantStimuliTrial::new(&c, 1.0, 3.0, keys(), 0);
        assert_eq!(t.advance(700 * MS), ConstantStep::Presenting);
        assert_eq!(t.toggles(), 0);
        t.advance(801 * MS);
        assert_eq!(t.toggles(), 1);
        assert_eq!(t.advance(1_001 * MS), ConstantStep::PresentationComplete);
        assert_eq!(t.toggles(), 2);
        assert_eq!(t.screen(), Screen::ReportPrompt);
    }

    #[test]
    fn keys_during_presentation_are_ignored() {
        let mut t = ConstantStimuliTrial::new(&condition(1, None), 1.0, 3.0, keys(), 0);
        t.advance(600 * MS);
        let step = t.offer(&[KeyPress::new(Key::Char('v'), 600 * MS)]);
        assert_eq!(step, ConstantStep::Presenting);
        assert!(t.response().is_none());
        assert!(matches!(t.screen(), Screen::Quartet(_)));
    }

    #[test]
    fn guard_is_measured_from_the_report_window() {
        let mut t = ConstantStimuliTrial::new(&condition(1, None), 1.0, 3.0, keys(), 0);
        let (opened, _) = present(&mut t, std::iter::repeat(10));
        assert!(t.in_report_window());
        assert_eq!(t.screen(), Screen::ReportPrompt);

        // well past trial start, but inside the guard of the new reference
        let early = t.offer(&[KeyPress::new(Key::Char('h'), opened + 100 * MS)]);
        assert_eq!(early, ConstantStep::AwaitingReport);

        let step = t.offer(&[
            KeyPress::new(Key::Space, opened + 200 * MS),
            KeyPress::new(Key::Char('h'), opened + 300 * MS),
            KeyPress::new(Key::Char('v'), opened + 310 * MS),
        ]);
        let ConstantStep::Reported(r) = step else {
            panic!("expected a report, got {step:?}");
        };
        assert_eq!(r.label, PerceptLabel::Horizontal);
        assert_eq!(r.response_time_ns, 300 * MS);
        assert_eq!(t.advance(opened + 5_000 * MS), ConstantStep::Reported(r));
    }

    #[test]
    fn report_window_waits_indefinitely_without_timeout() {
        let mut t = ConstantStimuliTrial::new(&condition(1, None), 1.0, 3.0, keys(), 0);
        let (opened, _) = present(&mut t, std::iter::repeat(10));
        for hour in 1..=3 {
            assert_eq!(
                t.advance(opened + hour * 3_600_000 * MS),
                ConstantStep::AwaitingReport
            );
        }
        assert!(t.response().is_none());
    }

    #[test]
    fn configured_timeout_ends_without_response() {
        let mut t =
            ConstantStimuliTrial::new(&condition(1, Some(2_000)), 0.8, 3.0, keys(), 0);
        let (opened, _) = present(&mut t, std::iter::repeat(10));
        assert_eq!(t.advance(opened + 2_000 * MS), ConstantStep::AwaitingReport);
        assert_eq!(t.advance(opened + 2_001 * MS), ConstantStep::TimedOut);
        assert_eq!(
            t.offer(&[KeyPress::new(Key::Char('v'), opened + 2_002 * MS)]),
            ConstantStep::TimedOut
        );
        let record = t.into_record(condition(1, Some(2_000)));
        assert!(record.response.is_none());
        assert_eq!(record.ratio, 0.8);
    }

    #[test]
    fn zero_cycles_goes_straight_to_report() {
        let mut t = ConstantStimuliTrial::new(&condition(0, None), 1.0, 3.0, keys(), 0);
        assert_eq!(t.advance(0), ConstantStep::PresentationComplete);
        assert_eq!(t.toggles(), 0);
    }
}
