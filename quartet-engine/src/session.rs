//! Frame-driven session: instructions, practice, both phases and the
//! checkpoints between them.
//!
//! The display loop calls, once per frame and in this order:
//! [`Session::advance`] (abort check, deadlines, timed screens), then renders
//! [`Session::screen`], then [`Session::handle_input`] (key poll). Keys are
//! fed in between with [`Session::key_pressed`]. Persistence is left to the
//! caller, driven by the returned [`SessionEvent`]s.

use crate::conditions::{constant_conditions, limits_conditions, practice_conditions};
use crate::config::SessionConfig;
use crate::constant::{ConstantStep, ConstantStimuliTrial, PerceptKeys};
use crate::error::{EngineError, Result};
use crate::limits::LimitsTrial;
use crate::personalize::derive_profile;
use crate::poller::ResponsePoller;
use quartet_core::{
    ConstantCondition, ConstantRecord, FixationColor, Key, LimitsCondition, LimitsRecord, Message,
    RatioSequence, Screen, SessionPhase, SubjectProfile,
};
use quartet_timing::Clock;
use rand::Rng;
use tracing::{debug, info};

const NS_PER_MS: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseStarted(SessionPhase),
    TrialStarted {
        phase: SessionPhase,
        trial: usize,
    },
    TrialComplete {
        phase: SessionPhase,
        trial: usize,
        responded: bool,
    },
    /// Every Phase 1 record is final.
    LimitsComplete,
    /// The subject profile has been derived from Phase 1.
    ProfileReady,
    /// Every Phase 2 record is final.
    ConstantComplete,
    Finished,
}

/// Screens that hold until the subject presses a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Trigger,
    LimitsInstructions,
    PracticeInstructions,
    EndOfPractice,
    LimitsBreak { runs_left: usize },
    Bridge,
    ConstantInstructions,
    ConstantBreak { runs_left: usize },
}

impl Checkpoint {
    pub fn screen(&self) -> Screen {
        match *self {
            Checkpoint::Trigger => Screen::Message(Message::Trigger),
            Checkpoint::LimitsInstructions => Screen::Message(Message::LimitsInstructions),
            Checkpoint::PracticeInstructions => Screen::Message(Message::PracticeInstructions),
            Checkpoint::EndOfPractice => Screen::Message(Message::EndOfPractice),
            Checkpoint::Bridge => Screen::Message(Message::Bridge),
            Checkpoint::ConstantInstructions => Screen::Message(Message::ConstantInstructions),
            Checkpoint::LimitsBreak { runs_left } | Checkpoint::ConstantBreak { runs_left } => {
                Screen::Break { runs_left }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Stage {
    Waiting(Checkpoint),
    Practice(LimitsTrial),
    Limits(LimitsTrial),
    Constant(ConstantStimuliTrial),
    Feedback { until_ns: u64, responded: bool },
    Iti { until_ns: u64 },
    Closing { until_ns: u64 },
    Finished,
}

pub struct Session<C: Clock> {
    config: SessionConfig,
    clock: C,
    poller: ResponsePoller,
    sequence: RatioSequence,
    phase: SessionPhase,
    stage: Stage,
    cursor: usize,
    practice_plan: Vec<LimitsCondition>,
    limits_plan: Vec<LimitsCondition>,
    constant_plan: Vec<ConstantCondition>,
    limits_records: Vec<LimitsRecord>,
    constant_records: Vec<ConstantRecord>,
    profile: Option<SubjectProfile>,
}

impl<C: Clock> Session<C> {
    /// Builds every trial list up front; `rng` is not used afterwards.
    pub fn new<R: Rng>(config: SessionConfig, clock: C, rng: &mut R) -> Self {
        let practice_plan = practice_conditions(&config.limits, rng);
        let limits_plan = limits_conditions(&config.limits, rng);
        let constant_plan = constant_conditions(&config.constant, rng);
        info!(
            practice = practice_plan.len(),
            limits = limits_plan.len(),
            constant = constant_plan.len(),
            "trial lists ready"
        );
        Self {
            poller: ResponsePoller::new(config.session.abort_key),
            sequence: config.stimulus.ratio_sequence(),
            config,
            clock,
            phase: SessionPhase::Welcome,
            stage: Stage::Waiting(Checkpoint::Trigger),
            cursor: 0,
            practice_plan,
            limits_plan,
            constant_plan,
            limits_records: Vec::new(),
            constant_records: Vec::new(),
            profile: None,
        }
    }

    /// Queues a key event stamped with the session clock.
    pub fn key_pressed(&mut self, key: Key) {
        let ts = self.clock.now();
        self.poller.push(key, ts);
    }

    /// Start of a frame: abort check, deadlines and timed screens.
    pub fn advance(&mut self) -> Result<Vec<SessionEvent>> {
        if self.poller.abort_requested() {
            info!(time_ns = self.clock.now(), "abort key pressed");
            return Err(EngineError::AbortRequested);
        }
        let now = self.clock.now();
        let mut events = Vec::new();
        match &mut self.stage {
            Stage::Practice(trial) | Stage::Limits(trial) => {
                if trial.advance(now).is_finished() {
                    let responded = trial.response().is_some();
                    self.finish_limits_trial(responded, now, &mut events);
                }
            }
            Stage::Constant(trial) => match trial.advance(now) {
                ConstantStep::PresentationComplete => self.poller.clear(),
                ConstantStep::TimedOut => self.finish_constant_trial(now, &mut events),
                _ => {}
            },
            Stage::Feedback { until_ns, .. } if now >= *until_ns => {
                let iti_ms = self.current_iti_ms();
                self.stage = Stage::Iti {
                    until_ns: now + iti_ms * NS_PER_MS,
                };
            }
            Stage::Iti { until_ns } if now >= *until_ns => self.after_trial(&mut events),
            Stage::Closing { until_ns } if now >= *until_ns => {
                info!(time_ns = now, "session finished");
                self.stage = Stage::Finished;
                events.push(SessionEvent::Finished);
            }
            _ => {}
        }
        Ok(events)
    }

    /// End of a frame: drains the key queue into whatever is waiting for it.
    pub fn handle_input(&mut self) -> Vec<SessionEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();
        match &mut self.stage {
            Stage::Waiting(checkpoint) => {
                let checkpoint = *checkpoint;
                let presses = match checkpoint {
                    Checkpoint::Trigger => self.poller.poll(&[self.config.session.start_key]),
                    _ => self.poller.poll_any(),
                };
                if !presses.is_empty() {
                    self.leave_checkpoint(checkpoint, &mut events);
                }
            }
            Stage::Practice(trial) | Stage::Limits(trial) => {
                let presses = self.poller.poll(&[self.config.limits.response_key]);
                if trial.offer(&presses).is_finished() {
                    let responded = trial.response().is_some();
                    self.finish_limits_trial(responded, now, &mut events);
                }
            }
            Stage::Constant(trial) => {
                if trial.in_report_window() {
                    let keys = PerceptKeys::new(
                        self.config.constant.vertical_key,
                        self.config.constant.horizontal_key,
                    );
                    let presses = self.poller.poll(&keys.keys());
                    let step = trial.offer(&presses);
                    if step.is_finished() {
                        self.finish_constant_trial(now, &mut events);
                    }
                }
            }
            _ => self.poller.clear(),
        }
        events
    }

    pub fn screen(&self) -> Screen {
        match &self.stage {
            Stage::Waiting(checkpoint) => checkpoint.screen(),
            Stage::Practice(trial) | Stage::Limits(trial) => Screen::Quartet(trial.frame()),
            Stage::Constant(trial) => trial.screen(),
            Stage::Feedback { responded, .. } => Screen::Feedback {
                responded: *responded,
                practice: self.phase.is_practice(),
            },
            Stage::Iti { .. } => Screen::Fixation(FixationColor::Red),
            Stage::Closing { .. } => Screen::Message(Message::Closing),
            Stage::Finished => Screen::Blank,
        }
    }

    fn leave_checkpoint(&mut self, checkpoint: Checkpoint, events: &mut Vec<SessionEvent>) {
        debug!(?checkpoint, "checkpoint passed");
        match checkpoint {
            Checkpoint::Trigger => self.wait(Checkpoint::LimitsInstructions),
            Checkpoint::LimitsInstructions => self.wait(Checkpoint::PracticeInstructions),
            Checkpoint::PracticeInstructions => {
                self.clock.reset();
                info!("clock reset, practice starting");
                self.next_phase(events);
                self.next_practice_trial(events);
            }
            Checkpoint::EndOfPractice => {
                self.next_phase(events);
                self.next_limits_trial(events);
            }
            Checkpoint::LimitsBreak { .. } => self.next_limits_trial(events),
            Checkpoint::Bridge => {
                let profile = derive_profile(&self.limits_records, self.config.constant.step_rad);
                self.profile = Some(profile);
                events.push(SessionEvent::ProfileReady);
                self.next_phase(events);
                self.wait(Checkpoint::ConstantInstructions);
            }
            Checkpoint::ConstantInstructions | Checkpoint::ConstantBreak { .. } => {
                self.next_constant_trial(events)
            }
        }
    }

    fn wait(&mut self, checkpoint: Checkpoint) {
        self.poller.clear();
        self.stage = Stage::Waiting(checkpoint);
    }

    /// Moves to the following phase. Phases only ever run in order.
    fn next_phase(&mut self, events: &mut Vec<SessionEvent>) {
        let Some(phase) = self.phase.next() else {
            return;
        };
        info!(phase = phase.label(), time_ns = self.clock.now(), "phase started");
        self.phase = phase;
        self.cursor = 0;
        events.push(SessionEvent::PhaseStarted(phase));
    }

    fn begin_trial(&mut self, trial: usize, events: &mut Vec<SessionEvent>) -> u64 {
        self.poller.clear();
        let now = self.clock.now();
        info!(
            phase = self.phase.label(),
            trial,
            time_s = now as f64 / 1e9,
            "trial started"
        );
        events.push(SessionEvent::TrialStarted {
            phase: self.phase,
            trial,
        });
        now
    }

    fn next_practice_trial(&mut self, events: &mut Vec<SessionEvent>) {
        let Some(condition) = self.practice_plan.get(self.cursor).cloned() else {
            info!(time_ns = self.clock.now(), "practice finished");
            self.wait(Checkpoint::EndOfPractice);
            return;
        };
        let start = self.begin_trial(condition.trial, events);
        self.stage = Stage::Practice(LimitsTrial::new(
            &condition,
            &self.sequence,
            self.config.limits.response_key,
            self.config.stimulus.circle_radius_deg,
            start,
        ));
    }

    fn next_limits_trial(&mut self, events: &mut Vec<SessionEvent>) {
        let Some(condition) = self.limits_plan.get(self.cursor).cloned() else {
            info!(records = self.limits_records.len(), "phase 1 finished");
            events.push(SessionEvent::LimitsComplete);
            self.wait(Checkpoint::Bridge);
            return;
        };
        let start = self.begin_trial(condition.trial, events);
        self.stage = Stage::Limits(LimitsTrial::new(
            &condition,
            &self.sequence,
            self.config.limits.response_key,
            self.config.stimulus.circle_radius_deg,
            start,
        ));
    }

    fn next_constant_trial(&mut self, events: &mut Vec<SessionEvent>) {
        let Some(condition) = self.constant_plan.get(self.cursor).cloned() else {
            info!(records = self.constant_records.len(), "phase 2 finished");
            events.push(SessionEvent::ConstantComplete);
            self.next_phase(events);
            self.poller.clear();
            self.stage = Stage::Closing {
                until_ns: self.clock.now() + self.config.session.closing_ms * NS_PER_MS,
            };
            return;
        };
        let ratio = self
            .profile
            .as_ref()
            .map_or(f64::NAN, |p| p.ratio_for(condition.condition));
        let start = self.begin_trial(condition.trial, events);
        let keys = PerceptKeys::new(
            self.config.constant.vertical_key,
            self.config.constant.horizontal_key,
        );
        self.stage = Stage::Constant(ConstantStimuliTrial::new(
            &condition,
            ratio,
            self.config.stimulus.circle_radius_deg,
            keys,
            start,
        ));
    }

    fn finish_limits_trial(&mut self, responded: bool, now: u64, events: &mut Vec<SessionEvent>) {
        let (Stage::Practice(trial) | Stage::Limits(trial)) =
            std::mem::replace(&mut self.stage, Stage::Finished)
        else {
            return;
        };
        let (trial_no, feedback_ms) = if !self.phase.records_trials() {
            let c = &self.practice_plan[self.cursor];
            (c.trial, c.feedback_ms)
        } else {
            let condition = self.limits_plan[self.cursor].clone();
            let (trial_no, feedback_ms) = (condition.trial, condition.feedback_ms);
            let record = trial.into_record(condition);
            match &record.response {
                Some(r) => info!(
                    trial = trial_no,
                    key = %r.key,
                    rt_s = r.response_time_secs(),
                    ratio = r.ratio,
                    flip = r.flip,
                    "phase 1 response"
                ),
                None => info!(trial = trial_no, "phase 1 no response"),
            }
            self.limits_records.push(record);
            (trial_no, feedback_ms)
        };
        events.push(SessionEvent::TrialComplete {
            phase: self.phase,
            trial: trial_no,
            responded,
        });
        self.poller.clear();
        self.stage = Stage::Feedback {
            until_ns: now + feedback_ms * NS_PER_MS,
            responded,
        };
    }

    fn finish_constant_trial(&mut self, now: u64, events: &mut Vec<SessionEvent>) {
        let Stage::Constant(trial) = std::mem::replace(&mut self.stage, Stage::Finished) else {
            return;
        };
        let condition = self.constant_plan[self.cursor].clone();
        let (trial_no, feedback_ms) = (condition.trial, condition.feedback_ms);
        let record = trial.into_record(condition);
        let responded = record.response.is_some();
        match &record.response {
            Some(r) => info!(
                trial = trial_no,
                key = %r.key,
                rt_s = r.response_time_secs(),
                label = r.label.as_str(),
                "phase 2 response"
            ),
            None => info!(trial = trial_no, "phase 2 no response"),
        }
        self.constant_records.push(record);
        events.push(SessionEvent::TrialComplete {
            phase: self.phase,
            trial: trial_no,
            responded,
        });
        self.poller.clear();
        self.stage = Stage::Feedback {
            until_ns: now + feedback_ms * NS_PER_MS,
            responded,
        };
    }

    fn current_iti_ms(&self) -> u64 {
        match self.phase {
            SessionPhase::Practice => self.practice_plan.get(self.cursor).map(|c| c.iti_ms),
            SessionPhase::Limits => self.limits_plan.get(self.cursor).map(|c| c.iti_ms),
            SessionPhase::ConstantStimuli => self.constant_plan.get(self.cursor).map(|c| c.iti_ms),
            _ => None,
        }
        .unwrap_or(0)
    }

    /// End of the inter-trial interval: next trial, a break, or the end of
    /// the phase.
    fn after_trial(&mut self, events: &mut Vec<SessionEvent>) {
        let finished = self.cursor;
        self.cursor += 1;
        match self.phase {
            SessionPhase::Practice => self.next_practice_trial(events),
            SessionPhase::Limits => {
                let c = &self.limits_plan[finished];
                let per_run = self.config.limits.trials_per_run;
                let runs = self.config.limits.runs;
                if run_ends(c.trial, per_run, runs) {
                    self.wait(Checkpoint::LimitsBreak {
                        runs_left: runs - c.run,
                    });
                } else {
                    self.next_limits_trial(events);
                }
            }
            SessionPhase::ConstantStimuli => {
                let c = &self.constant_plan[finished];
                let per_run = self.config.constant.trials_per_run;
                let runs = self.config.constant.runs;
                if run_ends(c.trial, per_run, runs) {
                    self.wait(Checkpoint::ConstantBreak {
                        runs_left: runs - c.run,
                    });
                } else {
                    self.next_constant_trial(events);
                }
            }
            _ => {}
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn checkpoint(&self) -> Option<Checkpoint> {
        match self.stage {
            Stage::Waiting(cp) => Some(cp),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.stage, Stage::Finished)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn limits_plan(&self) -> &[LimitsCondition] {
        &self.limits_plan
    }

    pub fn limits_records(&self) -> &[LimitsRecord] {
        &self.limits_records
    }

    pub fn constant_records(&self) -> &[ConstantRecord] {
        &self.constant_records
    }

    pub fn profile(&self) -> Option<&SubjectProfile> {
        self.profile.as_ref()
    }
}

/// True after the last trial of a run, except the final run.
fn run_ends(trial: usize, trials_per_run: usize, runs: usize) -> bool {
    trials_per_run > 0 && trial % trials_per_run == 0 && trial < trials_per_run * runs
}
