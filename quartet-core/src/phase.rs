/// Top-level stages of a session, in order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Welcome,
    Practice,
    Limits,
    ConstantStimuli,
    Debrief,
}

impl SessionPhase {
    pub fn next(&self) -> Option<Self> {
        use SessionPhase::*;
        Some(match self {
            Welcome => Practice,
            Practice => Limits,
            Limits => ConstantStimuli,
            ConstantStimuli => Debrief,
            Debrief => return None,
        })
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, SessionPhase::Practice)
    }

    /// Phases whose trials end up in the output tables.
    pub fn records_trials(&self) -> bool {
        matches!(self, SessionPhase::Limits | SessionPhase::ConstantStimuli)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionPhase::Welcome => "welcome",
            SessionPhase::Practice => "practice",
            SessionPhase::Limits => "phase 1 (method of limits)",
            SessionPhase::ConstantStimuli => "phase 2 (method of constant stimuli)",
            SessionPhase::Debrief => "debrief",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_advance_in_order_and_stop() {
        let mut phase = SessionPhase::default();
        let mut seen = vec![phase];
        while let Some(next) = phase.next() {
            phase = next;
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                SessionPhase::Welcome,
                SessionPhase::Practice,
                SessionPhase::Limits,
                SessionPhase::ConstantStimuli,
                SessionPhase::Debrief
            ]
        );
        assert!(!SessionPhase::Practice.records_trials());
        assert!(SessionPhase::Limits.records_trials());
    }
}
