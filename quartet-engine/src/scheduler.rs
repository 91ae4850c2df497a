use std::time::Duration;

/// Deadline-accumulating alternation clock.
///
/// Deadline `k` (1-based) sits at `first + interval * (k - 1)` after `start`.
/// Each `poll` fires at most one alternation, no matter how many deadlines the
/// display loop slept through; the remaining ones fire on the following polls.
/// Ending the presentation is the caller's business.
#[derive(Debug, Clone)]
pub struct AlternationScheduler {
    start_ns: u64,
    interval_ns: u64,
    next_deadline_ns: u64,
    flips: u32,
}

impl AlternationScheduler {
    /// Every alternation lasts `interval`, first one included.
    pub fn new(start_ns: u64, interval: Duration) -> Self {
        Self::with_first_interval(start_ns, interval, interval)
    }

    /// The first frame is held for `first`, every later one for `interval`.
    pub fn with_first_interval(start_ns: u64, first: Duration, interval: Duration) -> Self {
        Self {
            start_ns,
            interval_ns: interval.as_nanos() as u64,
            next_deadline_ns: first.as_nanos() as u64,
            flips: 0,
        }
    }

    /// Returns the new alternation count when the pending deadline has been
    /// crossed (strictly) by `now_ns`.
    pub fn poll(&mut self, now_ns: u64) -> Option<u32> {
        let elapsed = now_ns.saturating_sub(self.start_ns);
        if elapsed > self.next_deadline_ns {
            self.flips += 1;
            self.next_deadline_ns += self.interval_ns;
            Some(self.flips)
        } else {
            None
        }
    }

    pub fn flips(&self) -> u32 {
        self.flips
    }

    pub fn start_ns(&self) -> u64 {
        self.start_ns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: u64 = 1_000_000;

    #[test]
    fn nothing_fires_before_first_deadline() {
        let mut s = AlternationScheduler::new(0, Duration::from_millis(250));
        assert_eq!(s.poll(0), None);
        assert_eq!(s.poll(250 * MS), None, "deadline must be crossed strictly");
        assert_eq!(s.poll(250 * MS + 1), Some(1));
        assert_eq!(s.flips(), 1);
    }

    #[test]
    fn skipped_deadlines_fire_one_per_poll() {
        let mut s = AlternationScheduler::new(0, Duration::from_millis(100));
        let now = 350 * MS;
        assert_eq!(s.poll(now), Some(1));
        assert_eq!(s.poll(now), Some(2));
        assert_eq!(s.poll(now), Some(3));
        assert_eq!(s.poll(now), None);
        // the fourth deadline sits at 400 ms
        assert_eq!(s.poll(400 * MS), None);
        assert_eq!(s.poll(400 * MS + 1), Some(4));
    }

    #[test]
    fn deadlines_are_relative_to_start() {
        let mut s = AlternationScheduler::new(1_000 * MS, Duration::from_millis(250));
        assert_eq!(s.poll(1_200 * MS), None);
        assert_eq!(s.poll(1_251 * MS), Some(1));
        assert_eq!(s.start_ns(), 1_000 * MS);
    }

    #[test]
    fn first_interval_can_differ() {
        let mut s = AlternationScheduler::with_first_interval(
            0,
            Duration::from_millis(500),
            Duration::from_millis(200),
        );
        assert_eq!(s.poll(400 * MS), None);
        assert_eq!(s.poll(501 * MS), Some(1));
        assert_eq!(s.poll(650 * MS), None);
        assert_eq!(s.poll(701 * MS), Some(2));
    }

    #[test]
    fn jittered_polling_never_drifts() {
        // irregular frame gaps between 1 and 37 ms over 10 s
        let mut s = AlternationScheduler::new(0, Duration::from_millis(250));
        let mut t = 0;
        let mut step = 1;
        while t < 10_000 * MS {
            s.poll(t);
            step = (step * 7 + 3) % 37 + 1;
            t += step * MS;
        }
        // drain any backlog at the final time
        while s.poll(t).is_some() {}
        assert_eq!(s.flips() as u64, (t - 1) / (250 * MS));
    }
}
