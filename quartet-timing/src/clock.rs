use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic session clock. Timestamps are nanoseconds since the last reset.
///
/// This is the only time authority for scheduling decisions; key events are
/// stamped against the same clock.
pub trait Clock: Clone + Send + Sync {
    fn now(&self) -> u64;
    fn reset(&mut self);
    fn elapsed(&self, ts: u64) -> Duration {
        Duration::from_nanos(self.now().saturating_sub(ts))
    }
    fn record_frame(&mut self, d: Duration);
    fn calibration_stats(&self) -> CalibrationStats;
}

#[derive(Debug, Clone, Default)]
pub struct CalibrationStats {
    pub samples: usize,
    pub average_frame_time_ns: f64,
    pub jitter_ns: f64,
    pub min_frame_time_ns: f64,
    pub max_frame_time_ns: f64,
    pub effective_fps: f64,
}

/// Rolling window of presented frame durations.
#[derive(Debug, Clone)]
pub struct FrameLog {
    frame_times: VecDeque<Duration>,
    max_samples: usize,
}

impl FrameLog {
    pub fn with_capacity(max_samples: usize) -> Self {
        Self {
            frame_times: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn push(&mut self, d: Duration) {
        if self.frame_times.len() >= self.max_samples {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(d);
    }

    pub fn stats(&self) -> CalibrationStats {
        let times: Vec<f64> = self
            .frame_times
            .iter()
            .map(|d| d.as_nanos() as f64)
            .collect();
        if times.is_empty() {
            return CalibrationStats::default();
        }
        let avg = times.iter().sum::<f64>() / times.len() as f64;
        let var = times.iter().map(|x| (x - avg).powi(2)).sum::<f64>() / times.len() as f64;
        let min = times.iter().copied().fold(f64::INFINITY, f64::min);
        let max = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        CalibrationStats {
            samples: times.len(),
            average_frame_time_ns: avg,
            jitter_ns: var.sqrt(),
            min_frame_time_ns: min,
            max_frame_time_ns: max,
            effective_fps: if avg > 0.0 { 1e9 / avg } else { 0.0 },
        }
    }
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::with_capacity(1000)
    }
}

/// Wall clock backed by `Instant`.
#[derive(Debug, Clone)]
pub struct HighPrecisionClock {
    start: Instant,
    frames: FrameLog,
}

impl HighPrecisionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            frames: FrameLog::default(),
        }
    }
}

impl Default for HighPrecisionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for HighPrecisionClock {
    fn now(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    fn reset(&mut self) {
        self.start = Instant::now();
    }

    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }

    fn calibration_stats(&self) -> CalibrationStats {
        self.frames.stats()
    }
}

/// Clock that only moves when told to. Clones share the same time source,
/// so a test can hold one handle while the session owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    raw_ns: Arc<AtomicU64>,
    origin_ns: Arc<AtomicU64>,
    frames: FrameLog,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time as seen through `now()`.
    pub fn set_ns(&self, ns: u64) {
        let origin = self.origin_ns.load(Ordering::SeqCst);
        self.raw_ns.store(origin + ns, Ordering::SeqCst);
    }

    pub fn set(&self, t: Duration) {
        self.set_ns(t.as_nanos() as u64);
    }

    pub fn advance(&self, d: Duration) {
        self.raw_ns
            .fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.raw_ns
            .load(Ordering::SeqCst)
            .saturating_sub(self.origin_ns.load(Ordering::SeqCst))
    }

    fn reset(&mut self) {
        self.origin_ns
            .store(self.raw_ns.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    fn record_frame(&mut self, d: Duration) {
        self.frames.push(d);
    }

    fn calibration_stats(&self) -> CalibrationStats {
        self.frames.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), 250_000_000);
        assert_eq!(clock.elapsed(100_000_000), Duration::from_millis(150));
    }

    #[test]
    fn manual_clock_reset_moves_origin() {
        let mut clock = ManualClock::new();
        let handle = clock.clone();
        handle.set(Duration::from_secs(3));
        clock.reset();
        assert_eq!(handle.now(), 0);
        handle.set(Duration::from_millis(20));
        assert_eq!(clock.now(), 20_000_000);
    }

    #[test]
    fn frame_log_drops_oldest_and_reports_stats() {
        let mut log = FrameLog::with_capacity(3);
        for ms in [10, 16, 16, 18] {
            log.push(Duration::from_millis(ms));
        }
        let stats = log.stats();
        assert_eq!(stats.samples, 3);
        assert_abs_diff_eq!(stats.min_frame_time_ns, 16e6);
        assert_abs_diff_eq!(stats.max_frame_time_ns, 18e6);
        assert_abs_diff_eq!(stats.average_frame_time_ns, 50e6 / 3.0, epsilon = 1.0);
        assert!(stats.effective_fps > 59.0 && stats.effective_fps < 61.0);
    }

    #[test]
    fn empty_frame_log_is_all_zero() {
        let stats = FrameLog::default().stats();
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.effective_fps, 0.0);
    }

    #[test]
    fn high_precision_clock_is_monotonic() {
        let mut clock = HighPrecisionClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        clock.reset();
        assert!(clock.now() < 1_000_000_000);
    }
}
