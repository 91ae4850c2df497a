mod clock;

pub use clock::{CalibrationStats, Clock, FrameLog, HighPrecisionClock, ManualClock};
