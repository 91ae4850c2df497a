use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Quartet aspect ratio (vertical over horizontal spacing).
///
/// Ratios are not linear in perceptual space, so anything that averages or
/// steps through them works on the angle `atan(ratio)` instead.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatioPoint(pub f64);

impl RatioPoint {
    pub fn from_angle(angle_rad: f64) -> Self {
        RatioPoint(angle_rad.tan())
    }

    pub fn angle(self) -> f64 {
        self.0.atan()
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Sweep direction of a Method of Limits trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatioDirection {
    Ascending,
    Descending,
}

impl RatioDirection {
    pub const ALL: [RatioDirection; 2] = [RatioDirection::Ascending, RatioDirection::Descending];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ascending => "ascending",
            Self::Descending => "descending",
        }
    }
}

impl fmt::Display for RatioDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Evenly spaced (in angle) ratios between two bounds, built once per session.
///
/// The descending list is the exact reverse of the ascending one; both are
/// shared behind `Arc` so a running trial can hold its list cheaply.
#[derive(Debug, Clone)]
pub struct RatioSequence {
    ascending: Arc<[f64]>,
    descending: Arc<[f64]>,
}

impl RatioSequence {
    /// `steps` angles from `atan(min_ratio)` to `atan(max_ratio)` inclusive.
    pub fn linspace(min_ratio: f64, max_ratio: f64, steps: usize) -> Self {
        let lo = min_ratio.atan();
        let hi = max_ratio.atan();
        let ascending: Vec<f64> = match steps {
            0 => Vec::new(),
            1 => vec![lo.tan()],
            n => {
                let span = hi - lo;
                (0..n)
                    .map(|i| (lo + span * i as f64 / (n - 1) as f64).tan())
                    .collect()
            }
        };
        let descending: Vec<f64> = ascending.iter().rev().copied().collect();
        Self {
            ascending: ascending.into(),
            descending: descending.into(),
        }
    }

    pub fn list(&self, direction: RatioDirection) -> Arc<[f64]> {
        match direction {
            RatioDirection::Ascending => Arc::clone(&self.ascending),
            RatioDirection::Descending => Arc::clone(&self.descending),
        }
    }

    pub fn ascending(&self) -> &[f64] {
        &self.ascending
    }

    pub fn descending(&self) -> &[f64] {
        &self.descending
    }
}
