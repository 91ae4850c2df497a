use crate::ratio::{RatioDirection, RatioPoint};
use crate::trial::ConditionLabel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedRatio {
    pub label: ConditionLabel,
    pub angle_rad: f64,
    pub ratio: f64,
}

/// Per-subject parity estimate from Phase 1 and the Phase 2 ratio set built
/// around it. Computed once after Phase 1 and read-only afterwards.
///
/// Means are NaN when a direction had no valid response; they are carried as
/// such rather than replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub ascending_mean_rad: f64,
    pub descending_mean_rad: f64,
    pub overall_mean_rad: f64,
    pub step_rad: f64,
    pub ratios: Vec<PersonalizedRatio>,
}

impl SubjectProfile {
    pub fn mean_rad(&self, direction: RatioDirection) -> f64 {
        match direction {
            RatioDirection::Ascending => self.ascending_mean_rad,
            RatioDirection::Descending => self.descending_mean_rad,
        }
    }

    pub fn mean_ratio(&self, direction: RatioDirection) -> f64 {
        RatioPoint::from_angle(self.mean_rad(direction)).value()
    }

    pub fn overall_mean_ratio(&self) -> f64 {
        RatioPoint::from_angle(self.overall_mean_rad).value()
    }

    pub fn ratio_for(&self, label: ConditionLabel) -> f64 {
        self.ratios
            .iter()
            .find(|r| r.label == label)
            .map_or(f64::NAN, |r| r.ratio)
    }

    pub fn is_defined(&self) -> bool {
        self.overall_mean_rad.is_finite()
    }
}
