//! Parity estimate from Phase 1 responses and the Phase 2 ratio set built
//! around it.

use quartet_core::{
    ConditionLabel, LimitsRecord, PersonalizedRatio, RatioDirection, RatioPoint, SubjectProfile,
};
use tracing::{info, warn};

/// Mean response angle of one direction. NaN when nobody responded.
pub fn direction_mean_rad(records: &[LimitsRecord], direction: RatioDirection) -> f64 {
    let angles: Vec<f64> = response_angles(records, direction).collect();
    if angles.is_empty() {
        return f64::NAN;
    }
    angles.iter().sum::<f64>() / angles.len() as f64
}

pub(crate) fn response_angles(
    records: &[LimitsRecord],
    direction: RatioDirection,
) -> impl Iterator<Item = f64> + '_ {
    records
        .iter()
        .filter(move |r| r.condition.direction == direction)
        .filter_map(|r| r.response.as_ref())
        .map(|resp| RatioPoint(resp.ratio).angle())
}

/// Averages response angles per direction, then the two direction means,
/// and lays the eight condition ratios out in `step_rad` steps around the
/// result.
pub fn derive_profile(records: &[LimitsRecord], step_rad: f64) -> SubjectProfile {
    let ascending_mean_rad = direction_mean_rad(records, RatioDirection::Ascending);
    let descending_mean_rad = direction_mean_rad(records, RatioDirection::Descending);
    let overall_mean_rad = (ascending_mean_rad + descending_mean_rad) / 2.0;

    let ratios = ConditionLabel::ALL
        .iter()
        .map(|&label| {
            let angle_rad = overall_mean_rad + label.steps() as f64 * step_rad;
            PersonalizedRatio {
                label,
                angle_rad,
                ratio: RatioPoint::from_angle(angle_rad).value(),
            }
        })
        .collect();

    let profile = SubjectProfile {
        ascending_mean_rad,
        descending_mean_rad,
        overall_mean_rad,
        step_rad,
        ratios,
    };

    if profile.is_defined() {
        info!(
            ascending = format_args!("{:.4}", profile.mean_ratio(RatioDirection::Ascending)),
            descending = format_args!("{:.4}", profile.mean_ratio(RatioDirection::Descending)),
            overall = format_args!("{:.4}", profile.overall_mean_ratio()),
            "parity ratio estimated"
        );
        for r in &profile.ratios {
            info!(label = %r.label, angle_rad = r.angle_rad, ratio = r.ratio, "personalized ratio");
        }
    } else {
        warn!(
            ascending_rad = ascending_mean_rad,
            descending_rad = descending_mean_rad,
            "a direction has no responses; personalized ratios are undefined"
        );
    }
    profile
}
