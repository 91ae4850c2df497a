use crate::personalize::response_angles;
use quartet_core::{
    ConditionLabel, ConstantRecord, LimitsRecord, PerceptLabel, RatioDirection, RatioPoint,
};
use serde::Serialize;

/// Descriptive statistics of one sample. Empty samples give NaN throughout;
/// `sd` needs at least two values (sample standard deviation).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
}

impl Describe {
    pub fn of(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self {
                mean: f64::NAN,
                sd: f64::NAN,
                min: f64::NAN,
                max: f64::NAN,
            };
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let sd = if n > 1 {
            (values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            f64::NAN
        };
        Self {
            mean,
            sd,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Maps every statistic through `tan`, turning angle statistics into ratios.
    pub fn as_ratio(&self) -> Self {
        let tan = |a: f64| RatioPoint::from_angle(a).value();
        Self {
            mean: tan(self.mean),
            sd: tan(self.sd),
            min: tan(self.min),
            max: tan(self.max),
        }
    }
}

/// Phase 1 responses of one sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionSummary {
    pub direction: RatioDirection,
    pub n: usize,
    pub radians: Describe,
    pub ratio: Describe,
}

pub fn summarize_limits(records: &[LimitsRecord]) -> Vec<DirectionSummary> {
    RatioDirection::ALL
        .iter()
        .map(|&direction| {
            let angles: Vec<f64> = response_angles(records, direction).collect();
            let radians = Describe::of(&angles);
            DirectionSummary {
                direction,
                n: angles.len(),
                radians,
                ratio: radians.as_ratio(),
            }
        })
        .collect()
}

/// Phase 2 reports for one condition label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConditionSummary {
    pub condition: ConditionLabel,
    pub ratio: f64,
    pub n: usize,
    pub vertical_percent: f64,
    /// Standard error of `vertical_percent`.
    pub se_percent: f64,
}

/// Vertical-report proportions per condition, over trials with a report.
/// Labels that never appeared are skipped.
pub fn summarize_constant(records: &[ConstantRecord]) -> Vec<ConditionSummary> {
    ConditionLabel::ALL
        .iter()
        .filter_map(|&condition| {
            let mut ratio = None;
            let binary: Vec<f64> = records
                .iter()
                .filter(|r| r.condition.condition == condition)
                .inspect(|r| ratio = ratio.or(Some(r.ratio)))
                .filter_map(|r| r.response.as_ref())
                .map(|resp| f64::from(resp.label == PerceptLabel::Vertical))
                .collect();
            let ratio = ratio?;
            let stats = Describe::of(&binary);
            Some(ConditionSummary {
                condition,
                ratio,
                n: binary.len(),
                vertical_percent: stats.mean * 100.0,
                se_percent: stats.sd / (binary.len() as f64).sqrt() * 100.0,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use quartet_core::{
        ConstantCondition, ConstantResponse, Key, LimitsCondition, LimitsResponse, QuartetPair,
    };

    fn limits(direction: RatioDirection, angle: Option<f64>) -> LimitsRecord {
        LimitsRecord {
            condition: LimitsCondition {
                trial: 1,
                run: 1,
                flip_ms: 250,
                response_delay_ms: 150,
                feedback_ms: 1000,
                iti_ms: 1000,
                quartet_order: QuartetPair::RightTilted,
                direction,
            },
            response: angle.map(|a| LimitsResponse {
                key: Key::Space,
                response_time_ns: 2_000_000_000,
                ratio: a.tan(),
                flip: 6,
            }),
        }
    }

    fn constant(condition: ConditionLabel, label: Option<PerceptLabel>) -> ConstantRecord {
        ConstantRecord {
            condition: ConstantCondition {
                trial: 1,
                run: 1,
                first_frame_ms: 500,
                flip_ms: 500,
                cycles: 1,
                response_delay_ms: 150,
                report_timeout_ms: None,
                feedback_ms: 1000,
                iti_ms: 1000,
                condition,
                quartet_order: QuartetPair::LeftTilted,
            },
            ratio: 1.2,
            response: label.map(|label| ConstantResponse {
                key: Key::Char('v'),
                response_time_ns: 400_000_000,
                label,
            }),
        }
    }

    #[test]
    fn describe_uses_sample_sd() {
        let d = Describe::of(&[1.0, 2.0, 3.0, 4.0]);
        assert_abs_diff_eq!(d.mean, 2.5);
        assert_abs_diff_eq!(d.sd, (5.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!((d.min, d.max), (1.0, 4.0));
        assert!(Describe::of(&[2.0]).sd.is_nan());
        assert!(Describe::of(&[]).mean.is_nan());
    }

    #[test]
    fn direction_summary_counts_only_responses() {
        let records = vec![
            limits(RatioDirection::Ascending, Some(0.2)),
            limits(RatioDirection::Ascending, Some(0.4)),
            limits(RatioDirection::Ascending, None),
            limits(RatioDirection::Descending, None),
        ];
        let summary = summarize_limits(&records);
        assert_eq!(summary.len(), 2);
        let asc = summary[0];
        assert_eq!(asc.direction, RatioDirection::Ascending);
        assert_eq!(asc.n, 2);
        assert_abs_diff_eq!(asc.radians.mean, 0.3, epsilon = 1e-12);
        assert_abs_diff_eq!(asc.ratio.mean, 0.3_f64.tan(), epsilon = 1e-12);
        assert_abs_diff_eq!(asc.ratio.max, 0.4_f64.tan(), epsilon = 1e-12);
        let desc = summary[1];
        assert_eq!(desc.n, 0);
        assert!(desc.radians.mean.is_nan());
    }

    #[test]
    fn constant_summary_reports_vertical_share() {
        let records = vec![
            constant(ConditionLabel::Parity, Some(PerceptLabel::Vertical)),
            constant(ConditionLabel::Parity, Some(PerceptLabel::Horizontal)),
            constant(ConditionLabel::Parity, Some(PerceptLabel::Vertical)),
            constant(ConditionLabel::Parity, Some(PerceptLabel::Vertical)),
            constant(ConditionLabel::Parity, None),
            constant(ConditionLabel::Plus2, Some(PerceptLabel::Horizontal)),
        ];
        let summary = summarize_constant(&records);
        assert_eq!(summary.len(), 2);
        let pr = summary[0];
        assert_eq!(pr.condition, ConditionLabel::Parity);
        assert_eq!(pr.n, 4);
        assert_abs_diff_eq!(pr.vertical_percent, 75.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pr.se_percent, 0.5 / 2.0 * 100.0, epsilon = 1e-9);
        assert_eq!(summary[1].condition, ConditionLabel::Plus2);
        assert_abs_diff_eq!(summary[1].vertical_percent, 0.0);
    }
}
