use crate::ratio::RatioDirection;
use crate::stimulus::QuartetPair;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Keyboard keys the session cares about. Anything else is `Char` or ignored
/// by the input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Key {
    Space,
    Escape,
    Return,
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Space => f.write_str("space"),
            Key::Escape => f.write_str("escape"),
            Key::Return => f.write_str("return"),
            Key::Char(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for Key {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "space" => Ok(Key::Space),
            "escape" | "esc" => Ok(Key::Escape),
            "return" | "enter" => Ok(Key::Return),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Key::Char(c)),
                    _ => Err(format!("unknown key name {s:?}")),
                }
            }
        }
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for Key {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A key event stamped against the session clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub timestamp_ns: u64,
}

impl KeyPress {
    pub fn new(key: Key, timestamp_ns: u64) -> Self {
        Self { key, timestamp_ns }
    }
}

/// The eight personalized ratio conditions, ordered by angular offset
/// from the estimated parity angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionLabel {
    #[serde(rename = "PR-3")]
    Minus3,
    #[serde(rename = "PR-2")]
    Minus2,
    #[serde(rename = "PR-1")]
    Minus1,
    #[serde(rename = "PR")]
    Parity,
    #[serde(rename = "PR+1")]
    Plus1,
    #[serde(rename = "PR+2")]
    Plus2,
    #[serde(rename = "PR+3")]
    Plus3,
    #[serde(rename = "PR+4")]
    Plus4,
}

impl ConditionLabel {
    pub const ALL: [ConditionLabel; 8] = [
        ConditionLabel::Minus3,
        ConditionLabel::Minus2,
        ConditionLabel::Minus1,
        ConditionLabel::Parity,
        ConditionLabel::Plus1,
        ConditionLabel::Plus2,
        ConditionLabel::Plus3,
        ConditionLabel::Plus4,
    ];

    /// Signed number of angular steps away from the parity angle.
    pub fn steps(&self) -> i32 {
        match self {
            Self::Minus3 => -3,
            Self::Minus2 => -2,
            Self::Minus1 => -1,
            Self::Parity => 0,
            Self::Plus1 => 1,
            Self::Plus2 => 2,
            Self::Plus3 => 3,
            Self::Plus4 => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minus3 => "PR-3",
            Self::Minus2 => "PR-2",
            Self::Minus1 => "PR-1",
            Self::Parity => "PR",
            Self::Plus1 => "PR+1",
            Self::Plus2 => "PR+2",
            Self::Plus3 => "PR+3",
            Self::Plus4 => "PR+4",
        }
    }
}

impl fmt::Display for ConditionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forced-choice percept reported in Phase 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerceptLabel {
    Vertical,
    Horizontal,
}

impl PerceptLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vertical => "vertical",
            Self::Horizontal => "horizontal",
        }
    }
}

/// Phase 1 trial parameters, fixed before the trial starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsCondition {
    pub trial: usize,
    pub run: usize,
    pub flip_ms: u64,
    pub response_delay_ms: u64,
    pub feedback_ms: u64,
    pub iti_ms: u64,
    pub quartet_order: QuartetPair,
    pub direction: RatioDirection,
}

/// Accepted Phase 1 response. Exists only as a whole, so a record can never
/// carry a key without its time, ratio and flip count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitsResponse {
    pub key: Key,
    /// Latency from trial start.
    pub response_time_ns: u64,
    /// Ratio on screen when the key was accepted.
    pub ratio: f64,
    /// Alternations completed when the key was accepted.
    pub flip: u32,
}

impl LimitsResponse {
    pub fn response_time_secs(&self) -> f64 {
        self.response_time_ns as f64 / 1e9
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsRecord {
    #[serde(flatten)]
    pub condition: LimitsCondition,
    pub response: Option<LimitsResponse>,
}

/// Phase 2 trial parameters, fixed before the trial starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantCondition {
    pub trial: usize,
    pub run: usize,
    pub first_frame_ms: u64,
    pub flip_ms: u64,
    pub cycles: u32,
    pub response_delay_ms: u64,
    pub report_timeout_ms: Option<u64>,
    pub feedback_ms: u64,
    pub iti_ms: u64,
    pub condition: ConditionLabel,
    pub quartet_order: QuartetPair,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantResponse {
    pub key: Key,
    /// Latency from the opening of the report window.
    pub response_time_ns: u64,
    pub label: PerceptLabel,
}

impl ConstantResponse {
    pub fn response_time_secs(&self) -> f64 {
        self.response_time_ns as f64 / 1e9
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantRecord {
    #[serde(flatten)]
    pub condition: ConstantCondition,
    /// Ratio presented for this trial's condition label.
    pub ratio: f64,
    pub response: Option<ConstantResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_names_parse_and_print() {
        assert_eq!("space".parse::<Key>().unwrap(), Key::Space);
        assert_eq!("Esc".parse::<Key>().unwrap(), Key::Escape);
        assert_eq!("v".parse::<Key>().unwrap(), Key::Char('v'));
        assert!("vh".parse::<Key>().is_err());
        assert_eq!(Key::Char('h').to_string(), "h");
        assert_eq!(Key::Space.to_string(), "space");
    }

    #[test]
    fn condition_labels_cover_minus_three_to_plus_four() {
        let steps: Vec<i32> = ConditionLabel::ALL.iter().map(|l| l.steps()).collect();
        assert_eq!(steps, vec![-3, -2, -1, 0, 1, 2, 3, 4]);
        assert_eq!(
            serde_json::to_string(&ConditionLabel::Plus4).unwrap(),
            "\"PR+4\""
        );
    }

    #[test]
    fn missing_response_serializes_as_null() {
        let record = LimitsRecord {
            condition: LimitsCondition {
                trial: 1,
                run: 1,
                flip_ms: 250,
                response_delay_ms: 150,
                feedback_ms: 1000,
                iti_ms: 1000,
                quartet_order: QuartetPair::LeftTilted,
                direction: RatioDirection::Ascending,
            },
            response: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["response"].is_null());
        assert_eq!(value["direction"], "ascending");
        let back: LimitsRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
