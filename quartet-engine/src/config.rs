use crate::error::{EngineError, Result};
use quartet_core::{Key, RatioSequence};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Quartet geometry and the Phase 1 ratio range. Sizes in degrees of visual angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimulusConfig {
    pub circle_radius_deg: f64,
    pub square_size_deg: f64,
    pub fixation_radius_deg: f64,
    pub text_height_deg: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub ratio_steps: usize,
    pub background_rgb: [u8; 3],
    pub square_rgb: [u8; 3],
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            circle_radius_deg: 3.0,
            square_size_deg: 1.0,
            fixation_radius_deg: 0.1,
            text_height_deg: 0.5,
            min_ratio: 1.0 / 3.0,
            max_ratio: 3.0,
            ratio_steps: 154,
            background_rgb: [64, 64, 64],
            square_rgb: [191, 191, 191],
        }
    }
}

impl StimulusConfig {
    pub fn ratio_sequence(&self) -> RatioSequence {
        RatioSequence::linspace(self.min_ratio, self.max_ratio, self.ratio_steps)
    }
}

/// Phase 1 (method of limits) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub runs: usize,
    pub trials_per_run: usize,
    pub practice_trials: usize,
    pub flip_ms: u64,
    pub response_delay_ms: u64,
    pub feedback_ms: u64,
    pub iti_ms: u64,
    pub response_key: Key,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            runs: 2,
            trials_per_run: 10,
            practice_trials: 4,
            flip_ms: 250,
            response_delay_ms: 150,
            feedback_ms: 1000,
            iti_ms: 1000,
            response_key: Key::Space,
        }
    }
}

/// Phase 2 (method of constant stimuli) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstantConfig {
    pub runs: usize,
    pub trials_per_run: usize,
    pub first_frame_ms: u64,
    pub flip_ms: u64,
    pub cycles: u32,
    pub response_delay_ms: u64,
    pub feedback_ms: u64,
    pub iti_ms: u64,
    /// Upper bound on the report window. Unset means wait for a key indefinitely.
    pub report_timeout_ms: Option<u64>,
    pub step_rad: f64,
    pub vertical_key: Key,
    pub horizontal_key: Key,
}

impl Default for ConstantConfig {
    fn default() -> Self {
        Self {
            runs: 4,
            trials_per_run: 80,
            first_frame_ms: 500,
            flip_ms: 500,
            cycles: 1,
            response_delay_ms: 150,
            feedback_ms: 1000,
            iti_ms: 1000,
            report_timeout_ms: None,
            step_rad: 0.075,
            vertical_key: Key::Char('v'),
            horizontal_key: Key::Char('h'),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub experiment_name: String,
    pub start_key: Key,
    pub abort_key: Key,
    pub closing_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            experiment_name: "Prescan_MotQuart".to_string(),
            start_key: Key::Char('p'),
            abort_key: Key::Escape,
            closing_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub distance_cm: f64,
    pub width_cm: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub refresh_hz: f64,
}

impl MonitorConfig {
    pub fn new(distance_cm: f64, width_cm: f64, width_px: u32, height_px: u32, refresh_hz: f64) -> Self {
        Self {
            distance_cm,
            width_cm,
            width_px,
            height_px,
            refresh_hz,
        }
    }

    /// Pixels spanned by one degree of visual angle at the screen centre.
    pub fn pixels_per_degree(&self) -> f64 {
        let cm_per_degree = self.distance_cm * 1.0_f64.to_radians().tan();
        cm_per_degree * self.width_px as f64 / self.width_cm
    }

    fn default_presets() -> BTreeMap<String, MonitorConfig> {
        BTreeMap::from([
            ("Beaver".to_string(), MonitorConfig::new(80.0, 52.3, 1920, 1080, 60.0)),
            ("Scanner".to_string(), MonitorConfig::new(128.7, 42.8, 1920, 1080, 60.0)),
            ("TseLab".to_string(), MonitorConfig::new(63.0, 47.2, 1920, 1080, 60.0)),
            ("TongLab".to_string(), MonitorConfig::new(39.0, 38.0, 1600, 1200, 85.0)),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session: SessionSettings,
    pub stimulus: StimulusConfig,
    pub limits: LimitsConfig,
    pub constant: ConstantConfig,
    pub monitors: BTreeMap<String, MonitorConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            stimulus: StimulusConfig::default(),
            limits: LimitsConfig::default(),
            constant: ConstantConfig::default(),
            monitors: MonitorConfig::default_presets(),
        }
    }
}

impl SessionConfig {
    /// Reads `path`, or writes the defaults there when it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path).map_err(|source| EngineError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })?;
            return toml::from_str(&contents).map_err(|source| EngineError::ConfigParse {
                path: path.to_path_buf(),
                source,
            });
        }

        let defaults = Self::default();
        let text = toml::to_string_pretty(&defaults)?;
        fs::write(path, text).map_err(|source| EngineError::ConfigWrite {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "wrote default session config");
        Ok(defaults)
    }

    /// Shortened session for checking a setup end to end.
    pub fn debug(mut self) -> Self {
        self.limits.trials_per_run = 4;
        self.limits.practice_trials = 2;
        self.constant.runs = 2;
        self.constant.trials_per_run = 8;
        self
    }

    pub fn monitor(&self, name: &str) -> Result<&MonitorConfig> {
        self.monitors
            .get(name)
            .ok_or_else(|| EngineError::UnknownMonitor(name.to_string()))
    }
}
