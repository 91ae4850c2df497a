pub mod conditions;
pub mod config;
pub mod constant;
pub mod error;
pub mod limits;
pub mod output;
pub mod personalize;
pub mod poller;
pub mod scheduler;
pub mod session;
pub mod summary;

pub use config::{
    ConstantConfig, LimitsConfig, MonitorConfig, SessionConfig, SessionSettings, StimulusConfig,
};
pub use constant::{ConstantStep, ConstantStimuliTrial, PerceptKeys};
pub use error::{EngineError, Result};
pub use limits::{LimitsState, LimitsStep, LimitsTrial};
pub use output::OutputPaths;
pub use personalize::derive_profile;
pub use poller::ResponsePoller;
pub use scheduler::AlternationScheduler;
pub use session::{Checkpoint, Session, SessionEvent};
