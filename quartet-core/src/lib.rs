pub mod phase;
pub mod profile;
pub mod ratio;
pub mod stimulus;
pub mod trial;

pub use phase::SessionPhase;
pub use profile::{PersonalizedRatio, SubjectProfile};
pub use ratio::{RatioDirection, RatioPoint, RatioSequence};
pub use stimulus::{FixationColor, Message, QuartetFrame, QuartetPair, Screen, ratio_to_offsets};
pub use trial::{
    ConditionLabel, ConstantCondition, ConstantRecord, ConstantResponse, Key, KeyPress,
    LimitsCondition, LimitsRecord, LimitsResponse, PerceptLabel,
};
