use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the engine reports to its caller.
///
/// A trial without a response is not an error: it is recorded as a `None`
/// response. An undefined personalization is not an error either: NaN is
/// carried through the profile.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session aborted with the reserved key")]
    AbortRequested,

    #[error("failed to read config {path}: {source}")]
    ConfigRead { path: PathBuf, source: io::Error },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to write default config {path}: {source}")]
    ConfigWrite { path: PathBuf, source: io::Error },

    #[error("failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("unknown monitor preset {0:?}")]
    UnknownMonitor(String),

    #[error("failed to write {path}: {source}")]
    Persist { path: PathBuf, source: io::Error },

    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
