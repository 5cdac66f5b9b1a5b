use thiserror::Error;

/// Errors surfaced at the simulation boundary.
///
/// Nothing inside the per-frame tick returns these; they are raised while
/// loading content or constructing a session.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid track: {0}")]
    InvalidTrack(String),

    #[error("invalid car: {0}")]
    InvalidCar(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("ghost store error: {0}")]
    GhostStore(String),

    #[error("failed to load asset {path}: {reason}")]
    Asset { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, SimError>;
