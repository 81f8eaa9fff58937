use thiserror::Error;

pub type Result<T, E = MotionError> = core::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    #[error("invalid timestamp '{0}': expected MM:SS:mmm or HH:MM:SS:mmm")]
    InvalidTimestamp(String),
    #[error("missing #WEBOTS_MOTION header")]
    MissingHeader,
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("line {line}: {reason}")]
    Row { line: usize, reason: String },
    #[error("motion has no frames")]
    Empty,
}
