use thiserror::Error;

pub type Result<T, E = SafetyError> = core::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SafetyError {
    #[error("Unknown motor: {0}")]
    UnknownMotor(String),
    #[error("{field} must be a finite number")]
    NotFinite { field: String },
    #[error("{0}")]
    OutOfLimits(String),
    #[error("{}", .0.join("; "))]
    Multiple(Vec<String>),
}

impl SafetyError {
    /// Fold several rejections into one error, keeping a lone one as-is.
    pub fn combine(mut errors: Vec<SafetyError>) -> Option<SafetyError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(SafetyError::Multiple(
                errors.iter().map(ToString::to_string).collect(),
            )),
        }
    }
}
