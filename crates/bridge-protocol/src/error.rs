use thiserror::Error;
use uuid::Uuid;

pub type Result<T, E = ProtocolError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("command has no 'action' field")]
    MissingAction { id: Option<Uuid> },
    #[error("unknown action: {action}")]
    UnknownAction { id: Option<Uuid>, action: String },
    #[error("invalid parameters for '{action}': {reason}")]
    InvalidParameters {
        id: Option<Uuid>,
        action: String,
        reason: String,
    },
    #[error("I/O error: {0}")]
    Io(String),
    #[error("encode error: {0}")]
    Encode(String),
}

impl ProtocolError {
    /// Correlation id of the offending command, when it could be recovered.
    pub fn command_id(&self) -> Option<Uuid> {
        match self {
            ProtocolError::MissingAction { id }
            | ProtocolError::UnknownAction { id, .. }
            | ProtocolError::InvalidParameters { id, .. } => *id,
            _ => None,
        }
    }

    /// Action name of the offending command, when present.
    pub fn action(&self) -> Option<&str> {
        match self {
            ProtocolError::UnknownAction { action, .. }
            | ProtocolError::InvalidParameters { action, .. } => Some(action),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(e: std::io::Error) -> Self {
        ProtocolError::Io(e.to_string())
    }
}
