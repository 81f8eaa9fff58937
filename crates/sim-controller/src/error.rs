use bridge_protocol::ProtocolError;
use thiserror::Error;

pub type Result<T, E = ControllerError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("metrics init error: {0}")]
    Metrics(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<prometheus::Error> for ControllerError {
    fn from(e: prometheus::Error) -> Self {
        ControllerError::Metrics(e.to_string())
    }
}
