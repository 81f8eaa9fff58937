use bridge_protocol::ProtocolError;
use thiserror::Error;

pub type Result<T, E = ToolError> = core::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error("exchange error: {0}")]
    Exchange(#[from] ProtocolError),
    #[error("motion library error: {0}")]
    Motions(String),
}

impl ToolError {
    pub fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}
