//! tool-server: the client side of the command/status bridge
//!
//! Exposes robot operations as tools. Each tool that acts on the robot writes
//! one command record and polls the status record until the controller has
//! answered, the action has finished, or the attempt budget is spent:
//! - [`Submitter`]: write + bounded poll loop, one outstanding command at a time
//! - [`SubmitOutcome`]: completed, rejected, busy, failed, timeout or delivery failure
//! - [`ToolServer`]: drone and humanoid tools plus connection checks
//! - [`ToolServer::call`]: dispatch by tool name with JSON arguments

mod error;
pub use error::{Result, ToolError};

mod config;
pub use config::ServerConfig;

mod outcome;
pub use outcome::{SubmitOutcome, Wait};

mod submit;
pub use submit::Submitter;

mod discovery;
pub use discovery::{list_active_robots, ActiveRobot};

pub mod catalogue;
pub use catalogue::{capabilities, ToolGroup, ToolSpec, TOOLS};

mod tools;
pub use tools::{parse_color, MoveRequest, ToolReply, ToolServer};

use bridge_protocol::FileExchange;

/// Tool server talking to the exchange directory named by `config`.
pub fn create_file_tool_server(config: ServerConfig) -> anyhow::Result<ToolServer<FileExchange>> {
    config.validate()?;
    let exchange = FileExchange::new(config.exchange_dir());
    tracing::info!(dir = %exchange.dir().display(), "tool server using file exchange");
    Ok(ToolServer::new(exchange, config))
}
