//! bridge-protocol: file-based command/status exchange
//!
//! A tool-serving process and a simulator-driven controller cooperate through a
//! per-robot directory holding two JSON documents: the command record (written by
//! the tool server, consumed by the controller) and the status record (written by
//! the controller every tick). This crate defines both records and the
//! [`Exchange`] seam over them. The default build enables an in-memory `mock`
//! exchange so controller and server logic can be exercised without a filesystem.

mod types;
pub use types::{
    rfc3339_now, unix_now, Action, ActiveAction, ArmPosition, ArmSide, CollisionReadings,
    CommandRecord, FlightSection, FlightStatus, HeadPosition, HumanoidSection, LimitRange,
    Orientation, ResultKind, RiskLevel, StatusRecord, SystemState, Vec3, COLLISION_SENSORS,
    VERTICAL_SPEED_M_S,
};

mod error;
pub use error::{ProtocolError, Result};

mod codec;
pub use codec::{encode_command, encode_status, parse_command, parse_status};

mod traits;
pub use traits::Exchange;

mod file;
pub use file::{FileExchange, COMMANDS_FILE, CONSUMED_FILE, IMAGE_FILE, STATUS_FILE};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::MemoryExchange;
