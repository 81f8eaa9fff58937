//! safety-guard: device limits and liveness monitoring for simulated robots
//!
//! Every command that moves an actuator passes through this crate before any
//! device state changes:
//! - [`MotorLimits`]: per-motor position ranges for the NAO humanoid, single
//!   targets and whole poses (all-or-nothing)
//! - [`FlightEnvelope`]: altitude, relative-move and duration bounds for drones
//! - [`LimitPolicy`]: whether an out-of-range value is rejected or clamped
//! - [`HeartbeatWatchdog`]: detects a controller that stopped publishing status

mod types;
pub use types::{LimitCheck, LimitPolicy, PoseAdjustment, WatchdogStatus};
pub use bridge_protocol::LimitRange;

mod error;
pub use error::{Result, SafetyError};

pub mod motors;
pub use motors::{MotorLimits, NAO_INITIAL_POSE, NAO_MOTORS};

pub mod flight;
pub use flight::{FlightEnvelope, MoveTarget};

#[cfg(feature = "watchdogs")]
mod watchdogs;
#[cfg(feature = "watchdogs")]
pub use watchdogs::{HeartbeatWatchdog, Watchdog};

/// NAO motor table with the given out-of-range policy.
pub fn create_default_motor_limits(policy: LimitPolicy) -> MotorLimits {
    MotorLimits::nao().with_policy(policy)
}

/// Watchdog that declares the controller stale after `stale_after_secs`
/// without a fresh status record.
#[cfg(feature = "watchdogs")]
pub fn create_default_watchdog(stale_after_secs: f64) -> HeartbeatWatchdog {
    tracing::debug!(stale_after_secs, "creating heartbeat watchdog");
    HeartbeatWatchdog::new("controller_heartbeat", stale_after_secs)
}
