use bridge_protocol::{Action, ActiveAction, Orientation, ResultKind, StatusRecord, Vec3};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Device layer of a quadcopter: the seam between the controller and the
/// simulator's motors and sensors.
pub trait DroneBody: Send {
    fn position(&self) -> Vec3;

    fn orientation(&self) -> Orientation;

    /// Horizontal range sensor readings in metres, keyed by sensor name.
    fn range_readings(&self) -> BTreeMap<String, f64>;

    /// Command the position/heading the flight controller should hold.
    fn set_setpoint(&mut self, position: Vec3, yaw: f64);

    fn set_motor_velocity(&mut self, velocity: f64);

    /// Stop all propellers immediately.
    fn cut_motors(&mut self);

    /// Encoded JPEG frame from the on-board camera, if there is one.
    fn capture_image(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// Device layer of a humanoid: named position-controlled motors plus LEDs.
pub trait HumanoidBody: Send {
    /// Returns `false` when the body has no motor by that name.
    fn set_motor_position(&mut self, motor: &str, position: f64) -> bool;

    fn motor_target(&self, motor: &str) -> Option<f64>;

    fn set_led_color(&mut self, rgb: u32);

    fn position(&self) -> Vec3 {
        Vec3::default()
    }

    fn capture_image(&mut self) -> Option<Vec<u8>> {
        None
    }
}

/// Immediate result of applying one command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub kind: ResultKind,
    pub message: String,
}

impl CommandOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Ok,
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Rejected,
            message: message.into(),
        }
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Busy,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Error,
            message: message.into(),
        }
    }
}

/// A long-running action that finished during [`RobotController::advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub command_id: Option<Uuid>,
    pub name: &'static str,
    pub message: String,
}

/// Robot-specific half of the controller loop.
///
/// The loop owns admission (busy/stop rules) and the exchange; implementations
/// own device state. `now` is always simulation time in seconds.
pub trait RobotController: Send {
    fn kind(&self) -> &'static str;

    fn supports(&self, action: &Action) -> bool;

    fn apply(&mut self, id: Option<Uuid>, action: &Action, now: f64) -> CommandOutcome;

    /// Progress the in-flight action, if any.
    fn advance(&mut self, now: f64) -> Option<Completion>;

    fn active(&self, now: f64) -> Option<ActiveAction>;

    /// True when the in-flight action gives way to the next command instead
    /// of making it wait.
    fn yields_to_commands(&self) -> bool {
        false
    }

    fn in_emergency(&self) -> bool;

    fn capture_image(&mut self) -> Option<Vec<u8>>;

    /// Write the robot-specific parts of the status record.
    fn fill_status(&self, status: &mut StatusRecord);
}
