//! Quadcopter flight-state machine.

use crate::traits::{CommandOutcome, Completion, DroneBody, RobotController};
use bridge_protocol::{
    Action, ActiveAction, CollisionReadings, FlightSection, FlightStatus, StatusRecord, Vec3,
    VERTICAL_SPEED_M_S,
};
use safety_guard::FlightEnvelope;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Propeller speed commanded while airborne, before the envelope cap.
pub const FLIGHT_MOTOR_VELOCITY: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManeuverKind {
    TakeOff,
    Land,
    Move,
    Altitude,
    Hover,
}

impl ManeuverKind {
    fn action_name(&self) -> &'static str {
        match self {
            ManeuverKind::TakeOff => "takeoff",
            ManeuverKind::Land => "land",
            ManeuverKind::Move => "move_relative",
            ManeuverKind::Altitude => "set_altitude",
            ManeuverKind::Hover => "hover",
        }
    }
}

/// Setpoint ramp from `from` to `to` over `duration` seconds.
#[derive(Debug, Clone)]
struct Maneuver {
    command_id: Option<Uuid>,
    kind: ManeuverKind,
    from: Vec3,
    to: Vec3,
    from_yaw: f64,
    to_yaw: f64,
    started_at: f64,
    duration: f64,
}

impl Maneuver {
    fn fraction(&self, now: f64) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        ((now - self.started_at) / self.duration).clamp(0.0, 1.0)
    }

    fn remaining(&self, now: f64) -> f64 {
        (self.started_at + self.duration - now).max(0.0)
    }
}

pub struct DroneController<B: DroneBody> {
    body: B,
    envelope: FlightEnvelope,
    flight_status: FlightStatus,
    setpoint: Vec3,
    yaw: f64,
    maneuver: Option<Maneuver>,
}

fn vertical_duration(from: f64, to: f64) -> f64 {
    (to - from).abs() / VERTICAL_SPEED_M_S
}

fn with_warnings(message: String, warnings: &[String]) -> String {
    if warnings.is_empty() {
        message
    } else {
        format!("{message} (warning: {})", warnings.join("; "))
    }
}

impl<B: DroneBody> DroneController<B> {
    pub fn new(body: B, envelope: FlightEnvelope) -> Self {
        let setpoint = body.position();
        let yaw = body.orientation().yaw;
        Self {
            body,
            envelope,
            flight_status: FlightStatus::Grounded,
            setpoint,
            yaw,
            maneuver: None,
        }
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn flight_status(&self) -> FlightStatus {
        self.flight_status
    }

    fn begin(
        &mut self,
        id: Option<Uuid>,
        kind: ManeuverKind,
        to: Vec3,
        to_yaw: f64,
        duration: f64,
        now: f64,
    ) {
        if let Some(previous) = self.maneuver.take() {
            debug!(
                replaced = previous.kind.action_name(),
                by = kind.action_name(),
                "maneuver replaced"
            );
        }
        self.maneuver = Some(Maneuver {
            command_id: id,
            kind,
            from: self.setpoint,
            to,
            from_yaw: self.yaw,
            to_yaw,
            started_at: now,
            duration,
        });
        self.flight_status = match kind {
            ManeuverKind::TakeOff => FlightStatus::TakingOff,
            ManeuverKind::Land => FlightStatus::Landing,
            ManeuverKind::Move | ManeuverKind::Altitude => FlightStatus::Moving,
            ManeuverKind::Hover => FlightStatus::Hovering,
        };
    }

    fn require_airborne(&self) -> Option<CommandOutcome> {
        match self.flight_status {
            FlightStatus::Grounded => Some(CommandOutcome::rejected(
                "drone is on the ground; take off first",
            )),
            FlightStatus::Emergency => Some(CommandOutcome::rejected(
                "drone is in emergency stop; take off to recover",
            )),
            _ => None,
        }
    }

    fn takeoff(&mut self, id: Option<Uuid>, altitude: f64, now: f64) -> CommandOutcome {
        if self.flight_status.is_airborne() {
            return CommandOutcome::rejected(format!(
                "already airborne ({:?})",
                self.flight_status
            ));
        }
        let (altitude, warning) = match self.envelope.check_altitude(altitude).into_result() {
            Ok(v) => v,
            Err(e) => return CommandOutcome::rejected(e.to_string()),
        };
        let velocity = self.envelope.clamp_motor_velocity(FLIGHT_MOTOR_VELOCITY);
        self.body.set_motor_velocity(velocity);
        self.setpoint = Vec3::new(self.setpoint.x, self.setpoint.y, self.body.position().z);
        let to = Vec3::new(self.setpoint.x, self.setpoint.y, altitude);
        let duration = vertical_duration(self.setpoint.z, altitude);
        self.begin(id, ManeuverKind::TakeOff, to, self.yaw, duration, now);
        info!(altitude, duration, "taking off");
        CommandOutcome::ok(with_warnings(
            format!("taking off to {altitude:.2} m"),
            warning.as_slice(),
        ))
    }

    fn land(&mut self, id: Option<Uuid>, now: f64) -> CommandOutcome {
        match self.flight_status {
            FlightStatus::Grounded => return CommandOutcome::ok("already on the ground"),
            FlightStatus::Emergency => {
                self.flight_status = FlightStatus::Grounded;
                return CommandOutcome::ok("landed after emergency stop");
            }
            _ => {}
        }
        let to = Vec3::new(self.setpoint.x, self.setpoint.y, 0.0);
        let duration = vertical_duration(self.setpoint.z, 0.0);
        self.begin(id, ManeuverKind::Land, to, self.yaw, duration, now);
        CommandOutcome::ok(format!("landing from {:.2} m", self.setpoint.z))
    }

    fn hover(&mut self, id: Option<Uuid>, duration: f64, now: f64) -> CommandOutcome {
        if let Some(refused) = self.require_airborne() {
            return refused;
        }
        let (duration, warning) = match self.envelope.check_hover(duration).into_result() {
            Ok(v) => v,
            Err(e) => return CommandOutcome::rejected(e.to_string()),
        };
        if duration > 0.0 {
            self.begin(id, ManeuverKind::Hover, self.setpoint, self.yaw, duration, now);
        } else {
            self.flight_status = FlightStatus::Hovering;
        }
        CommandOutcome::ok(with_warnings(
            format!("hovering at {:.2} m for {duration:.1} s", self.setpoint.z),
            warning.as_slice(),
        ))
    }

    fn move_relative(
        &mut self,
        id: Option<Uuid>,
        delta: (f64, f64, f64, f64),
        duration: f64,
        now: f64,
    ) -> CommandOutcome {
        if let Some(refused) = self.require_airborne() {
            return refused;
        }
        let (dx, dy, dz, dyaw) = delta;
        let target = match self
            .envelope
            .check_move(dx, dy, dz, dyaw, duration, self.setpoint.z)
        {
            Ok(t) => t,
            Err(e) => return CommandOutcome::rejected(e.to_string()),
        };
        let to = Vec3::new(
            self.setpoint.x + target.dx,
            self.setpoint.y + target.dy,
            self.setpoint.z + target.dz,
        );
        let to_yaw = self.yaw + target.dyaw;
        self.begin(id, ManeuverKind::Move, to, to_yaw, target.duration, now);
        CommandOutcome::ok(with_warnings(
            format!(
                "moving by ({:.2}, {:.2}, {:.2}) m over {:.1} s",
                target.dx, target.dy, target.dz, target.duration
            ),
            &target.warnings,
        ))
    }

    fn set_altitude(&mut self, id: Option<Uuid>, altitude: f64, now: f64) -> CommandOutcome {
        if let Some(refused) = self.require_airborne() {
            return refused;
        }
        let (altitude, warning) = match self.envelope.check_altitude(altitude).into_result() {
            Ok(v) => v,
            Err(e) => return CommandOutcome::rejected(e.to_string()),
        };
        let to = Vec3::new(self.setpoint.x, self.setpoint.y, altitude);
        let duration = vertical_duration(self.setpoint.z, altitude);
        self.begin(id, ManeuverKind::Altitude, to, self.yaw, duration, now);
        CommandOutcome::ok(with_warnings(
            format!("changing altitude to {altitude:.2} m"),
            warning.as_slice(),
        ))
    }

    fn emergency_stop(&mut self) -> CommandOutcome {
        let cancelled = self.maneuver.take().map(|m| m.kind.action_name());
        self.body.cut_motors();
        self.setpoint = self.body.position();
        self.flight_status = FlightStatus::Emergency;
        warn!(?cancelled, "emergency stop");
        CommandOutcome::ok(match cancelled {
            Some(name) => format!("emergency stop: motors cut, {name} cancelled"),
            None => "emergency stop: motors cut".to_string(),
        })
    }
}

impl<B: DroneBody> RobotController for DroneController<B> {
    fn kind(&self) -> &'static str {
        "drone"
    }

    fn supports(&self, action: &Action) -> bool {
        matches!(
            action,
            Action::Takeoff { .. }
                | Action::Land
                | Action::Hover { .. }
                | Action::MoveRelative { .. }
                | Action::SetAltitude { .. }
                | Action::EmergencyStop
                | Action::GetCameraImage
                | Action::Status
        )
    }

    fn apply(&mut self, id: Option<Uuid>, action: &Action, now: f64) -> CommandOutcome {
        match action {
            Action::Takeoff { altitude } => self.takeoff(id, *altitude, now),
            Action::Land => self.land(id, now),
            Action::Hover { duration } => self.hover(id, *duration, now),
            Action::MoveRelative {
                x,
                y,
                z,
                yaw,
                duration,
            } => self.move_relative(id, (*x, *y, *z, *yaw), *duration, now),
            Action::SetAltitude { altitude } => self.set_altitude(id, *altitude, now),
            Action::EmergencyStop => self.emergency_stop(),
            Action::Status => CommandOutcome::ok("status reported"),
            other => CommandOutcome::rejected(format!(
                "{} is not supported by the drone controller",
                other.name()
            )),
        }
    }

    fn advance(&mut self, now: f64) -> Option<Completion> {
        let m = self.maneuver.as_ref()?;
        let t = m.fraction(now);
        if t < 1.0 {
            let setpoint = m.from.lerp(m.to, t);
            let yaw = m.from_yaw + (m.to_yaw - m.from_yaw) * t;
            self.setpoint = setpoint;
            self.yaw = yaw;
            self.body.set_setpoint(setpoint, yaw);
            return None;
        }

        let m = self.maneuver.take()?;
        self.setpoint = m.to;
        self.yaw = m.to_yaw;
        self.body.set_setpoint(m.to, m.to_yaw);
        let message = match m.kind {
            ManeuverKind::Land => {
                self.body.set_motor_velocity(0.0);
                self.flight_status = FlightStatus::Grounded;
                "landed".to_string()
            }
            ManeuverKind::Hover => {
                self.flight_status = FlightStatus::Hovering;
                format!("hover complete at {:.2} m", m.to.z)
            }
            _ => {
                self.flight_status = FlightStatus::Hovering;
                format!(
                    "{} complete: at ({:.2}, {:.2}, {:.2})",
                    m.kind.action_name(),
                    m.to.x,
                    m.to.y,
                    m.to.z
                )
            }
        };
        info!(action = m.kind.action_name(), %message, "maneuver finished");
        Some(Completion {
            command_id: m.command_id,
            name: m.kind.action_name(),
            message,
        })
    }

    fn active(&self, now: f64) -> Option<ActiveAction> {
        self.maneuver.as_ref().map(|m| ActiveAction {
            command_id: m.command_id,
            name: m.kind.action_name().to_string(),
            progress: m.fraction(now),
            remaining_secs: m.remaining(now),
        })
    }

    /// A timed hover only holds position; any command may take over.
    fn yields_to_commands(&self) -> bool {
        self.maneuver
            .as_ref()
            .is_some_and(|m| m.kind == ManeuverKind::Hover)
    }

    fn in_emergency(&self) -> bool {
        self.flight_status == FlightStatus::Emergency
    }

    fn capture_image(&mut self) -> Option<Vec<u8>> {
        self.body.capture_image()
    }

    fn fill_status(&self, status: &mut StatusRecord) {
        status.robot_position = self.body.position();
        status.flight = Some(FlightSection {
            flight_status: self.flight_status,
            orientation: self.body.orientation(),
            collision_sensors: CollisionReadings::from_ranges(self.body.range_readings()),
            target_altitude: self.maneuver.as_ref().map_or(self.setpoint.z, |m| m.to.z),
        });
    }
}
