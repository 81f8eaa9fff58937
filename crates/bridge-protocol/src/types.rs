use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

/// Climb/descent rate of the kinematic flight model, metres per second.
pub const VERTICAL_SPEED_M_S: f64 = 0.5;

/// Names of the eight horizontal range sensors reported by a drone.
pub const COLLISION_SENSORS: [&str; 8] = [
    "front",
    "front_right",
    "right",
    "back_right",
    "back",
    "back_left",
    "left",
    "front_left",
];

/// Wall-clock seconds since the Unix epoch.
pub fn unix_now() -> f64 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9
}

pub fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn default_takeoff_altitude() -> f64 {
    1.0
}

fn default_hover_duration() -> f64 {
    5.0
}

fn default_move_duration() -> f64 {
    2.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmSide {
    Left,
    Right,
}

impl ArmSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArmSide::Left => "left",
            ArmSide::Right => "right",
        }
    }
}

/// Requested operation carried by a command record.
///
/// The JSON form is flat: `{"action": "move_relative", "x": 1.0}`. Drone moves
/// also accept the body-frame names `forward`, `sideways` and `up`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Takeoff {
        #[serde(default = "default_takeoff_altitude")]
        altitude: f64,
    },
    Land,
    Hover {
        /// Seconds to hold position; 0 holds until the next command.
        #[serde(default = "default_hover_duration")]
        duration: f64,
    },
    MoveRelative {
        #[serde(default, alias = "forward")]
        x: f64,
        #[serde(default, alias = "sideways")]
        y: f64,
        #[serde(default, alias = "up")]
        z: f64,
        #[serde(default)]
        yaw: f64,
        #[serde(default = "default_move_duration")]
        duration: f64,
    },
    SetAltitude {
        altitude: f64,
    },
    EmergencyStop,
    GetCameraImage,
    SetHeadPosition {
        #[serde(default)]
        yaw: f64,
        #[serde(default)]
        pitch: f64,
    },
    SetArmPosition {
        arm: ArmSide,
        #[serde(default)]
        shoulder_pitch: f64,
        #[serde(default)]
        shoulder_roll: f64,
    },
    ResetPose,
    PlayMotion {
        motion_name: String,
    },
    SetLeds {
        /// 24-bit RGB value, `0xRRGGBB`.
        color: u32,
    },
    ValidatePosition {
        motor_name: String,
        position: f64,
    },
    Status,
}

impl Action {
    /// Every action name the controller understands.
    pub const NAMES: [&'static str; 14] = [
        "takeoff",
        "land",
        "hover",
        "move_relative",
        "set_altitude",
        "emergency_stop",
        "get_camera_image",
        "set_head_position",
        "set_arm_position",
        "reset_pose",
        "play_motion",
        "set_leds",
        "validate_position",
        "status",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Action::Takeoff { .. } => "takeoff",
            Action::Land => "land",
            Action::Hover { .. } => "hover",
            Action::MoveRelative { .. } => "move_relative",
            Action::SetAltitude { .. } => "set_altitude",
            Action::EmergencyStop => "emergency_stop",
            Action::GetCameraImage => "get_camera_image",
            Action::SetHeadPosition { .. } => "set_head_position",
            Action::SetArmPosition { .. } => "set_arm_position",
            Action::ResetPose => "reset_pose",
            Action::PlayMotion { .. } => "play_motion",
            Action::SetLeds { .. } => "set_leds",
            Action::ValidatePosition { .. } => "validate_position",
            Action::Status => "status",
        }
    }

    pub fn is_known(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Action::EmergencyStop)
    }

    /// Actions that observe the robot without changing its state. These are
    /// admitted even while a long-running action is in progress.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Action::Status | Action::GetCameraImage | Action::ValidatePosition { .. }
        )
    }

    /// Maneuvers a caller waits out, rather than returning once the
    /// controller has accepted them.
    pub fn runs_to_completion(&self) -> bool {
        matches!(
            self,
            Action::Takeoff { .. }
                | Action::Land
                | Action::SetAltitude { .. }
                | Action::MoveRelative { .. }
        )
    }

    /// How long the action keeps the controller busy, in seconds, when it
    /// can be known from the command alone. Landing and altitude changes
    /// depend on the current height and are only known to the controller.
    pub fn expected_duration(&self) -> Option<f64> {
        match self {
            Action::Takeoff { altitude } => Some(altitude.abs() / VERTICAL_SPEED_M_S),
            Action::MoveRelative { duration, .. } => Some(*duration),
            _ => None,
        }
    }
}

/// The single outstanding request written by the tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(flatten)]
    pub action: Action,
}

impl CommandRecord {
    /// Fresh record with a new correlation id and the current time.
    pub fn new(action: Action) -> Self {
        Self {
            id: Some(Uuid::new_v4()),
            timestamp: Some(unix_now()),
            action,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Ok,
    Rejected,
    Busy,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    #[default]
    Ready,
    Busy,
    Emergency,
}

/// A long-running action still in progress on the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAction {
    pub command_id: Option<Uuid>,
    pub name: String,
    /// Fraction complete, 0.0..=1.0.
    pub progress: f64,
    /// Simulation seconds until the action finishes.
    #[serde(default)]
    pub remaining_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn lerp(self, to: Vec3, t: f64) -> Vec3 {
        Vec3 {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
            z: self.z + (to.z - self.z) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    #[default]
    Grounded,
    TakingOff,
    Hovering,
    Moving,
    Landing,
    Emergency,
}

impl FlightStatus {
    pub fn is_airborne(&self) -> bool {
        matches!(
            self,
            FlightStatus::TakingOff
                | FlightStatus::Hovering
                | FlightStatus::Moving
                | FlightStatus::Landing
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    #[default]
    Safe,
    Caution,
    Warning,
    Critical,
}

impl RiskLevel {
    /// Classify the closest obstacle distance in metres.
    pub fn from_min_range(range: f64) -> Self {
        if range < 0.3 {
            RiskLevel::Critical
        } else if range < 0.8 {
            RiskLevel::Warning
        } else if range < 1.5 {
            RiskLevel::Caution
        } else {
            RiskLevel::Safe
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CollisionReadings {
    pub ranges: BTreeMap<String, f64>,
    pub min_range: f64,
    pub risk_level: RiskLevel,
}

impl CollisionReadings {
    pub fn from_ranges(ranges: BTreeMap<String, f64>) -> Self {
        let min_range = ranges.values().copied().fold(f64::INFINITY, f64::min);
        let min_range = if min_range.is_finite() { min_range } else { 999.0 };
        Self {
            risk_level: RiskLevel::from_min_range(min_range),
            min_range,
            ranges,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightSection {
    pub flight_status: FlightStatus,
    pub orientation: Orientation,
    pub collision_sensors: CollisionReadings,
    pub target_altitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadPosition {
    pub yaw: f64,
    pub pitch: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmPosition {
    pub shoulder_pitch: f64,
    pub shoulder_roll: f64,
}

/// Closed interval of admissible values for one actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitRange {
    pub min: f64,
    pub max: f64,
}

impl LimitRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanoidSection {
    pub head_position: HeadPosition,
    pub arm_positions: BTreeMap<String, ArmPosition>,
    pub motor_angles: BTreeMap<String, f64>,
    pub current_motion: Option<String>,
    pub led_color: u32,
    pub motor_limits: BTreeMap<String, LimitRange>,
}

/// Snapshot published by the controller.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusRecord {
    pub timestamp: f64,
    pub updated_at: String,
    pub sim_time: f64,
    /// Increments on every publish; a stalled value means a stalled controller.
    pub heartbeat: u64,
    pub robot: String,
    pub last_command: Option<String>,
    pub last_command_id: Option<Uuid>,
    pub last_result: Option<String>,
    pub result_kind: Option<ResultKind>,
    pub system: SystemState,
    pub webots_connected: bool,
    pub system_health: String,
    pub current_action: Option<ActiveAction>,
    pub robot_position: Vec3,
    pub flight: Option<FlightSection>,
    pub humanoid: Option<HumanoidSection>,
    pub last_image_timestamp: Option<f64>,
}

impl StatusRecord {
    pub fn acknowledges(&self, id: Uuid) -> bool {
        self.last_command_id == Some(id)
    }

    /// True while the command `id` still owns the in-progress action.
    pub fn is_running(&self, id: Uuid) -> bool {
        self.current_action
            .as_ref()
            .is_some_and(|a| a.command_id == Some(id))
    }

    pub fn age(&self, now: f64) -> f64 {
        (now - self.timestamp).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names_match_serde_tags() {
        let samples = [
            Action::Takeoff { altitude: 1.0 },
            Action::Land,
            Action::Hover { duration: 0.0 },
            Action::EmergencyStop,
            Action::ResetPose,
            Action::PlayMotion {
                motion_name: "Wave".into(),
            },
            Action::Status,
        ];
        for action in samples {
            let value = serde_json::to_value(&action).unwrap();
            assert_eq!(value["action"], action.name());
            assert!(Action::is_known(action.name()));
        }
    }

    #[test]
    fn test_move_relative_accepts_body_frame_aliases() {
        let action: Action =
            serde_json::from_str(r#"{"action":"move_relative","forward":1.5,"up":-0.5}"#).unwrap();
        assert_eq!(
            action,
            Action::MoveRelative {
                x: 1.5,
                y: 0.0,
                z: -0.5,
                yaw: 0.0,
                duration: 2.0
            }
        );
    }

    #[test]
    fn test_takeoff_defaults_to_one_metre() {
        let action: Action = serde_json::from_str(r#"{"action":"takeoff"}"#).unwrap();
        assert_eq!(action, Action::Takeoff { altitude: 1.0 });
        assert_eq!(action.expected_duration(), Some(2.0));
        assert!(action.runs_to_completion());
    }

    #[test]
    fn test_height_dependent_maneuvers_have_no_fixed_duration() {
        assert!(Action::Land.runs_to_completion());
        assert_eq!(Action::Land.expected_duration(), None);
        assert_eq!(Action::SetAltitude { altitude: 25.0 }.expected_duration(), None);
        assert!(!Action::Hover { duration: 5.0 }.runs_to_completion());
        assert!(!Action::PlayMotion {
            motion_name: "Wave".into()
        }
        .runs_to_completion());
    }

    #[test]
    fn test_command_record_is_flat_on_the_wire() {
        let record = CommandRecord::new(Action::Land);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["action"], "land");
        assert!(value.get("id").is_some());
        assert!(value.get("timestamp").is_some());
    }

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_min_range(0.1), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_min_range(0.5), RiskLevel::Warning);
        assert_eq!(RiskLevel::from_min_range(1.0), RiskLevel::Caution);
        assert_eq!(RiskLevel::from_min_range(999.0), RiskLevel::Safe);
        let readings = CollisionReadings::from_ranges(BTreeMap::new());
        assert_eq!(readings.min_range, 999.0);
    }

    #[test]
    fn test_status_tolerates_missing_fields() {
        let status: StatusRecord =
            serde_json::from_str(r#"{"last_command":"takeoff","heartbeat":3}"#).unwrap();
        assert_eq!(status.last_command.as_deref(), Some("takeoff"));
        assert_eq!(status.heartbeat, 3);
        assert_eq!(status.system, SystemState::Ready);
        assert!(status.flight.is_none());
    }

    #[test]
    fn test_limit_range_clamps() {
        let r = LimitRange::new(-1.0, 1.0);
        assert!(r.contains(1.0));
        assert!(!r.contains(1.01));
        assert_eq!(r.clamp(3.0), 1.0);
        assert_eq!(r.clamp(-3.0), -1.0);
    }
}
