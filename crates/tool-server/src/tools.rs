//! Drone and humanoid tools on top of [`Submitter`].

use crate::catalogue::capabilities;
use crate::config::ServerConfig;
use crate::discovery::list_active_robots;
use crate::outcome::SubmitOutcome;
use crate::submit::Submitter;
use bridge_protocol::{unix_now, Action, ArmSide, Exchange, StatusRecord};
use parking_lot::Mutex;
use safety_guard::{HeartbeatWatchdog, Watchdog};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

/// What a tool hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolReply {
    pub ok: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn from_outcome(outcome: &SubmitOutcome) -> Self {
        let mut data = json!({ "outcome": outcome.label() });
        if let Some(status) = outcome.status() {
            data["system"] = json!(status.system);
            data["position"] = json!(status.robot_position);
            if let Some(active) = &status.current_action {
                data["current_action"] = json!(active);
            }
        }
        Self {
            ok: outcome.is_success(),
            message: outcome.describe(),
            data: Some(data),
        }
    }
}

/// Map a colour name or `#RRGGBB` to a 24-bit RGB value.
pub fn parse_color(color: &str) -> Result<u32, String> {
    let named = match color.to_ascii_lowercase().as_str() {
        "red" => Some(0xFF0000),
        "green" => Some(0x00FF00),
        "blue" => Some(0x0000FF),
        "white" => Some(0xFFFFFF),
        "off" => Some(0x000000),
        _ => None,
    };
    if let Some(rgb) = named {
        return Ok(rgb);
    }
    match color.strip_prefix('#') {
        Some(hex) if hex.len() == 6 => u32::from_str_radix(hex, 16)
            .map_err(|_| format!("invalid hex colour: {color}")),
        _ => Err(format!(
            "invalid colour: {color}; use red, green, blue, white, off or #RRGGBB"
        )),
    }
}

fn parse_arm(arm: &str) -> Option<ArmSide> {
    match arm.to_ascii_lowercase().as_str() {
        "left" => Some(ArmSide::Left),
        "right" => Some(ArmSide::Right),
        _ => None,
    }
}

/// Relative move in the drone's terms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveRequest {
    pub forward: f64,
    pub sideways: f64,
    pub up: f64,
    pub yaw: f64,
    pub duration: f64,
}

/// Tool surface for one robot. Values are passed through unchanged; limits
/// are enforced by the controller, and its verdict comes back in the reply.
pub struct ToolServer<E: Exchange> {
    submitter: Submitter<E>,
    config: ServerConfig,
    watchdog: Mutex<HeartbeatWatchdog>,
}

impl<E: Exchange> ToolServer<E> {
    pub fn new(exchange: E, config: ServerConfig) -> Self {
        let submitter = Submitter::from_config(exchange, &config);
        let watchdog = safety_guard::create_default_watchdog(config.stale_after_secs);
        Self {
            submitter,
            config,
            watchdog: Mutex::new(watchdog),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn submitter(&self) -> &Submitter<E> {
        &self.submitter
    }

    async fn send(&self, action: Action) -> ToolReply {
        info!(robot = %self.config.robot_name, action = action.name(), "tool call");
        ToolReply::from_outcome(&self.submitter.submit(action).await)
    }

    fn current_status(&self) -> Result<StatusRecord, ToolReply> {
        self.submitter.read_status().ok_or_else(|| {
            ToolReply::fail(format!(
                "no status from {} yet; is the controller running?",
                self.config.robot_name
            ))
        })
    }

    fn is_running(&self, status: &StatusRecord) -> bool {
        status.age(unix_now()) < self.config.stale_after_secs
    }

    // Drone

    pub async fn takeoff(&self, altitude: f64) -> ToolReply {
        self.send(Action::Takeoff { altitude }).await
    }

    pub async fn land(&self) -> ToolReply {
        self.send(Action::Land).await
    }

    pub async fn hover(&self, duration: f64) -> ToolReply {
        self.send(Action::Hover { duration }).await
    }

    pub async fn move_relative(&self, request: MoveRequest) -> ToolReply {
        self.send(Action::MoveRelative {
            x: request.forward,
            y: request.sideways,
            z: request.up,
            yaw: request.yaw,
            duration: request.duration,
        })
        .await
    }

    pub async fn set_altitude(&self, altitude: f64) -> ToolReply {
        self.send(Action::SetAltitude { altitude }).await
    }

    pub async fn emergency_stop(&self) -> ToolReply {
        self.send(Action::EmergencyStop).await
    }

    pub fn get_drone_position(&self) -> ToolReply {
        let status = match self.current_status() {
            Ok(s) => s,
            Err(reply) => return reply,
        };
        let orientation = status.flight.as_ref().map(|f| f.orientation).unwrap_or_default();
        ToolReply::ok(format!(
            "{} at ({:.2}, {:.2}, {:.2})",
            status.robot,
            status.robot_position.x,
            status.robot_position.y,
            status.robot_position.z
        ))
        .with_data(json!({
            "position": status.robot_position,
            "orientation": orientation,
            "timestamp": status.timestamp,
        }))
    }

    pub fn get_drone_status(&self) -> ToolReply {
        let status = match self.current_status() {
            Ok(s) => s,
            Err(reply) => return reply,
        };
        let now = unix_now();
        let flight_status = status.flight.as_ref().map(|f| f.flight_status);
        ToolReply::ok(format!("{} is {:?}", status.robot, status.system)).with_data(json!({
            "running": self.is_running(&status),
            "webots_connected": status.webots_connected,
            "system": status.system,
            "flight_status": flight_status,
            "position": status.robot_position,
            "current_action": status.current_action,
            "last_command": status.last_command,
            "last_result": status.last_result,
            "system_health": status.system_health,
            "last_update": status.timestamp,
            "time_since_update": status.age(now),
        }))
    }

    pub fn get_collision_sensors(&self) -> ToolReply {
        let status = match self.current_status() {
            Ok(s) => s,
            Err(reply) => return reply,
        };
        match status.flight {
            Some(flight) => {
                let readings = flight.collision_sensors;
                ToolReply::ok(format!(
                    "closest obstacle {:.2} m, risk {:?}",
                    readings.min_range, readings.risk_level
                ))
                .with_data(json!(readings))
            }
            None => ToolReply::fail(format!("{} has no collision sensors", status.robot)),
        }
    }

    pub async fn get_visual_perception(&self) -> ToolReply {
        let outcome = self.submitter.capture_image().await;
        let mut reply = ToolReply::from_outcome(&outcome);
        if outcome.is_success() {
            reply.message = match self.submitter.exchange().image_location() {
                Some(path) => format!("image captured: {}", path.display()),
                None => "image captured".to_string(),
            };
        }
        reply
    }

    /// Liveness of the controller, judged by the heartbeat watchdog.
    pub fn check_connection(&self) -> ToolReply {
        let now = unix_now();
        let status = self.submitter.read_status();
        let mut dog = self.watchdog.lock();
        if let Some(s) = &status {
            dog.observe(s.heartbeat, s.timestamp, now);
        }
        let health = dog.check(now);
        let exchange = self.submitter.exchange();
        let data = json!({
            "connected": health.healthy,
            "heartbeat": status.as_ref().map(|s| s.heartbeat),
            "time_since_update": health.age_secs,
            "stale_after": health.timeout_secs,
            "webots_connected": status.as_ref().is_some_and(|s| s.webots_connected),
            "system_health": status.as_ref().map(|s| s.system_health.clone()),
            "command_pending": exchange.has_pending_command().unwrap_or(false),
            "status_available": status.is_some(),
            "robot": self.config.robot_name,
        });
        let reply = if health.healthy {
            ToolReply::ok(format!("{} controller is running", self.config.robot_name))
        } else {
            ToolReply::fail(
                health
                    .last_error
                    .unwrap_or_else(|| "controller not responding".to_string()),
            )
        };
        reply.with_data(data)
    }

    pub fn get_capabilities(&self) -> ToolReply {
        ToolReply::ok("available tools").with_data(capabilities())
    }

    pub fn list_active_robots(&self) -> ToolReply {
        match list_active_robots(
            &self.config.data_root,
            self.config.active_window_secs,
            unix_now(),
        ) {
            Ok(robots) => ToolReply::ok(format!("{} active robot(s)", robots.len()))
                .with_data(json!(robots)),
            Err(e) => ToolReply::fail(format!("{e:#}")),
        }
    }

    // Humanoid

    pub async fn set_head_position(&self, yaw: f64, pitch: f64) -> ToolReply {
        self.send(Action::SetHeadPosition { yaw, pitch }).await
    }

    pub async fn set_arm_position(
        &self,
        arm: &str,
        shoulder_pitch: f64,
        shoulder_roll: f64,
    ) -> ToolReply {
        let Some(arm) = parse_arm(arm) else {
            return ToolReply::fail(format!("invalid arm '{arm}'; use left or right"));
        };
        self.send(Action::SetArmPosition {
            arm,
            shoulder_pitch,
            shoulder_roll,
        })
        .await
    }

    pub async fn reset_pose(&self) -> ToolReply {
        self.send(Action::ResetPose).await
    }

    pub async fn play_motion(&self, motion_name: &str) -> ToolReply {
        self.send(Action::PlayMotion {
            motion_name: motion_name.to_string(),
        })
        .await
    }

    pub fn list_motions(&self) -> ToolReply {
        let Some(dir) = &self.config.motions_dir else {
            return ToolReply::fail("no motions directory configured");
        };
        match motion_playback::list_motion_names(dir) {
            Ok(names) if names.is_empty() => {
                ToolReply::ok(format!("no .motion files in {}", dir.display())).with_data(json!(names))
            }
            Ok(names) => ToolReply::ok(format!("{} motion(s)", names.len())).with_data(json!(names)),
            Err(e) => ToolReply::fail(format!("{e:#}")),
        }
    }

    pub async fn set_led_color(&self, color: &str) -> ToolReply {
        match parse_color(color) {
            Ok(rgb) => self.send(Action::SetLeds { color: rgb }).await,
            Err(reason) => ToolReply::fail(reason),
        }
    }

    pub async fn validate_position(&self, motor_name: &str, position: f64) -> ToolReply {
        self.send(Action::ValidatePosition {
            motor_name: motor_name.to_string(),
            position,
        })
        .await
    }

    pub fn get_robot_status(&self) -> ToolReply {
        let status = match self.current_status() {
            Ok(s) => s,
            Err(reply) => return reply,
        };
        let running = self.is_running(&status);
        ToolReply::ok(format!("{} is {:?}", status.robot, status.system)).with_data(json!({
            "running": running,
            "webots_connected": status.webots_connected,
            "system": status.system,
            "humanoid": status.humanoid,
            "current_action": status.current_action,
            "last_command": status.last_command,
            "last_result": status.last_result,
            "last_update": status.timestamp,
            "last_image_timestamp": status.last_image_timestamp,
        }))
    }
}
