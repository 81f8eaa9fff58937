//! Name-based dispatch over the tool surface, for the CLI and REPL.

use crate::error::{Result, ToolError};
use crate::tools::{MoveRequest, ToolReply, ToolServer};
use bridge_protocol::Exchange;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    Drone,
    Humanoid,
    System,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub group: ToolGroup,
    pub description: &'static str,
    pub params: &'static [&'static str],
}

const fn tool(
    name: &'static str,
    group: ToolGroup,
    description: &'static str,
    params: &'static [&'static str],
) -> ToolSpec {
    ToolSpec {
        name,
        group,
        description,
        params,
    }
}

pub const TOOLS: &[ToolSpec] = &[
    tool("takeoff", ToolGroup::Drone, "Climb to an altitude", &["altitude (default 1.0)"]),
    tool("land", ToolGroup::Drone, "Descend and stop the motors", &[]),
    tool("hover", ToolGroup::Drone, "Hold position", &["duration (default 5.0, 0 = until next command)"]),
    tool(
        "move_relative",
        ToolGroup::Drone,
        "Move relative to the current position",
        &["forward", "sideways", "up", "yaw", "duration (default 2.0)"],
    ),
    tool("set_altitude", ToolGroup::Drone, "Climb or descend to an altitude", &["altitude"]),
    tool("emergency_stop", ToolGroup::System, "Stop immediately, cancelling any action", &[]),
    tool("get_drone_position", ToolGroup::Drone, "Position and orientation", &[]),
    tool("get_drone_status", ToolGroup::Drone, "Flight state and system health", &[]),
    tool("get_collision_sensors", ToolGroup::Drone, "Range sensor readings and risk level", &[]),
    tool("get_visual_perception", ToolGroup::System, "Capture a camera image", &[]),
    tool("check_connection", ToolGroup::System, "Controller liveness", &[]),
    tool("get_capabilities", ToolGroup::System, "This list", &[]),
    tool("list_active_robots", ToolGroup::System, "Robots with recent status", &[]),
    tool("set_head_position", ToolGroup::Humanoid, "Point the head", &["yaw", "pitch"]),
    tool(
        "set_arm_position",
        ToolGroup::Humanoid,
        "Position one shoulder",
        &["arm (left|right)", "shoulder_pitch", "shoulder_roll"],
    ),
    tool("reset_pose", ToolGroup::Humanoid, "Return to the initial pose", &[]),
    tool("play_motion", ToolGroup::Humanoid, "Play a keyframe motion", &["motion_name"]),
    tool("list_motions", ToolGroup::Humanoid, "Motions available to play", &[]),
    tool(
        "set_led_color",
        ToolGroup::Humanoid,
        "Set the LED colour",
        &["color (red|green|blue|white|off|#RRGGBB)"],
    ),
    tool(
        "validate_position",
        ToolGroup::Humanoid,
        "Check a motor position against its limits",
        &["motor_name", "position"],
    ),
    tool("get_robot_status", ToolGroup::Humanoid, "Head, arms, motion and LED state", &[]),
];

pub fn capabilities() -> Value {
    json!({
        "server": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "tools": TOOLS,
    })
}

fn one() -> f64 {
    1.0
}

fn five() -> f64 {
    5.0
}

fn two() -> f64 {
    2.0
}

#[derive(Deserialize)]
struct TakeoffArgs {
    #[serde(default = "one")]
    altitude: f64,
}

#[derive(Deserialize)]
struct AltitudeArgs {
    altitude: f64,
}

#[derive(Deserialize)]
struct HoverArgs {
    #[serde(default = "five")]
    duration: f64,
}

#[derive(Deserialize)]
struct MoveArgs {
    #[serde(default, alias = "x")]
    forward: f64,
    #[serde(default, alias = "y")]
    sideways: f64,
    #[serde(default, alias = "z")]
    up: f64,
    #[serde(default)]
    yaw: f64,
    #[serde(default = "two")]
    duration: f64,
}

#[derive(Deserialize)]
struct HeadArgs {
    #[serde(default)]
    yaw: f64,
    #[serde(default)]
    pitch: f64,
}

#[derive(Deserialize)]
struct ArmArgs {
    arm: String,
    #[serde(default)]
    shoulder_pitch: f64,
    #[serde(default)]
    shoulder_roll: f64,
}

#[derive(Deserialize)]
struct MotionArgs {
    #[serde(alias = "name")]
    motion_name: String,
}

#[derive(Deserialize)]
struct LedArgs {
    color: String,
}

#[derive(Deserialize)]
struct ValidateArgs {
    motor_name: String,
    position: f64,
}

fn args<T: DeserializeOwned>(tool: &str, raw: &Value) -> Result<T> {
    let raw = if raw.is_null() { json!({}) } else { raw.clone() };
    serde_json::from_value(raw).map_err(|e| ToolError::invalid(tool, e.to_string()))
}

impl<E: Exchange> ToolServer<E> {
    /// Run the tool named `tool` with JSON-object arguments.
    pub async fn call(&self, tool: &str, raw: Value) -> Result<ToolReply> {
        let reply = match tool {
            "takeoff" => {
                let a: TakeoffArgs = args(tool, &raw)?;
                self.takeoff(a.altitude).await
            }
            "land" => self.land().await,
            "hover" => {
                let a: HoverArgs = args(tool, &raw)?;
                self.hover(a.duration).await
            }
            "move_relative" => {
                let a: MoveArgs = args(tool, &raw)?;
                self.move_relative(MoveRequest {
                    forward: a.forward,
                    sideways: a.sideways,
                    up: a.up,
                    yaw: a.yaw,
                    duration: a.duration,
                })
                .await
            }
            "set_altitude" => {
                let a: AltitudeArgs = args(tool, &raw)?;
                self.set_altitude(a.altitude).await
            }
            "emergency_stop" => self.emergency_stop().await,
            "get_drone_position" => self.get_drone_position(),
            "get_drone_status" => self.get_drone_status(),
            "get_collision_sensors" => self.get_collision_sensors(),
            "get_visual_perception" => self.get_visual_perception().await,
            "check_connection" => self.check_connection(),
            "get_capabilities" => self.get_capabilities(),
            "list_active_robots" => self.list_active_robots(),
            "set_head_position" => {
                let a: HeadArgs = args(tool, &raw)?;
                self.set_head_position(a.yaw, a.pitch).await
            }
            "set_arm_position" => {
                let a: ArmArgs = args(tool, &raw)?;
                self.set_arm_position(&a.arm, a.shoulder_pitch, a.shoulder_roll)
                    .await
            }
            "reset_pose" => self.reset_pose().await,
            "play_motion" => {
                let a: MotionArgs = args(tool, &raw)?;
                self.play_motion(&a.motion_name).await
            }
            "list_motions" => self.list_motions(),
            "set_led_color" => {
                let a: LedArgs = args(tool, &raw)?;
                self.set_led_color(&a.color).await
            }
            "validate_position" => {
                let a: ValidateArgs = args(tool, &raw)?;
                self.validate_position(&a.motor_name, a.position).await
            }
            "get_robot_status" => self.get_robot_status(),
            other => return Err(ToolError::UnknownTool(other.to_string())),
        };
        Ok(reply)
    }
}
