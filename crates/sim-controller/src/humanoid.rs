//! NAO humanoid: head and arm positioning, LEDs, keyframe motions.

use crate::traits::{CommandOutcome, Completion, HumanoidBody, RobotController};
use bridge_protocol::{
    Action, ActiveAction, ArmPosition, ArmSide, HeadPosition, HumanoidSection, StatusRecord,
};
use motion_playback::{MotionLibrary, MotionPlayer, Pose};
use safety_guard::{LimitCheck, LimitPolicy, MotorLimits};
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_RGB: u32 = 0x00FF_FFFF;

fn shoulder_motors(arm: ArmSide) -> (&'static str, &'static str) {
    match arm {
        ArmSide::Left => ("LShoulderPitch", "LShoulderRoll"),
        ArmSide::Right => ("RShoulderPitch", "RShoulderRoll"),
    }
}

struct Playback {
    command_id: Option<Uuid>,
    player: MotionPlayer,
}

pub struct HumanoidController<B: HumanoidBody> {
    body: B,
    limits: MotorLimits,
    motions: MotionLibrary,
    transition_secs: f64,
    playback: Option<Playback>,
    led_color: u32,
    emergency: bool,
}

impl<B: HumanoidBody> HumanoidController<B> {
    /// Builds the controller and drives the body into the initial pose.
    pub fn new(body: B, limits: MotorLimits, motions: MotionLibrary, transition_secs: f64) -> Self {
        let mut controller = Self {
            body,
            limits,
            motions,
            transition_secs,
            playback: None,
            led_color: 0,
            emergency: false,
        };
        controller.apply_initial_pose();
        controller
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn current_motion(&self) -> Option<&str> {
        self.playback.as_ref().map(|p| p.player.name())
    }

    fn apply_initial_pose(&mut self) {
        for (motor, position) in self.limits.initial_pose() {
            if !self.body.set_motor_position(&motor, position) {
                debug!(%motor, "body has no such motor");
            }
        }
    }

    fn target(&self, motor: &str) -> f64 {
        self.body.motor_target(motor).unwrap_or(0.0)
    }

    fn set_pose(&mut self, targets: &[(&str, f64)]) -> CommandOutcome {
        let adjusted = match self.limits.check_pose(targets.iter().copied()) {
            Ok(a) => a,
            Err(e) => return CommandOutcome::rejected(e.to_string()),
        };
        for (motor, position) in &adjusted.positions {
            self.body.set_motor_position(motor, *position);
        }
        let summary = adjusted
            .positions
            .iter()
            .map(|(m, v)| format!("{m}={v:.3} rad ({:.1}°)", v.to_degrees()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut message = format!("set {summary}");
        if !adjusted.warnings.is_empty() {
            message.push_str(&format!(" (warning: {})", adjusted.warnings.join("; ")));
        }
        CommandOutcome::ok(message)
    }

    fn play_motion(&mut self, id: Option<Uuid>, name: &str, now: f64) -> CommandOutcome {
        let Some(motion) = self.motions.get(name) else {
            return CommandOutcome::rejected(format!("motion '{name}' not found"));
        };
        let motion = motion.clone();
        let current: Pose = motion
            .motors
            .iter()
            .map(|m| (m.clone(), self.target(m)))
            .collect();
        let player = MotionPlayer::start(motion, current, now, self.transition_secs);
        let message = format!(
            "playing motion {} ({:.2} s)",
            player.name(),
            player.total_duration()
        );
        info!(motion = player.name(), "motion started");
        self.playback = Some(Playback {
            command_id: id,
            player,
        });
        CommandOutcome::ok(message)
    }

    fn set_leds(&mut self, color: u32) -> CommandOutcome {
        if color > MAX_RGB {
            return CommandOutcome::rejected(format!(
                "LED colour {color:#x} exceeds 24-bit RGB"
            ));
        }
        self.body.set_led_color(color);
        self.led_color = color;
        CommandOutcome::ok(format!("LED colour set to {color:#08x}"))
    }

    fn validate_position(&self, motor: &str, position: f64) -> CommandOutcome {
        match self.limits.check_with(motor, position, LimitPolicy::Clamp) {
            LimitCheck::Within(v) => CommandOutcome::ok(format!(
                "position valid: {motor} {v:.3} rad ({:.1}°)",
                v.to_degrees()
            )),
            LimitCheck::Clamped { message, .. } => CommandOutcome::rejected(message),
            LimitCheck::Rejected(e) => CommandOutcome::rejected(e.to_string()),
        }
    }

    fn emergency_stop(&mut self) -> CommandOutcome {
        self.emergency = true;
        match self.playback.take() {
            Some(p) => {
                warn!(motion = p.player.name(), "emergency stop during motion");
                CommandOutcome::ok(format!(
                    "emergency stop: motion {} halted",
                    p.player.name()
                ))
            }
            None => CommandOutcome::ok("emergency stop: holding pose"),
        }
    }

    /// Apply a sampled motion pose, clamping each motor into its range.
    fn drive(&mut self, pose: &Pose) {
        for (motor, value) in pose {
            if let Some(v) = self
                .limits
                .check_with(motor, *value, LimitPolicy::Clamp)
                .applied()
            {
                self.body.set_motor_position(motor, v);
            }
        }
    }
}

impl<B: HumanoidBody> RobotController for HumanoidController<B> {
    fn kind(&self) -> &'static str {
        "humanoid"
    }

    fn supports(&self, action: &Action) -> bool {
        matches!(
            action,
            Action::SetHeadPosition { .. }
                | Action::SetArmPosition { .. }
                | Action::ResetPose
                | Action::PlayMotion { .. }
                | Action::SetLeds { .. }
                | Action::ValidatePosition { .. }
                | Action::EmergencyStop
                | Action::GetCameraImage
                | Action::Status
        )
    }

    fn apply(&mut self, id: Option<Uuid>, action: &Action, now: f64) -> CommandOutcome {
        let outcome = match action {
            Action::SetHeadPosition { yaw, pitch } => {
                self.set_pose(&[("HeadYaw", *yaw), ("HeadPitch", *pitch)])
            }
            Action::SetArmPosition {
                arm,
                shoulder_pitch,
                shoulder_roll,
            } => {
                let (pitch, roll) = shoulder_motors(*arm);
                self.set_pose(&[(pitch, *shoulder_pitch), (roll, *shoulder_roll)])
            }
            Action::ResetPose => {
                self.apply_initial_pose();
                CommandOutcome::ok("initial pose restored")
            }
            Action::PlayMotion { motion_name } => self.play_motion(id, motion_name, now),
            Action::SetLeds { color } => self.set_leds(*color),
            Action::ValidatePosition {
                motor_name,
                position,
            } => return self.validate_position(motor_name, *position),
            Action::EmergencyStop => return self.emergency_stop(),
            Action::Status => return CommandOutcome::ok("status reported"),
            other => {
                return CommandOutcome::rejected(format!(
                    "{} is not supported by the humanoid controller",
                    other.name()
                ))
            }
        };
        if outcome.kind == bridge_protocol::ResultKind::Ok {
            self.emergency = false;
        }
        outcome
    }

    fn advance(&mut self, now: f64) -> Option<Completion> {
        let pose = self.playback.as_ref()?.player.sample(now);
        self.drive(&pose);
        if !self.playback.as_ref()?.player.is_over(now) {
            return None;
        }
        let done = self.playback.take()?;
        info!(motion = done.player.name(), "motion completed");
        Some(Completion {
            command_id: done.command_id,
            name: "play_motion",
            message: format!("motion {} completed", done.player.name()),
        })
    }

    fn active(&self, now: f64) -> Option<ActiveAction> {
        self.playback.as_ref().map(|p| ActiveAction {
            command_id: p.command_id,
            name: format!("play_motion:{}", p.player.name()),
            progress: p.player.progress(now),
            remaining_secs: p.player.remaining(now),
        })
    }

    fn in_emergency(&self) -> bool {
        self.emergency
    }

    fn capture_image(&mut self) -> Option<Vec<u8>> {
        self.body.capture_image()
    }

    fn fill_status(&self, status: &mut StatusRecord) {
        let arm = |side: ArmSide| {
            let (pitch, roll) = shoulder_motors(side);
            ArmPosition {
                shoulder_pitch: self.target(pitch),
                shoulder_roll: self.target(roll),
            }
        };
        status.robot_position = self.body.position();
        status.humanoid = Some(HumanoidSection {
            head_position: HeadPosition {
                yaw: self.target("HeadYaw"),
                pitch: self.target("HeadPitch"),
            },
            arm_positions: [ArmSide::Left, ArmSide::Right]
                .into_iter()
                .map(|side| (side.as_str().to_string(), arm(side)))
                .collect(),
            motor_angles: self
                .limits
                .names()
                .filter_map(|m| self.body.motor_target(m).map(|v| (m.to_string(), v)))
                .collect(),
            current_motion: self.current_motion().map(str::to_string),
            led_color: self.led_color,
            motor_limits: self.limits.table().clone(),
        });
    }
}
