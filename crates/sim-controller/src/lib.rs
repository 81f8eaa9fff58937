//! sim-controller: the simulator side of the command/status bridge
//!
//! One [`ControllerLoop`] per robot, stepped by the simulator once per
//! timestep. Each step consumes at most one command from the exchange,
//! checks it against the device limits in `safety-guard`, applies it to the
//! robot and publishes a status record with a heartbeat.
//!
//! Robot behaviour lives behind [`RobotController`]:
//! - [`DroneController`]: takeoff/land/hover/move state machine for a quadcopter
//! - [`HumanoidController`]: NAO head/arm poses, LEDs and keyframe motions
//!
//! The device layer itself ([`DroneBody`], [`HumanoidBody`]) is what a real
//! simulator binding implements; the `kinematic` feature provides ideal
//! bodies for headless runs and tests.

mod config;
pub use config::{ControllerConfig, RobotKind};

mod error;
pub use error::{ControllerError, Result};

mod traits;
pub use traits::{CommandOutcome, Completion, DroneBody, HumanoidBody, RobotController};

pub mod drone;
pub use drone::DroneController;

pub mod humanoid;
pub use humanoid::HumanoidController;

mod control_loop;
pub use control_loop::{ControllerLoop, TickReport};

mod metrics;
pub use metrics::ControllerMetrics;

#[cfg(feature = "kinematic")]
pub mod kinematic;
#[cfg(feature = "kinematic")]
pub use kinematic::{KinematicDrone, KinematicHumanoid};

use anyhow::Context;
use bridge_protocol::Exchange;
use motion_playback::MotionLibrary;
use safety_guard::MotorLimits;

/// Drone controller with the configured flight envelope and limit policy.
pub fn create_drone_controller<B: DroneBody>(body: B, config: &ControllerConfig) -> DroneController<B> {
    DroneController::new(body, config.flight.clone().with_policy(config.limit_policy))
}

/// Humanoid controller with NAO limits (plus any override file) and the
/// motions found in the configured directory.
pub fn create_humanoid_controller<B: HumanoidBody>(
    body: B,
    config: &ControllerConfig,
) -> anyhow::Result<HumanoidController<B>> {
    let mut limits = safety_guard::create_default_motor_limits(config.limit_policy);
    if let Some(path) = &config.motor_limits_file {
        let merged = limits
            .merge_file(path)
            .with_context(|| format!("loading motor limits: {}", path.display()))?;
        tracing::info!(merged, file = %path.display(), "motor limit overrides loaded");
    }
    let motions = match &config.motions_dir {
        Some(dir) => motion_playback::load_motions_dir(dir)?,
        None => MotionLibrary::default(),
    };
    tracing::info!(count = motions.len(), "motions available");
    Ok(HumanoidController::new(
        body,
        limits,
        motions,
        config.transition_secs,
    ))
}

/// Controller loop over the kinematic bodies for the configured robot kind.
#[cfg(feature = "kinematic")]
pub fn build_controller<E: Exchange>(
    config: &ControllerConfig,
    exchange: E,
) -> anyhow::Result<ControllerLoop<E>> {
    config.validate()?;
    let robot: Box<dyn RobotController> = match config.robot_kind {
        RobotKind::Drone => Box::new(create_drone_controller(KinematicDrone::new(), config)),
        RobotKind::Humanoid => Box::new(create_humanoid_controller(
            KinematicHumanoid::nao(),
            config,
        )?),
    };
    let controller = ControllerLoop::new(
        exchange,
        robot,
        config.robot_name.clone(),
        config.status_every_ticks,
    )?;
    Ok(controller)
}

#[cfg(all(test, feature = "kinematic"))]
mod tests {
    use super::*;
    use bridge_protocol::{Action, CommandRecord, FileExchange, ResultKind};

    #[test]
    fn test_humanoid_loads_motions_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        let motions = dir.path().join("motions");
        std::fs::create_dir_all(&motions).unwrap();
        std::fs::write(
            motions.join("HandWave.motion"),
            "#WEBOTS_MOTION,V1.0,RShoulderPitch\n00:00:000,Pose1,-1.0\n00:01:500,Pose2,-1.2\n",
        )
        .unwrap();
        let config = ControllerConfig {
            motions_dir: Some(motions),
            ..ControllerConfig::for_kind(RobotKind::Humanoid)
        };
        let mut h = create_humanoid_controller(KinematicHumanoid::nao(), &config).unwrap();
        let out = h.apply(
            None,
            &Action::PlayMotion {
                motion_name: "HandWave".into(),
            },
            0.0,
        );
        assert_eq!(out.kind, ResultKind::Ok);
        assert_eq!(h.current_motion(), Some("HandWave"));
    }

    #[test]
    fn test_missing_motions_dir_is_an_error() {
        let config = ControllerConfig {
            motions_dir: Some("/definitely/not/here".into()),
            ..ControllerConfig::for_kind(RobotKind::Humanoid)
        };
        assert!(create_humanoid_controller(KinematicHumanoid::nao(), &config).is_err());
    }

    #[test]
    fn test_file_exchange_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = ControllerConfig {
            data_root: dir.path().to_path_buf(),
            ..ControllerConfig::default()
        };
        let exchange = FileExchange::new(config.exchange_dir());
        let mut controller = build_controller(&config, exchange.clone()).unwrap();

        let record = CommandRecord::new(Action::Takeoff { altitude: 1.0 });
        exchange.write_command(&record).unwrap();
        controller.step(0.0);

        let status = exchange.read_status().unwrap().unwrap();
        assert!(status.acknowledges(record.id.unwrap()));
        assert_eq!(status.result_kind, Some(ResultKind::Ok));
        assert!(!exchange.commands_path().exists());

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(exchange.status_path()).unwrap()).unwrap();
        assert_eq!(raw["robot"], "Crazyflie");
        assert_eq!(raw["system"], "busy");
    }
}
