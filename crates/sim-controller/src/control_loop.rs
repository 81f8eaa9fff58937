use crate::metrics::ControllerMetrics;
use crate::traits::{CommandOutcome, Completion, RobotController};
use crate::Result;
use bridge_protocol::{
    rfc3339_now, unix_now, Action, CommandRecord, Exchange, ProtocolError, ResultKind,
    StatusRecord, SystemState,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What one call to [`ControllerLoop::step`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Result of the command taken this tick, if any.
    pub command: Option<ResultKind>,
    pub completed: bool,
    pub published: bool,
}

#[derive(Debug, Default)]
struct LastCommand {
    name: Option<String>,
    id: Option<Uuid>,
    result: Option<String>,
    kind: Option<ResultKind>,
}

/// Read side of the bridge, stepped by the simulator host once per tick.
///
/// Each step takes at most one pending command, decides whether it may run
/// now, applies it, advances any long-running action and publishes status.
/// Nothing in here sleeps or waits on the tool server.
pub struct ControllerLoop<E: Exchange> {
    exchange: E,
    robot: Box<dyn RobotController>,
    robot_name: String,
    metrics: ControllerMetrics,
    status_every_ticks: u64,
    tick: u64,
    heartbeat: u64,
    last: LastCommand,
    last_seen_id: Option<Uuid>,
    last_image_timestamp: Option<f64>,
    write_failures: u64,
}

impl<E: Exchange> ControllerLoop<E> {
    pub fn new(
        exchange: E,
        robot: Box<dyn RobotController>,
        robot_name: impl Into<String>,
        status_every_ticks: u64,
    ) -> Result<Self> {
        Ok(Self {
            exchange,
            robot,
            robot_name: robot_name.into(),
            metrics: ControllerMetrics::new()?,
            status_every_ticks: status_every_ticks.max(1),
            tick: 0,
            heartbeat: 0,
            last: LastCommand::default(),
            last_seen_id: None,
            last_image_timestamp: None,
            write_failures: 0,
        })
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn robot(&self) -> &dyn RobotController {
        self.robot.as_ref()
    }

    pub fn heartbeat(&self) -> u64 {
        self.heartbeat
    }

    /// Drop a command left over from a previous session.
    pub fn discard_stale_command(&self) -> Result<bool> {
        let discarded = self.exchange.discard_pending()?;
        if discarded {
            info!(robot = %self.robot_name, "cleared stale command on startup");
        }
        Ok(discarded)
    }

    pub fn step(&mut self, sim_time: f64) -> TickReport {
        self.tick += 1;
        self.metrics.ticks.inc();
        let mut report = TickReport::default();

        match self.exchange.take_command() {
            None => {}
            Some(Ok(record)) => report.command = self.handle(record, sim_time),
            Some(Err(e)) => {
                self.record_invalid(e);
                report.command = Some(ResultKind::Error);
            }
        }

        if let Some(done) = self.robot.advance(sim_time) {
            self.record_completion(done);
            report.completed = true;
        }

        let due = self.heartbeat == 0 || self.tick % self.status_every_ticks == 0;
        if due || report.command.is_some() || report.completed {
            report.published = self.publish(sim_time);
        }
        report
    }

    fn handle(&mut self, mut record: CommandRecord, now: f64) -> Option<ResultKind> {
        if record.id.is_some() && record.id == self.last_seen_id {
            debug!(id = ?record.id, "command already processed");
            return None;
        }
        let id = *record.id.get_or_insert_with(Uuid::new_v4);
        self.last_seen_id = Some(id);

        let action = record.action;
        let outcome = self.admit(&action, now).unwrap_or_else(|| self.dispatch(id, &action, now));

        match outcome.kind {
            ResultKind::Ok => info!(action = action.name(), %id, result = %outcome.message, "command applied"),
            _ => warn!(action = action.name(), %id, kind = ?outcome.kind, result = %outcome.message, "command not applied"),
        }
        self.metrics.record_result(outcome.kind);
        let kind = outcome.kind;
        self.last = LastCommand {
            name: Some(action.name().to_string()),
            id: Some(id),
            result: Some(outcome.message),
            kind: Some(kind),
        };
        Some(kind)
    }

    /// Refusal for a command that may not run right now, if any.
    fn admit(&self, action: &Action, now: f64) -> Option<CommandOutcome> {
        if !self.robot.supports(action) {
            return Some(CommandOutcome::rejected(format!(
                "{} is not supported by the {} controller",
                action.name(),
                self.robot.kind()
            )));
        }
        if action.is_stop() || action.is_read_only() || self.robot.yields_to_commands() {
            return None;
        }
        self.robot.active(now).map(|active| {
            CommandOutcome::busy(format!(
                "busy: {} in progress ({:.0}%)",
                active.name,
                active.progress * 100.0
            ))
        })
    }

    fn dispatch(&mut self, id: Uuid, action: &Action, now: f64) -> CommandOutcome {
        match action {
            Action::GetCameraImage => self.capture_image(),
            _ => self.robot.apply(Some(id), action, now),
        }
    }

    fn capture_image(&mut self) -> CommandOutcome {
        let Some(frame) = self.robot.capture_image() else {
            return CommandOutcome::error("camera not available");
        };
        match self.exchange.put_image(&frame) {
            Ok(()) => {
                self.last_image_timestamp = Some(unix_now());
                match self.exchange.image_location() {
                    Some(path) => CommandOutcome::ok(format!("image saved to {}", path.display())),
                    None => CommandOutcome::ok("image captured"),
                }
            }
            Err(e) => CommandOutcome::error(format!("saving image failed: {e}")),
        }
    }

    fn record_invalid(&mut self, e: ProtocolError) {
        warn!(error = %e, "invalid command");
        self.metrics.invalid_commands.inc();
        self.metrics.record_result(ResultKind::Error);
        if let Some(id) = e.command_id() {
            self.last_seen_id = Some(id);
        }
        self.last = LastCommand {
            name: e.action().map(str::to_string),
            id: e.command_id(),
            result: Some(e.to_string()),
            kind: Some(ResultKind::Error),
        };
    }

    fn record_completion(&mut self, done: Completion) {
        if done.command_id.is_some() && done.command_id == self.last.id {
            self.last.result = Some(done.message);
            self.last.kind = Some(ResultKind::Ok);
        } else {
            debug!(action = done.name, message = %done.message, "earlier action completed");
        }
    }

    fn build_status(&self, sim_time: f64) -> StatusRecord {
        let active = self.robot.active(sim_time);
        let system = if self.robot.in_emergency() {
            SystemState::Emergency
        } else if active.is_some() {
            SystemState::Busy
        } else {
            SystemState::Ready
        };
        let system_health = if self.write_failures == 0 {
            "ok".to_string()
        } else {
            format!("degraded: {} status write failures", self.write_failures)
        };
        let mut status = StatusRecord {
            timestamp: unix_now(),
            updated_at: rfc3339_now(),
            sim_time,
            heartbeat: self.heartbeat + 1,
            robot: self.robot_name.clone(),
            last_command: self.last.name.clone(),
            last_command_id: self.last.id,
            last_result: self.last.result.clone(),
            result_kind: self.last.kind,
            system,
            webots_connected: true,
            system_health,
            current_action: active,
            last_image_timestamp: self.last_image_timestamp,
            ..StatusRecord::default()
        };
        self.robot.fill_status(&mut status);
        status
    }

    fn publish(&mut self, sim_time: f64) -> bool {
        let status = self.build_status(sim_time);
        self.metrics
            .busy
            .set(i64::from(status.current_action.is_some()));
        match self.exchange.write_status(&status) {
            Ok(()) => {
                self.heartbeat = status.heartbeat;
                self.metrics.status_published.inc();
                true
            }
            Err(e) => {
                self.write_failures += 1;
                self.metrics.status_write_failures.inc();
                warn!(error = %e, failures = self.write_failures, "status write failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drone::DroneController;
    use crate::humanoid::HumanoidController;
    use crate::kinematic::{KinematicDrone, KinematicHumanoid};
    use bridge_protocol::{FlightStatus, MemoryExchange};
    use motion_playback::{parse_motion, MotionLibrary};
    use safety_guard::{FlightEnvelope, MotorLimits};

    const DT: f64 = 0.032;

    fn drone_loop() -> (ControllerLoop<MemoryExchange>, MemoryExchange) {
        let ex = MemoryExchange::new();
        let robot = DroneController::new(KinematicDrone::new(), FlightEnvelope::default());
        let ctl = ControllerLoop::new(ex.clone(), Box::new(robot), "Crazyflie", 1).unwrap();
        (ctl, ex)
    }

    fn humanoid_loop() -> (ControllerLoop<MemoryExchange>, MemoryExchange) {
        let mut motions = MotionLibrary::default();
        motions.insert(
            parse_motion(
                "Wave",
                "#WEBOTS_MOTION,V1.0,RShoulderPitch\n00:00:000,Pose1,-1.0\n00:02:000,Pose2,-1.2\n",
            )
            .unwrap(),
        );
        motions.insert(
            parse_motion("Bow", "#WEBOTS_MOTION,V1.0,HeadPitch\n00:00:000,Pose1,0.3\n00:01:000,Pose2,0.0\n")
                .unwrap(),
        );
        let robot = HumanoidController::new(KinematicHumanoid::nao(), MotorLimits::nao(), motions, 1.0);
        let ex = MemoryExchange::new();
        let ctl = ControllerLoop::new(ex.clone(), Box::new(robot), "NAO", 1).unwrap();
        (ctl, ex)
    }

    fn send(ex: &MemoryExchange, action: Action) -> Uuid {
        let record = CommandRecord::new(action);
        ex.write_command(&record).unwrap();
        record.id.unwrap()
    }

    fn status(ex: &MemoryExchange) -> StatusRecord {
        ex.read_status().unwrap().unwrap()
    }

    fn run(ctl: &mut ControllerLoop<MemoryExchange>, t: &mut f64, ticks: usize) {
        for _ in 0..ticks {
            *t += DT;
            ctl.step(*t);
        }
    }

    #[test]
    fn test_idle_tick_publishes_heartbeat() {
        let (mut ctl, ex) = drone_loop();
        let report = ctl.step(0.0);
        assert!(report.published);
        assert_eq!(report.command, None);
        ctl.step(DT);
        let s = status(&ex);
        assert_eq!(s.heartbeat, 2);
        assert_eq!(s.robot, "Crazyflie");
        assert_eq!(s.system, SystemState::Ready);
        assert!(s.webots_connected);
    }

    #[test]
    fn test_command_is_acknowledged_with_its_id() {
        let (mut ctl, ex) = drone_loop();
        let id = send(&ex, Action::Takeoff { altitude: 1.0 });
        let report = ctl.step(0.0);
        assert_eq!(report.command, Some(ResultKind::Ok));
        let s = status(&ex);
        assert_eq!(s.last_command.as_deref(), Some("takeoff"));
        assert_eq!(s.last_command_id, Some(id));
        assert_eq!(s.system, SystemState::Busy);
        assert!(s.is_running(id));
        assert_eq!(ex.consumed_count(), 1);
    }

    #[test]
    fn test_malformed_and_unknown_commands_do_not_stop_the_loop() {
        let (mut ctl, ex) = drone_loop();
        ex.inject_raw_command("{ this is not json");
        assert_eq!(ctl.step(0.0).command, Some(ResultKind::Error));
        assert_eq!(status(&ex).result_kind, Some(ResultKind::Error));

        let id = Uuid::new_v4();
        ex.inject_raw_command(format!(r#"{{"id":"{id}","action":"backflip"}}"#));
        ctl.step(DT);
        let s = status(&ex);
        assert_eq!(s.last_command_id, Some(id));
        assert_eq!(s.last_command.as_deref(), Some("backflip"));
        assert!(s.last_result.unwrap().contains("unknown action"));

        send(&ex, Action::Status);
        assert_eq!(ctl.step(2.0 * DT).command, Some(ResultKind::Ok));
        assert_eq!(ctl.metrics().invalid_commands.get(), 2);
    }

    #[test]
    fn test_duplicate_id_is_ignored() {
        let (mut ctl, ex) = drone_loop();
        let record = CommandRecord::new(Action::Takeoff { altitude: 1.0 });
        ex.write_command(&record).unwrap();
        ctl.step(0.0);
        ex.write_command(&record).unwrap();
        assert_eq!(ctl.step(DT).command, None);
        assert_eq!(ctl.metrics().count("ok"), 1);
    }

    #[test]
    fn test_rejection_leaves_state_unchanged() {
        let (mut ctl, ex) = drone_loop();
        let mut t = 0.0;
        send(&ex, Action::Takeoff { altitude: 1.0 });
        run(&mut ctl, &mut t, 80);
        let before = status(&ex);

        let id = send(&ex, Action::SetAltitude { altitude: 99.0 });
        run(&mut ctl, &mut t, 1);
        let after = status(&ex);
        assert_eq!(after.last_command_id, Some(id));
        assert_eq!(after.result_kind, Some(ResultKind::Rejected));
        assert_eq!(after.robot_position, before.robot_position);
        assert_eq!(
            after.flight.unwrap().flight_status,
            before.flight.unwrap().flight_status
        );
    }

    #[test]
    fn test_round_trip_takeoff_move_land() {
        let (mut ctl, ex) = drone_loop();
        let mut t = 0.0;

        let takeoff = send(&ex, Action::Takeoff { altitude: 1.0 });
        run(&mut ctl, &mut t, 1);
        assert_eq!(status(&ex).last_command.as_deref(), Some("takeoff"));
        run(&mut ctl, &mut t, 80);
        let s = status(&ex);
        assert!(!s.is_running(takeoff));
        let x0 = s.robot_position.x;

        send(
            &ex,
            Action::MoveRelative {
                x: 1.0,
                y: 0.0,
                z: 0.0,
                yaw: 0.0,
                duration: 2.0,
            },
        );
        run(&mut ctl, &mut t, 80);
        let s = status(&ex);
        assert_eq!(s.last_command.as_deref(), Some("move_relative"));
        assert!((s.robot_position.x - (x0 + 1.0)).abs() < 1e-9);

        send(&ex, Action::Land);
        run(&mut ctl, &mut t, 80);
        let s = status(&ex);
        assert_eq!(s.flight.unwrap().flight_status, FlightStatus::Grounded);
        assert_eq!(s.result_kind, Some(ResultKind::Ok));
        assert_eq!(s.last_result.as_deref(), Some("landed"));
    }

    #[test]
    fn test_timed_hover_gives_way_to_next_command() {
        let (mut ctl, ex) = drone_loop();
        let mut t = 0.0;
        send(&ex, Action::Takeoff { altitude: 1.0 });
        run(&mut ctl, &mut t, 80);

        let hover = send(&ex, Action::Hover { duration: 300.0 });
        run(&mut ctl, &mut t, 1);
        assert!(status(&ex).is_running(hover));

        let land = send(&ex, Action::Land);
        run(&mut ctl, &mut t, 1);
        let s = status(&ex);
        assert_eq!(s.result_kind, Some(ResultKind::Ok));
        assert!(s.is_running(land));
        assert!(!s.is_running(hover));
        assert_eq!(s.flight.unwrap().flight_status, FlightStatus::Landing);
        assert_eq!(ctl.metrics().count("busy"), 0);
    }

    #[test]
    fn test_busy_while_motion_plays() {
        let (mut ctl, ex) = humanoid_loop();
        let mut t = 0.0;
        let wave = send(&ex, Action::PlayMotion { motion_name: "Wave".into() });
        run(&mut ctl, &mut t, 1);
        assert!(status(&ex).is_running(wave));

        let bow = send(&ex, Action::PlayMotion { motion_name: "Bow".into() });
        run(&mut ctl, &mut t, 1);
        let s = status(&ex);
        assert_eq!(s.last_command_id, Some(bow));
        assert_eq!(s.result_kind, Some(ResultKind::Busy));
        assert!(s.is_running(wave));
        assert_eq!(s.humanoid.unwrap().current_motion.as_deref(), Some("Wave"));
        assert_eq!(ctl.metrics().count("busy"), 1);

        send(&ex, Action::Status);
        run(&mut ctl, &mut t, 1);
        assert_eq!(status(&ex).result_kind, Some(ResultKind::Ok));
    }

    #[test]
    fn test_stop_overrides_motion_immediately() {
        let (mut ctl, ex) = humanoid_loop();
        let mut t = 0.0;
        send(&ex, Action::PlayMotion { motion_name: "Wave".into() });
        run(&mut ctl, &mut t, 10);

        let stop = send(&ex, Action::EmergencyStop);
        run(&mut ctl, &mut t, 1);
        let s = status(&ex);
        assert_eq!(s.last_command_id, Some(stop));
        assert_eq!(s.result_kind, Some(ResultKind::Ok));
        assert_eq!(s.system, SystemState::Emergency);
        assert!(s.current_action.is_none());
        assert!(s.humanoid.unwrap().current_motion.is_none());
    }

    #[test]
    fn test_stop_overrides_drone_move() {
        let (mut ctl, ex) = drone_loop();
        let mut t = 0.0;
        send(&ex, Action::Takeoff { altitude: 2.0 });
        run(&mut ctl, &mut t, 20);
        send(&ex, Action::EmergencyStop);
        run(&mut ctl, &mut t, 1);
        let s = status(&ex);
        assert_eq!(s.system, SystemState::Emergency);
        assert_eq!(s.flight.unwrap().flight_status, FlightStatus::Emergency);
        assert_eq!(s.robot_position.z, 0.0);
    }

    #[test]
    fn test_unsupported_action_is_rejected() {
        let (mut ctl, ex) = drone_loop();
        send(&ex, Action::SetLeds { color: 0xFF });
        assert_eq!(ctl.step(0.0).command, Some(ResultKind::Rejected));
        assert!(status(&ex)
            .last_result
            .unwrap()
            .contains("not supported by the drone controller"));
    }

    #[test]
    fn test_camera_image_is_stored() {
        let (mut ctl, ex) = drone_loop();
        send(&ex, Action::GetCameraImage);
        ctl.step(0.0);
        let s = status(&ex);
        assert_eq!(s.result_kind, Some(ResultKind::Ok));
        assert!(s.last_image_timestamp.is_some());
        assert_eq!(ex.image().unwrap(), crate::kinematic::PLACEHOLDER_JPEG.to_vec());
    }

    #[test]
    fn test_write_failures_are_counted_not_fatal() {
        let (mut ctl, ex) = drone_loop();
        ex.set_fail_writes(true);
        assert!(!ctl.step(0.0).published);
        ex.set_fail_writes(false);
        assert!(ctl.step(DT).published);
        let s = status(&ex);
        assert_eq!(s.heartbeat, 1);
        assert!(s.system_health.starts_with("degraded"));
        assert_eq!(ctl.metrics().status_write_failures.get(), 1);
    }

    #[test]
    fn test_status_stride() {
        let ex = MemoryExchange::new();
        let robot = DroneController::new(KinematicDrone::new(), FlightEnvelope::default());
        let mut ctl = ControllerLoop::new(ex.clone(), Box::new(robot), "Crazyflie", 5).unwrap();
        let published: Vec<bool> = (0..10).map(|i| ctl.step(i as f64 * DT).published).collect();
        assert_eq!(published.iter().filter(|p| **p).count(), 3);
        send(&ex, Action::Status);
        assert!(ctl.step(1.0).published);
    }
}
