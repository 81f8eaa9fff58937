//! Ideal-tracking bodies standing in for the simulator.

use crate::traits::{DroneBody, HumanoidBody};
use bridge_protocol::{Orientation, Vec3, COLLISION_SENSORS};
use safety_guard::NAO_MOTORS;
use std::collections::BTreeMap;

/// Smallest valid JPEG stream (SOI + EOI), returned by the mock cameras.
pub const PLACEHOLDER_JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xD9];

/// Range reported when nothing is in sight.
pub const NO_OBSTACLE_M: f64 = 999.0;

/// Drone that reaches every setpoint instantly. Cutting the motors drops it to
/// the ground where it is.
#[derive(Debug, Clone)]
pub struct KinematicDrone {
    position: Vec3,
    yaw: f64,
    motor_velocity: f64,
    ranges: BTreeMap<String, f64>,
    has_camera: bool,
}

impl Default for KinematicDrone {
    fn default() -> Self {
        Self {
            position: Vec3::default(),
            yaw: 0.0,
            motor_velocity: 0.0,
            ranges: COLLISION_SENSORS
                .iter()
                .map(|s| ((*s).to_string(), NO_OBSTACLE_M))
                .collect(),
            has_camera: true,
        }
    }
}

impl KinematicDrone {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_camera(mut self) -> Self {
        self.has_camera = false;
        self
    }

    pub fn set_range(&mut self, sensor: &str, metres: f64) {
        self.ranges.insert(sensor.to_string(), metres);
    }

    pub fn motor_velocity(&self) -> f64 {
        self.motor_velocity
    }
}

impl DroneBody for KinematicDrone {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn orientation(&self) -> Orientation {
        Orientation {
            roll: 0.0,
            pitch: 0.0,
            yaw: self.yaw,
        }
    }

    fn range_readings(&self) -> BTreeMap<String, f64> {
        self.ranges.clone()
    }

    fn set_setpoint(&mut self, position: Vec3, yaw: f64) {
        self.position = position;
        self.yaw = yaw;
    }

    fn set_motor_velocity(&mut self, velocity: f64) {
        self.motor_velocity = velocity;
    }

    fn cut_motors(&mut self) {
        self.motor_velocity = 0.0;
        self.position.z = 0.0;
    }

    fn capture_image(&mut self) -> Option<Vec<u8>> {
        self.has_camera.then(|| PLACEHOLDER_JPEG.to_vec())
    }
}

/// Humanoid whose motors sit exactly at their last target.
#[derive(Debug, Clone)]
pub struct KinematicHumanoid {
    targets: BTreeMap<String, f64>,
    led_color: u32,
    position: Vec3,
}

impl KinematicHumanoid {
    /// A NAO with every motor at zero.
    pub fn nao() -> Self {
        Self {
            targets: NAO_MOTORS
                .iter()
                .map(|(name, _, _)| ((*name).to_string(), 0.0))
                .collect(),
            led_color: 0,
            position: Vec3::new(0.0, 0.0, 0.33),
        }
    }

    pub fn led_color(&self) -> u32 {
        self.led_color
    }
}

impl HumanoidBody for KinematicHumanoid {
    fn set_motor_position(&mut self, motor: &str, position: f64) -> bool {
        match self.targets.get_mut(motor) {
            Some(target) => {
                *target = position;
                true
            }
            None => false,
        }
    }

    fn motor_target(&self, motor: &str) -> Option<f64> {
        self.targets.get(motor).copied()
    }

    fn set_led_color(&mut self, rgb: u32) {
        self.led_color = rgb;
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn capture_image(&mut self) -> Option<Vec<u8>> {
        Some(PLACEHOLDER_JPEG.to_vec())
    }
}
