//! Flight envelope for quadcopters.

use crate::{LimitCheck, LimitPolicy, LimitRange, SafetyError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightEnvelope {
    /// Absolute altitude, metres.
    pub altitude: LimitRange,
    /// Per-command relative displacement, metres.
    pub forward: LimitRange,
    pub sideways: LimitRange,
    pub vertical: LimitRange,
    /// Per-command heading change, radians.
    pub yaw: LimitRange,
    pub move_duration: LimitRange,
    pub hover_duration: LimitRange,
    pub max_motor_velocity: f64,
    pub policy: LimitPolicy,
}

impl Default for FlightEnvelope {
    fn default() -> Self {
        Self {
            altitude: LimitRange::new(0.1, 10.0),
            forward: LimitRange::new(-5.0, 5.0),
            sideways: LimitRange::new(-5.0, 5.0),
            vertical: LimitRange::new(-3.0, 3.0),
            yaw: LimitRange::new(-PI, PI),
            move_duration: LimitRange::new(0.5, 30.0),
            hover_duration: LimitRange::new(0.0, 300.0),
            max_motor_velocity: 500.0,
            policy: LimitPolicy::Reject,
        }
    }
}

/// An admissible relative move, after any clamping.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveTarget {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub dyaw: f64,
    pub duration: f64,
    pub warnings: Vec<String>,
}

impl FlightEnvelope {
    pub fn with_policy(mut self, policy: LimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn check(&self, field: &str, unit: &str, range: LimitRange, value: f64) -> LimitCheck {
        if !value.is_finite() {
            return LimitCheck::Rejected(SafetyError::NotFinite {
                field: field.to_string(),
            });
        }
        if range.contains(value) {
            return LimitCheck::Within(value);
        }
        let outside = format!(
            "{field} {value:.3} {unit} is outside the limits [{:.3}, {:.3}] {unit}",
            range.min, range.max
        );
        match self.policy {
            LimitPolicy::Reject => LimitCheck::Rejected(SafetyError::OutOfLimits(outside)),
            LimitPolicy::Clamp => {
                let applied = range.clamp(value);
                LimitCheck::Clamped {
                    requested: value,
                    applied,
                    message: format!("{outside}. Clamped to {applied:.3} {unit}"),
                }
            }
        }
    }

    pub fn check_altitude(&self, altitude: f64) -> LimitCheck {
        self.check("altitude", "m", self.altitude, altitude)
    }

    pub fn check_hover(&self, duration: f64) -> LimitCheck {
        self.check("hover duration", "s", self.hover_duration, duration)
    }

    /// Validate a relative move from `current_altitude`. The altitude reached
    /// at the end of the move must itself lie inside the envelope.
    pub fn check_move(
        &self,
        dx: f64,
        dy: f64,
        dz: f64,
        dyaw: f64,
        duration: f64,
        current_altitude: f64,
    ) -> Result<MoveTarget, SafetyError> {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let mut take = |check: LimitCheck| match check.into_result() {
            Ok((v, warning)) => {
                warnings.extend(warning);
                v
            }
            Err(e) => {
                errors.push(e);
                0.0
            }
        };

        let dx = take(self.check("forward", "m", self.forward, dx));
        let dy = take(self.check("sideways", "m", self.sideways, dy));
        let mut dz = take(self.check("up", "m", self.vertical, dz));
        let dyaw = take(self.check("yaw", "rad", self.yaw, dyaw));
        let duration = take(self.check("duration", "s", self.move_duration, duration));
        let target = take(self.check(
            "target altitude",
            "m",
            self.altitude,
            current_altitude + dz,
        ));
        if (target - (current_altitude + dz)).abs() > f64::EPSILON {
            dz = target - current_altitude;
        }

        if let Some(err) = SafetyError::combine(errors) {
            return Err(err);
        }
        Ok(MoveTarget {
            dx,
            dy,
            dz,
            dyaw,
            duration,
            warnings,
        })
    }

    pub fn clamp_motor_velocity(&self, velocity: f64) -> f64 {
        velocity.clamp(-self.max_motor_velocity, self.max_motor_velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_altitude_bounds() {
        let env = FlightEnvelope::default();
        assert_eq!(env.check_altitude(1.0), LimitCheck::Within(1.0));
        assert!(env.check_altitude(12.0).is_rejected());
        assert!(env.check_altitude(0.0).is_rejected());
        assert!(env.check_altitude(f64::INFINITY).is_rejected());
    }

    #[test]
    fn test_move_within_envelope() {
        let env = FlightEnvelope::default();
        let mv = env.check_move(1.0, 0.0, 0.0, 0.0, 2.0, 1.0).unwrap();
        assert_eq!(mv.dx, 1.0);
        assert_eq!(mv.dz, 0.0);
        assert!(mv.warnings.is_empty());
    }

    #[test]
    fn test_move_rejects_every_offending_axis() {
        let env = FlightEnvelope::default();
        let err = env.check_move(6.0, 0.0, 0.0, 4.0, 2.0, 1.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("forward 6.000 m"));
        assert!(msg.contains("yaw 4.000 rad"));
    }

    #[test]
    fn test_move_cannot_leave_altitude_band() {
        let env = FlightEnvelope::default();
        assert!(env.check_move(0.0, 0.0, -1.0, 0.0, 2.0, 0.5).is_err());

        let clamp = FlightEnvelope::default().with_policy(LimitPolicy::Clamp);
        let mv = clamp.check_move(0.0, 0.0, 2.5, 0.0, 2.0, 9.0).unwrap();
        assert!((mv.dz - 1.0).abs() < 1e-9);
        assert_eq!(mv.warnings.len(), 1);
    }

    #[test]
    fn test_clamp_policy_clamps_axes() {
        let env = FlightEnvelope::default().with_policy(LimitPolicy::Clamp);
        let mv = env.check_move(8.0, -8.0, 0.0, 0.0, 60.0, 1.0).unwrap();
        assert_eq!(mv.dx, 5.0);
        assert_eq!(mv.dy, -5.0);
        assert_eq!(mv.duration, 30.0);
        assert_eq!(mv.warnings.len(), 3);
    }

    #[test]
    fn test_motor_velocity_cap() {
        let env = FlightEnvelope::default();
        assert_eq!(env.clamp_motor_velocity(900.0), 500.0);
        assert_eq!(env.clamp_motor_velocity(-900.0), -500.0);
        assert_eq!(env.clamp_motor_velocity(42.0), 42.0);
    }
}
