//! Motor position limits for the NAO humanoid.

use crate::{LimitCheck, LimitPolicy, LimitRange, PoseAdjustment, SafetyError};
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// NAO position ranges in radians.
pub const NAO_MOTORS: [(&str, f64, f64); 24] = [
    ("HeadYaw", -2.0857, 2.0857),
    ("HeadPitch", -0.6720, 0.5149),
    ("LShoulderPitch", -2.0857, 2.0857),
    ("RShoulderPitch", -2.0857, 2.0857),
    ("LShoulderRoll", -0.3142, 1.3265),
    ("RShoulderRoll", -1.3265, 0.3142),
    ("LElbowYaw", -2.0857, 2.0857),
    ("RElbowYaw", -2.0857, 2.0857),
    ("LElbowRoll", -1.5446, -0.0349),
    ("RElbowRoll", 0.0349, 1.5446),
    ("LWristYaw", -1.8238, 1.8238),
    ("RWristYaw", -1.8238, 1.8238),
    ("LHipYawPitch", -1.145303, 0.740810),
    ("RHipYawPitch", -1.145303, 0.740810),
    ("LHipRoll", -0.379472, 0.790477),
    ("RHipRoll", -0.790477, 0.379472),
    ("LHipPitch", -1.773912, 0.484090),
    ("RHipPitch", -1.773912, 0.484090),
    ("LKneePitch", -0.092346, 2.112528),
    ("RKneePitch", -0.092346, 2.112528),
    ("LAnklePitch", -1.189516, 0.922747),
    ("RAnklePitch", -1.189516, 0.922747),
    ("LAnkleRoll", -0.397880, 0.769001),
    ("RAnkleRoll", -0.769001, 0.397880),
];

/// Standing pose applied at start-up and by `reset_pose`. Motors not listed
/// rest at 0.0.
pub const NAO_INITIAL_POSE: [(&str, f64); 2] = [("LElbowRoll", -0.5), ("RElbowRoll", 0.5)];

#[derive(Debug, Deserialize)]
struct LimitsFile {
    motors: BTreeMap<String, LimitRange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotorLimits {
    limits: BTreeMap<String, LimitRange>,
    policy: LimitPolicy,
}

impl MotorLimits {
    pub fn nao() -> Self {
        let limits = NAO_MOTORS
            .iter()
            .map(|(name, min, max)| ((*name).to_string(), LimitRange::new(*min, *max)))
            .collect();
        Self {
            limits,
            policy: LimitPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> LimitPolicy {
        self.policy
    }

    /// Merge ranges from a YAML file of the form `motors: {Name: {min, max}}`.
    /// Listed motors replace or extend the current table.
    pub fn merge_file(&mut self, path: &Path) -> anyhow::Result<usize> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading motor limits {}", path.display()))?;
        let file: LimitsFile = serde_yaml::from_str(&text)
            .with_context(|| format!("parsing motor limits {}", path.display()))?;
        for (name, range) in &file.motors {
            if range.min > range.max {
                anyhow::bail!("motor {name}: min {} exceeds max {}", range.min, range.max);
            }
        }
        let count = file.motors.len();
        self.limits.extend(file.motors);
        debug!(count, path = %path.display(), "merged motor limits");
        Ok(count)
    }

    pub fn range(&self, motor: &str) -> Option<LimitRange> {
        self.limits.get(motor).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.limits.keys().map(String::as_str)
    }

    pub fn table(&self) -> &BTreeMap<String, LimitRange> {
        &self.limits
    }

    /// Check one target position under the configured policy.
    pub fn check(&self, motor: &str, position: f64) -> LimitCheck {
        self.check_with(motor, position, self.policy)
    }

    /// Check one target position, choosing the policy explicitly.
    pub fn check_with(&self, motor: &str, position: f64, policy: LimitPolicy) -> LimitCheck {
        let Some(range) = self.range(motor) else {
            return LimitCheck::Rejected(SafetyError::UnknownMotor(motor.to_string()));
        };
        if !position.is_finite() {
            return LimitCheck::Rejected(SafetyError::NotFinite {
                field: motor.to_string(),
            });
        }
        if range.contains(position) {
            return LimitCheck::Within(position);
        }

        let outside = format!(
            "Motor position {motor} ({position:.3} rad = {:.1}°) is outside the limits [{:.3}, {:.3}] rad [{:.1}°, {:.1}°]",
            position.to_degrees(),
            range.min,
            range.max,
            range.min.to_degrees(),
            range.max.to_degrees(),
        );
        match policy {
            LimitPolicy::Reject => LimitCheck::Rejected(SafetyError::OutOfLimits(outside)),
            LimitPolicy::Clamp => {
                let applied = range.clamp(position);
                LimitCheck::Clamped {
                    requested: position,
                    applied,
                    message: format!(
                        "{outside}. Clamped to {applied:.3} rad ({:.1}°)",
                        applied.to_degrees()
                    ),
                }
            }
        }
    }

    /// Check every target of a multi-joint command. Either all targets are
    /// admissible (possibly after clamping) or the whole pose is refused.
    pub fn check_pose<'a, I>(&self, targets: I) -> Result<PoseAdjustment, SafetyError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut adjusted = PoseAdjustment::default();
        let mut errors = Vec::new();
        for (motor, position) in targets {
            match self.check(motor, position) {
                LimitCheck::Within(v) => adjusted.positions.push((motor.to_string(), v)),
                LimitCheck::Clamped {
                    applied, message, ..
                } => {
                    adjusted.positions.push((motor.to_string(), applied));
                    adjusted.warnings.push(message);
                }
                LimitCheck::Rejected(e) => errors.push(e),
            }
        }
        if let Some(err) = SafetyError::combine(errors) {
            warn!(%err, "pose refused");
            return Err(err);
        }
        Ok(adjusted)
    }

    /// The start-up pose for every motor in the table.
    pub fn initial_pose(&self) -> Vec<(String, f64)> {
        self.limits
            .iter()
            .map(|(name, range)| {
                let rest = NAO_INITIAL_POSE
                    .iter()
                    .find(|(m, _)| *m == name.as_str())
                    .map_or(0.0, |(_, v)| *v);
                (name.clone(), range.clamp(rest))
            })
            .collect()
    }
}

impl Default for MotorLimits {
    fn default() -> Self {
        Self::nao()
    }
}
