use crate::SafetyError;
use serde::{Deserialize, Serialize};

/// What to do with a value outside its admissible range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPolicy {
    /// Refuse the command and leave the device untouched.
    #[default]
    Reject,
    /// Apply the nearest admissible value and report a warning.
    Clamp,
}

/// Outcome of checking a single value against its range.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    Within(f64),
    Clamped {
        requested: f64,
        applied: f64,
        message: String,
    },
    Rejected(SafetyError),
}

impl LimitCheck {
    /// The value to apply, unless the check rejected it.
    pub fn applied(&self) -> Option<f64> {
        match self {
            LimitCheck::Within(v) => Some(*v),
            LimitCheck::Clamped { applied, .. } => Some(*applied),
            LimitCheck::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, LimitCheck::Rejected(_))
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            LimitCheck::Clamped { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<(f64, Option<String>), SafetyError> {
        match self {
            LimitCheck::Within(v) => Ok((v, None)),
            LimitCheck::Clamped {
                applied, message, ..
            } => Ok((applied, Some(message))),
            LimitCheck::Rejected(e) => Err(e),
        }
    }
}

/// Admissible targets for a multi-joint command, plus any clamp warnings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PoseAdjustment {
    pub positions: Vec<(String, f64)>,
    pub warnings: Vec<String>,
}

impl PoseAdjustment {
    pub fn get(&self, motor: &str) -> Option<f64> {
        self.positions
            .iter()
            .find(|(name, _)| name == motor)
            .map(|(_, v)| *v)
    }
}

/// Watchdog status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchdogStatus {
    pub name: String,
    pub healthy: bool,
    /// Seconds since the watched source last showed progress, if ever.
    pub age_secs: Option<f64>,
    pub last_error: Option<String>,
    pub timeout_secs: f64,
    pub consecutive_failures: u32,
}
