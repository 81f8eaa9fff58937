use anyhow::Context;
use safety_guard::{FlightEnvelope, LimitPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotKind {
    #[default]
    Drone,
    Humanoid,
}

impl RobotKind {
    pub fn default_name(&self) -> &'static str {
        match self {
            RobotKind::Drone => "Crazyflie",
            RobotKind::Humanoid => "NAO",
        }
    }
}

impl std::str::FromStr for RobotKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drone" | "crazyflie" => Ok(RobotKind::Drone),
            "humanoid" | "nao" => Ok(RobotKind::Humanoid),
            other => Err(format!("unknown robot kind: {other}")),
        }
    }
}

fn default_robot_name() -> String {
    RobotKind::Drone.default_name().to_string()
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_timestep_ms() -> u64 {
    32
}

fn default_status_every_ticks() -> u64 {
    1
}

fn default_transition_secs() -> f64 {
    motion_playback::DEFAULT_TRANSITION_SECS
}

/// Controller settings, loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub robot_kind: RobotKind,
    #[serde(default = "default_robot_name")]
    pub robot_name: String,
    /// Parent of the per-robot exchange directories.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default = "default_timestep_ms")]
    pub timestep_ms: u64,
    /// Publish status at least every N ticks; commands always publish.
    #[serde(default = "default_status_every_ticks")]
    pub status_every_ticks: u64,
    #[serde(default)]
    pub limit_policy: LimitPolicy,
    #[serde(default)]
    pub motions_dir: Option<PathBuf>,
    #[serde(default)]
    pub motor_limits_file: Option<PathBuf>,
    #[serde(default = "default_transition_secs")]
    pub transition_secs: f64,
    #[serde(default)]
    pub flight: FlightEnvelope,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            robot_kind: RobotKind::default(),
            robot_name: default_robot_name(),
            data_root: default_data_root(),
            timestep_ms: default_timestep_ms(),
            status_every_ticks: default_status_every_ticks(),
            limit_policy: LimitPolicy::default(),
            motions_dir: None,
            motor_limits_file: None,
            transition_secs: default_transition_secs(),
            flight: FlightEnvelope::default(),
        }
    }
}

impl ControllerConfig {
    pub fn for_kind(kind: RobotKind) -> Self {
        Self {
            robot_kind: kind,
            robot_name: kind.default_name().to_string(),
            ..Self::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading controller config: {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing controller config: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.robot_name.trim().is_empty() {
            anyhow::bail!("robot_name must not be empty");
        }
        if self.timestep_ms == 0 {
            anyhow::bail!("timestep_ms must be positive");
        }
        if self.status_every_ticks == 0 {
            anyhow::bail!("status_every_ticks must be positive");
        }
        Ok(())
    }

    pub fn exchange_dir(&self) -> PathBuf {
        self.data_root.join(&self.robot_name)
    }

    pub fn timestep(&self) -> Duration {
        Duration::from_millis(self.timestep_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_crazyflie_setup() {
        let cfg = ControllerConfig::default();
        assert_eq!(cfg.robot_name, "Crazyflie");
        assert_eq!(cfg.exchange_dir(), PathBuf::from("data/Crazyflie"));
        assert_eq!(cfg.timestep(), Duration::from_millis(32));
        assert_eq!(cfg.limit_policy, LimitPolicy::Reject);
    }

    #[test]
    fn test_loads_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.yaml");
        std::fs::write(
            &path,
            "robot_kind: humanoid\nrobot_name: NAO\nlimit_policy: clamp\nflight:\n  max_motor_velocity: 300\n",
        )
        .unwrap();
        let cfg = ControllerConfig::load(&path).unwrap();
        assert_eq!(cfg.robot_kind, RobotKind::Humanoid);
        assert_eq!(cfg.limit_policy, LimitPolicy::Clamp);
        assert_eq!(cfg.flight.max_motor_velocity, 300.0);
        assert_eq!(cfg.flight.altitude.max, 10.0);
        assert_eq!(cfg.timestep_ms, 32);
    }

    #[test]
    fn test_rejects_zero_timestep() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "timestep_ms: 0\n").unwrap();
        assert!(ControllerConfig::load(&path).is_err());
    }

    #[test]
    fn test_robot_kind_from_str() {
        assert_eq!("NAO".parse::<RobotKind>().unwrap(), RobotKind::Humanoid);
        assert!("boat".parse::<RobotKind>().is_err());
    }
}
