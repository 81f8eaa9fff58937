use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_robot_name() -> String {
    "Crazyflie".to_string()
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_attempts() -> u32 {
    50
}

fn default_stale_after_secs() -> f64 {
    10.0
}

fn default_active_window_secs() -> f64 {
    30.0
}

/// Tool server settings, loaded from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    #[serde(default = "default_robot_name")]
    pub robot_name: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Status re-reads per call before giving up, not counting the allowance
    /// for the action's own duration.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// A controller whose status is older than this counts as disconnected.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: f64,
    /// Window used when scanning the data root for running robots.
    #[serde(default = "default_active_window_secs")]
    pub active_window_secs: f64,
    #[serde(default)]
    pub motions_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            robot_name: default_robot_name(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            stale_after_secs: default_stale_after_secs(),
            active_window_secs: default_active_window_secs(),
            motions_dir: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading server config: {}", path.display()))?;
        let cfg: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("parsing server config: {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.robot_name.trim().is_empty() {
            anyhow::bail!("robot_name must not be empty");
        }
        if self.poll_interval_ms == 0 {
            anyhow::bail!("poll_interval_ms must be positive");
        }
        if self.max_attempts == 0 {
            anyhow::bail!("max_attempts must be positive");
        }
        if self.stale_after_secs.is_nan() || self.stale_after_secs <= 0.0 {
            anyhow::bail!("stale_after_secs must be positive");
        }
        Ok(())
    }

    pub fn exchange_dir(&self) -> PathBuf {
        self.data_root.join(&self.robot_name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        assert_eq!(cfg.max_attempts, 50);
        assert_eq!(cfg.exchange_dir(), PathBuf::from("data/Crazyflie"));
    }

    #[test]
    fn test_load_overrides_some_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.yaml");
        std::fs::write(&path, "robot_name: NAO\npoll_interval_ms: 20\nmotions_dir: motions\n").unwrap();
        let cfg = ServerConfig::load(&path).unwrap();
        assert_eq!(cfg.robot_name, "NAO");
        assert_eq!(cfg.poll_interval_ms, 20);
        assert_eq!(cfg.max_attempts, 50);
        assert_eq!(cfg.motions_dir, Some(PathBuf::from("motions")));
    }

    #[test]
    fn test_zero_attempts_is_invalid() {
        let cfg = ServerConfig {
            max_attempts: 0,
            ..ServerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
