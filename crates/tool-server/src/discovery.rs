use anyhow::Context;
use bridge_protocol::{Exchange, FileExchange, FlightStatus, SystemState, Vec3};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// A robot whose controller published status recently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveRobot {
    pub name: String,
    pub position: Vec3,
    pub system: SystemState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_status: Option<FlightStatus>,
    pub last_update: f64,
    pub time_since_update: f64,
}

/// Scan `data_root` for per-robot exchange directories updated within
/// `window_secs` of `now`. A missing data root means no robots.
pub fn list_active_robots(
    data_root: &Path,
    window_secs: f64,
    now: f64,
) -> anyhow::Result<Vec<ActiveRobot>> {
    if !data_root.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(data_root)
        .with_context(|| format!("reading data root: {}", data_root.display()))?;

    let mut robots = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let status = match FileExchange::new(&path).read_status() {
            Ok(Some(status)) => status,
            Ok(None) => continue,
            Err(e) => {
                debug!(robot = %name, error = %e, "skipping unreadable status");
                continue;
            }
        };
        let age = status.age(now);
        if age < window_secs {
            robots.push(ActiveRobot {
                name,
                position: status.robot_position,
                system: status.system,
                flight_status: status.flight.map(|f| f.flight_status),
                last_update: status.timestamp,
                time_since_update: age,
            });
        }
    }
    robots.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(robots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_protocol::{unix_now, StatusRecord};

    fn publish(root: &Path, name: &str, timestamp: f64) {
        let status = StatusRecord {
            timestamp,
            robot: name.to_string(),
            ..StatusRecord::default()
        };
        FileExchange::for_robot(root, name).write_status(&status).unwrap();
    }

    #[test]
    fn test_only_recent_robots_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let now = unix_now();
        publish(dir.path(), "Crazyflie", now - 1.0);
        publish(dir.path(), "Crazyflie2", now - 120.0);
        publish(dir.path(), "NAO", now - 5.0);
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        let robots = list_active_robots(dir.path(), 30.0, now).unwrap();
        let names: Vec<_> = robots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Crazyflie", "NAO"]);
        assert!((robots[1].time_since_update - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_root_is_empty() {
        let robots = list_active_robots(Path::new("/no/such/data/root"), 30.0, 0.0).unwrap();
        assert!(robots.is_empty());
    }
}
