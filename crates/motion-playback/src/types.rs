use serde::Serialize;
use std::collections::BTreeMap;

/// Target position per motor name, radians.
pub type Pose = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Seconds from the start of the motion.
    pub time: f64,
    pub pose_name: String,
    /// One entry per motor; `None` keeps the motor's previous target.
    pub positions: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Motion {
    pub name: String,
    pub motors: Vec<String>,
    pub frames: Vec<Frame>,
}

impl Motion {
    /// Time of the last keyframe.
    pub fn duration(&self) -> f64 {
        self.frames.last().map_or(0.0, |f| f.time)
    }

    /// Value of motor `m` at frame `i`, carrying earlier values over `*` cells.
    fn resolved(&self, i: usize, m: usize) -> Option<f64> {
        self.frames[..=i]
            .iter()
            .rev()
            .find_map(|f| f.positions.get(m).copied().flatten())
    }

    fn pose_of_frame(&self, i: usize) -> Pose {
        self.motors
            .iter()
            .enumerate()
            .filter_map(|(m, name)| self.resolved(i, m).map(|v| (name.clone(), v)))
            .collect()
    }

    pub fn first_pose(&self) -> Pose {
        if self.frames.is_empty() {
            return Pose::new();
        }
        self.pose_of_frame(0)
    }

    /// Pose at `t` seconds into the motion, linearly interpolated between the
    /// surrounding keyframes and held at either end.
    pub fn pose_at(&self, t: f64) -> Pose {
        let Some(last) = self.frames.len().checked_sub(1) else {
            return Pose::new();
        };
        if t <= self.frames[0].time {
            return self.pose_of_frame(0);
        }
        if t >= self.frames[last].time {
            return self.pose_of_frame(last);
        }

        let next = self.frames.partition_point(|f| f.time <= t);
        let prev = next - 1;
        let (t0, t1) = (self.frames[prev].time, self.frames[next].time);
        let ratio = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };

        self.motors
            .iter()
            .enumerate()
            .filter_map(|(m, name)| {
                let a = self.resolved(prev, m)?;
                let b = self.resolved(next, m).unwrap_or(a);
                Some((name.clone(), a + (b - a) * ratio))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motion() -> Motion {
        Motion {
            name: "Nod".into(),
            motors: vec!["HeadPitch".into(), "HeadYaw".into()],
            frames: vec![
                Frame {
                    time: 0.0,
                    pose_name: "Pose1".into(),
                    positions: vec![Some(0.0), None],
                },
                Frame {
                    time: 1.0,
                    pose_name: "Pose2".into(),
                    positions: vec![Some(0.4), Some(0.2)],
                },
                Frame {
                    time: 2.0,
                    pose_name: "Pose3".into(),
                    positions: vec![None, Some(-0.2)],
                },
            ],
        }
    }

    #[test]
    fn test_duration_is_last_frame_time() {
        assert_eq!(motion().duration(), 2.0);
    }

    #[test]
    fn test_first_pose_skips_undriven_motors() {
        let pose = motion().first_pose();
        assert_eq!(pose.get("HeadPitch"), Some(&0.0));
        assert!(!pose.contains_key("HeadYaw"));
    }

    #[test]
    fn test_interpolates_between_frames() {
        let m = motion();
        let mid = m.pose_at(0.5);
        assert!((mid["HeadPitch"] - 0.2).abs() < 1e-9);
        assert!(!mid.contains_key("HeadYaw"));

        let later = m.pose_at(1.5);
        assert!((later["HeadPitch"] - 0.4).abs() < 1e-9);
        assert!(later["HeadYaw"].abs() < 1e-9);
    }

    #[test]
    fn test_holds_last_pose_after_end() {
        let end = motion().pose_at(10.0);
        assert_eq!(end["HeadPitch"], 0.4);
        assert_eq!(end["HeadYaw"], -0.2);
    }
}
