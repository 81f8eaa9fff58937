use crate::{Motion, Pose};
use tracing::debug;

pub const DEFAULT_TRANSITION_SECS: f64 = 1.0;

/// One playback of a motion, driven by simulation time.
///
/// Playback starts with a linear blend from the robot's current pose to the
/// motion's first pose, then follows the keyframes. Nothing here blocks: the
/// controller calls [`MotionPlayer::sample`] once per tick and applies the result.
#[derive(Debug, Clone)]
pub struct MotionPlayer {
    motion: Motion,
    from: Pose,
    started_at: f64,
    transition: f64,
}

impl MotionPlayer {
    pub fn start(motion: Motion, current: Pose, now: f64, transition: f64) -> Self {
        let transition = transition.max(0.0);
        debug!(motion = %motion.name, duration = motion.duration(), transition, "motion started");
        Self {
            motion,
            from: current,
            started_at: now,
            transition,
        }
    }

    pub fn name(&self) -> &str {
        &self.motion.name
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Transition plus keyframe time.
    pub fn total_duration(&self) -> f64 {
        self.transition + self.motion.duration()
    }

    fn elapsed(&self, now: f64) -> f64 {
        (now - self.started_at).max(0.0)
    }

    /// Pose to command at `now`.
    pub fn sample(&self, now: f64) -> Pose {
        let elapsed = self.elapsed(now);
        if elapsed < self.transition {
            let ratio = elapsed / self.transition;
            return self
                .motion
                .first_pose()
                .into_iter()
                .map(|(name, target)| {
                    let start = self.from.get(&name).copied().unwrap_or(0.0);
                    (name, start + (target - start) * ratio)
                })
                .collect();
        }
        self.motion.pose_at(elapsed - self.transition)
    }

    pub fn progress(&self, now: f64) -> f64 {
        let total = self.total_duration();
        if total <= 0.0 {
            return 1.0;
        }
        (self.elapsed(now) / total).clamp(0.0, 1.0)
    }

    pub fn remaining(&self, now: f64) -> f64 {
        (self.total_duration() - self.elapsed(now)).max(0.0)
    }

    pub fn is_over(&self, now: f64) -> bool {
        self.elapsed(now) >= self.total_duration()
    }
}
