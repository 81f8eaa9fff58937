//! motion-playback: keyframe motions for humanoid robots
//!
//! Parses Webots `.motion` files (a header naming the motors, then one row per
//! keyframe) and plays them back without blocking: the caller samples the pose
//! for the current simulation time once per tick.

mod error;
pub use error::{MotionError, Result};

mod parse;
pub use parse::{parse_motion, parse_timestamp, HEADER_TAG};

mod types;
pub use types::{Frame, Motion, Pose};

mod library;
pub use library::{list_motion_names, load_motion_file, load_motions_dir, MotionLibrary};

mod player;
pub use player::{MotionPlayer, DEFAULT_TRANSITION_SECS};
