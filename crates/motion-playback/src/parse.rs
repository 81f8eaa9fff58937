use crate::{Frame, Motion, MotionError, Result};

pub const HEADER_TAG: &str = "#WEBOTS_MOTION";

fn segment(raw: &str, s: &str) -> Result<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MotionError::InvalidTimestamp(raw.to_string()));
    }
    s.parse()
        .map_err(|_| MotionError::InvalidTimestamp(raw.to_string()))
}

/// Convert a keyframe time to seconds.
///
/// Three segments read as `MM:SS:mmm` (minutes, seconds, milliseconds), four as
/// `HH:MM:SS:mmm`. Seconds and minutes below the leading unit must be under 60
/// and milliseconds under 1000.
pub fn parse_timestamp(raw: &str) -> Result<f64> {
    let parts = raw
        .trim()
        .split(':')
        .map(|s| segment(raw, s))
        .collect::<Result<Vec<u64>>>()?;

    let (hours, minutes, seconds, millis) = match parts[..] {
        [m, s, ms] => (0, m, s, ms),
        [h, m, s, ms] => {
            if m >= 60 {
                return Err(MotionError::InvalidTimestamp(raw.to_string()));
            }
            (h, m, s, ms)
        }
        _ => return Err(MotionError::InvalidTimestamp(raw.to_string())),
    };
    if seconds >= 60 || millis >= 1000 {
        return Err(MotionError::InvalidTimestamp(raw.to_string()));
    }

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds as f64 + millis as f64 / 1000.0)
}

fn parse_header(line: &str) -> Result<Vec<String>> {
    let mut fields = line.split(',').map(str::trim);
    if fields.next() != Some(HEADER_TAG) {
        return Err(MotionError::MissingHeader);
    }
    match fields.next() {
        Some(v) if v.starts_with('V') => {}
        other => {
            return Err(MotionError::InvalidHeader(format!(
                "expected a version after {HEADER_TAG}, found {other:?}"
            )))
        }
    }
    let motors: Vec<String> = fields.map(str::to_string).collect();
    if motors.is_empty() || motors.iter().any(String::is_empty) {
        return Err(MotionError::InvalidHeader("empty motor list".into()));
    }
    Ok(motors)
}

fn parse_row(line: &str, line_no: usize, motors: usize) -> Result<Frame> {
    let row_err = |reason: String| MotionError::Row {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() != motors + 2 {
        return Err(row_err(format!(
            "expected {} values, found {}",
            motors,
            fields.len().saturating_sub(2)
        )));
    }
    let time = parse_timestamp(fields[0]).map_err(|e| row_err(e.to_string()))?;
    let positions = fields[2..]
        .iter()
        .map(|v| match *v {
            "*" => Ok(None),
            v => v
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Some)
                .ok_or_else(|| row_err(format!("invalid position '{v}'"))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Frame {
        time,
        pose_name: fields[1].to_string(),
        positions,
    })
}

/// Parse the text of a `.motion` file.
pub fn parse_motion(name: &str, text: &str) -> Result<Motion> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let (_, header) = lines.next().ok_or(MotionError::MissingHeader)?;
    let motors = parse_header(header)?;

    let mut frames: Vec<Frame> = Vec::new();
    for (line_no, line) in lines {
        if line.starts_with('#') {
            continue;
        }
        let frame = parse_row(line, line_no, motors.len())?;
        if let Some(prev) = frames.last() {
            if frame.time < prev.time {
                return Err(MotionError::Row {
                    line: line_no,
                    reason: format!("time {:.3}s goes backwards", frame.time),
                });
            }
        }
        frames.push(frame);
    }
    if frames.is_empty() {
        return Err(MotionError::Empty);
    }

    Ok(Motion {
        name: name.to_string(),
        motors,
        frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WAVE: &str = "\
#WEBOTS_MOTION,V1.0,RShoulderPitch,RShoulderRoll,RElbowRoll
00:00:000,Pose1,1.4,-0.2,0.5
00:00:500,Pose2,-1.0,*,1.2
# raise
00:01:200,Pose3,-1.2,-0.3,*
01:02:040,Pose4,1.4,-0.2,0.5
";

    #[test]
    fn test_timestamp_is_minutes_seconds_millis() {
        assert_eq!(parse_timestamp("00:00:000").unwrap(), 0.0);
        assert_eq!(parse_timestamp("00:01:200").unwrap(), 1.2);
        assert_eq!(parse_timestamp("01:02:040").unwrap(), 62.04);
        assert_eq!(parse_timestamp("00:02:500").unwrap(), 2.5);
    }

    #[test]
    fn test_four_segment_timestamp_has_hours() {
        assert_eq!(parse_timestamp("01:00:00:000").unwrap(), 3600.0);
        assert_eq!(parse_timestamp("00:01:30:250").unwrap(), 90.25);
    }

    #[test]
    fn test_rejects_out_of_range_segments() {
        for bad in [
            "00:60:000",
            "00:00:1000",
            "1:2",
            "a:b:c",
            "00::000",
            "00:00:00:00:00",
            "-1:00:000",
        ] {
            assert!(parse_timestamp(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_parses_motion_file() {
        let motion = parse_motion("Wave", WAVE).unwrap();
        assert_eq!(motion.motors.len(), 3);
        assert_eq!(motion.frames.len(), 4);
        assert_eq!(motion.frames[1].positions[1], None);
        assert_eq!(motion.frames[2].pose_name, "Pose3");
        assert_eq!(motion.duration(), 62.04);
    }

    #[test]
    fn test_short_motion_has_nonzero_duration() {
        let text = "#WEBOTS_MOTION,V1.0,HeadYaw\n00:00:000,Pose1,0\n00:00:800,Pose2,0.5\n";
        let motion = parse_motion("Look", text).unwrap();
        assert!((motion.duration() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_header_is_required() {
        assert_eq!(
            parse_motion("x", "00:00:000,Pose1,0\n").unwrap_err(),
            MotionError::MissingHeader
        );
        assert!(matches!(
            parse_motion("x", "#WEBOTS_MOTION,V1.0\n00:00:000,Pose1\n").unwrap_err(),
            MotionError::InvalidHeader(_)
        ));
        assert_eq!(parse_motion("x", "").unwrap_err(), MotionError::MissingHeader);
    }

    #[test]
    fn test_bad_rows_report_their_line() {
        let text = "#WEBOTS_MOTION,V1.0,HeadYaw\n00:00:000,Pose1,0\n00:00:500,Pose2,abc\n";
        assert_eq!(
            parse_motion("x", text).unwrap_err(),
            MotionError::Row {
                line: 3,
                reason: "invalid position 'abc'".into()
            }
        );

        let backwards = "#WEBOTS_MOTION,V1.0,HeadYaw\n00:01:000,Pose1,0\n00:00:500,Pose2,0\n";
        assert!(matches!(
            parse_motion("x", backwards).unwrap_err(),
            MotionError::Row { line: 3, .. }
        ));

        let header_only = "#WEBOTS_MOTION,V1.0,HeadYaw\n";
        assert_eq!(parse_motion("x", header_only).unwrap_err(), MotionError::Empty);
    }
}
