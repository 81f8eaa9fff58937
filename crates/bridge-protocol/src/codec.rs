use crate::error::{ProtocolError, Result};
use crate::types::{Action, CommandRecord, StatusRecord};
use serde_json::Value;
use uuid::Uuid;

/// Decode a command file.
///
/// Decoding is staged so the caller can tell a broken file from a well-formed
/// request it does not understand: invalid JSON, a missing `action`, an action
/// name outside [`Action::NAMES`] and bad parameters each map to their own
/// [`ProtocolError`] variant, carrying the correlation id whenever it parsed.
pub fn parse_command(bytes: &[u8]) -> Result<CommandRecord> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let Value::Object(map) = &value else {
        return Err(ProtocolError::Malformed("command is not a JSON object".into()));
    };

    let id = map
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok());

    let action = match map.get("action") {
        Some(Value::String(name)) => name.clone(),
        Some(_) => {
            return Err(ProtocolError::InvalidParameters {
                id,
                action: String::new(),
                reason: "'action' must be a string".into(),
            })
        }
        None => return Err(ProtocolError::MissingAction { id }),
    };
    if !Action::is_known(&action) {
        return Err(ProtocolError::UnknownAction { id, action });
    }

    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidParameters {
        id,
        action,
        reason: e.to_string(),
    })
}

pub fn encode_command(record: &CommandRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| ProtocolError::Encode(e.to_string()))
}

pub fn parse_status(bytes: &[u8]) -> Result<StatusRecord> {
    serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

pub fn encode_status(record: &StatusRecord) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(record).map_err(|e| ProtocolError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ArmSide;

    #[test]
    fn test_parses_hand_written_command_without_id() {
        let cmd = parse_command(br#"{"action":"takeoff","altitude":2}"#).unwrap();
        assert_eq!(cmd.id, None);
        assert_eq!(cmd.action, Action::Takeoff { altitude: 2.0 });
    }

    #[test]
    fn test_malformed_json_is_reported_as_such() {
        let err = parse_command(b"{\"action\": \"land\"").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        let err = parse_command(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_missing_action_keeps_the_id() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"id":"{id}","altitude":1.0}}"#);
        let err = parse_command(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingAction { .. }));
        assert_eq!(err.command_id(), Some(id));
    }

    #[test]
    fn test_unknown_action_is_distinguished_from_bad_parameters() {
        let err = parse_command(br#"{"action":"do_a_barrel_roll"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction { .. }));
        assert_eq!(err.action(), Some("do_a_barrel_roll"));

        let err = parse_command(br#"{"action":"set_arm_position","arm":"middle"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidParameters { .. }));
        assert_eq!(err.action(), Some("set_arm_position"));
    }

    #[test]
    fn test_command_survives_encoding() {
        let record = CommandRecord::new(Action::SetArmPosition {
            arm: ArmSide::Left,
            shoulder_pitch: 0.5,
            shoulder_roll: 0.2,
        });
        let bytes = encode_command(&record).unwrap();
        let decoded = parse_command(&bytes).unwrap();
        assert_eq!(decoded.id, record.id);
        assert_eq!(decoded.action, record.action);
    }

    #[test]
    fn test_garbage_status_is_malformed() {
        assert!(matches!(
            parse_status(b"not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
