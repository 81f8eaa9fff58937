use bridge_protocol::StatusRecord;
use uuid::Uuid;

/// Freshness condition a submission waits for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Wait {
    /// The status names this command as the last one processed.
    Acknowledged(Uuid),
    /// Acknowledged, and no long-running action for this command remains.
    Completed(Uuid),
    /// Any status published after the given wall-clock time.
    TimestampAfter(f64),
    /// A camera image stored after the given wall-clock time.
    ImageAfter(f64),
}

impl Wait {
    pub fn command_id(&self) -> Option<Uuid> {
        match self {
            Wait::Acknowledged(id) | Wait::Completed(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_met(&self, status: &StatusRecord) -> bool {
        match self {
            Wait::Acknowledged(id) => status.acknowledges(*id),
            Wait::Completed(id) => status.acknowledges(*id) && !status.is_running(*id),
            Wait::TimestampAfter(t) => status.timestamp > *t,
            Wait::ImageAfter(t) => status.last_image_timestamp.is_some_and(|ts| ts > *t),
        }
    }
}

/// How one submission ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Completed(StatusRecord),
    /// The controller refused the command; device state is unchanged.
    Rejected { reason: String, status: StatusRecord },
    /// Another long-running action is still in progress.
    Busy { reason: String, status: StatusRecord },
    /// The controller took the command but could not carry it out.
    Failed { reason: String, status: StatusRecord },
    /// The attempt budget ran out before the freshness condition held.
    Timeout {
        attempts: u32,
        last_status: Option<StatusRecord>,
    },
    /// The command record could not be written.
    DeliveryFailure(String),
}

impl SubmitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SubmitOutcome::Completed(_))
    }

    pub fn status(&self) -> Option<&StatusRecord> {
        match self {
            SubmitOutcome::Completed(status)
            | SubmitOutcome::Rejected { status, .. }
            | SubmitOutcome::Busy { status, .. }
            | SubmitOutcome::Failed { status, .. } => Some(status),
            SubmitOutcome::Timeout { last_status, .. } => last_status.as_ref(),
            SubmitOutcome::DeliveryFailure(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubmitOutcome::Completed(_) => "completed",
            SubmitOutcome::Rejected { .. } => "rejected",
            SubmitOutcome::Busy { .. } => "busy",
            SubmitOutcome::Failed { .. } => "failed",
            SubmitOutcome::Timeout { .. } => "timeout",
            SubmitOutcome::DeliveryFailure(_) => "delivery_failure",
        }
    }

    /// One line for a human reader.
    pub fn describe(&self) -> String {
        match self {
            SubmitOutcome::Completed(status) => status
                .last_result
                .clone()
                .unwrap_or_else(|| "done".to_string()),
            SubmitOutcome::Rejected { reason, .. } => format!("rejected: {reason}"),
            SubmitOutcome::Busy { reason, .. } => reason.clone(),
            SubmitOutcome::Failed { reason, .. } => format!("failed: {reason}"),
            SubmitOutcome::Timeout { attempts, .. } => format!(
                "no response from the controller after {attempts} attempts; is the simulation running?"
            ),
            SubmitOutcome::DeliveryFailure(reason) => format!("could not send command: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_protocol::ActiveAction;

    #[test]
    fn test_completed_needs_ack_and_no_running_action() {
        let id = Uuid::new_v4();
        let mut status = StatusRecord {
            last_command_id: Some(id),
            current_action: Some(ActiveAction {
                command_id: Some(id),
                name: "takeoff".into(),
                progress: 0.3,
                remaining_secs: 1.4,
            }),
            ..StatusRecord::default()
        };
        assert!(Wait::Acknowledged(id).is_met(&status));
        assert!(!Wait::Completed(id).is_met(&status));
        status.current_action = None;
        assert!(Wait::Completed(id).is_met(&status));
        assert!(!Wait::Completed(Uuid::new_v4()).is_met(&status));
    }

    #[test]
    fn test_image_wait_needs_newer_image() {
        let status = StatusRecord {
            last_image_timestamp: Some(10.0),
            ..StatusRecord::default()
        };
        assert!(Wait::ImageAfter(9.5).is_met(&status));
        assert!(!Wait::ImageAfter(10.0).is_met(&status));
        assert!(!Wait::ImageAfter(0.0).is_met(&StatusRecord::default()));
    }

    #[test]
    fn test_timeout_is_not_a_rejection() {
        let timeout = SubmitOutcome::Timeout {
            attempts: 5,
            last_status: None,
        };
        assert_eq!(timeout.label(), "timeout");
        assert!(!timeout.is_success());
        assert!(timeout.describe().contains("5 attempts"));
    }
}
