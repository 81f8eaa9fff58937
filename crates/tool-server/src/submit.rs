use crate::config::ServerConfig;
use crate::outcome::{SubmitOutcome, Wait};
use bridge_protocol::{Action, CommandRecord, Exchange, ResultKind, StatusRecord};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Write side of the exchange.
///
/// Each call writes one command record and then re-reads the status at a
/// fixed interval until the wait condition holds or the attempt budget runs
/// out. Calls through one submitter are serialised, except emergency stop,
/// which is written immediately.
pub struct Submitter<E: Exchange> {
    exchange: E,
    poll_interval: Duration,
    max_attempts: u32,
    turn: Mutex<()>,
}

impl<E: Exchange> Submitter<E> {
    pub fn new(exchange: E, poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            exchange,
            poll_interval,
            max_attempts: max_attempts.max(1),
            turn: Mutex::new(()),
        }
    }

    pub fn from_config(exchange: E, config: &ServerConfig) -> Self {
        Self::new(exchange, config.poll_interval(), config.max_attempts)
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn polls_for(&self, secs: f64) -> u32 {
        let interval = self.poll_interval.as_secs_f64().max(1e-3);
        (secs.max(0.0) / interval).ceil().min(f64::from(u32::MAX)) as u32
    }

    /// Base attempts plus enough extra polls to cover the action's own
    /// duration when it is known up front. The loop extends this while the
    /// controller reports the action as still running.
    pub fn attempt_budget(&self, action: &Action) -> u32 {
        let extra = action.expected_duration().map_or(0, |secs| self.polls_for(secs));
        self.max_attempts.saturating_add(extra)
    }

    pub fn read_status(&self) -> Option<StatusRecord> {
        match self.exchange.read_status() {
            Ok(status) => status,
            Err(e) => {
                debug!(error = %e, "status not readable");
                None
            }
        }
    }

    /// Send `action` and wait until the controller has finished with it:
    /// completed for maneuvers, acknowledged for everything else.
    pub async fn submit(&self, action: Action) -> SubmitOutcome {
        let id = Uuid::new_v4();
        let wait = if action.runs_to_completion() {
            Wait::Completed(id)
        } else {
            Wait::Acknowledged(id)
        };
        let record = CommandRecord {
            id: Some(id),
            ..CommandRecord::new(action)
        };
        self.submit_until(record, wait).await
    }

    /// Request a camera frame and wait for an image newer than the current one.
    pub async fn capture_image(&self) -> SubmitOutcome {
        let baseline = self
            .read_status()
            .and_then(|s| s.last_image_timestamp)
            .unwrap_or(0.0);
        self.submit_until(
            CommandRecord::new(Action::GetCameraImage),
            Wait::ImageAfter(baseline),
        )
        .await
    }

    pub async fn submit_until(&self, record: CommandRecord, wait: Wait) -> SubmitOutcome {
        let is_stop = record.action.is_stop();
        let _turn = if is_stop {
            None
        } else {
            Some(self.turn.lock().await)
        };

        let name = record.action.name();
        let mut budget = self.attempt_budget(&record.action);
        let previous = self.read_status();
        let mut heartbeat = previous.as_ref().map(|s| s.heartbeat);
        let mut pending = Pending {
            id: record.id,
            before: previous.and_then(|s| s.last_command_id),
            acknowledged: false,
            is_stop,
        };
        if let Err(e) = self.exchange.write_command(&record) {
            warn!(action = name, error = %e, "command delivery failed");
            return SubmitOutcome::DeliveryFailure(e.to_string());
        }
        debug!(action = name, id = ?record.id, budget, "command written");

        let mut attempts = 0;
        let mut last_status = None;
        while attempts < budget {
            attempts += 1;
            tokio::time::sleep(self.poll_interval).await;
            let Some(status) = self.read_status() else {
                continue;
            };
            if let Some(outcome) = pending.settle(&status, &wait) {
                info!(action = name, outcome = outcome.label(), "command settled");
                return outcome;
            }
            // Only a live controller may extend the budget.
            let live = heartbeat.replace(status.heartbeat) != Some(status.heartbeat);
            if let Some(remaining) = pending.remaining_secs(&status).filter(|_| live) {
                let needed = attempts
                    .saturating_add(self.polls_for(remaining))
                    .saturating_add(self.max_attempts);
                if needed > budget {
                    trace!(action = name, remaining, budget = needed, "extending budget");
                    budget = needed;
                }
            }
            last_status = Some(status);
        }

        warn!(action = name, attempts, "no response from controller");
        SubmitOutcome::Timeout {
            attempts,
            last_status,
        }
    }
}

/// Poll-loop state for one written command.
struct Pending {
    id: Option<Uuid>,
    /// Last acknowledged command before ours was written.
    before: Option<Uuid>,
    acknowledged: bool,
    is_stop: bool,
}

impl Pending {
    /// Controller's estimate of the time left on our action, while it runs.
    fn remaining_secs(&self, status: &StatusRecord) -> Option<f64> {
        let id = self.id?;
        status
            .current_action
            .as_ref()
            .filter(|a| a.command_id == Some(id))
            .map(|a| a.remaining_secs)
    }

    fn settle(&mut self, status: &StatusRecord, wait: &Wait) -> Option<SubmitOutcome> {
        let Some(id) = self.id else {
            return wait.is_met(status).then(|| SubmitOutcome::Completed(status.clone()));
        };

        if status.acknowledges(id) {
            self.acknowledged = true;
            let reason = status.last_result.clone().unwrap_or_default();
            match status.result_kind {
                Some(ResultKind::Rejected) => {
                    return Some(SubmitOutcome::Rejected {
                        reason,
                        status: status.clone(),
                    })
                }
                Some(ResultKind::Busy) => {
                    return Some(SubmitOutcome::Busy {
                        reason,
                        status: status.clone(),
                    })
                }
                Some(ResultKind::Error) => {
                    return Some(SubmitOutcome::Failed {
                        reason,
                        status: status.clone(),
                    })
                }
                Some(ResultKind::Ok) | None => {}
            }
        } else if self.acknowledged && !status.is_running(id) {
            // A later command (emergency stop) replaced ours before it finished.
            return Some(superseded(status));
        } else if !self.is_stop && self.overwritten_by_stop(status) {
            // The stop replaced our command file before the controller took it.
            return Some(superseded(status));
        }

        wait.is_met(status).then(|| SubmitOutcome::Completed(status.clone()))
    }

    fn overwritten_by_stop(&self, status: &StatusRecord) -> bool {
        status.last_command_id.is_some()
            && status.last_command_id != self.before
            && status.last_command.as_deref() == Some(Action::EmergencyStop.name())
    }
}

fn superseded(status: &StatusRecord) -> SubmitOutcome {
    let by = status.last_command.as_deref().unwrap_or("another command");
    SubmitOutcome::Failed {
        reason: format!("superseded by {by}"),
        status: status.clone(),
    }
}
