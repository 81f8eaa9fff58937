use crate::Result;
use bridge_protocol::ResultKind;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct ControllerMetrics {
    pub registry: Registry,
    pub ticks: IntCounter,
    pub commands: IntCounterVec,
    pub invalid_commands: IntCounter,
    pub status_published: IntCounter,
    pub status_write_failures: IntCounter,
    pub busy: IntGauge,
}

impl ControllerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let ticks = IntCounter::new("sb_controller_ticks", "Controller ticks executed")?;
        let commands = IntCounterVec::new(
            Opts::new("sb_controller_commands", "Commands processed by result kind"),
            &["result"],
        )?;
        let invalid_commands = IntCounter::new(
            "sb_controller_invalid_commands",
            "Command files that were malformed or named an unknown action",
        )?;
        let status_published =
            IntCounter::new("sb_controller_status_published", "Status records written")?;
        let status_write_failures = IntCounter::new(
            "sb_controller_status_write_failures",
            "Status records that could not be written",
        )?;
        let busy = IntGauge::new(
            "sb_controller_busy",
            "1 while a long-running action is in progress",
        )?;

        registry.register(Box::new(ticks.clone()))?;
        registry.register(Box::new(commands.clone()))?;
        registry.register(Box::new(invalid_commands.clone()))?;
        registry.register(Box::new(status_published.clone()))?;
        registry.register(Box::new(status_write_failures.clone()))?;
        registry.register(Box::new(busy.clone()))?;

        Ok(Self {
            registry,
            ticks,
            commands,
            invalid_commands,
            status_published,
            status_write_failures,
            busy,
        })
    }

    pub fn record_result(&self, kind: ResultKind) {
        let label = match kind {
            ResultKind::Ok => "ok",
            ResultKind::Rejected => "rejected",
            ResultKind::Busy => "busy",
            ResultKind::Error => "error",
        };
        self.commands.with_label_values(&[label]).inc();
    }

    pub fn count(&self, kind: &str) -> u64 {
        self.commands.with_label_values(&[kind]).get()
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_result() {
        let m = ControllerMetrics::new().unwrap();
        m.record_result(ResultKind::Busy);
        m.record_result(ResultKind::Busy);
        m.ticks.inc();
        assert_eq!(m.count("busy"), 2);
        assert_eq!(m.count("ok"), 0);
        assert!(m.encode_text().contains("sb_controller_ticks 1"));
    }
}
