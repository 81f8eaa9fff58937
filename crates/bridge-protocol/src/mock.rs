use crate::{Exchange, ProtocolError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Slots {
    command: Option<Vec<u8>>,
    status: Option<Vec<u8>>,
    image: Option<Vec<u8>>,
    consumed: u64,
    fail_writes: bool,
}

/// In-process exchange. Clones share the same slots, so one clone can be handed
/// to a controller and another to a tool server.
#[derive(Debug, Clone, Default)]
pub struct MemoryExchange {
    inner: Arc<Mutex<Slots>>,
}

impl MemoryExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place arbitrary bytes in the command slot, bypassing encoding.
    pub fn inject_raw_command(&self, bytes: impl Into<Vec<u8>>) {
        self.inner.lock().command = Some(bytes.into());
    }

    /// Make every subsequent write fail with an I/O error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Number of commands taken so far.
    pub fn consumed_count(&self) -> u64 {
        self.inner.lock().consumed
    }

    pub fn image(&self) -> Option<Vec<u8>> {
        self.inner.lock().image.clone()
    }

    fn write_slot(
        &self,
        pick: impl FnOnce(&mut Slots) -> &mut Option<Vec<u8>>,
        bytes: &[u8],
    ) -> Result<()> {
        let mut slots = self.inner.lock();
        if slots.fail_writes {
            return Err(ProtocolError::Io("write refused".into()));
        }
        *pick(&mut *slots) = Some(bytes.to_vec());
        Ok(())
    }
}

impl Exchange for MemoryExchange {
    fn put_command(&self, bytes: &[u8]) -> Result<()> {
        self.write_slot(|s| &mut s.command, bytes)
    }

    fn take_command_bytes(&self) -> Result<Option<Vec<u8>>> {
        let mut slots = self.inner.lock();
        let taken = slots.command.take();
        if taken.is_some() {
            slots.consumed += 1;
        }
        Ok(taken)
    }

    fn has_pending_command(&self) -> Result<bool> {
        Ok(self.inner.lock().command.is_some())
    }

    fn put_status(&self, bytes: &[u8]) -> Result<()> {
        self.write_slot(|s| &mut s.status, bytes)
    }

    fn status_bytes(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().status.clone())
    }

    fn put_image(&self, bytes: &[u8]) -> Result<()> {
        self.write_slot(|s| &mut s.image, bytes)
    }

    fn cleanup(&self) -> Result<()> {
        let mut slots = self.inner.lock();
        slots.command = None;
        slots.status = None;
        slots.image = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, CommandRecord};

    #[test]
    fn test_clones_share_state() {
        let server = MemoryExchange::new();
        let controller = server.clone();
        server.write_command(&CommandRecord::new(Action::Status)).unwrap();
        assert!(controller.take_command().unwrap().is_ok());
        assert_eq!(server.consumed_count(), 1);
        assert!(!server.has_pending_command().unwrap());
    }

    #[test]
    fn test_refused_writes_surface_as_io_errors() {
        let ex = MemoryExchange::new();
        ex.set_fail_writes(true);
        let err = ex.write_command(&CommandRecord::new(Action::Land)).unwrap_err();
        assert!(matches!(err, ProtocolError::Io(_)));
        assert!(!ex.has_pending_command().unwrap());
    }
}
