use crate::codec::{encode_command, encode_status, parse_command, parse_status};
use crate::{CommandRecord, Result, StatusRecord};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared state between one tool server and one controller.
///
/// Implementations replace each record as a whole: a reader sees either the
/// previous or the next document, never a mix. The command slot holds at most
/// one pending record and taking it marks it consumed.
pub trait Exchange: Send + Sync {
    /// Replace the pending command.
    fn put_command(&self, bytes: &[u8]) -> Result<()>;

    /// Remove and return the pending command, if any.
    fn take_command_bytes(&self) -> Result<Option<Vec<u8>>>;

    fn has_pending_command(&self) -> Result<bool>;

    fn put_status(&self, bytes: &[u8]) -> Result<()>;

    fn status_bytes(&self) -> Result<Option<Vec<u8>>>;

    fn put_image(&self, bytes: &[u8]) -> Result<()>;

    /// Where a captured image can be read by other processes.
    fn image_location(&self) -> Option<PathBuf> {
        None
    }

    /// Remove every record held by this exchange.
    fn cleanup(&self) -> Result<()>;

    fn write_command(&self, record: &CommandRecord) -> Result<()> {
        self.put_command(&encode_command(record)?)
    }

    /// `None` when nothing is pending, otherwise the decoded command or the
    /// reason it could not be decoded. The record is consumed either way.
    fn take_command(&self) -> Option<Result<CommandRecord>> {
        match self.take_command_bytes() {
            Ok(Some(bytes)) => Some(parse_command(&bytes)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }

    /// Drop a pending command without decoding it. Returns whether one existed.
    fn discard_pending(&self) -> Result<bool> {
        Ok(self.take_command_bytes()?.is_some())
    }

    fn write_status(&self, status: &StatusRecord) -> Result<()> {
        self.put_status(&encode_status(status)?)
    }

    fn read_status(&self) -> Result<Option<StatusRecord>> {
        match self.status_bytes()? {
            Some(bytes) => parse_status(&bytes).map(Some),
            None => Ok(None),
        }
    }
}

impl<E: Exchange + ?Sized> Exchange for Arc<E> {
    fn put_command(&self, bytes: &[u8]) -> Result<()> {
        (**self).put_command(bytes)
    }

    fn take_command_bytes(&self) -> Result<Option<Vec<u8>>> {
        (**self).take_command_bytes()
    }

    fn has_pending_command(&self) -> Result<bool> {
        (**self).has_pending_command()
    }

    fn put_status(&self, bytes: &[u8]) -> Result<()> {
        (**self).put_status(bytes)
    }

    fn status_bytes(&self) -> Result<Option<Vec<u8>>> {
        (**self).status_bytes()
    }

    fn put_image(&self, bytes: &[u8]) -> Result<()> {
        (**self).put_image(bytes)
    }

    fn image_location(&self) -> Option<PathBuf> {
        (**self).image_location()
    }

    fn cleanup(&self) -> Result<()> {
        (**self).cleanup()
    }
}
