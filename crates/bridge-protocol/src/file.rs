use crate::{Exchange, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

pub const COMMANDS_FILE: &str = "commands.json";
pub const CONSUMED_FILE: &str = "commands.consumed.json";
pub const STATUS_FILE: &str = "status.json";
pub const IMAGE_FILE: &str = "camera_image.jpg";

/// Exchange backed by a directory shared between two processes.
///
/// Writers stage each document in a hidden temp file in the same directory and
/// rename it over the target. Taking a command renames `commands.json` to
/// `commands.consumed.json` before reading, so a command written after the
/// rename stays pending for the next tick.
///
/// Commands are flushed to disk before the rename. Status and image writes
/// happen on the controller tick and skip the flush unless
/// [`FileExchange::with_synced_status`] asks for it.
#[derive(Debug, Clone)]
pub struct FileExchange {
    dir: PathBuf,
    commands: PathBuf,
    consumed: PathBuf,
    status: PathBuf,
    image: PathBuf,
    sync_status: bool,
}

impl FileExchange {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            commands: dir.join(COMMANDS_FILE),
            consumed: dir.join(CONSUMED_FILE),
            status: dir.join(STATUS_FILE),
            image: dir.join(IMAGE_FILE),
            dir,
            sync_status: false,
        }
    }

    /// Flush status and image writes to disk as well, for crash durability.
    pub fn with_synced_status(mut self, sync: bool) -> Self {
        self.sync_status = sync;
        self
    }

    pub fn syncs_status(&self) -> bool {
        self.sync_status
    }

    /// Exchange for one robot instance under a shared data root.
    pub fn for_robot(data_root: impl AsRef<Path>, robot_name: &str) -> Self {
        Self::new(data_root.as_ref().join(robot_name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn commands_path(&self) -> &Path {
        &self.commands
    }

    pub fn status_path(&self) -> &Path {
        &self.status
    }

    pub fn image_path(&self) -> &Path {
        &self.image
    }

    fn atomic_write(&self, target: &Path, bytes: &[u8], sync: bool) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(bytes)?;
        if sync {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(target).map_err(|e| e.error)?;
        trace!(path = %target.display(), len = bytes.len(), sync, "replaced");
        Ok(())
    }
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

impl Exchange for FileExchange {
    fn put_command(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.commands, bytes, true)
    }

    fn take_command_bytes(&self) -> Result<Option<Vec<u8>>> {
        match fs::rename(&self.commands, &self.consumed) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        debug!(path = %self.consumed.display(), "command consumed");
        read_if_exists(&self.consumed)
    }

    fn has_pending_command(&self) -> Result<bool> {
        Ok(self.commands.try_exists()?)
    }

    fn put_status(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.status, bytes, self.sync_status)
    }

    fn status_bytes(&self) -> Result<Option<Vec<u8>>> {
        read_if_exists(&self.status)
    }

    fn put_image(&self, bytes: &[u8]) -> Result<()> {
        self.atomic_write(&self.image, bytes, self.sync_status)
    }

    fn image_location(&self) -> Option<PathBuf> {
        Some(self.image.clone())
    }

    fn cleanup(&self) -> Result<()> {
        for path in [&self.commands, &self.consumed, &self.status, &self.image] {
            remove_if_exists(path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Action, CommandRecord, ProtocolError, StatusRecord};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_command_is_consumed_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let ex = FileExchange::for_robot(dir.path(), "Crazyflie");
        assert!(ex.take_command().is_none());

        ex.write_command(&CommandRecord::new(Action::Land)).unwrap();
        assert!(ex.has_pending_command().unwrap());
        let taken = ex.take_command().unwrap().unwrap();
        assert_eq!(taken.action, Action::Land);

        assert!(!ex.has_pending_command().unwrap());
        assert!(ex.take_command().is_none());
        assert!(dir.path().join("Crazyflie").join(CONSUMED_FILE).exists());
    }

    #[test]
    fn test_newer_command_replaces_pending_one() {
        let dir = tempfile::tempdir().unwrap();
        let ex = FileExchange::new(dir.path());
        ex.write_command(&CommandRecord::new(Action::Land)).unwrap();
        ex.write_command(&CommandRecord::new(Action::EmergencyStop))
            .unwrap();
        let taken = ex.take_command().unwrap().unwrap();
        assert_eq!(taken.action, Action::EmergencyStop);
    }

    #[test]
    fn test_malformed_file_is_consumed_and_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ex = FileExchange::new(dir.path());
        ex.put_command(b"{ not json").unwrap();
        assert!(matches!(
            ex.take_command(),
            Some(Err(ProtocolError::Malformed(_)))
        ));
        assert!(ex.take_command().is_none());
    }

    #[test]
    fn test_status_replacement_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let ex = FileExchange::new(dir.path());
        assert!(ex.read_status().unwrap().is_none());

        for beat in 0..5 {
            let status = StatusRecord {
                heartbeat: beat,
                ..StatusRecord::default()
            };
            ex.write_status(&status).unwrap();
        }
        assert_eq!(ex.read_status().unwrap().unwrap().heartbeat, 4);

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![STATUS_FILE.to_string()]);
    }

    #[test]
    fn test_status_writes_skip_flush_unless_asked() {
        let dir = tempfile::tempdir().unwrap();
        let ex = FileExchange::new(dir.path());
        assert!(!ex.syncs_status());
        ex.write_status(&StatusRecord::default()).unwrap();

        let synced = FileExchange::new(dir.path()).with_synced_status(true);
        assert!(synced.syncs_status());
        synced
            .write_status(&StatusRecord {
                heartbeat: 1,
                ..StatusRecord::default()
            })
            .unwrap();
        assert_eq!(ex.read_status().unwrap().unwrap().heartbeat, 1);
    }

    #[test]
    fn test_reader_never_sees_a_partial_status() {
        let dir = tempfile::tempdir().unwrap();
        let writer = FileExchange::new(dir.path());
        let reader = writer.clone();
        writer.write_status(&StatusRecord::default()).unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let handle = {
            let done = Arc::clone(&done);
            thread::spawn(move || {
                for beat in 1..=500 {
                    let status = StatusRecord {
                        heartbeat: beat,
                        last_result: Some("x".repeat(beat as usize % 64 * 32)),
                        ..StatusRecord::default()
                    };
                    writer.write_status(&status).unwrap();
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let mut last = 0;
        loop {
            let finished = done.load(Ordering::SeqCst);
            let status = reader.read_status().unwrap().unwrap();
            assert!(status.heartbeat >= last);
            last = status.heartbeat;
            if finished {
                break;
            }
        }
        handle.join().unwrap();
        assert_eq!(last, 500);
    }

    #[test]
    fn test_cleanup_removes_all_records() {
        let dir = tempfile::tempdir().unwrap();
        let ex = FileExchange::new(dir.path());
        ex.write_command(&CommandRecord::new(Action::Status)).unwrap();
        ex.write_status(&StatusRecord::default()).unwrap();
        ex.put_image(&[0xFF, 0xD8]).unwrap();
        ex.cleanup().unwrap();
        assert!(ex.read_status().unwrap().is_none());
        assert!(!ex.has_pending_command().unwrap());
        assert!(!ex.image_path().exists());
        ex.cleanup().unwrap();
    }
}
