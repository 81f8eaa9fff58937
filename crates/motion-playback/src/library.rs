use crate::{parse_motion, Motion};
use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const EXTENSION: &str = "motion";

/// Motions available to a controller, keyed by file stem.
#[derive(Debug, Default, Clone)]
pub struct MotionLibrary {
    motions: BTreeMap<String, Motion>,
}

impl MotionLibrary {
    pub fn insert(&mut self, motion: Motion) {
        self.motions.insert(motion.name.clone(), motion);
    }

    /// Look a motion up by name; a trailing extension such as `.motion` is ignored.
    pub fn get(&self, name: &str) -> Option<&Motion> {
        let stem = name.split('.').next().unwrap_or(name);
        self.motions.get(stem)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.motions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.motions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motions.is_empty()
    }
}

fn motion_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("reading motions dir: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == EXTENSION) {
            entries.push(path);
        }
    }
    entries.sort();
    Ok(entries)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn load_motion_file(path: impl AsRef<Path>) -> anyhow::Result<Motion> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading motion: {}", path.display()))?;
    let motion = parse_motion(&stem(path), &raw)
        .with_context(|| format!("parsing motion: {}", path.display()))?;
    Ok(motion)
}

/// Load every `*.motion` file in `dir`. Files that fail to parse are skipped
/// with a warning so one bad file does not hide the rest.
pub fn load_motions_dir(dir: impl AsRef<Path>) -> anyhow::Result<MotionLibrary> {
    let mut lib = MotionLibrary::default();
    for path in motion_files(dir.as_ref())? {
        match load_motion_file(&path) {
            Ok(motion) => lib.insert(motion),
            Err(e) => warn!(error = %format!("{e:#}"), "skipping motion"),
        }
    }
    info!(count = lib.len(), dir = %dir.as_ref().display(), "loaded motions");
    Ok(lib)
}

/// Names of the motion files in `dir`, without parsing them.
pub fn list_motion_names(dir: impl AsRef<Path>) -> anyhow::Result<Vec<String>> {
    Ok(motion_files(dir.as_ref())?.iter().map(|p| stem(p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    #[test]
    fn test_loads_directory_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "Wave.motion",
            "#WEBOTS_MOTION,V1.0,HeadYaw\n00:00:000,Pose1,0\n00:01:000,Pose2,0.3\n",
        );
        write(dir.path(), "Broken.motion", "garbage\n");
        write(dir.path(), "notes.txt", "ignored");

        let lib = load_motions_dir(dir.path()).unwrap();
        assert_eq!(lib.names().collect::<Vec<_>>(), vec!["Wave"]);
        assert!(lib.get("Wave.motion").is_some());
        assert!(lib.get("Broken").is_none());

        let names = list_motion_names(dir.path()).unwrap();
        assert_eq!(names, vec!["Broken".to_string(), "Wave".to_string()]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_motions_dir(dir.path().join("nope")).unwrap_err();
        assert!(format!("{err:#}").contains("reading motions dir"));
    }
}
