//! [`SnapshotFile`] – the durable JSON copy of the score table.
//!
//! The artifact is a single pretty-printed JSON object
//! (`{"action": score, ...}`). Writes go to a sibling `*.tmp` file which is
//! synced and then renamed over the artifact, so a crash mid-write leaves
//! either the previous snapshot or the new one, never a truncated file.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use aura_types::AuraError;
use serde_json::Value;
use tracing::debug;

use crate::knowledge::Scores;

/// Location of the on-disk snapshot artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the staging file used while writing.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read and parse the artifact.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// * [`AuraError::Decode`] if the file is not valid JSON.
    /// * [`AuraError::Io`] for any other read failure.
    pub fn load(&self) -> Result<Option<Value>, AuraError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AuraError::Io(format!(
                    "failed to read snapshot at {}: {e}",
                    self.path.display()
                )));
            }
        };
        let value = serde_json::from_str(&raw).map_err(|e| {
            AuraError::Decode(format!(
                "snapshot at {} is not valid JSON: {e}",
                self.path.display()
            ))
        })?;
        Ok(Some(value))
    }

    /// Atomically replace the artifact with `scores`.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::PersistenceWrite`] if the directory, the staging
    /// file or the final rename cannot be written.
    pub fn write(&self, scores: &Scores) -> Result<(), AuraError> {
        let write_err = |what: &str, e: String| {
            AuraError::PersistenceWrite(format!("{what} {}: {e}", self.path.display()))
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| write_err("failed to create directory for", e.to_string()))?;
        }

        let raw = serde_json::to_string_pretty(scores)
            .map_err(|e| write_err("failed to encode snapshot for", e.to_string()))?;

        let staging = self.staging_path();
        fs::File::create(&staging)
            .and_then(|mut f| {
                f.write_all(raw.as_bytes())?;
                f.sync_all()
            })
            .map_err(|e| write_err("failed to stage snapshot for", e.to_string()))?;

        fs::rename(&staging, &self.path).map_err(|e| {
            let _ = fs::remove_file(&staging);
            write_err("failed to replace snapshot at", e.to_string())
        })?;

        debug!(path = %self.path.display(), entries = scores.len(), "snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KnowledgeStore;
    use aura_types::Sign;

    fn sample_scores() -> Scores {
        Scores::from([
            ("action_1".to_string(), 8),
            ("action_2".to_string(), -3),
            (String::new(), 1),
        ])
    }

    #[test]
    fn load_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let file = SnapshotFile::new(dir.path().join("knowledge.json"));
        assert!(file.load().expect("no error").is_none());
    }

    #[test]
    fn write_then_load_restores_same_table() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let file = SnapshotFile::new(dir.path().join("knowledge.json"));
        file.write(&sample_scores()).expect("write");

        let store = KnowledgeStore::new();
        let value = file.load().expect("load").expect("present");
        assert_eq!(store.restore(&value).expect("restore"), 3);
        assert_eq!(store.snapshot(), sample_scores());
    }

    #[test]
    fn artifact_is_plain_json_object() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("knowledge.json");
        SnapshotFile::new(&path).write(&sample_scores()).expect("write");

        let raw = std::fs::read_to_string(&path).expect("read");
        let value: Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["action_1"], 8);
        assert_eq!(value["action_2"], -3);
    }

    #[test]
    fn write_overwrites_previous_version_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let file = SnapshotFile::new(dir.path().join("knowledge.json"));
        file.write(&sample_scores()).expect("first write");

        let store = KnowledgeStore::new();
        store.apply_feedback("only", Sign::Negative);
        file.write(&store.snapshot()).expect("second write");

        let value = file.load().expect("load").expect("present");
        assert_eq!(value, serde_json::json!({ "only": -1 }));
        assert!(!file.staging_path().exists());
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let file = SnapshotFile::new(dir.path().join("nested").join("deeper").join("k.json"));
        file.write(&Scores::new()).expect("write");
        assert_eq!(file.load().expect("load"), Some(serde_json::json!({})));
    }

    #[test]
    fn load_reports_decode_error_for_corrupt_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("knowledge.json");
        std::fs::write(&path, "{ \"action_1\": 3,").expect("write corrupt");

        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, AuraError::Decode(_)));
    }

    #[test]
    fn write_into_a_file_path_fails_with_persistence_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").expect("write blocker");

        let file = SnapshotFile::new(blocker.join("knowledge.json"));
        let err = file.write(&sample_scores()).unwrap_err();
        assert!(matches!(err, AuraError::PersistenceWrite(_)));
    }

    #[test]
    fn staging_path_is_a_sibling() {
        let file = SnapshotFile::new("/var/lib/aura/knowledge.json");
        assert_eq!(
            file.staging_path(),
            PathBuf::from("/var/lib/aura/knowledge.json.tmp")
        );
    }
}
