//! Step IDs persisted between pipeline invocations.
//!
//! Each pipeline keeps its own small JSON file (`openai_ft_ids.json`,
//! `openai_dpo_ids.json`, `openai_eval_ids.json`) so a later step can pick up
//! the ID an earlier run produced.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineIds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

/// A `PipelineIds` file on disk.
#[derive(Debug, Clone)]
pub struct IdStore {
    path: PathBuf,
}

impl IdStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files load as empty.
    pub fn load(&self) -> PipelineIds {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!("No saved IDs at {}", self.path.display());
                return PipelineIds::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed IDs file {}: {}", self.path.display(), e);
            PipelineIds::default()
        })
    }

    pub fn save(&self, ids: &PipelineIds) -> Result<(), AppError> {
        std::fs::write(&self.path, serde_json::to_string_pretty(ids)?)?;
        Ok(())
    }

    /// Loads, applies `change`, and saves.
    pub fn update(&self, change: impl FnOnce(&mut PipelineIds)) -> Result<PipelineIds, AppError> {
        let mut ids = self.load();
        change(&mut ids);
        self.save(&ids)?;
        Ok(ids)
    }
}

/// Returns `explicit` if given, else the persisted value, else a validation
/// error naming the step that produces it.
pub fn resolve_id(
    explicit: Option<&str>,
    saved: Option<&str>,
    what: &str,
    produced_by: &str,
) -> Result<String, AppError> {
    explicit.or(saved).map(str::to_string).ok_or_else(|| {
        AppError::Validation(format!(
            "no {what} available; pass it explicitly or run `{produced_by}` first"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdStore::new(dir.path().join("ids.json"));
        assert_eq!(store.load(), PipelineIds::default());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(IdStore::new(path).load(), PipelineIds::default());
    }

    #[test]
    fn test_update_keeps_other_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdStore::new(dir.path().join("ids.json"));
        store.update(|ids| ids.file_id = Some("file-1".into())).unwrap();
        store.update(|ids| ids.job_id = Some("ftjob-2".into())).unwrap();

        let ids = store.load();
        assert_eq!(ids.file_id.as_deref(), Some("file-1"));
        assert_eq!(ids.job_id.as_deref(), Some("ftjob-2"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("run_id"));
    }

    #[test]
    fn test_resolve_id_prefers_explicit() {
        assert_eq!(
            resolve_id(Some("a"), Some("b"), "file ID", "upload").unwrap(),
            "a"
        );
        assert_eq!(resolve_id(None, Some("b"), "file ID", "upload").unwrap(), "b");
        let err = resolve_id(None, None, "file ID", "finetune upload").unwrap_err();
        assert!(err.to_string().contains("finetune upload"));
    }
}
