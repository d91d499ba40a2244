//! The only client state that outlives the process: which view was active
//! and the list filter. Cached server data is never written to disk.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ErrorCode;
use crate::model::ParseEnumError;
use crate::query::TaskFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveView {
    Board,
    #[default]
    List,
}

impl fmt::Display for ActiveView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Board => "board",
            Self::List => "list",
        })
    }
}

impl FromStr for ActiveView {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "board" => Ok(Self::Board),
            "list" => Ok(Self::List),
            _ => Err(ParseEnumError {
                expected: "view",
                got: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub active_view: ActiveView,
    pub filters: TaskFilter,
}

/// `<data_dir>/tasksync/preferences.json`.
#[must_use]
pub fn default_preferences_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("tasksync/preferences.json"))
}

/// Load saved preferences. A missing or unreadable file yields defaults;
/// a corrupt one is logged and ignored.
#[must_use]
pub fn load_preferences(path: &Path) -> Preferences {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Preferences::default(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read preferences, using defaults");
            return Preferences::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|err| {
        let code = ErrorCode::PreferencesCorrupt;
        warn!(
            code = %code,
            hint = code.hint().unwrap_or_default(),
            path = %path.display(),
            error = %err,
            "corrupt preferences, using defaults"
        );
        Preferences::default()
    })
}

/// Persist `prefs` atomically (write to a sibling temp file, then rename).
///
/// # Errors
///
/// Fails when the directory cannot be created or the file cannot be written.
pub fn save_preferences(path: &Path, prefs: &Preferences) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(prefs).context("failed to serialize preferences")?;

    fs::write(&tmp_path, body)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| {
        format!(
            "failed to atomically move {} to {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::query::FilterChange;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested/preferences.json");
        let prefs = Preferences {
            active_view: ActiveView::Board,
            filters: TaskFilter::default().with([
                FilterChange::Status(Some(Status::InProgress)),
                FilterChange::Search("milk".into()),
            ]),
        };
        save_preferences(&path, &prefs).expect("save");
        assert_eq!(load_preferences(&path), prefs);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert_eq!(
            load_preferences(&dir.path().join("none.json")),
            Preferences::default()
        );
    }

    #[test]
    fn corrupt_file_is_default() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("preferences.json");
        fs::write(&path, "{not json").expect("write");
        assert_eq!(load_preferences(&path), Preferences::default());
    }

    #[test]
    fn partial_file_keeps_known_fields() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("preferences.json");
        fs::write(&path, r#"{"active_view": "board"}"#).expect("write");
        let prefs = load_preferences(&path);
        assert_eq!(prefs.active_view, ActiveView::Board);
        assert_eq!(prefs.filters, TaskFilter::default());
    }

    #[test]
    fn view_parses_case_insensitively() {
        assert_eq!("Board".parse::<ActiveView>().expect("parse"), ActiveView::Board);
        assert!("grid".parse::<ActiveView>().is_err());
    }
}
