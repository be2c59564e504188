//! Session persistence and selection file loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::model::{ExportPayload, Selections};

const SESSION_DIR: &str = ".feedpick";
const SESSION_FILE: &str = "session.json";

/// Snapshot of a selection session persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub selections: Selections,
    /// Page the selections were made on.
    pub location: Option<String>,
}

/// Persists session state to a file under `.feedpick/`.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
    path: PathBuf,
}

impl SessionStore {
    /// Create a new store rooted at the provided directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let path = root.join(SESSION_DIR).join(SESSION_FILE);
        Self { root, path }
    }

    /// Location of the persisted session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the most recently persisted session snapshot.
    pub fn load(&self) -> Result<Option<SessionSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read session file at {}", self.path.display()))?;
        let snapshot = serde_json::from_str(&data)
            .with_context(|| format!("invalid session data in {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Persist the provided snapshot to disk, creating parent directories as needed.
    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let dir = self.path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create session directory {}", dir.display()))?;

        let data = serde_json::to_string_pretty(snapshot)
            .context("failed to serialize session snapshot")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write session file to {}", self.path.display()))?;
        Ok(())
    }
}

/// Accepted shapes of a selections file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SelectionsFile {
    Payload(ExportPayload),
    Snapshot(SessionSnapshot),
    Bare(Selections),
}

/// Read selections from an export payload, a session snapshot, or a bare selections document.
/// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
pub fn load_selections(path: &Path) -> Result<Selections> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read selections from {}", path.display()))?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    let file: SelectionsFile = if is_yaml {
        serde_yaml::from_str(&data)
            .with_context(|| format!("invalid YAML selections in {}", path.display()))?
    } else {
        serde_json::from_str(&data)
            .with_context(|| format!("invalid JSON selections in {}", path.display()))?
    };

    Ok(match file {
        SelectionsFile::Payload(payload) => payload.selections,
        SelectionsFile::Snapshot(snapshot) => snapshot.selections,
        SelectionsFile::Bare(selections) => selections,
    })
}
