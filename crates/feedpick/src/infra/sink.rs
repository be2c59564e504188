//! Export sinks receiving finished selection payloads.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::domain::model::ExportPayload;

/// Destination for the payload emitted when the operator is done.
pub trait ExportSink {
    fn deliver(&mut self, payload: &ExportPayload) -> Result<()>;
}

/// Writes the payload as pretty JSON, replacing any previous export.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExportSink for JsonFileSink {
    fn deliver(&mut self, payload: &ExportPayload) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create export directory: {}", parent.display())
            })?;
        }
        let data =
            serde_json::to_string_pretty(payload).context("failed to serialize export payload")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write export to {}", self.path.display()))?;
        tracing::info!(path = %self.path.display(), "selections exported");
        Ok(())
    }
}

/// Keeps every delivered payload in memory, in delivery order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    delivered: Vec<ExportPayload>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> &[ExportPayload] {
        &self.delivered
    }

    pub fn last(&self) -> Option<&ExportPayload> {
        self.delivered.last()
    }
}

impl ExportSink for MemorySink {
    fn deliver(&mut self, payload: &ExportPayload) -> Result<()> {
        self.delivered.push(payload.clone());
        Ok(())
    }
}
