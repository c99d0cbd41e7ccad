use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, SorterError};

/// Watermark used when no state has been persisted yet
pub const EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00Z";

/// Parse an RFC 3339 timestamp and rewrite it as fixed-width UTC with
/// whole seconds (`2024-05-01T21:00:12Z`), the only form in which string
/// order is time order
pub fn normalize_timestamp(raw: &str) -> Result<String> {
    let parsed = DateTime::parse_from_rfc3339(raw.trim())
        .map_err(|e| SorterError::DataShape(format!("bad timestamp {}: {}", raw, e)))?;
    Ok(parsed
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Persisted incremental state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// Publish time of the newest video fully considered so far.
    ///
    /// Fixed-width ISO-8601 UTC, so plain string ordering is time ordering.
    pub last_published_at: String,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            last_published_at: EPOCH_TIMESTAMP.to_string(),
        }
    }
}

impl RunState {
    pub fn new(last_published_at: &str) -> Self {
        Self {
            last_published_at: last_published_at.to_string(),
        }
    }

    /// A video is new iff it was published strictly after the watermark
    pub fn is_new(&self, published_at: &str) -> bool {
        published_at > self.last_published_at.as_str()
    }

    /// Move the watermark forward; never backwards. Returns whether it moved.
    pub fn advance(&mut self, published_at: &str) -> bool {
        if self.is_new(published_at) {
            self.last_published_at = published_at.to_string();
            true
        } else {
            false
        }
    }
}

/// Single-writer store for the watermark file
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state, defaulting to the epoch when absent
    pub fn load(&self) -> Result<RunState> {
        if !self.path.exists() {
            debug!("No state file at {}, starting from epoch", self.path.display());
            return Ok(RunState::default());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let state: RunState = serde_json::from_str(&content).map_err(|e| {
            SorterError::DataShape(format!("corrupt state file {}: {}", self.path.display(), e))
        })?;
        let last_published_at = normalize_timestamp(&state.last_published_at).map_err(|e| {
            SorterError::DataShape(format!("state file {}: {}", self.path.display(), e))
        })?;

        Ok(RunState { last_published_at })
    }

    /// Atomically replace the persisted state
    pub fn save(&self, state: &RunState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(serde_json::to_string(state)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| SorterError::Io(e.error))?;

        debug!("💾 Saved state to {}", self.path.display());
        Ok(())
    }

    /// Save only if the new state is not behind the persisted one
    pub fn save_monotonic(&self, state: &RunState) -> Result<bool> {
        let current = self.load()?;
        if state.last_published_at < current.last_published_at {
            warn!(
                "Refusing to move watermark back from {} to {}",
                current.last_published_at, state.last_published_at
            );
            return Ok(false);
        }
        if state.last_published_at == current.last_published_at && self.path.exists() {
            return Ok(false);
        }
        self.save(state)?;
        info!("📌 Watermark advanced to {}", state.last_published_at);
        Ok(true)
    }

    /// Remove the persisted state; the next run starts from the epoch
    pub fn reset(&self) -> Result<bool> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("🗑️ Removed state file {}", self.path.display());
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
