//! Persistence layer.
//!
//! Each cycle day owns a directory of JSON artifacts. Stages read and
//! write them through the `DayStore` trait; the filesystem store writes
//! atomically (temp file + rename) so a reader never sees a partial file.

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::EngineError;

/// Named artifacts of a cycle day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Artifact {
    Quotes,
    Evaluated,
    InflatedPool,
    EligiblePool,
    Singles,
    Parlays,
    Card,
}

impl Artifact {
    /// Path relative to the day directory.
    pub fn relative_path(&self) -> &'static str {
        match self {
            Artifact::Quotes => "quotes.json",
            Artifact::Evaluated => "evaluated.json",
            Artifact::InflatedPool => "pools/inflated.json",
            Artifact::EligiblePool => "pools/parlay_eligible.json",
            Artifact::Singles => "picks/singles.json",
            Artifact::Parlays => "picks/parlays.json",
            Artifact::Card => "picks/card.json",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative_path())
    }
}

/// Storage for one day's artifacts.
pub trait DayStore {
    fn exists(&self, day: &str, artifact: Artifact) -> bool;

    /// Raw bytes, or `None` if the artifact has not been written.
    fn read(&self, day: &str, artifact: Artifact) -> Result<Option<Vec<u8>>>;

    /// Replace the artifact wholesale.
    fn write(&self, day: &str, artifact: Artifact, bytes: &[u8]) -> Result<()>;

    /// Human-readable location, for summaries and logs.
    fn location(&self, day: &str, artifact: Artifact) -> String;
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Read an artifact that must exist and hold a JSON array.
pub fn read_rows<S: DayStore + ?Sized>(store: &S, day: &str, artifact: Artifact) -> Result<Vec<Value>> {
    let bytes = store.read(day, artifact)?.ok_or_else(|| EngineError::MissingSnapshot {
        day: day.to_string(),
        artifact: artifact.to_string(),
    })?;

    let value: Value = serde_json::from_slice(&bytes).map_err(|e| EngineError::MalformedSnapshot {
        artifact: artifact.to_string(),
        message: e.to_string(),
    })?;

    match value {
        Value::Array(rows) => Ok(rows),
        other => Err(EngineError::MalformedSnapshot {
            artifact: artifact.to_string(),
            message: format!("expected a JSON array, found {}", json_kind(&other)),
        }
        .into()),
    }
}

/// Read an artifact if present, treating a missing one as empty.
pub fn read_rows_or_empty<S: DayStore + ?Sized>(
    store: &S,
    day: &str,
    artifact: Artifact,
) -> Result<Vec<Value>> {
    if !store.exists(day, artifact) {
        debug!(day, artifact = %artifact, "Optional artifact missing, treating as empty");
        return Ok(Vec::new());
    }
    read_rows(store, day, artifact)
}

/// Serialise to pretty JSON (with a trailing newline) and write.
pub fn write_json<S: DayStore + ?Sized, T: Serialize + ?Sized>(
    store: &S,
    day: &str,
    artifact: Artifact,
    value: &T,
) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .with_context(|| format!("Failed to serialise {artifact}"))?;
    bytes.push(b'\n');
    store.write(day, artifact, &bytes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// Artifacts under `<root>/<day>/`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, day: &str, artifact: Artifact) -> PathBuf {
        self.root.join(day).join(artifact.relative_path())
    }
}

impl DayStore for FsStore {
    fn exists(&self, day: &str, artifact: Artifact) -> bool {
        self.path_for(day, artifact).is_file()
    }

    fn read(&self, day: &str, artifact: Artifact) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(day, artifact);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(bytes))
    }

    fn write(&self, day: &str, artifact: Artifact, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(day, artifact);
        let dir = path
            .parent()
            .ok_or_else(|| EngineError::Storage(format!("No parent directory for {}", path.display())))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);

        std::fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;

        debug!(path = %path.display(), bytes = bytes.len(), "Artifact written");
        Ok(())
    }

    fn location(&self, day: &str, artifact: Artifact) -> String {
        self.path_for(day, artifact).display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
