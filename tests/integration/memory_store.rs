//! In-memory day store for integration testing.
//!
//! Provides a deterministic `DayStore` implementation that keeps every
//! artifact as raw bytes in a map, with helpers to seed inputs, drop
//! artifacts and snapshot a day for byte-level comparisons.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use slipforge::storage::{Artifact, DayStore};

type Key = (String, Artifact);

/// A store whose contents are fully controllable from test code.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<BTreeMap<Key, Vec<u8>>>>,
    /// If set, every write fails with this message.
    fail_writes: Arc<Mutex<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact with a JSON value.
    pub fn put_json(&self, day: &str, artifact: Artifact, value: &Value) {
        let bytes = serde_json::to_vec(value).unwrap();
        self.files.lock().unwrap().insert((day.to_string(), artifact), bytes);
    }

    pub fn get_json(&self, day: &str, artifact: Artifact) -> Value {
        let bytes = self.get_bytes(day, artifact).unwrap_or_else(|| panic!("{artifact} missing"));
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn get_bytes(&self, day: &str, artifact: Artifact) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(&(day.to_string(), artifact)).cloned()
    }

    pub fn remove(&self, day: &str, artifact: Artifact) {
        self.files.lock().unwrap().remove(&(day.to_string(), artifact));
    }

    /// Every artifact of a day, keyed by artifact.
    pub fn snapshot(&self, day: &str) -> BTreeMap<Artifact, Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .iter()
            .filter(|((d, _), _)| d == day)
            .map(|((_, a), bytes)| (*a, bytes.clone()))
            .collect()
    }

    /// Force all subsequent writes to fail.
    pub fn set_write_error(&self, msg: &str) {
        *self.fail_writes.lock().unwrap() = Some(msg.to_string());
    }
}

impl DayStore for MemoryStore {
    fn exists(&self, day: &str, artifact: Artifact) -> bool {
        self.files.lock().unwrap().contains_key(&(day.to_string(), artifact))
    }

    fn read(&self, day: &str, artifact: Artifact) -> Result<Option<Vec<u8>>> {
        Ok(self.get_bytes(day, artifact))
    }

    fn write(&self, day: &str, artifact: Artifact, bytes: &[u8]) -> Result<()> {
        if let Some(msg) = self.fail_writes.lock().unwrap().as_ref() {
            return Err(anyhow!("{msg}"));
        }
        self.files
            .lock()
            .unwrap()
            .insert((day.to_string(), artifact), bytes.to_vec());
        Ok(())
    }

    fn location(&self, day: &str, artifact: Artifact) -> String {
        format!("memory://{day}/{artifact}")
    }
}
