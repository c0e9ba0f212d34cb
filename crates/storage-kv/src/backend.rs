//! Minimal key/value contract required by the persistence core, plus the
//! in-memory reference backend.

use std::collections::HashMap;

use thiserror::Error;

/// Errors surfaced by a key/value backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The write would exceed the backing store's byte budget.
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The backend refused the operation for a non-capacity reason.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// The minimal capability the storage core requires from its backing store.
///
/// Only the persistence scheduler writes through this trait, and only at
/// flush time; every other component operates on in-memory copies.
pub trait KeyValueBackend: Send {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError>;

    fn remove(&mut self, key: &str);

    /// All (key, value) pairs, used for usage measurement.
    fn entries(&self) -> Vec<(String, String)>;
}

/// HashMap-backed store with an optional byte capacity, mirroring the
/// size-constrained profile area the dashboard persists into.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
    capacity: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes once `sum(key + value)` bytes would
    /// exceed `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryBackend {
            entries: HashMap::new(),
            capacity: Some(capacity),
        }
    }

    /// Adjusts (or removes) the simulated capacity.
    pub fn set_capacity(&mut self, capacity: Option<usize>) {
        self.capacity = capacity;
    }

    fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        if let Some(capacity) = self.capacity {
            let existing = self
                .entries
                .get(key)
                .map(|v| key.len() + v.len())
                .unwrap_or(0);
            let projected = self.used_bytes() - existing + key.len() + value.len();
            if projected > capacity {
                return Err(BackendError::CapacityExceeded(format!(
                    "{} of {} bytes in use, write of {} more refused",
                    self.used_bytes(),
                    capacity,
                    key.len() + value.len()
                )));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    fn entries(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
