//! Top-level storage facade: owned state, load/recovery, debounced writes.
//!
//! `StorageManager` replaces the collection of module-level singletons the
//! dashboard grew over time. It is constructed once per application
//! session, owns the in-memory stores, and is the only component that
//! touches the backing store - through the write pipeline
//! (codec -> integrity seal -> quota-guarded commit) and the load ladder
//! (verified value -> verified backup -> legacy migration -> defaults).

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, error, info, warn};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;

use pocketfolio_core::constants::MAX_SNAPSHOTS;
use pocketfolio_core::errors::{Error, Result, StorageError, ValidationError};
use pocketfolio_core::export::{
    sanitize_positions, sanitize_snapshots, PortfolioExport, PortfolioImport,
};
use pocketfolio_core::positions::{NewPosition, Position, PositionStore, PositionUpdate};
use pocketfolio_core::snapshots::{PortfolioSnapshot, SnapshotOverrides, SnapshotStore};

use crate::backend::{BackendError, KeyValueBackend};
use crate::codec::{Codec, COMPRESSION_THRESHOLD};
use crate::integrity;
use crate::keys::{backup_key, POSITIONS_KEY, SCHEMA_VERSION, SCHEMA_VERSION_KEY, SNAPSHOTS_KEY};
use crate::migration::LegacyMigrator;
use crate::quota::QuotaGuard;
use crate::scheduler::{PersistenceScheduler, SchedulerState};

/// Default debounce window between a mutation and its flush.
pub const SAVE_DEBOUNCE_MS: u64 = 500;

/// Default byte budget of the backing store.
pub const MAX_STORAGE_BYTES: usize = 5 * 1024 * 1024;

/// Tunables for the persistence core.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub debounce: Duration,
    pub max_bytes: usize,
    pub compression_threshold: usize,
    pub max_snapshots: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            debounce: Duration::from_millis(SAVE_DEBOUNCE_MS),
            max_bytes: MAX_STORAGE_BYTES,
            compression_threshold: COMPRESSION_THRESHOLD,
            max_snapshots: MAX_SNAPSHOTS,
        }
    }
}

/// In-memory canonical state: the live positions and the retained
/// snapshots.
pub struct PortfolioState {
    pub positions: PositionStore,
    pub snapshots: SnapshotStore,
}

/// Usage figures for the storage-info panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub used_bytes: usize,
    pub max_bytes: usize,
    pub usage_ratio: f64,
    pub position_count: usize,
    pub snapshot_count: usize,
}

/// Outcome of an import: what was kept, what was dropped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub positions_imported: usize,
    pub positions_dropped: usize,
    pub snapshots_imported: usize,
    pub snapshots_dropped: usize,
}

pub struct StorageManager {
    state: Arc<Mutex<PortfolioState>>,
    backend: Arc<Mutex<dyn KeyValueBackend>>,
    scheduler: PersistenceScheduler,
    quota: QuotaGuard,
}

impl StorageManager {
    /// Loads (or migrates, or recovers) persisted state from `backend` and
    /// starts the persistence scheduler. Construction never fails: on
    /// unreadable data the manager degrades to the best available state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open<B: KeyValueBackend + 'static>(backend: B, config: StorageConfig) -> Self {
        Self::open_shared(Arc::new(Mutex::new(backend)), config)
    }

    /// Variant of [`open`](StorageManager::open) for embedders that retain
    /// their own handle to the backing store.
    pub fn open_shared(backend: Arc<Mutex<dyn KeyValueBackend>>, config: StorageConfig) -> Self {
        let codec = Codec::new(config.compression_threshold);
        let quota = QuotaGuard::new(config.max_bytes);

        let loaded = load_state(&mut *lock(&backend), &codec, &quota, &config);
        let state = Arc::new(Mutex::new(loaded));

        let scheduler = {
            let state = Arc::clone(&state);
            let backend = Arc::clone(&backend);
            let codec = codec.clone();
            PersistenceScheduler::spawn(config.debounce, move || {
                persist_state(&mut lock(&state), &mut *lock(&backend), &codec, &quota)
            })
        };

        StorageManager {
            state,
            backend,
            scheduler,
            quota,
        }
    }

    // === Positions ===

    pub fn add_position(&self, input: NewPosition) -> Result<Position> {
        let position = lock(&self.state).positions.add(input)?;
        self.scheduler.mark_dirty();
        Ok(position)
    }

    /// Explicit merge-into-existing-lot variant of
    /// [`add_position`](StorageManager::add_position).
    pub fn merge_position(&self, input: NewPosition) -> Result<Position> {
        let position = lock(&self.state).positions.merge(input)?;
        self.scheduler.mark_dirty();
        Ok(position)
    }

    pub fn update_position(&self, id: &str, update: PositionUpdate) -> Result<Position> {
        let position = lock(&self.state).positions.update(id, update)?;
        self.scheduler.mark_dirty();
        Ok(position)
    }

    pub fn delete_position(&self, id: &str) -> Result<Position> {
        let position = lock(&self.state).positions.delete(id)?;
        self.scheduler.mark_dirty();
        Ok(position)
    }

    /// Stores the latest fetched quote on every lot of `symbol`.
    pub fn record_quote(&self, symbol: &str, price: Decimal) -> Result<usize> {
        let touched = lock(&self.state).positions.record_quote(symbol, price)?;
        if touched > 0 {
            self.scheduler.mark_dirty();
        }
        Ok(touched)
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        lock(&self.state).positions.get(id).cloned()
    }

    pub fn positions(&self) -> Vec<Position> {
        lock(&self.state).positions.list()
    }

    // === Snapshots ===

    pub fn create_snapshot(&self, overrides: SnapshotOverrides) -> PortfolioSnapshot {
        let snapshot = {
            let mut state = lock(&self.state);
            let positions = state.positions.list();
            state.snapshots.create(&positions, overrides)
        };
        self.scheduler.mark_dirty();
        snapshot
    }

    pub fn snapshots(&self) -> Vec<PortfolioSnapshot> {
        lock(&self.state).snapshots.list()
    }

    pub fn snapshots_in_range(&self, start: &str, end: &str) -> Vec<PortfolioSnapshot> {
        lock(&self.state).snapshots.by_date_range(start, end)
    }

    // === Persistence ===

    /// Immediate-flush escape hatch: cancels any pending debounce deadline
    /// and returns once the write pipeline has completed.
    pub async fn flush_now(&self) -> Result<()> {
        self.scheduler.flush_now().await
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Flushes and consumes the manager; used at session teardown.
    pub async fn close(self) -> Result<()> {
        self.flush_now().await
    }

    // === Export / import ===

    pub fn export_json(&self) -> Result<String> {
        let export = {
            let state = lock(&self.state);
            PortfolioExport::build(state.positions.list(), state.snapshots.list())
        };
        serde_json::to_string_pretty(&export)
            .map_err(|e| StorageError::Serialization(e.to_string()).into())
    }

    /// Replaces the in-memory state with the validated contents of an
    /// export document and flushes immediately. Invalid entries are dropped
    /// (and counted), never failing the whole import.
    pub async fn import_json(&self, text: &str) -> Result<ImportSummary> {
        let document: PortfolioImport = serde_json::from_str(text).map_err(|e| {
            Error::Validation(ValidationError::InvalidInput(format!(
                "unreadable import document: {}",
                e
            )))
        })?;

        let (positions, positions_dropped) = sanitize_positions(document.positions);
        let (snapshots, snapshots_dropped) = sanitize_snapshots(document.snapshots);
        let summary = ImportSummary {
            positions_imported: positions.len(),
            positions_dropped,
            snapshots_imported: snapshots.len(),
            snapshots_dropped,
        };

        {
            let mut state = lock(&self.state);
            state.positions.replace_all(positions);
            state.snapshots.replace_all(snapshots);
        }
        info!(
            "Imported {} positions ({} dropped) and {} snapshots ({} dropped)",
            summary.positions_imported,
            summary.positions_dropped,
            summary.snapshots_imported,
            summary.snapshots_dropped
        );

        self.flush_now().await?;
        Ok(summary)
    }

    pub fn storage_stats(&self) -> StorageStats {
        let used_bytes = QuotaGuard::usage(&*lock(&self.backend));
        let state = lock(&self.state);
        StorageStats {
            used_bytes,
            max_bytes: self.quota.hard_limit(),
            usage_ratio: used_bytes as f64 / self.quota.hard_limit() as f64,
            position_count: state.positions.len(),
            snapshot_count: state.snapshots.len(),
        }
    }
}

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Serializes the whole state and commits it behind the quota guard,
/// evicting oldest snapshots until the write fits. In-memory state is never
/// rolled back on failure; the next successful flush carries it.
pub(crate) fn persist_state(
    state: &mut PortfolioState,
    backend: &mut dyn KeyValueBackend,
    codec: &Codec,
    quota: &QuotaGuard,
) -> Result<()> {
    loop {
        let positions = state.positions.list();
        let snapshots = state.snapshots.list();
        let writes = vec![
            (
                POSITIONS_KEY.to_string(),
                integrity::seal(&codec.encode(&positions)?)?,
            ),
            (
                SNAPSHOTS_KEY.to_string(),
                integrity::seal(&codec.encode(&snapshots)?)?,
            ),
            (SCHEMA_VERSION_KEY.to_string(), SCHEMA_VERSION.to_string()),
        ];

        if !quota.fits(backend, &writes) {
            if evict_for_room(state) {
                continue;
            }
            return Err(StorageError::CapacityExceeded(format!(
                "{} bytes in use and no snapshots left to evict",
                QuotaGuard::usage(backend)
            ))
            .into());
        }

        match commit_writes(backend, &writes) {
            Ok(()) => {
                state.positions.take_dirty();
                state.snapshots.take_dirty();
                debug!(
                    "Persisted {} positions and {} snapshots",
                    positions.len(),
                    snapshots.len()
                );
                return Ok(());
            }
            Err(BackendError::CapacityExceeded(msg)) => {
                if evict_for_room(state) {
                    warn!(
                        "Backing store rejected write ({}), retrying after eviction",
                        msg
                    );
                    continue;
                }
                return Err(StorageError::CapacityExceeded(msg).into());
            }
            Err(e) => return Err(Error::from(StorageError::from(e))),
        }
    }
}

fn evict_for_room(state: &mut PortfolioState) -> bool {
    // Positions are the source of truth and are never evicted; snapshots
    // are the lowest-value data and go oldest-first.
    state.snapshots.evict_oldest().is_some()
}

/// Rotates each key's previous value into its backup slot, then commits
/// the new value, keeping exactly one generation of rollback.
fn commit_writes(
    backend: &mut dyn KeyValueBackend,
    writes: &[(String, String)],
) -> std::result::Result<(), BackendError> {
    for (key, value) in writes {
        if let Some(previous) = backend.get(key) {
            backend.set(&backup_key(key), &previous)?;
        }
        backend.set(key, value)?;
    }
    Ok(())
}

/// Load path: schema check, integrity-verified decode with backup
/// recovery, legacy migration, empty defaults. Never fails; it degrades to
/// the best available state and logs what happened.
pub(crate) fn load_state(
    backend: &mut dyn KeyValueBackend,
    codec: &Codec,
    quota: &QuotaGuard,
    config: &StorageConfig,
) -> PortfolioState {
    let version = backend
        .get(SCHEMA_VERSION_KEY)
        .and_then(|v| v.trim().parse::<u32>().ok());

    let mut positions: Option<Vec<Position>> = None;
    let mut snapshots: Option<Vec<PortfolioSnapshot>> = None;
    if version == Some(SCHEMA_VERSION) {
        positions = read_managed(backend, codec, POSITIONS_KEY);
        snapshots = read_managed(backend, codec, SNAPSHOTS_KEY);
    } else if let Some(found) = version {
        debug!(
            "Schema version {} behind current {}, checking for a legacy layout",
            found, SCHEMA_VERSION
        );
    }

    if positions.is_none() && snapshots.is_none() {
        if let Some(migrated) = LegacyMigrator::run(backend) {
            let mut state = PortfolioState {
                positions: PositionStore::from_positions(migrated.positions),
                snapshots: SnapshotStore::from_snapshots(
                    migrated.snapshots,
                    config.max_snapshots,
                ),
            };
            // Commit the migrated data under the current keys right away so
            // the migration runs exactly once.
            if let Err(e) = persist_state(&mut state, backend, codec, quota) {
                warn!("Could not persist migrated data yet: {}", e);
            }
            return state;
        }
    }

    PortfolioState {
        positions: PositionStore::from_positions(positions.unwrap_or_default()),
        snapshots: SnapshotStore::from_snapshots(
            snapshots.unwrap_or_default(),
            config.max_snapshots,
        ),
    }
}

/// Reads one managed key through the integrity ladder: verified current
/// value, else verified backup. Returns `None` when neither yields a
/// decodable payload - the caller moves on to migration or defaults.
fn read_managed<T: DeserializeOwned>(
    backend: &mut dyn KeyValueBackend,
    codec: &Codec,
    key: &str,
) -> Option<T> {
    let text = backend.get(key)?;
    match verify_decode(codec, &text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Stored '{}' failed verification ({}), trying backup", key, e);
            let bkey = backup_key(key);
            match backend.get(&bkey).map(|t| verify_decode(codec, &t)) {
                Some(Ok(value)) => {
                    info!("Recovered '{}' from its backup copy", key);
                    Some(value)
                }
                Some(Err(backup_err)) => {
                    error!("Backup for '{}' is also unreadable: {}", key, backup_err);
                    None
                }
                None => {
                    error!("No backup available for '{}'", key);
                    None
                }
            }
        }
    }
}

fn verify_decode<T: DeserializeOwned>(codec: &Codec, text: &str) -> Result<T> {
    let payload = integrity::unseal(text)?;
    codec.decode(&payload)
}
