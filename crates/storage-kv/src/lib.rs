//! Key/value persistence implementation for Pocketfolio.
//!
//! This crate owns everything that touches the backing store:
//! - The minimal key/value backend contract and an in-memory reference
//!   backend
//! - Text codec with the run-length compression pass
//! - Integrity sealing (checksums + one-generation backups)
//! - Quota accounting and oldest-snapshot eviction
//! - One-time migration of the legacy key layout
//! - The debounced persistence scheduler and the top-level storage manager
//!
//! # Architecture
//!
//! This crate is the only place in the application where the backing store
//! is read or written. The `core` crate is storage-agnostic and owns the
//! domain semantics.
//!
//! ```text
//! core (domain stores)
//!         │
//!         ▼
//! storage-kv (this crate)
//!         │
//!         ▼
//! key/value backing store
//! ```

pub mod backend;
pub mod codec;
pub mod errors;
pub mod integrity;
pub mod keys;
pub mod manager;
pub mod migration;
pub mod quota;
pub mod scheduler;

// Re-export the main entry points
pub use backend::{BackendError, KeyValueBackend, MemoryBackend};
pub use codec::Codec;
pub use manager::{ImportSummary, StorageConfig, StorageManager, StorageStats};
pub use migration::LegacyMigrator;
pub use quota::QuotaGuard;
pub use scheduler::{PersistenceScheduler, SchedulerState};

// Re-export storage error conversion helpers
pub use errors::IntoCore;

// Re-export from pocketfolio-core for convenience
pub use pocketfolio_core::errors::{Error, Result, StorageError};

#[cfg(test)]
mod integrity_tests;
#[cfg(test)]
mod scheduler_tests;
