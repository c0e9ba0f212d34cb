//! Byte-budget accounting for the backing store.
//!
//! The guard measures usage as `sum(key + value)` across all entries and
//! flags writes that would push usage past the soft threshold. Eviction
//! itself happens in the flush loop, which owns the in-memory snapshot
//! store; the guard only does the arithmetic.

use log::debug;

use crate::backend::KeyValueBackend;
use crate::keys::backup_key;

const SOFT_LIMIT_NUMERATOR: usize = 9;
const SOFT_LIMIT_DENOMINATOR: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct QuotaGuard {
    hard_limit: usize,
    soft_limit: usize,
}

impl QuotaGuard {
    pub fn new(hard_limit: usize) -> Self {
        QuotaGuard {
            hard_limit,
            soft_limit: hard_limit / SOFT_LIMIT_DENOMINATOR * SOFT_LIMIT_NUMERATOR,
        }
    }

    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    pub fn soft_limit(&self) -> usize {
        self.soft_limit
    }

    /// Total bytes across all entries, key and value lengths included.
    pub fn usage(backend: &dyn KeyValueBackend) -> usize {
        backend.entries().iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    /// Projected usage if `writes` replaced their current entries,
    /// including the backup slot each write rotates its previous value
    /// into.
    pub fn projected_usage(backend: &dyn KeyValueBackend, writes: &[(String, String)]) -> usize {
        let mut total = Self::usage(backend);
        for (key, value) in writes {
            let bkey = backup_key(key);
            let current = backend.get(key);
            let current_backup = backend.get(&bkey);

            if let Some(cur) = &current {
                total -= key.len() + cur.len();
            }
            if let Some(bak) = &current_backup {
                total -= bkey.len() + bak.len();
            }
            total += key.len() + value.len();
            if let Some(cur) = &current {
                total += bkey.len() + cur.len();
            }
        }
        total
    }

    /// Whether the projected usage stays under the soft threshold.
    pub fn fits(&self, backend: &dyn KeyValueBackend, writes: &[(String, String)]) -> bool {
        let projected = Self::projected_usage(backend, writes);
        let fits = projected <= self.soft_limit;
        if !fits {
            debug!(
                "Projected usage {} exceeds soft limit {} (hard limit {})",
                projected, self.soft_limit, self.hard_limit
            );
        }
        fits
    }
}
