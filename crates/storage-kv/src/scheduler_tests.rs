//! Scheduler tests: debounce coalescing, immediate flush, state machine.
//!
//! These run on a paused tokio clock so the debounce window is exercised
//! deterministically.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use pocketfolio_core::positions::NewPosition;

    use crate::backend::{BackendError, KeyValueBackend, MemoryBackend};
    use crate::keys::POSITIONS_KEY;
    use crate::manager::{StorageConfig, StorageManager, SAVE_DEBOUNCE_MS};
    use crate::scheduler::SchedulerState;

    /// Counts physical writes of the position payload.
    struct CountingBackend {
        inner: MemoryBackend,
        position_writes: Arc<AtomicUsize>,
    }

    impl CountingBackend {
        fn new(position_writes: Arc<AtomicUsize>) -> Self {
            CountingBackend {
                inner: MemoryBackend::new(),
                position_writes,
            }
        }
    }

    impl KeyValueBackend for CountingBackend {
        fn get(&self, key: &str) -> Option<String> {
            self.inner.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
            if key == POSITIONS_KEY {
                self.position_writes.fetch_add(1, Ordering::SeqCst);
            }
            self.inner.set(key, value)
        }

        fn remove(&mut self, key: &str) {
            self.inner.remove(key);
        }

        fn entries(&self) -> Vec<(String, String)> {
            self.inner.entries()
        }
    }

    fn input(symbol: &str, quantity: Decimal) -> NewPosition {
        NewPosition {
            symbol: symbol.to_string(),
            quantity,
            purchase_price_per_share: dec!(100),
            ..Default::default()
        }
    }

    fn past_debounce() -> Duration {
        Duration::from_millis(SAVE_DEBOUNCE_MS * 2)
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_within_window_coalesce_into_one_write() {
        let writes = Arc::new(AtomicUsize::new(0));
        let manager = StorageManager::open(
            CountingBackend::new(Arc::clone(&writes)),
            StorageConfig::default(),
        );

        manager.add_position(input("AAPL", dec!(1))).unwrap();
        manager.add_position(input("MSFT", dec!(2))).unwrap();
        manager.add_position(input("GOOG", dec!(3))).unwrap();
        manager.add_position(input("TSLA", dec!(4))).unwrap();

        tokio::time::sleep(past_debounce()).await;
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_quiet_window_gets_its_own_write() {
        let writes = Arc::new(AtomicUsize::new(0));
        let manager = StorageManager::open(
            CountingBackend::new(Arc::clone(&writes)),
            StorageConfig::default(),
        );

        manager.add_position(input("AAPL", dec!(1))).unwrap();
        tokio::time::sleep(past_debounce()).await;
        assert_eq!(writes.load(Ordering::SeqCst), 1);

        manager.add_position(input("MSFT", dec!(2))).unwrap();
        tokio::time::sleep(past_debounce()).await;
        assert_eq!(writes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_now_writes_immediately_and_cancels_timer() {
        let writes = Arc::new(AtomicUsize::new(0));
        let manager = StorageManager::open(
            CountingBackend::new(Arc::clone(&writes)),
            StorageConfig::default(),
        );

        manager.add_position(input("AAPL", dec!(1))).unwrap();
        manager.flush_now().await.unwrap();
        assert_eq!(writes.load(Ordering::SeqCst), 1);

        // The canceled deadline must not fire a second write.
        tokio::time::sleep(past_debounce()).await;
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutation_during_quiet_period_reschedules() {
        let writes = Arc::new(AtomicUsize::new(0));
        let manager = StorageManager::open(
            CountingBackend::new(Arc::clone(&writes)),
            StorageConfig::default(),
        );

        manager.add_position(input("AAPL", dec!(1))).unwrap();
        // Halfway through the window another mutation arrives; the deadline
        // restarts and still produces a single write.
        tokio::time::sleep(Duration::from_millis(SAVE_DEBOUNCE_MS / 2)).await;
        manager.add_position(input("MSFT", dec!(2))).unwrap();

        tokio::time::sleep(Duration::from_millis(SAVE_DEBOUNCE_MS / 2)).await;
        assert_eq!(writes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(past_debounce()).await;
        assert_eq!(writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_state_transitions() {
        let manager = StorageManager::open(MemoryBackend::new(), StorageConfig::default());
        assert_eq!(manager.scheduler_state(), SchedulerState::Idle);

        manager.add_position(input("AAPL", dec!(1))).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(manager.scheduler_state(), SchedulerState::Scheduled);

        tokio::time::sleep(past_debounce()).await;
        assert_eq!(manager.scheduler_state(), SchedulerState::Idle);
    }
}
