//! Debounced persistence scheduling.
//!
//! A single writer task owns the flush path, in the same shape as a
//! single-writer database actor: store mutations send a cheap mark-dirty
//! command, the task coalesces them behind one debounce deadline, and
//! `flush_now` jumps the queue with a oneshot reply. Once a flush starts it
//! runs to completion; only a new mutation or an explicit flush can touch a
//! *pending* deadline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use pocketfolio_core::errors::{Error, Result};

/// Observable scheduler phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Nothing pending.
    Idle,
    /// A debounce deadline is armed.
    Scheduled,
    /// The write pipeline is running.
    Flushing,
}

const STATE_IDLE: u8 = 0;
const STATE_SCHEDULED: u8 = 1;
const STATE_FLUSHING: u8 = 2;

enum Command {
    MarkDirty,
    Flush(oneshot::Sender<Result<()>>),
}

/// Handle for nudging the writer task.
pub struct PersistenceScheduler {
    tx: mpsc::UnboundedSender<Command>,
    state: Arc<AtomicU8>,
}

impl PersistenceScheduler {
    /// Spawns the writer task. `flush` serializes and commits the current
    /// in-memory state; it only ever runs on this task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(debounce: Duration, mut flush: F) -> Self
    where
        F: FnMut() -> Result<()> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(STATE_IDLE));
        let task_state = Arc::clone(&state);

        tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                let command = if let Some(at) = deadline {
                    tokio::select! {
                        cmd = rx.recv() => match cmd {
                            Some(cmd) => Some(cmd),
                            None => break,
                        },
                        _ = sleep_until(at) => None,
                    }
                } else {
                    match rx.recv().await {
                        Some(cmd) => Some(cmd),
                        None => break,
                    }
                };

                match command {
                    Some(Command::MarkDirty) => {
                        deadline = Some(Instant::now() + debounce);
                        task_state.store(STATE_SCHEDULED, Ordering::SeqCst);
                    }
                    Some(Command::Flush(reply)) => {
                        deadline = None;
                        task_state.store(STATE_FLUSHING, Ordering::SeqCst);
                        let result = flush();
                        task_state.store(STATE_IDLE, Ordering::SeqCst);
                        let _ = reply.send(result);
                    }
                    None => {
                        // Debounce deadline expired.
                        deadline = None;
                        task_state.store(STATE_FLUSHING, Ordering::SeqCst);
                        if let Err(e) = flush() {
                            // State stays in memory; the next mutation
                            // reschedules and retries.
                            error!("Debounced flush failed: {}", e);
                        } else {
                            debug!("Debounced flush completed");
                        }
                        task_state.store(STATE_IDLE, Ordering::SeqCst);
                    }
                }
            }

            // Handle dropped with a deadline still armed: flush once so the
            // last debounce window cannot be lost.
            if deadline.is_some() {
                if let Err(e) = flush() {
                    error!("Final flush on shutdown failed: {}", e);
                }
            }
            task_state.store(STATE_IDLE, Ordering::SeqCst);
        });

        PersistenceScheduler { tx, state }
    }

    /// Marks the in-memory state dirty and (re)arms the debounce window.
    /// Any number of calls inside the window coalesce into one flush.
    pub fn mark_dirty(&self) {
        let _ = self.tx.send(Command::MarkDirty);
    }

    /// Cancels any pending deadline and flushes immediately, returning once
    /// the write pipeline has completed.
    pub async fn flush_now(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply_tx))
            .map_err(|_| Error::Unexpected("persistence task stopped".to_string()))?;
        reply_rx
            .await
            .map_err(|_| Error::Unexpected("persistence task dropped the reply".to_string()))?
    }

    pub fn state(&self) -> SchedulerState {
        match self.state.load(Ordering::SeqCst) {
            STATE_SCHEDULED => SchedulerState::Scheduled,
            STATE_FLUSHING => SchedulerState::Flushing,
            _ => SchedulerState::Idle,
        }
    }
}
