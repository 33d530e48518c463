//! Background flusher
//!
//! Owns the thread that drives interval-mode flush passes.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::{Result, StoreError};

use super::FlushReport;

/// Something that can write out its pending changes
pub trait FlushTarget: Send + Sync + 'static {
    /// Run one flush pass. Failures stay pending and are reported, not returned.
    fn flush_pending(&self) -> FlushReport;
}

/// Handle to a running flusher thread
///
/// Dropping the handle stops the thread and waits for it. A pass already
/// in progress is allowed to finish; no extra pass is run on stop, the
/// owner does its own final flush.
pub struct Flusher {
    /// Dropping the sender wakes the thread and ends the loop
    shutdown: Option<Sender<()>>,

    /// Background thread join handle
    thread: Option<thread::JoinHandle<()>>,

    period: Duration,
}

impl Flusher {
    /// Spawn a thread calling `target.flush_pending()` every `period`
    pub fn start<T: FlushTarget>(target: Arc<T>, period: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(0);

        let thread = thread::Builder::new()
            .name("persistkv-flusher".to_string())
            .spawn(move || flush_loop(target.as_ref(), period, shutdown_rx))
            .map_err(|e| {
                StoreError::Initialization(format!("failed to spawn flusher thread: {}", e))
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
            period,
        })
    }

    /// Stop the thread and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        drop(self.shutdown.take());
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                tracing::error!("flusher thread panicked");
            }
        }
    }

    /// Check if the flusher thread is still running
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |h| !h.is_finished())
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Main flusher loop (background thread)
fn flush_loop<T: FlushTarget>(target: &T, period: Duration, shutdown: Receiver<()>) {
    let ticker = channel::tick(period);

    loop {
        crossbeam::select! {
            // Only ever fires on disconnect: the handle never sends
            recv(shutdown) -> _ => return,
            recv(ticker) -> _ => {
                target.flush_pending();
            }
        }
    }
}
