//! Background open
//!
//! Loads a store on its own thread so the caller can keep working while
//! the directory is scanned and decoded.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::config::Config;
use crate::engine::Store;
use crate::error::{Result, StoreError};

/// A store being opened in the background
///
/// Either `.await` it on any executor or block with `wait()`. Dropping it
/// without waiting lets the open finish and then shuts the store down.
pub struct Opening<V: Clone + Send + Sync + 'static> {
    state: Arc<OpenState<V>>,
}

struct OpenState<V: Clone + Send + Sync + 'static> {
    slot: Mutex<Slot<V>>,
    ready: Condvar,
}

struct Slot<V: Clone + Send + Sync + 'static> {
    result: Option<Result<Store<V>>>,
    waker: Option<Waker>,
}

impl<V: Clone + Send + Sync + 'static> Store<V> {
    /// Open a store without blocking the caller
    ///
    /// Does the same work as `open` on a dedicated thread.
    pub fn open_in_background(config: Config<V>) -> Opening<V> {
        let state = Arc::new(OpenState {
            slot: Mutex::new(Slot {
                result: None,
                waker: None,
            }),
            ready: Condvar::new(),
        });

        let thread_state = Arc::clone(&state);
        let spawned = thread::Builder::new()
            .name("persistkv-open".to_string())
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| Store::open(config)))
                    .unwrap_or_else(|_| {
                        Err(StoreError::Initialization("open thread panicked".to_string()))
                    });
                thread_state.complete(result);
            });

        if let Err(e) = spawned {
            state.complete(Err(StoreError::Initialization(format!(
                "failed to spawn open thread: {}",
                e
            ))));
        }

        Opening { state }
    }
}

impl<V: Clone + Send + Sync + 'static> OpenState<V> {
    fn complete(&self, result: Result<Store<V>>) {
        let waker = {
            let mut slot = self.slot.lock();
            slot.result = Some(result);
            slot.waker.take()
        };
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Opening<V> {
    /// Block until the store is open
    pub fn wait(self) -> Result<Store<V>> {
        let mut slot = self.state.slot.lock();
        loop {
            if let Some(result) = slot.result.take() {
                return result;
            }
            self.state.ready.wait(&mut slot);
        }
    }

    /// Whether `wait` would return immediately
    pub fn is_ready(&self) -> bool {
        self.state.slot.lock().result.is_some()
    }
}

impl<V: Clone + Send + Sync + 'static> Future for Opening<V> {
    type Output = Result<Store<V>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.state.slot.lock();
        match slot.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                slot.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
