//! In-flight call deduplication
//!
//! Wraps an async action so that a second invocation while one is already
//! in flight awaits the same outcome instead of issuing a duplicate call.
//! At most one call per [`SingleFlight`] is pending at any time.

use std::future::Future;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt, Shared};

type SharedFlight<T> = Shared<BoxFuture<'static, T>>;

/// Per-action in-flight future slot, cleared once the call settles
pub struct SingleFlight<T: Clone = ()> {
    inflight: Mutex<Option<SharedFlight<T>>>,
}

impl<T: Clone + Send + Sync + 'static> SingleFlight<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(None),
        }
    }

    /// True while a call started through [`run`](Self::run) has not settled
    pub fn in_flight(&self) -> bool {
        let slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_some()
    }

    /// Run `make()` unless a previous call is still pending, in which case
    /// the pending call's outcome is awaited and returned instead.
    pub async fn run<F>(&self, make: impl FnOnce() -> F) -> T
    where
        F: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            match &*slot {
                Some(pending) => pending.clone(),
                None => {
                    let flight = make().boxed().shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        let outcome = flight.clone().await;

        // Clear the slot unless a newer flight already replaced it
        let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&flight)) {
            *slot = None;
        }

        outcome
    }
}

impl<T: Clone + Send + Sync + 'static> Default for SingleFlight<T> {
    fn default() -> Self {
        Self::new()
    }
}
