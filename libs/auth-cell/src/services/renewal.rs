use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

struct PendingRenewal {
    id: u64,
    handle: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<PendingRenewal>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<PendingRenewal>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the single deferred renewal job.
///
/// Scheduling replaces (and aborts) whatever job was pending. A job leaves the
/// slot the moment its deadline fires, so rescheduling from inside a running
/// job never aborts the caller.
#[derive(Default)]
pub struct RenewalScheduler {
    pending: Slot,
    next_id: AtomicU64,
}

impl RenewalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = Arc::clone(&self.pending);

        // Held across spawn so the job cannot observe the slot before it is filled.
        let mut pending = lock(&self.pending);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut current = lock(&slot);
                if current.as_ref().is_some_and(|p| p.id == id) {
                    *current = None;
                }
            }
            job.await;
        });

        if let Some(previous) = pending.replace(PendingRenewal { id, handle }) {
            debug!("Replacing pending renewal #{}", previous.id);
            previous.handle.abort();
        }
        debug!("Renewal #{} scheduled in {:?}", id, delay);
    }

    /// Abort the pending job, if any. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        match lock(&self.pending).take() {
            Some(previous) => {
                debug!("Cancelled pending renewal #{}", previous.id);
                previous.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.pending)
            .as_ref()
            .is_some_and(|p| !p.handle.is_finished())
    }
}

impl Drop for RenewalScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
