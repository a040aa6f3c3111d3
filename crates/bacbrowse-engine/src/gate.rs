use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::BrowseError;

/// One-permit semaphore per device key, so reads against one device never
/// overlap no matter which operation issues them.
#[derive(Debug, Default)]
pub(crate) struct DeviceGate {
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
    closed: AtomicBool,
}

impl DeviceGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails with [`BrowseError::NotRunning`] once the gate is closed.
    pub(crate) async fn acquire(&self, key: &str) -> Result<OwnedSemaphorePermit, BrowseError> {
        let semaphore = {
            let mut semaphores = self.semaphores.lock().unwrap_or_else(PoisonError::into_inner);
            if self.closed.load(Ordering::Acquire) {
                return Err(BrowseError::NotRunning);
            }
            semaphores
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        semaphore
            .acquire_owned()
            .await
            .map_err(|_| BrowseError::NotRunning)
    }

    /// Wakes every waiter with an error; used on dispose.
    pub(crate) fn close(&self) {
        let semaphores = self.semaphores.lock().unwrap_or_else(PoisonError::into_inner);
        self.closed.store(true, Ordering::Release);
        for semaphore in semaphores.values() {
            semaphore.close();
        }
    }

    /// Forgets devices nobody holds or waits for. Holders and waiters keep
    /// their own handle to the semaphore, so only idle entries have a count
    /// of one.
    pub(crate) fn prune(&self) {
        self.semaphores
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|_, semaphore| Arc::strong_count(semaphore) > 1);
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.semaphores.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
