//! The single store connection shared by every operation of a client.

use tokio::sync::{Mutex, MutexGuard};

/// A store connection behind a binary lock.
///
/// The store is only reachable through [`Connection::lock`], so at most one
/// command is in flight at any instant. Operations take the lock for a single
/// command and drop it right after; two commands issued by the same operation
/// are not atomic with respect to other operations.
#[derive(Debug)]
pub struct Connection<S> {
    store: Mutex<S>,
}

impl<S> Connection<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Waits for exclusive access to the store.
    pub async fn lock(&self) -> MutexGuard<'_, S> {
        self.store.lock().await
    }
}
