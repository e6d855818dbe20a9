//! Single-flight lock for asynchronous mutating operations
//!
//! The remote API misbehaves when more than one asynchronous operation is
//! started at a time, so every mutating call is initiated while holding this
//! lock. The lock covers initiation only; completion polling happens after
//! release.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Shared single-flight lock.
///
/// Construct one per process at the orchestration root and hand clones to
/// every mutation call site; all clones contend on the same mutex.
#[derive(Debug, Clone, Default)]
pub struct AsyncOperationLock {
    inner: Arc<Mutex<()>>,
}

impl AsyncOperationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the lock is free, then take it on behalf of `owner`.
    pub async fn acquire(&self, owner: impl Into<String>) -> AsyncOperationGuard {
        let owner = owner.into();

        tracing::debug!("{} acquiring global asynchronous operation lock...", owner);
        let guard = Arc::clone(&self.inner).lock_owned().await;
        tracing::debug!("{} acquired global asynchronous operation lock.", owner);

        AsyncOperationGuard {
            owner,
            guard: Some(guard),
        }
    }

    /// Whether some holder currently has the lock
    pub fn is_locked(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

/// A held acquisition of [`AsyncOperationLock`].
///
/// Released by the first call to [`release`](Self::release), or on drop.
#[derive(Debug)]
pub struct AsyncOperationGuard {
    owner: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl AsyncOperationGuard {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn is_released(&self) -> bool {
        self.guard.is_none()
    }

    /// Release the lock. Calls after the first have no effect.
    pub fn release(&mut self) {
        if let Some(guard) = self.guard.take() {
            tracing::debug!(
                "{} releasing global asynchronous operation lock...",
                self.owner
            );
            drop(guard);
            tracing::debug!("{} released global asynchronous operation lock.", self.owner);
        }
    }
}

impl Drop for AsyncOperationGuard {
    fn drop(&mut self) {
        self.release();
    }
}
