//! The binary lock destinations use to serialize handler invocations.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A binary lock whose acquisition can be raced against cancellation.
///
/// The lock itself exposes no acquire/release API. It is taken through
/// [`ExecutionContext::acquire_or_cancel`](crate::ExecutionContext::acquire_or_cancel)
/// and given back through [`ExecutionContext::release`](crate::ExecutionContext::release),
/// so only the context that holds it can free it.
///
/// Clones share the same underlying lock.
#[derive(Clone, Default)]
pub struct CancellableLock {
    inner: Arc<Mutex<()>>,
}

impl CancellableLock {
    /// Creates a new, free lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if nobody holds the lock right now.
    ///
    /// The answer may be stale by the time the caller looks at it.
    pub fn is_free(&self) -> bool {
        self.inner.try_lock().is_ok()
    }

    /// Returns `true` if both handles refer to the same lock.
    pub fn same_lock(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Waits for the lock. Dropping the returned future before it resolves
    /// leaves the lock untouched.
    pub(crate) async fn lock(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.inner).lock_owned().await
    }
}

impl fmt::Debug for CancellableLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellableLock")
            .field("free", &self.is_free())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let lock = CancellableLock::new();
        assert!(lock.is_free());

        let guard = lock.lock().await;
        assert!(!lock.is_free());

        drop(guard);
        assert!(lock.is_free());
    }

    #[test]
    fn test_clones_share_state() {
        let a = CancellableLock::new();
        let b = a.clone();
        assert!(a.same_lock(&b));
        assert!(!a.same_lock(&CancellableLock::new()));
    }
}
