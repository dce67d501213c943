//! Execution scopes for dispatch operations.
//!
//! An [`ExecutionContext`] is created per logical `call` (by the caller) or
//! per spawned `send` (by the destination). It owns two things:
//!
//! - a one-shot, broadcast cancellation signal, fired explicitly through a
//!   [`Canceller`] or by a timer;
//! - a LIFO stack of the [`CancellableLock`]s it currently holds.
//!
//! # Scoped acquisition
//!
//! Every successful [`acquire_or_cancel`](ExecutionContext::acquire_or_cancel)
//! must be paired with a [`release`](ExecutionContext::release) in the same
//! scope. Releases pop the most recently acquired lock first.
//!
//! ```rust
//! use courier_core::{CancellableLock, ExecutionContext};
//!
//! # tokio_test::block_on(async {
//! let lock = CancellableLock::new();
//! let ctx = ExecutionContext::new();
//!
//! if ctx.acquire_or_cancel(&lock).await {
//!     // ... exclusive section ...
//!     ctx.release();
//! }
//! assert!(lock.is_free());
//! # });
//! ```
//!
//! The context performs no deadlock detection. Taking two locks in
//! different orders from two contexts can deadlock; hold at most one lock
//! per context unless the order is fixed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace, warn};

use crate::foundation::lock::CancellableLock;

/// The one-shot trigger for an [`ExecutionContext`]'s cancellation signal.
///
/// `cancel` consumes the trigger, so a context cannot be signaled twice
/// through it.
pub struct Canceller {
    token: CancellationToken,
}

impl Canceller {
    /// Fires the cancellation signal.
    ///
    /// Every pending and future `acquire_or_cancel` on the context (and its
    /// clones) returns `false` afterwards. A handler already running is not
    /// interrupted.
    pub fn cancel(self) {
        debug!("execution context canceled");
        self.token.cancel();
    }
}

impl fmt::Debug for Canceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceller")
            .field("fired", &self.token.is_cancelled())
            .finish()
    }
}

struct ContextInner {
    cancel: CancellationToken,
    held: Mutex<Vec<OwnedMutexGuard<()>>>,
    /// Stops the timeout timer when the context goes away.
    _timer: Option<DropGuard>,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        let held = self.held.get_mut();
        if !held.is_empty() {
            warn!(
                held = held.len(),
                "execution context dropped while holding locks, releasing"
            );
            while let Some(guard) = held.pop() {
                drop(guard);
            }
        }
    }
}

/// Per-operation scope: cancellation signal plus the stack of held locks.
///
/// Clones refer to the same scope.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    /// Creates a context that is never canceled.
    pub fn new() -> Self {
        Self::from_parts(CancellationToken::new(), None)
    }

    /// Creates a context together with its cancellation trigger.
    pub fn with_cancel() -> (Self, Canceller) {
        let token = CancellationToken::new();
        let ctx = Self::from_parts(token.clone(), None);
        (ctx, Canceller { token })
    }

    /// Creates a context that cancels itself after `timeout`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout(timeout: Duration) -> Self {
        let (ctx, _canceller) = Self::with_timeout_and_cancel(timeout);
        ctx
    }

    /// Creates a context that cancels itself after `timeout` or when the
    /// returned trigger fires, whichever comes first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_timeout_and_cancel(timeout: Duration) -> (Self, Canceller) {
        let token = CancellationToken::new();
        let stop = CancellationToken::new();

        let timer_token = token.clone();
        let timer_stop = stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(timeout) => {
                    trace!(?timeout, "execution context timed out");
                    timer_token.cancel();
                }
                () = timer_token.cancelled() => {}
                () = timer_stop.cancelled() => {}
            }
        });

        let ctx = Self::from_parts(token.clone(), Some(stop.drop_guard()));
        (ctx, Canceller { token })
    }

    fn from_parts(cancel: CancellationToken, timer: Option<DropGuard>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cancel,
                held: Mutex::new(Vec::new()),
                _timer: timer,
            }),
        }
    }

    /// Returns `true` once the cancellation signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Resolves when the cancellation signal fires.
    pub async fn cancelled(&self) {
        self.inner.cancel.cancelled().await;
    }

    /// Races acquisition of `lock` against this context's cancellation.
    ///
    /// Returns `true` with the lock pushed onto the held stack, or `false`
    /// with nothing changed if cancellation won. Once the context is
    /// canceled this always returns `false`, even for a free lock.
    pub async fn acquire_or_cancel(&self, lock: &CancellableLock) -> bool {
        let guard = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => {
                debug!("lock acquisition lost to cancellation");
                return false;
            }
            guard = lock.lock() => guard,
        };

        let depth = {
            let mut held = self.inner.held.lock();
            held.push(guard);
            held.len()
        };
        trace!(depth, "lock acquired");
        true
    }

    /// Releases the most recently acquired lock.
    ///
    /// # Panics
    ///
    /// Panics if the context holds no lock. Releasing a lock one does not
    /// hold is a programming error.
    pub fn release(&self) {
        let guard = self.inner.held.lock().pop();
        match guard {
            Some(guard) => {
                drop(guard);
                trace!(depth = self.held_count(), "lock released");
            }
            None => panic!("ExecutionContext::release called while holding no lock"),
        }
    }

    /// Releases every held lock, most recent first.
    ///
    /// Does nothing if no lock is held, so early-exit paths can call it
    /// unconditionally.
    pub fn release_all(&self) {
        self.release_to(0);
    }

    /// Releases locks until exactly `depth` remain held.
    pub(crate) fn release_to(&self, depth: usize) {
        let released = {
            let mut held = self.inner.held.lock();
            let keep = depth.min(held.len());
            held.split_off(keep)
        };
        if !released.is_empty() {
            trace!(count = released.len(), "releasing locks");
        }
        for guard in released.into_iter().rev() {
            drop(guard);
        }
    }

    /// Returns the number of locks currently held.
    pub fn held_count(&self) -> usize {
        self.inner.held.lock().len()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("cancelled", &self.is_cancelled())
            .field("held", &self.held_count())
            .finish()
    }
}
