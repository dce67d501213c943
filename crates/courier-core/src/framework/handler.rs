//! Fault-isolating handler wrappers.
//!
//! A [`Handler`] is the processing logic a destination runs for a request.
//! It comes in two flavors:
//!
//! - [`Handler::plain`] wraps logic that receives the execution context and
//!   the destination lock and decides itself whether and when to lock;
//! - [`Handler::auto_locked`] wraps logic that only sees the request. The
//!   wrapper acquires the destination lock first and releases it after the
//!   logic returns or panics.
//!
//! Either way, [`Handler::serve`] always returns a [`Response`]. A panic in
//! the wrapped logic becomes a [`DispatchError::Panic`] response.
//!
//! # Example
//!
//! ```rust
//! use courier_core::{CancellableLock, ExecutionContext, Handler, Request, Response, Sink};
//!
//! let echo = Handler::auto_locked(|request: Request| async move {
//!     Response::ok(request.body().clone())
//! });
//!
//! # tokio_test::block_on(async {
//! let response = echo
//!     .serve(
//!         &ExecutionContext::new(),
//!         &CancellableLock::new(),
//!         Request::new("/", "/echo", Sink::text("ping")),
//!     )
//!     .await;
//! assert_eq!(response.body().unwrap().as_str(), Some("ping"));
//! # });
//! ```

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use crate::foundation::context::ExecutionContext;
use crate::foundation::error::{DispatchError, install_panic_hook};
use crate::foundation::lock::CancellableLock;
use crate::foundation::message::{Request, Response};

/// Type-erased logic of a plain handler.
pub type ServeFn =
    Arc<dyn Fn(ExecutionContext, CancellableLock, Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Type-erased logic of an auto-locked handler.
pub type LockedFn = Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>;

/// Processing logic wrapped for fault containment.
#[derive(Clone)]
pub enum Handler {
    /// Logic that manages locking itself.
    Plain(ServeFn),
    /// Logic that runs with the destination lock held.
    AutoLocked(LockedFn),
}

impl Handler {
    /// Wraps logic that receives the context and the destination lock.
    ///
    /// The logic is responsible for pairing any `acquire_or_cancel` with a
    /// `release`.
    pub fn plain<F, Fut>(f: F) -> Self
    where
        F: Fn(ExecutionContext, CancellableLock, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self::Plain(Arc::new(move |ctx, lock, request| f(ctx, lock, request).boxed()))
    }

    /// Wraps logic that runs with the destination lock held.
    ///
    /// If the context is canceled before the lock is obtained, the logic is
    /// not invoked and the response carries [`DispatchError::ContextCanceled`].
    pub fn auto_locked<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self::AutoLocked(Arc::new(move |request| f(request).boxed()))
    }

    /// Returns `true` for the auto-locked flavor.
    pub fn is_auto_locked(&self) -> bool {
        matches!(self, Self::AutoLocked(_))
    }

    /// Runs the handler for `request`.
    ///
    /// Never panics on behalf of the wrapped logic. Locks the logic acquired
    /// on `ctx` and did not release because it panicked are released before
    /// this returns.
    pub async fn serve(
        &self,
        ctx: &ExecutionContext,
        lock: &CancellableLock,
        request: Request,
    ) -> Response {
        install_panic_hook();
        let depth = ctx.held_count();
        let protocol = request.protocol().to_string();

        let outcome = match self {
            Self::Plain(f) => {
                let call = {
                    let f = Arc::clone(f);
                    let ctx = ctx.clone();
                    let lock = lock.clone();
                    async move { f(ctx, lock, request).await }
                };
                AssertUnwindSafe(call).catch_unwind().await
            }
            Self::AutoLocked(f) => {
                if !ctx.acquire_or_cancel(lock).await {
                    return Response::error(DispatchError::ContextCanceled);
                }
                let call = {
                    let f = Arc::clone(f);
                    async move { f(request).await }
                };
                let outcome = AssertUnwindSafe(call).catch_unwind().await;
                let held = ctx.held_count();
                if outcome.is_ok() && held > depth + 1 {
                    warn!(
                        protocol = %protocol,
                        leaked = held - depth - 1,
                        "handler returned while still holding locks"
                    );
                }
                // Also drops anything the logic leaked above the destination lock.
                ctx.release_to(depth);
                outcome
            }
        };

        match outcome {
            Ok(response) => {
                let held = ctx.held_count();
                if held > depth {
                    warn!(
                        protocol = %protocol,
                        leaked = held - depth,
                        "handler returned while still holding locks"
                    );
                }
                response
            }
            Err(payload) => {
                ctx.release_to(depth);
                let err = DispatchError::from_panic(payload);
                error!(protocol = %protocol, error = %err, "handler panicked");
                if let DispatchError::Panic { stack, .. } = &err {
                    if !stack.is_empty() {
                        debug!(protocol = %protocol, "panic backtrace:\n{stack}");
                    }
                }
                Response::error(err)
            }
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Handler::Plain"),
            Self::AutoLocked(_) => f.write_str("Handler::AutoLocked"),
        }
    }
}
