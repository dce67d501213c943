//! The destination contract and the local destination variants.
//!
//! A [`Destination`] accepts requests in two ways:
//!
//! - `call` runs the request in the caller's task and returns its
//!   [`Response`];
//! - `send` spawns the work under a fresh [`ExecutionContext`] and returns
//!   immediately. Only dispatch-time failures can be reported.
//!
//! The local variants differ in their serialization policy:
//!
//! | Variant | Lock | Ordering |
//! |---------|------|----------|
//! | [`ConcurrentDestination`] | a new free lock per call | none |
//! | [`LockedDestination`] | one shared lock | one handler at a time |
//! | [`MuxDestination`] | one shared lock across all protocols | one handler at a time |

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::foundation::context::ExecutionContext;
use crate::foundation::error::{DispatchError, DispatchResult};
use crate::foundation::lock::CancellableLock;
use crate::foundation::message::{Request, Response};
use crate::framework::handler::Handler;
use crate::framework::routing::Router;

/// An addressable unit that processes requests.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Processes `request` and returns its response.
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response;

    /// Starts processing `request` without waiting for it.
    ///
    /// The work runs under its own context, independent of any caller's
    /// cancellation. The response is discarded.
    fn send(&self, request: Request) -> DispatchResult<()>;
}

/// A shared, type-erased destination.
pub type BoxedDestination = Arc<dyn Destination>;

#[async_trait]
impl<D: Destination + ?Sized> Destination for Arc<D> {
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response {
        (**self).call(ctx, request).await
    }

    fn send(&self, request: Request) -> DispatchResult<()> {
        (**self).send(request)
    }
}

/// Spawns `handler` for `request` under a fresh context on the current
/// tokio runtime.
fn spawn_serve(handler: Handler, lock: CancellableLock, request: Request) -> DispatchResult<()> {
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|e| DispatchError::Spawn(e.to_string()))?;

    trace!(protocol = %request.protocol(), "spawning send");
    runtime.spawn(async move {
        let protocol = request.protocol().to_string();
        let ctx = ExecutionContext::new();
        let response = handler.serve(&ctx, &lock, request).await;
        if let Some(err) = response.err() {
            debug!(protocol = %protocol, error = %err, "send completed with error");
        }
    });
    Ok(())
}

// =============================================================================
// ConcurrentDestination
// =============================================================================

/// Runs every request immediately, with no serialization.
///
/// Each invocation receives its own, always-free lock, so auto-locked
/// handlers never wait.
#[derive(Debug, Clone)]
pub struct ConcurrentDestination {
    handler: Handler,
}

impl ConcurrentDestination {
    /// Creates a destination around `handler`.
    pub fn new(handler: Handler) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Destination for ConcurrentDestination {
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response {
        self.handler
            .serve(ctx, &CancellableLock::new(), request)
            .await
    }

    fn send(&self, request: Request) -> DispatchResult<()> {
        spawn_serve(self.handler.clone(), CancellableLock::new(), request)
    }
}

// =============================================================================
// LockedDestination
// =============================================================================

/// Serializes every request behind one shared lock.
///
/// A caller whose context is canceled while waiting gives up without ever
/// taking the lock, letting the next waiter proceed.
#[derive(Debug, Clone)]
pub struct LockedDestination {
    handler: Handler,
    lock: CancellableLock,
}

impl LockedDestination {
    /// Creates a destination around `handler` with a new lock.
    pub fn new(handler: Handler) -> Self {
        Self {
            handler,
            lock: CancellableLock::new(),
        }
    }

    /// Returns the destination's shared lock.
    pub fn lock(&self) -> &CancellableLock {
        &self.lock
    }
}

#[async_trait]
impl Destination for LockedDestination {
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response {
        self.handler.serve(ctx, &self.lock, request).await
    }

    fn send(&self, request: Request) -> DispatchResult<()> {
        spawn_serve(self.handler.clone(), self.lock.clone(), request)
    }
}

// =============================================================================
// MuxDestination
// =============================================================================

/// Routes requests by protocol to handlers that share one lock.
///
/// Useful when several request types guard the same mutable state.
///
/// # Example
///
/// ```rust
/// use courier_core::{Destination, ExecutionContext, MuxDestination, Request, Response, Sink};
///
/// let mux = MuxDestination::new();
/// mux.handle_locked("/greet", |request: Request| async move {
///     Response::ok(Sink::text(format!("hello {}", request.body())))
/// });
///
/// # tokio_test::block_on(async {
/// let response = mux
///     .call(&ExecutionContext::new(), Request::new("/", "/greet", Sink::text("bob")))
///     .await;
/// assert_eq!(response.body().unwrap().as_str(), Some("hello bob"));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MuxDestination {
    routes: Arc<Router<Handler>>,
    lock: CancellableLock,
}

impl MuxDestination {
    /// Creates a mux with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` to a protocol pattern.
    pub fn handle(&self, pattern: &str, handler: Handler) {
        debug!(pattern = %pattern, "binding protocol handler");
        self.routes.bind(pattern, handler);
    }

    /// Binds plain handler logic to a protocol pattern.
    pub fn handle_fn<F, Fut>(&self, pattern: &str, f: F)
    where
        F: Fn(ExecutionContext, CancellableLock, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle(pattern, Handler::plain(f));
    }

    /// Binds auto-locked handler logic to a protocol pattern.
    pub fn handle_locked<F, Fut>(&self, pattern: &str, f: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        self.handle(pattern, Handler::auto_locked(f));
    }

    /// Builder form of [`handle`](Self::handle).
    pub fn with(self, pattern: &str, handler: Handler) -> Self {
        self.handle(pattern, handler);
        self
    }

    /// Returns the bound protocol patterns, longest first.
    pub fn protocols(&self) -> Vec<String> {
        self.routes.patterns()
    }

    /// Returns the mux's shared lock.
    pub fn lock(&self) -> &CancellableLock {
        &self.lock
    }

    fn route(&self, request: &Request) -> DispatchResult<Handler> {
        self.routes.lookup(request.protocol()).ok_or_else(|| {
            debug!(protocol = %request.protocol(), "no handler for protocol");
            DispatchError::ProtocolNotImplemented(request.protocol().to_string())
        })
    }
}

#[async_trait]
impl Destination for MuxDestination {
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response {
        match self.route(&request) {
            Ok(handler) => handler.serve(ctx, &self.lock, request).await,
            Err(err) => Response::error(err),
        }
    }

    fn send(&self, request: Request) -> DispatchResult<()> {
        let handler = self.route(&request)?;
        spawn_serve(handler, self.lock.clone(), request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::sink::Sink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn request(protocol: &str) -> Request {
        Request::new("/", protocol, Sink::default())
    }

    fn sleepy(delay: Duration) -> Handler {
        Handler::auto_locked(move |_| async move {
            tokio::time::sleep(delay).await;
            Response::empty()
        })
    }

    async fn call_many<D>(dest: Arc<D>, count: usize) -> Duration
    where
        D: Destination + 'static,
    {
        let started = Instant::now();
        let tasks: Vec<_> = (0..count)
            .map(|_| {
                let dest = Arc::clone(&dest);
                tokio::spawn(async move { dest.call(&ExecutionContext::new(), request("/p")).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }
        started.elapsed()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_destination_overlaps() {
        let dest = Arc::new(ConcurrentDestination::new(sleepy(Duration::from_millis(30))));
        let elapsed = call_many(dest, 10).await;
        assert!(elapsed < Duration::from_millis(150), "took {elapsed:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_locked_destination_serializes() {
        let dest = Arc::new(LockedDestination::new(sleepy(Duration::from_millis(10))));
        let elapsed = call_many(dest, 10).await;
        assert!(elapsed >= Duration::from_millis(100), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_locked_destination_canceled_waiter() {
        let dest = Arc::new(LockedDestination::new(sleepy(Duration::from_millis(50))));

        let busy = {
            let dest = Arc::clone(&dest);
            tokio::spawn(async move { dest.call(&ExecutionContext::new(), request("/p")).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let ctx = ExecutionContext::with_timeout(Duration::from_millis(5));
        let response = dest.call(&ctx, request("/p")).await;
        assert_eq!(response.err(), Some(&DispatchError::ContextCanceled));

        assert!(busy.await.unwrap().is_ok());
        assert!(dest.lock().is_free());
    }

    #[tokio::test]
    async fn test_locked_send_runs_in_background() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handler = {
            let counter = Arc::clone(&counter);
            Handler::auto_locked(move |_| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Response::empty()
                }
            })
        };
        let dest = LockedDestination::new(handler);

        for _ in 0..3 {
            dest.send(request("/p")).unwrap();
        }

        for _ in 0..100 {
            if counter.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_send_without_runtime() {
        let dest = ConcurrentDestination::new(sleepy(Duration::ZERO));
        assert!(matches!(dest.send(request("/p")), Err(DispatchError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_mux_routes_by_protocol() {
        let mux = MuxDestination::new()
            .with(
                "/user/",
                Handler::auto_locked(|_| async { Response::ok(Sink::text("user")) }),
            )
            .with(
                "/user/admin/",
                Handler::auto_locked(|_| async { Response::ok(Sink::text("admin")) }),
            );

        let ctx = ExecutionContext::new();
        let user = mux.call(&ctx, request("/user/get")).await;
        let admin = mux.call(&ctx, request("/user/admin/get")).await;

        assert_eq!(user.body().unwrap().as_str(), Some("user"));
        assert_eq!(admin.body().unwrap().as_str(), Some("admin"));
        assert_eq!(mux.protocols(), vec!["/user/admin/", "/user/"]);
    }

    #[tokio::test]
    async fn test_mux_miss() {
        let mux = MuxDestination::new();

        let response = mux.call(&ExecutionContext::new(), request("/nope")).await;
        assert_eq!(
            response.err(),
            Some(&DispatchError::ProtocolNotImplemented("/nope".into()))
        );

        assert_eq!(
            mux.send(request("/nope")),
            Err(DispatchError::ProtocolNotImplemented("/nope".into()))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mux_serializes_across_protocols() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let mux = Arc::new(MuxDestination::new());
        for protocol in ["/a", "/b", "/c"] {
            let active = Arc::clone(&active);
            let overlaps = Arc::clone(&overlaps);
            mux.handle_locked(protocol, move |_| {
                let active = Arc::clone(&active);
                let overlaps = Arc::clone(&overlaps);
                async move {
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(Duration::from_millis(3)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Response::empty()
                }
            });
        }

        let tasks: Vec<_> = ["/a", "/b", "/c"]
            .iter()
            .cycle()
            .take(12)
            .map(|protocol| {
                let mux = Arc::clone(&mux);
                let protocol = protocol.to_string();
                tokio::spawn(async move { mux.call(&ExecutionContext::new(), request(&protocol)).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }
}
