//! Tower integration.
//!
//! [`DestinationService`] wraps any [`Destination`] as a
//! `tower::Service<Request>`, so tower middleware can sit in front of it:
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tower::limit::ConcurrencyLimitLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(ConcurrencyLimitLayer::new(64))
//!     .service(DestinationService::new(dispatcher));
//! ```
//!
//! Every call runs under a fresh [`ExecutionContext`]. Failures travel
//! inside the [`Response`], so the service error type is [`Infallible`].

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::Service;

use crate::foundation::context::ExecutionContext;
use crate::foundation::message::{Request, Response};
use crate::framework::destination::Destination;

/// The future returned by [`DestinationService`].
pub type ServiceFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

/// A [`Destination`] exposed as a tower service.
#[derive(Debug)]
pub struct DestinationService<D> {
    destination: Arc<D>,
    timeout: Option<Duration>,
}

impl<D> DestinationService<D> {
    /// Wraps `destination`.
    pub fn new(destination: D) -> Self {
        Self::from_arc(Arc::new(destination))
    }

    /// Wraps an already shared destination.
    pub fn from_arc(destination: Arc<D>) -> Self {
        Self {
            destination,
            timeout: None,
        }
    }

    /// Cancels each call's context after `timeout`.
    ///
    /// A timeout carried by the request itself takes precedence.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl<D> Clone for DestinationService<D> {
    fn clone(&self) -> Self {
        Self {
            destination: Arc::clone(&self.destination),
            timeout: self.timeout,
        }
    }
}

impl<D> Service<Request> for DestinationService<D>
where
    D: Destination + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = ServiceFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let destination = Arc::clone(&self.destination);
        let timeout = request.timeout().or(self.timeout);

        Box::pin(async move {
            let ctx = match timeout {
                Some(timeout) => ExecutionContext::with_timeout(timeout),
                None => ExecutionContext::new(),
            };
            Ok(destination.call(&ctx, request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::DispatchError;
    use crate::foundation::sink::Sink;
    use crate::framework::destination::LockedDestination;
    use crate::framework::handler::Handler;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_service_calls_destination() {
        let dest = LockedDestination::new(Handler::auto_locked(|request: Request| async move {
            Response::ok(request.body().clone())
        }));

        let response = DestinationService::new(dest)
            .oneshot(Request::new("/", "/echo", Sink::text("via tower")))
            .await
            .unwrap();

        assert_eq!(response.body().unwrap().as_str(), Some("via tower"));
    }

    #[tokio::test]
    async fn test_service_timeout_cancels_waiters() {
        let dest = Arc::new(LockedDestination::new(Handler::auto_locked(|_| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Response::empty()
        })));
        let service = DestinationService::from_arc(Arc::clone(&dest))
            .with_timeout(Duration::from_millis(10));

        let first = tokio::spawn(
            service
                .clone()
                .oneshot(Request::new("/", "/slow", Sink::default())),
        );
        tokio::time::sleep(Duration::from_millis(2)).await;

        let second = service
            .oneshot(Request::new("/", "/slow", Sink::default()))
            .await
            .unwrap();
        assert_eq!(second.err(), Some(&DispatchError::ContextCanceled));

        // The running handler is not interrupted by its own timeout.
        assert!(first.await.unwrap().unwrap().is_ok());
    }
}
