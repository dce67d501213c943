//! The front door for dispatching requests by address.
//!
//! A [`Dispatcher`] is itself a [`Destination`]: it looks the request up in
//! its [`AddressBook`] and forwards to whatever it finds. Because of that,
//! dispatchers compose. One dispatcher can be registered as a destination
//! in another's address book.
//!
//! ```rust
//! use courier_core::{
//!     ConcurrentDestination, Destination, Dispatcher, DispatchError, ExecutionContext, Handler,
//!     Request, Response, RouteAddressBook, Sink,
//! };
//!
//! let book = RouteAddressBook::new().with(
//!     "/echo",
//!     ConcurrentDestination::new(Handler::auto_locked(|request: Request| async move {
//!         Response::ok(request.body().clone())
//!     })),
//! );
//! let dispatcher = Dispatcher::new(book);
//!
//! # tokio_test::block_on(async {
//! let ctx = ExecutionContext::new();
//! let hit = dispatcher.call(&ctx, Request::new("/echo", "/", Sink::text("hi"))).await;
//! assert_eq!(hit.body().unwrap().as_str(), Some("hi"));
//!
//! let miss = dispatcher.call(&ctx, Request::new("/nowhere", "/", Sink::default())).await;
//! assert_eq!(miss.err(), Some(&DispatchError::DestNotFound("/nowhere".into())));
//! # });
//! ```

use std::fmt;

use async_trait::async_trait;
use tracing::{Instrument, Level, debug, span};

use crate::foundation::context::ExecutionContext;
use crate::foundation::error::{DispatchError, DispatchResult};
use crate::foundation::message::{Request, Response};
use crate::framework::address_book::AddressBook;
use crate::framework::destination::{BoxedDestination, Destination};

/// Routes requests to destinations found in an [`AddressBook`].
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync` whenever its address book is, and is meant
/// to be shared behind an `Arc`.
#[derive(Clone, Default)]
pub struct Dispatcher<B> {
    book: B,
}

impl<B: AddressBook> Dispatcher<B> {
    /// Creates a dispatcher over `book`.
    pub fn new(book: B) -> Self {
        Self { book }
    }

    /// Returns the address book.
    pub fn address_book(&self) -> &B {
        &self.book
    }

    fn resolve(&self, request: &Request) -> DispatchResult<BoxedDestination> {
        self.book.lookup(request).ok_or_else(|| {
            debug!(address = %request.address(), "no destination for address");
            DispatchError::DestNotFound(request.address().to_string())
        })
    }
}

#[async_trait]
impl<B: AddressBook> Destination for Dispatcher<B> {
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            address = %request.address(),
            protocol = %request.protocol()
        );

        async move {
            match self.resolve(&request) {
                Ok(destination) => destination.call(ctx, request).await,
                Err(err) => Response::error(err),
            }
        }
        .instrument(span)
        .await
    }

    fn send(&self, request: Request) -> DispatchResult<()> {
        let destination = self.resolve(&request)?;
        debug!(address = %request.address(), protocol = %request.protocol(), "forwarding send");
        destination.send(request)
    }
}

impl<B> fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}
