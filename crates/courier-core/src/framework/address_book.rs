//! Address resolution for the dispatcher.
//!
//! An [`AddressBook`] maps a request to the destination that should handle
//! it. The usual implementation is [`RouteAddressBook`], a longest-prefix
//! table over addresses. Closures work too, which is handy for destinations
//! that are created or loaded on demand:
//!
//! ```rust
//! use courier_core::{AddressBook, BoxedDestination, Request, Sink};
//!
//! let empty = |_: &Request| -> Option<BoxedDestination> { None };
//! assert!(empty.lookup(&Request::new("/svc", "/p", Sink::default())).is_none());
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::foundation::message::Request;
use crate::framework::destination::{BoxedDestination, Destination};
use crate::framework::routing::Router;

/// Resolves requests to destinations.
pub trait AddressBook: Send + Sync {
    /// Returns the destination for `request`, or `None` if nothing matches.
    fn lookup(&self, request: &Request) -> Option<BoxedDestination>;
}

impl<F> AddressBook for F
where
    F: Fn(&Request) -> Option<BoxedDestination> + Send + Sync,
{
    fn lookup(&self, request: &Request) -> Option<BoxedDestination> {
        self(request)
    }
}

impl<B: AddressBook + ?Sized> AddressBook for Arc<B> {
    fn lookup(&self, request: &Request) -> Option<BoxedDestination> {
        (**self).lookup(request)
    }
}

/// An address book backed by a longest-prefix [`Router`] over addresses.
///
/// Registration may happen while lookups are in flight.
#[derive(Default)]
pub struct RouteAddressBook {
    routes: Router<BoxedDestination>,
}

impl RouteAddressBook {
    /// Creates an empty address book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `destination` under an address pattern.
    ///
    /// Replaces any destination registered under the same pattern.
    pub fn register<D>(&self, pattern: &str, destination: D)
    where
        D: Destination + 'static,
    {
        self.register_boxed(pattern, Arc::new(destination));
    }

    /// Registers an already shared destination under an address pattern.
    pub fn register_boxed(&self, pattern: &str, destination: BoxedDestination) {
        if self.routes.bind(pattern, destination).is_some() {
            debug!(pattern = %pattern, "replaced destination");
        } else {
            debug!(pattern = %pattern, "registered destination");
        }
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<D>(self, pattern: &str, destination: D) -> Self
    where
        D: Destination + 'static,
    {
        self.register(pattern, destination);
        self
    }

    /// Removes the destination registered under `pattern`.
    pub fn unregister(&self, pattern: &str) -> Option<BoxedDestination> {
        self.routes.unbind(pattern)
    }

    /// Returns the registered address patterns, longest first.
    pub fn addresses(&self) -> Vec<String> {
        self.routes.patterns()
    }

    /// Returns the number of registered destinations.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl AddressBook for RouteAddressBook {
    fn lookup(&self, request: &Request) -> Option<BoxedDestination> {
        self.routes.lookup(request.address())
    }
}

impl fmt::Debug for RouteAddressBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteAddressBook")
            .field("addresses", &self.addresses())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::message::Response;
    use crate::foundation::sink::Sink;
    use crate::framework::destination::ConcurrentDestination;
    use crate::framework::handler::Handler;
    use crate::ExecutionContext;

    fn replying(text: &'static str) -> ConcurrentDestination {
        ConcurrentDestination::new(Handler::auto_locked(move |_| async move {
            Response::ok(Sink::text(text))
        }))
    }

    fn request(address: &str) -> Request {
        Request::new(address, "/p", Sink::default())
    }

    async fn reply_of(book: &dyn AddressBook, address: &str) -> Option<String> {
        let dest = book.lookup(&request(address))?;
        let response = dest.call(&ExecutionContext::new(), request(address)).await;
        response.body().map(|b| b.to_string())
    }

    #[tokio::test]
    async fn test_longest_address_wins() {
        let book = RouteAddressBook::new()
            .with("/svc/", replying("svc"))
            .with("/svc/users/", replying("users"));

        assert_eq!(reply_of(&book, "/svc/users/42").await.as_deref(), Some("users"));
        assert_eq!(reply_of(&book, "/svc/orders").await.as_deref(), Some("svc"));
        assert!(book.lookup(&request("/other")).is_none());
        assert_eq!(book.addresses(), vec!["/svc/users/", "/svc/"]);
    }

    #[tokio::test]
    async fn test_unregister() {
        let book = RouteAddressBook::new().with("/svc", replying("svc"));
        assert_eq!(book.len(), 1);

        assert!(book.unregister("/svc").is_some());
        assert!(book.is_empty());
        assert!(book.lookup(&request("/svc")).is_none());
    }

    #[tokio::test]
    async fn test_closure_and_arc_books() {
        let shared: BoxedDestination = Arc::new(replying("lazy"));
        let factory = move |request: &Request| -> Option<BoxedDestination> {
            request
                .address()
                .starts_with("/lazy")
                .then(|| Arc::clone(&shared))
        };
        let book = Arc::new(factory);

        assert_eq!(reply_of(&book, "/lazy/1").await.as_deref(), Some("lazy"));
        assert!(book.lookup(&request("/eager")).is_none());
    }
}
