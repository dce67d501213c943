//! # Courier Core
//!
//! The dispatch engine of the Courier message layer.
//!
//! This crate provides request/response envelopes, cancellable locking,
//! fault-isolating handlers, and the destinations and dispatcher that route
//! requests to them.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Payloads**: Content-tagged byte buffers ([`Sink`], [`ContentType`])
//! - **Envelopes**: [`Request`] and [`Response`]
//! - **Errors**: The [`DispatchError`] taxonomy
//! - **Locking**: [`CancellableLock`] and the [`ExecutionContext`] that holds it
//!
//! ### Framework Layer
//!
//! - **Handlers**: Panic containment and auto-locking ([`Handler`])
//! - **Destinations**: [`ConcurrentDestination`], [`LockedDestination`],
//!   [`MuxDestination`]
//! - **Routing**: Longest-prefix [`Router`], [`AddressBook`], [`Dispatcher`]
//! - **Tower Integration**: [`DestinationService`]
//!
//! ## Request Flow
//!
//! ```text
//! ┌────────┐     ┌────────────┐     ┌─────────────┐     ┌─────────┐
//! │ caller │────▶│ Dispatcher │────▶│ Destination │────▶│ Handler │
//! └────────┘     └────────────┘     └─────────────┘     └─────────┘
//!                   address            protocol            lock
//! ```
//!
//! ## Example
//!
//! ```rust
//! use courier_core::prelude::*;
//!
//! let mux = MuxDestination::new();
//! mux.handle_locked("/upper", |request: Request| async move {
//!     Response::ok(Sink::text(request.body().to_text_lossy().to_uppercase()))
//! });
//!
//! let dispatcher = Dispatcher::new(RouteAddressBook::new().with("/text/", mux));
//!
//! # tokio_test::block_on(async {
//! let response = dispatcher
//!     .call(
//!         &ExecutionContext::new(),
//!         Request::new("/text/tools", "/upper", Sink::text("shout")),
//!     )
//!     .await;
//! assert_eq!(response.body().unwrap().as_str(), Some("SHOUT"));
//! # });
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;

// Re-export foundation types
pub use foundation::{
    CancellableLock, Canceller, ContentType, Credentials, DispatchError, DispatchResult,
    ExecutionContext, Request, Response, Sink,
};

// Re-export framework types
pub use framework::{
    AddressBook, BoxedDestination, ConcurrentDestination, Destination, DestinationService,
    Dispatcher, Handler, LockedDestination, MuxDestination, RouteAddressBook, Router,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::framework::{
        AddressBook, BoxedDestination, ConcurrentDestination, Destination, DestinationService,
        Dispatcher, Handler, LockedDestination, MuxDestination, RouteAddressBook, Router,
    };
}
