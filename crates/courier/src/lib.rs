//! # Courier
//!
//! A message dispatch layer: named destinations, reached through an address
//! book, serving request/response calls and fire-and-forget sends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌─────────────────────────────────────┐
//! │ HttpBridge  │────▶│ Dispatcher │────▶│ "/echo"   Mux (protocol → Handler)  │
//! │  (inbound)  │     │            │────▶│ "/jobs/"  Locked (one at a time)    │
//! └─────────────┘     └────────────┘────▶│ "/peer/"  Remote (HTTP to a peer)   │
//!                                        └─────────────────────────────────────┘
//! ```
//!
//! - **Runtime**: loads configuration, sets up logging, owns the address book
//!   and the inbound bridge
//! - **Dispatcher**: resolves a request's address to a destination
//!   (longest-prefix match) and forwards the call
//! - **Destinations**: concurrent, locked, protocol-multiplexed or remote
//! - **Handlers**: user logic; panics are contained and reported as errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder().build()?;
//!
//!     let echo = MuxDestination::new();
//!     echo.handle_locked("/say", |request: Request| async move {
//!         Response::ok(request.body().clone())
//!     });
//!     runtime.register("/echo", echo);
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `http-client` (default): remote destinations over HTTP
//! - `http-server` (default): the inbound HTTP bridge
//! - `json-log`: JSON log lines

pub use courier_core as core;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use courier_runtime::{CourierConfig, CourierRuntime, RuntimeError, RuntimeResult};

    // Messages and execution
    pub use courier_core::{
        CancellableLock, Canceller, ContentType, Credentials, DispatchError, DispatchResult,
        ExecutionContext, Request, Response, Sink,
    };

    // Destinations and routing
    pub use courier_core::{
        AddressBook, BoxedDestination, ConcurrentDestination, Destination, Dispatcher, Handler,
        LockedDestination, MuxDestination, RouteAddressBook,
    };

    #[cfg(feature = "http-client")]
    pub use courier_transport::RemoteDestination;
    #[cfg(feature = "http-server")]
    pub use courier_transport::HttpBridge;
}
