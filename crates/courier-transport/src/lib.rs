//! # Courier Transport
//!
//! Network transport for the Courier message layer.
//!
//! This crate lets destinations live on other nodes. It supports the two
//! sides of the HTTP binding through feature flags.
//!
//! ## Features
//!
//! - `http-client` (default): [`RemoteDestination`], a destination that
//!   forwards calls to a peer
//! - `http-server` (default): [`HttpBridge`], which serves a local
//!   destination to peers
//! - `full`: Both sides
//!
//! ## Architecture
//!
//! ```text
//!  node A                                         node B
//! ┌────────────┐   ┌───────────────────┐  POST   ┌────────────┐   ┌────────────┐
//! │ Dispatcher │──▶│ RemoteDestination │────────▶│ HttpBridge │──▶│ Dispatcher │
//! └────────────┘   └───────────────────┘         └────────────┘   └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_transport::{HttpBridge, RemoteDestination};
//!
//! // Node B: expose a dispatcher.
//! let handle = HttpBridge::listen("0.0.0.0:7000", dispatcher).await?;
//!
//! // Node A: route an address prefix to node B.
//! book.register("/node-b/", RemoteDestination::new("http://node-b:7000")?);
//! ```

pub mod error;

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-client")]
pub use http::{DefaultResolver, HttpResolver, RemoteDestination};

#[cfg(feature = "http-server")]
pub use http::{HttpBridge, ListenerHandle};
