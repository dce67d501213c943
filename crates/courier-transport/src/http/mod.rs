//! HTTP binding for remote destinations.
//!
//! This module provides the outbound client, the inbound bridge and the
//! wire conventions they share.

pub mod wire;

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{DefaultResolver, HttpResolver, RemoteDestination};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{HttpBridge, ListenerHandle, resolve_request, write_response};
