//! Courier Runtime - Orchestration layer for Courier nodes.
//!
//! This crate provides:
//! - Layered configuration (`ConfigLoader`, `CourierConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Node orchestration (`CourierRuntime`): the address book, the
//!   dispatcher over it, configured remotes and the inbound HTTP bridge
//!
//! # Transport Features
//!
//! - `http-client` (default): remotes listed in the configuration are
//!   registered as HTTP destinations
//! - `http-server` (default): a `[server]` section starts the HTTP bridge
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::builder().build()?;
//!
//!     runtime.register("/echo", echo_destination());
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, DispatchConfig, LoggingConfig,
    RemoteConfig, ServerConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CourierRuntime, NodeDispatcher, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// Provides the common logging macros plus `Level`.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
