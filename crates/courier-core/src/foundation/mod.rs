//! Foundation layer - payloads, envelopes, errors and the locking primitives.
//!
//! This module contains the building blocks every other layer depends on:
//! - Tagged payloads ([`Sink`]) and the request/response envelopes
//! - The error taxonomy ([`DispatchError`])
//! - The cancellable lock and the execution context that holds it

pub mod context;
pub mod error;
pub mod lock;
pub mod message;
pub mod sink;

pub use context::{Canceller, ExecutionContext};
pub use error::{DispatchError, DispatchResult};
pub use lock::CancellableLock;
pub use message::{Credentials, Request, Response};
pub use sink::{ContentType, Sink};
