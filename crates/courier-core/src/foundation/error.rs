//! Unified error types for the Courier dispatch layer.
//!
//! Every failure that can reach a caller is a [`DispatchError`]. For `call`
//! it sits in the error slot of a [`Response`](crate::Response); for `send`
//! and address lookup it is returned directly.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::RefCell;
use std::panic;
use std::sync::Once;

use thiserror::Error;

/// Errors produced along the dispatch path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A mux destination has no handler for the request's protocol.
    #[error("protocol '{0}' not implemented")]
    ProtocolNotImplemented(String),

    /// The address book has no destination for the request's address.
    #[error("destination '{0}' not found")]
    DestNotFound(String),

    /// Lock acquisition lost the race against context cancellation.
    #[error("context canceled")]
    ContextCanceled,

    /// A handler panicked; the panic was contained at the handler boundary.
    ///
    /// Only `detail` is part of the message; `stack` stays local.
    #[error("handler panicked: {detail}")]
    Panic {
        /// The panic payload rendered as text.
        detail: String,
        /// Backtrace of the panicking thread, empty unless `RUST_BACKTRACE`
        /// enabled capture.
        stack: String,
    },

    /// A remote call returned a non-success status.
    #[error("remote status {code} {text}")]
    TransportStatus {
        /// The wire status code.
        code: u16,
        /// The standard reason phrase for `code`.
        text: String,
    },

    /// The remote round trip failed before a status was received.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The request could not be turned into a wire request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The destination has no asynchronous delivery path.
    #[error("send is not supported by destination '{0}'")]
    SendUnsupported(String),

    /// Fire-and-forget work could not be spawned.
    #[error("failed to spawn send: {0}")]
    Spawn(String),

    /// Application-level failure reported by a handler.
    #[error("{0}")]
    Handler(String),
}

impl DispatchError {
    /// Creates a handler error.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::Handler(msg.into())
    }

    /// Converts a caught panic payload into [`DispatchError::Panic`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };

        Self::Panic {
            detail,
            stack: take_panic_stack().unwrap_or_default(),
        }
    }

    /// Returns `true` for [`DispatchError::ContextCanceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::ContextCanceled)
    }

    /// Returns the wire status code for [`DispatchError::TransportStatus`].
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::TransportStatus { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

thread_local! {
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

static PANIC_HOOK: Once = Once::new();

/// Installs, once per process, a panic hook that records the backtrace of
/// the panicking thread for [`DispatchError::from_panic`].
///
/// Capture follows `RUST_BACKTRACE`. The previously installed hook still
/// runs after the backtrace is recorded.
pub(crate) fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::capture();
            let stack = (stack.status() == BacktraceStatus::Captured).then(|| stack.to_string());
            PANIC_STACK.with(|slot| *slot.borrow_mut() = stack);
            previous(info);
        }));
    });
}

/// Takes the backtrace recorded for the latest panic on this thread.
fn take_panic_stack() -> Option<String> {
    PANIC_STACK.with(|slot| slot.borrow_mut().take())
}
