//! Request and response envelopes.
//!
//! A [`Request`] is built once and then only read along the dispatch path.
//! A [`Response`] carries an optional body and an optional error; when the
//! error is present it decides the outcome regardless of the body.

use std::fmt;
use std::time::Duration;

use crate::foundation::error::DispatchError;
use crate::foundation::sink::Sink;

/// Basic-auth credentials attached to a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A request routed by address to a destination and by protocol to a handler.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use courier_core::{Request, Sink};
///
/// let request = Request::new("/users/42", "/profile/get", Sink::text("hi"))
///     .with_timeout(Duration::from_secs(2));
///
/// assert_eq!(request.address(), "/users/42");
/// assert_eq!(request.protocol(), "/profile/get");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    address: String,
    protocol: String,
    body: Sink,
    credentials: Option<Credentials>,
    timeout: Option<Duration>,
}

impl Request {
    /// Creates a request for `protocol` at `address`.
    pub fn new(address: impl Into<String>, protocol: impl Into<String>, body: Sink) -> Self {
        Self {
            address: address.into(),
            protocol: protocol.into(),
            body,
            credentials: None,
            timeout: None,
        }
    }

    /// Attaches credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Attaches a processing timeout hint.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The address used to select a destination.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The protocol used to select a handler.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The request body.
    pub fn body(&self) -> &Sink {
        &self.body
    }

    /// Attached credentials, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Attached timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

/// The outcome of a `call`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    error: Option<DispatchError>,
    body: Option<Sink>,
}

impl Response {
    /// Creates a response from its parts.
    pub fn new(body: Option<Sink>, error: Option<DispatchError>) -> Self {
        Self { error, body }
    }

    /// Creates a successful response with a body.
    pub fn ok(body: Sink) -> Self {
        Self {
            error: None,
            body: Some(body),
        }
    }

    /// Creates a successful response without a body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a failed response.
    pub fn error(error: DispatchError) -> Self {
        Self {
            error: Some(error),
            body: None,
        }
    }

    /// Returns `true` when no error is set.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The error, if the call failed.
    pub fn err(&self) -> Option<&DispatchError> {
        self.error.as_ref()
    }

    /// The body, if any. May be present on failed responses too.
    pub fn body(&self) -> Option<&Sink> {
        self.body.as_ref()
    }

    /// Splits the response into its body and error.
    pub fn into_parts(self) -> (Option<Sink>, Option<DispatchError>) {
        (self.body, self.error)
    }

    /// Converts into a `Result`, dropping the body on failure.
    pub fn into_result(self) -> Result<Option<Sink>, DispatchError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.body),
        }
    }
}

impl From<DispatchError> for Response {
    fn from(err: DispatchError) -> Self {
        Self::error(err)
    }
}

impl From<Sink> for Response {
    fn from(body: Sink) -> Self {
        Self::ok(body)
    }
}

impl From<Result<Sink, DispatchError>> for Response {
    fn from(result: Result<Sink, DispatchError>) -> Self {
        match result {
            Ok(body) => Self::ok(body),
            Err(err) => Self::error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = Request::new("/a", "/p", Sink::text("x"))
            .with_credentials(Credentials::new("user", "secret"))
            .with_timeout(Duration::from_millis(250));

        assert_eq!(request.credentials().unwrap().username, "user");
        assert_eq!(request.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(request.body().as_str(), Some("x"));
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("user", "secret"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("secret"));
    }

    #[test]
    fn test_error_is_authoritative() {
        let response = Response::new(
            Some(Sink::text("partial")),
            Some(DispatchError::handler("failed")),
        );
        assert!(!response.is_ok());
        assert_eq!(response.body().unwrap().as_str(), Some("partial"));
        assert!(response.into_result().is_err());
    }

    #[test]
    fn test_from_result() {
        let ok: Response = Ok::<_, DispatchError>(Sink::text("fine")).into();
        assert!(ok.is_ok());

        let failed: Response = Err::<Sink, _>(DispatchError::ContextCanceled).into();
        assert_eq!(failed.err(), Some(&DispatchError::ContextCanceled));
    }
}
