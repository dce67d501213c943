//! Outbound side of the HTTP binding.
//!
//! A [`RemoteDestination`] forwards `call`s to a peer over HTTP. The request
//! is POSTed to `base_url + protocol`; building the wire request and
//! interpreting the wire response are delegated to an [`HttpResolver`], so
//! deployments with different conventions can plug in their own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{
    Credentials, Destination, DispatchError, DispatchResult, ExecutionContext, Request, Response,
    Sink,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode, Url};
use tracing::{debug, trace, warn};

use crate::error::{TransportError, TransportResult};
use crate::http::wire::{
    ADDRESS_HEADER, TIMEOUT_HEADER, content_type_from_wire, content_type_to_wire, format_duration,
};

/// Converts between dispatch envelopes and HTTP messages on the client side.
#[async_trait]
pub trait HttpResolver: Send + Sync {
    /// Builds the outbound wire request for `request`, targeting `url`.
    fn build_request(
        &self,
        client: &Client,
        url: &str,
        request: &Request,
    ) -> DispatchResult<RequestBuilder>;

    /// Converts the peer's wire response into a [`Response`].
    async fn resolve_response(&self, response: reqwest::Response) -> Response;
}

/// The standard wire conventions.
///
/// - body bytes with a mapped `Content-Type`;
/// - basic auth when the request carries credentials;
/// - `X-Dispatch-Timeout` when it carries a timeout;
/// - `X-Dispatch-Address` when its address is not empty.
///
/// Status 200 yields a successful response. Any other status yields a
/// [`DispatchError::TransportStatus`], with the body still attached when
/// the peer sent one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

#[async_trait]
impl HttpResolver for DefaultResolver {
    fn build_request(
        &self,
        client: &Client,
        url: &str,
        request: &Request,
    ) -> DispatchResult<RequestBuilder> {
        let body = request.body();
        let mut builder = client
            .post(url)
            .header(CONTENT_TYPE, content_type_to_wire(body.content_type()))
            .body(body.to_bytes());

        if let Some(credentials) = request.credentials() {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.header(TIMEOUT_HEADER, format_duration(timeout));
        }
        if !request.address().is_empty() {
            builder = builder.header(ADDRESS_HEADER, request.address());
        }
        Ok(builder)
    }

    async fn resolve_response(&self, response: reqwest::Response) -> Response {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(content_type_from_wire)
            .unwrap_or_default();

        let data = match response.bytes().await {
            Ok(data) => data,
            Err(e) => return Response::error(DispatchError::Transport(e.to_string())),
        };
        trace!(status = %status, len = data.len(), "resolved remote response");

        if status == StatusCode::OK {
            return Response::ok(Sink::new(content_type, data));
        }

        let error = DispatchError::TransportStatus {
            code: status.as_u16(),
            text: status.canonical_reason().unwrap_or_default().to_string(),
        };
        let body = (!data.is_empty()).then(|| Sink::new(content_type, data));
        Response::new(body, Some(error))
    }
}

/// A destination living on another node, reached over HTTP.
///
/// Only `call` is supported. `send` fails with
/// [`DispatchError::SendUnsupported`]. Wrap a `call` in a spawned task if
/// fire-and-forget delivery is needed.
///
/// # Example
///
/// ```rust,ignore
/// let remote = RemoteDestination::new("http://10.0.0.7:7000")?
///     .with_credentials(Credentials::new("node", "secret"));
/// book.register("/peers/7/", remote);
/// ```
#[derive(Clone)]
pub struct RemoteDestination {
    client: Client,
    base_url: String,
    resolver: Arc<dyn HttpResolver>,
    credentials: Option<Credentials>,
}

impl RemoteDestination {
    /// Creates a destination for the peer at `base_url`.
    pub fn new(base_url: &str) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Self::with_client(base_url, client)
    }

    /// Creates a destination with a request timeout applied by the client.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Self::with_client(base_url, client)
    }

    /// Creates a destination that reuses an existing client.
    pub fn with_client(base_url: &str, client: Client) -> TransportResult<Self> {
        let parsed = Url::parse(base_url).map_err(|e| TransportError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransportError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            resolver: Arc::new(DefaultResolver),
            credentials: None,
        })
    }

    /// Replaces the wire conventions.
    pub fn with_resolver<R: HttpResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// Sets credentials used when a request carries none of its own.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Returns the peer's base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the URL a request with `protocol` is posted to.
    pub fn url_for(&self, protocol: &str) -> String {
        if protocol.starts_with('/') {
            format!("{}{}", self.base_url, protocol)
        } else {
            format!("{}/{}", self.base_url, protocol)
        }
    }

    async fn exchange(&self, request: &Request) -> Response {
        let url = self.url_for(request.protocol());
        let builder = match self.resolver.build_request(&self.client, &url, request) {
            Ok(builder) => builder,
            Err(err) => return Response::error(err),
        };

        debug!(url = %url, "calling remote destination");
        match builder.send().await {
            Ok(response) => self.resolver.resolve_response(response).await,
            Err(e) => {
                warn!(url = %url, error = %e, "remote call failed");
                Response::error(DispatchError::Transport(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Destination for RemoteDestination {
    async fn call(&self, ctx: &ExecutionContext, request: Request) -> Response {
        if ctx.is_cancelled() {
            return Response::error(DispatchError::ContextCanceled);
        }

        let request = match (request.credentials(), &self.credentials) {
            (None, Some(credentials)) => request.with_credentials(credentials.clone()),
            _ => request,
        };

        tokio::select! {
            biased;
            () = ctx.cancelled() => {
                debug!(protocol = %request.protocol(), "remote call canceled");
                Response::error(DispatchError::ContextCanceled)
            }
            response = self.exchange(&request) => response,
        }
    }

    fn send(&self, request: Request) -> DispatchResult<()> {
        Err(DispatchError::SendUnsupported(request.address().to_string()))
    }
}

impl fmt::Debug for RemoteDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteDestination")
            .field("base_url", &self.base_url)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}
