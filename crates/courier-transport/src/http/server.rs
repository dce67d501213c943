//! Inbound side of the HTTP binding.
//!
//! [`HttpBridge`] exposes a local [`Destination`] to remote peers. Every
//! POST becomes a [`Request`] (protocol = request path) which is `call`ed
//! on the destination under a context carrying the caller's timeout. The
//! response goes back with a status derived from its error:
//!
//! | Error | Status |
//! |-------|--------|
//! | none | 200 |
//! | `TransportStatus` | its own code |
//! | `DestNotFound`, `ProtocolNotImplemented` | 404 |
//! | `ContextCanceled` | 503 |
//! | anything else | 500 |

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as HttpResponse};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use courier_core::{
    BoxedDestination, Credentials, Destination, DispatchError, ExecutionContext, Request,
    Response, Sink,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace};

use crate::error::{TransportError, TransportResult};
use crate::http::wire::{
    ADDRESS_HEADER, TEXT_PLAIN, TIMEOUT_HEADER, content_type_from_wire, content_type_to_wire,
    parse_duration,
};

/// Handle to a running bridge listener.
///
/// Dropping the handle stops the listener.
#[derive(Debug)]
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

struct BridgeState {
    destination: BoxedDestination,
}

/// Serves a destination over HTTP.
pub struct HttpBridge;

impl HttpBridge {
    /// Binds `addr` and starts serving `destination`.
    pub async fn listen<D>(addr: &str, destination: D) -> TransportResult<ListenerHandle>
    where
        D: Destination + 'static,
    {
        Self::listen_boxed(addr, Arc::new(destination)).await
    }

    /// Like [`listen`](Self::listen), for an already shared destination.
    pub async fn listen_boxed(
        addr: &str,
        destination: BoxedDestination,
    ) -> TransportResult<ListenerHandle> {
        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| TransportError::Bind {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;
        let local_addr = listener.local_addr()?;

        let router = Router::new()
            .fallback(bridge_handler)
            .with_state(Arc::new(BridgeState { destination }));

        info!(addr = %local_addr, "HTTP bridge listening");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                info!(addr = %local_addr, "HTTP bridge shutting down");
            });
            if let Err(e) = server.await {
                error!(error = %e, "HTTP bridge error");
            }
        });

        Ok(ListenerHandle {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

async fn bridge_handler(
    State(state): State<Arc<BridgeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> HttpResponse {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let request = resolve_request(&uri, &headers, body);
    trace!(
        address = %request.address(),
        protocol = %request.protocol(),
        len = request.body().len(),
        "received bridged request"
    );

    let ctx = match request.timeout() {
        Some(timeout) => ExecutionContext::with_timeout(timeout),
        None => ExecutionContext::new(),
    };
    let response = state.destination.call(&ctx, request).await;
    write_response(response)
}

/// Converts an inbound HTTP request into a [`Request`].
pub fn resolve_request(uri: &Uri, headers: &HeaderMap, body: Bytes) -> Request {
    let protocol = uri.path();
    let address = header_str(headers, ADDRESS_HEADER).unwrap_or(protocol);
    let content_type = header_str(headers, CONTENT_TYPE.as_str())
        .map(content_type_from_wire)
        .unwrap_or_default();

    let mut request = Request::new(address, protocol, Sink::new(content_type, body));
    if let Some(credentials) = parse_basic_auth(headers) {
        request = request.with_credentials(credentials);
    }
    let timeout = header_str(headers, TIMEOUT_HEADER)
        .and_then(parse_duration)
        .filter(|t| !t.is_zero());
    if let Some(timeout) = timeout {
        request = request.with_timeout(timeout);
    }
    request
}

/// Converts a [`Response`] into the HTTP response sent back to the peer.
pub fn write_response(response: Response) -> HttpResponse {
    let (body, error) = response.into_parts();

    let status = match &error {
        None => StatusCode::OK,
        Some(err) => status_for(err),
    };
    if let Some(err) = &error {
        debug!(status = %status, error = %err, "bridged call failed");
    }

    match (body, error) {
        (Some(sink), _) => {
            let content_type = HeaderValue::from_static(content_type_to_wire(sink.content_type()));
            (status, [(CONTENT_TYPE, content_type)], Body::from(sink.to_bytes())).into_response()
        }
        (None, Some(err)) => (
            status,
            [(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN))],
            err.to_string(),
        )
            .into_response(),
        (None, None) => status.into_response(),
    }
}

fn status_for(err: &DispatchError) -> StatusCode {
    match err {
        DispatchError::TransportStatus { code, .. } => {
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        DispatchError::DestNotFound(_) | DispatchError::ProtocolNotImplemented(_) => {
            StatusCode::NOT_FOUND
        }
        DispatchError::ContextCanceled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_basic_auth(headers: &HeaderMap) -> Option<Credentials> {
    let value = header_str(headers, AUTHORIZATION.as_str())?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(Credentials::new(username, password))
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ContentType;
    use std::time::Duration;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_resolve_request_full() {
        let uri: Uri = "/profile/get?x=1".parse().unwrap();
        let headers = headers(&[
            ("content-type", "text/plain; charset=utf-8"),
            ("x-dispatch-address", "/users/42"),
            ("x-dispatch-timeout", "250ms"),
            ("authorization", "Basic YWxpY2U6c2VjcmV0"),
        ]);

        let request = resolve_request(&uri, &headers, Bytes::from_static(b"hello"));

        assert_eq!(request.protocol(), "/profile/get");
        assert_eq!(request.address(), "/users/42");
        assert_eq!(request.body().content_type(), ContentType::Text);
        assert_eq!(request.body().as_str(), Some("hello"));
        assert_eq!(request.timeout(), Some(Duration::from_millis(250)));
        assert_eq!(
            request.credentials(),
            Some(&Credentials::new("alice", "secret"))
        );
    }

    #[test]
    fn test_resolve_request_defaults() {
        let uri: Uri = "/echo".parse().unwrap();
        let headers = headers(&[("x-dispatch-timeout", "soon"), ("authorization", "Bearer t")]);

        let request = resolve_request(&uri, &headers, Bytes::new());

        assert_eq!(request.address(), "/echo");
        assert_eq!(request.body().content_type(), ContentType::Bytes);
        assert!(request.timeout().is_none());
        assert!(request.credentials().is_none());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (DispatchError::DestNotFound("/x".into()), StatusCode::NOT_FOUND),
            (
                DispatchError::ProtocolNotImplemented("/p".into()),
                StatusCode::NOT_FOUND,
            ),
            (DispatchError::ContextCanceled, StatusCode::SERVICE_UNAVAILABLE),
            (
                DispatchError::TransportStatus {
                    code: 418,
                    text: "I'm a teapot".into(),
                },
                StatusCode::IM_A_TEAPOT,
            ),
            (
                DispatchError::handler("bad input"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(write_response(Response::error(err)).status(), status);
        }
    }

    #[test]
    fn test_write_response_body() {
        let ok = write_response(Response::ok(Sink::text("pong")));
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(ok.headers()[CONTENT_TYPE], "text/plain");

        let failed = write_response(Response::error(DispatchError::ContextCanceled));
        assert_eq!(failed.headers()[CONTENT_TYPE], "text/plain");

        let empty = write_response(Response::empty());
        assert_eq!(empty.status(), StatusCode::OK);
        assert!(empty.headers().get(CONTENT_TYPE).is_none());
    }
}
