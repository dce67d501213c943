//! Echo Node Example
//!
//! A single Courier node serving an `/echo` destination over HTTP.
//!
//! # Protocols
//!
//! ```text
//! /echo
//! ├── /say    - echoes the body back, one call at a time
//! ├── /upper  - upper-cases a text body, calls run concurrently
//! └── /panic  - panics on an empty body; the caller gets a Panic error
//! ```
//!
//! Once the listener is up the node calls itself through the bridge, and
//! optionally calls a peer node given with `--peer`.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package echo-node -- --port 7000
//! cargo run --package echo-node -- --port 7001 --peer http://127.0.0.1:7000 --message hi
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use courier::prelude::*;
use courier::runtime::ServerConfig;
use tracing::{error, info, warn};

/// Command-line options.
#[derive(Debug, Parser)]
#[command(name = "echo-node", about = "Runs a Courier echo node")]
struct Cli {
    /// Configuration file (defaults to ./courier.toml if present).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the inbound HTTP bridge.
    #[arg(short, long, default_value_t = 7000)]
    port: u16,

    /// Base URL of another echo node to call on startup.
    #[arg(long)]
    peer: Option<String>,

    /// Text sent to the loopback and peer calls.
    #[arg(short, long, default_value = "hello from echo-node")]
    message: String,
}

// ============================================================================
// Destination
// ============================================================================

fn echo_destination() -> MuxDestination {
    let echo = MuxDestination::new();

    echo.handle_locked("/say", |request: Request| async move {
        info!(bytes = request.body().len(), "echoing");
        Response::ok(request.body().clone())
    });

    echo.handle_fn("/upper", |_ctx, _lock, request: Request| async move {
        match request.body().as_str() {
            Some(text) => Response::ok(Sink::text(text.to_uppercase())),
            None => Response::error(DispatchError::Handler("body is not text".into())),
        }
    });

    echo.handle_locked("/panic", |request: Request| async move {
        if request.body().is_empty() {
            panic!("asked to panic");
        }
        Response::ok(request.body().clone())
    });

    echo
}

// ============================================================================
// Outbound calls
// ============================================================================

async fn call_echo(label: &str, base_url: &str, message: &str) {
    let remote = match RemoteDestination::new(base_url) {
        Ok(remote) => remote,
        Err(e) => {
            error!(label, "invalid base URL: {e}");
            return;
        }
    };

    let ctx = ExecutionContext::with_timeout(Duration::from_secs(5));
    for protocol in ["/say", "/upper"] {
        let request = Request::new("/echo", protocol, Sink::text(message.to_string()));
        match remote.call(&ctx, request).await.into_result() {
            Ok(Some(body)) => info!(label, protocol, "reply: {body}"),
            Ok(None) => info!(label, protocol, "empty reply"),
            Err(e) => warn!(label, protocol, "call failed: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = CourierRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    let mut config = builder.load_config()?;
    if config.server.is_none() {
        config.server = Some(ServerConfig {
            host: "127.0.0.1".to_string(),
            port: cli.port,
        });
    }

    let runtime = CourierRuntime::from_config(&config)?;
    runtime.register("/echo", echo_destination());

    runtime.start().await?;

    if let Some(addr) = runtime.local_addr().await {
        call_echo("loopback", &format!("http://{addr}"), &cli.message).await;
    }
    if let Some(peer) = &cli.peer {
        call_echo("peer", peer, &cli.message).await;
    }

    let contained = runtime
        .call(Request::new("/echo", "/panic", Sink::default()))
        .await;
    if let Some(e) = contained.err() {
        info!("panic was contained: {e}");
    }

    runtime.run().await?;
    Ok(())
}
