//! Node runtime: configuration, address book, dispatcher and listener.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use courier_runtime::CourierRuntime;
//!
//! // Loads courier.toml from the current directory
//! let runtime = CourierRuntime::builder().build()?;
//!
//! runtime.register("/echo", echo_destination);
//! runtime.run().await?;
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use courier_core::{
    BoxedDestination, Destination, DispatchResult, Dispatcher, ExecutionContext, Request,
    Response, RouteAddressBook,
};
use tokio::signal;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::{ConfigLoader, ConfigResult, CourierConfig, RemoteConfig, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The dispatcher type a runtime exposes.
pub type NodeDispatcher = Dispatcher<Arc<RouteAddressBook>>;

#[cfg(feature = "http-server")]
type Listener = courier_transport::ListenerHandle;
#[cfg(not(feature = "http-server"))]
type Listener = ();

/// A Courier node.
///
/// Owns the address book, the dispatcher over it and, when a `server`
/// section is configured, the inbound HTTP bridge.
pub struct CourierRuntime {
    config: CourierConfig,
    book: Arc<RouteAddressBook>,
    dispatcher: Arc<NodeDispatcher>,
    listener: Mutex<Option<Listener>>,
    running: RwLock<bool>,
}

impl CourierRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates `config` like [`ConfigLoader::load`] does, then initializes
    /// logging and registers every configured remote.
    pub fn from_config(config: &CourierConfig) -> RuntimeResult<Self> {
        validate_config(config)?;
        Self::assemble(config, Vec::new())
    }

    fn assemble(
        config: &CourierConfig,
        local: Vec<(String, BoxedDestination)>,
    ) -> RuntimeResult<Self> {
        logging::init_from_config(&config.logging);

        let book = Arc::new(RouteAddressBook::new());
        for (pattern, destination) in local {
            book.register_boxed(&pattern, destination);
        }
        for remote in &config.remotes {
            register_remote(&book, remote)?;
        }

        info!(
            destinations = book.len(),
            remotes = config.remotes.len(),
            bridge = config.server.is_some(),
            "node assembled"
        );

        Ok(Self {
            config: config.clone(),
            dispatcher: Arc::new(Dispatcher::new(Arc::clone(&book))),
            book,
            listener: Mutex::new(None),
            running: RwLock::new(false),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Returns the node's address book.
    pub fn address_book(&self) -> &Arc<RouteAddressBook> {
        &self.book
    }

    /// Returns the node's dispatcher.
    pub fn dispatcher(&self) -> Arc<NodeDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Registers a local destination under an address pattern.
    pub fn register<D>(&self, pattern: &str, destination: D)
    where
        D: Destination + 'static,
    {
        self.book.register(pattern, destination);
    }

    /// Registers a shared destination under an address pattern.
    pub fn register_boxed(&self, pattern: &str, destination: BoxedDestination) {
        self.book.register_boxed(pattern, destination);
    }

    /// Removes the destination registered under exactly `pattern`.
    pub fn unregister(&self, pattern: &str) -> Option<BoxedDestination> {
        self.book.unregister(pattern)
    }

    /// Calls a destination through the dispatcher.
    ///
    /// The request's own timeout applies if it has one, otherwise the
    /// configured `dispatch.call_timeout_ms`.
    pub async fn call(&self, request: Request) -> Response {
        let ctx = match request.timeout().or(self.config.dispatch.call_timeout()) {
            Some(timeout) => ExecutionContext::with_timeout(timeout),
            None => ExecutionContext::new(),
        };
        self.dispatcher.call(&ctx, request).await
    }

    /// Sends a request through the dispatcher without waiting for it.
    pub fn send(&self, request: Request) -> DispatchResult<()> {
        self.dispatcher.send(request)
    }

    /// `true` between `start` and `stop`.
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Returns the address the bridge listens on, once started.
    #[cfg(feature = "http-server")]
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().await.as_ref().map(|l| l.local_addr())
    }

    /// Returns the address the bridge listens on, once started.
    #[cfg(not(feature = "http-server"))]
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    /// Starts the runtime, including the bridge if one is configured.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                debug!("start ignored, node already running");
                return Ok(());
            }
            *running = true;
        }

        if let Some(server) = &self.config.server {
            let listener = self.start_listener(&server.addr()).await;
            match listener {
                Ok(listener) => *self.listener.lock().await = Some(listener),
                Err(e) => {
                    *self.running.write().await = false;
                    return Err(e);
                }
            }
        }

        info!("node started");
        Ok(())
    }

    #[cfg(feature = "http-server")]
    async fn start_listener(&self, addr: &str) -> RuntimeResult<Listener> {
        let destination: BoxedDestination = self.dispatcher.clone();
        let handle = courier_transport::HttpBridge::listen_boxed(addr, destination).await?;
        debug!(addr = %handle.local_addr(), "bridge serving the dispatcher");
        Ok(handle)
    }

    #[cfg(not(feature = "http-server"))]
    async fn start_listener(&self, _addr: &str) -> RuntimeResult<Listener> {
        Err(RuntimeError::FeatureDisabled("http-server"))
    }

    /// Stops the runtime and its bridge.
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                debug!("stop ignored, node not running");
                return Ok(());
            }
            *running = false;
        }

        #[cfg(feature = "http-server")]
        {
            let listener = self.listener.lock().await.take();
            if let Some(listener) = listener {
                listener.shutdown().await;
            }
        }

        info!("node stopped");
        Ok(())
    }

    /// Runs the runtime until Ctrl+C or SIGTERM, starting it first if
    /// needed.
    pub async fn run(&self) -> RuntimeResult<()> {
        if !self.is_running().await {
            self.start().await?;
        }
        info!("node running, waiting for Ctrl+C or SIGTERM");

        let waited = wait_for_shutdown().await;
        self.stop().await?;
        waited
    }

    /// Runs the runtime until `shutdown` completes, starting it first if
    /// needed.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        if !self.is_running().await {
            self.start().await?;
        }
        shutdown.await;
        self.stop().await
    }
}

#[cfg(feature = "http-client")]
fn register_remote(book: &RouteAddressBook, remote: &RemoteConfig) -> RuntimeResult<()> {
    use courier_transport::RemoteDestination;

    let mut destination = match remote.timeout() {
        Some(timeout) => RemoteDestination::with_timeout(&remote.base_url, timeout)?,
        None => RemoteDestination::new(&remote.base_url)?,
    };
    if let Some(credentials) = remote.credentials() {
        destination = destination.with_credentials(credentials);
    }

    book.register(&remote.address, destination);
    info!(address = %remote.address, base_url = %remote.base_url, "remote registered");
    Ok(())
}

#[cfg(not(feature = "http-client"))]
fn register_remote(_book: &RouteAddressBook, remote: &RemoteConfig) -> RuntimeResult<()> {
    tracing::warn!(address = %remote.address, "remote configured without http-client");
    Err(RuntimeError::FeatureDisabled("http-client"))
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() -> RuntimeResult<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.map_err(|e| RuntimeError::Signal(e.to_string()))?;
                info!(signal = "SIGINT", "shutdown requested");
            }
            _ = sigterm.recv() => {
                info!(signal = "SIGTERM", "shutdown requested");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .map_err(|e| RuntimeError::Signal(e.to_string()))?;
        info!(signal = "SIGINT", "shutdown requested");
    }

    Ok(())
}

/// Loads configuration and assembles a [`CourierRuntime`].
///
/// Destinations given to [`register`](Self::register) are in the address
/// book before any configured remote, so a remote with the same pattern
/// replaces them.
///
/// ```rust,ignore
/// let runtime = CourierRuntime::builder()
///     .profile("prod")
///     .config_file("/etc/courier/courier.toml")
///     .register("/echo", echo)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    local: Vec<(String, BoxedDestination)>,
}

impl RuntimeBuilder {
    /// Searches the working directory for `courier.toml`.
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_current_dir(),
            local: Vec::new(),
        }
    }

    fn map_loader(mut self, f: impl FnOnce(ConfigLoader) -> ConfigLoader) -> Self {
        self.loader = f(self.loader);
        self
    }

    pub fn config_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.map_loader(|l| l.file(path))
    }

    pub fn profile(self, profile: impl AsRef<str>) -> Self {
        self.map_loader(|l| l.profile(profile))
    }

    pub fn search_path<P: AsRef<Path>>(self, path: P) -> Self {
        self.map_loader(|l| l.search_path(path))
    }

    pub fn with_env(self) -> Self {
        self.map_loader(ConfigLoader::with_env)
    }

    pub fn without_env(self) -> Self {
        self.map_loader(ConfigLoader::without_env)
    }

    /// Base configuration below files and environment.
    pub fn merge(self, config: CourierConfig) -> Self {
        self.map_loader(|l| l.merge(config))
    }

    /// Registers a local destination once the runtime is built.
    pub fn register<D>(mut self, pattern: &str, destination: D) -> Self
    where
        D: Destination + 'static,
    {
        self.local.push((pattern.to_string(), Arc::new(destination)));
        self
    }

    /// Loads the configuration only.
    pub fn load_config(self) -> ConfigResult<CourierConfig> {
        self.loader.load()
    }

    pub fn build(self) -> RuntimeResult<CourierRuntime> {
        let config = self.loader.load()?;
        CourierRuntime::assemble(&config, self.local)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
