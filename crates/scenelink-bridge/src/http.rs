//! HTTP micro-server
//!
//! Serves static files from one root folder on a dedicated background thread
//! and lets the embedding application hook in at two points:
//! - pattern handlers, matched against the request target in registration order
//! - "any request" and "not found" notifications
//!
//! Requests are handled one at a time on the server thread, so handlers and
//! subscribers run there and not on the caller's thread. State they share
//! with the caller must be synchronized; last-write-wins slots read once per
//! frame are enough for command endpoints like `/rot/<a>/<b>/<c>`.
//!
//! Individual requests are never logged; use the notifications instead.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::RwLock;
use regex_lite::Regex;
use scenelink_core::Event;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tracing::{debug, error, info, warn};

use crate::request::RequestContext;
use crate::{BridgeError, Result};

/// How long `destroy` lets in-flight requests finish
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Order in which a request is offered to handlers, notifications and files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingMode {
    /// Pattern handlers, "any request", static file, "not found", 404
    #[default]
    HandlersFirst,
    /// "Any request", static file, pattern handlers, "not found", 404
    FilesFirst,
}

impl FromStr for RoutingMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "handlers-first" => Ok(RoutingMode::HandlersFirst),
            "files-first" => Ok(RoutingMode::FilesFirst),
            other => Err(BridgeError::Other(format!("unknown routing mode: {}", other))),
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingMode::HandlersFirst => write!(f, "handlers-first"),
            RoutingMode::FilesFirst => write!(f, "files-first"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// Interface to listen on
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    /// TCP port (0 picks a free one)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Folder static files are served from
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub routing: RoutingMode,
    /// Log server lifecycle at debug level
    #[serde(default)]
    pub verbose: bool,
    /// Largest request body handed to handlers
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    2031
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            root: default_root(),
            routing: RoutingMode::default(),
            verbose: false,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Lifecycle notifications sent to the optional `setup` notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    Started { addr: SocketAddr },
    Stopped,
    Error(String),
}

/// Route handler callback, called with the regex capture groups
pub type RouteHandler = Arc<dyn Fn(&mut RequestContext, &[String]) + Send + Sync>;

struct Route {
    pattern: Regex,
    handler: RouteHandler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Serving,
    Destroyed,
}

/// State shared between the owner and the server thread
#[derive(Clone)]
struct ServerState {
    root: PathBuf,
    routing: RoutingMode,
    max_body_bytes: usize,
    routes: Arc<RwLock<Vec<Arc<Route>>>>,
    request_event: Event<RequestContext>,
    not_found_event: Event<RequestContext>,
}

pub struct HttpServer {
    config: HttpServerConfig,
    state: ServerState,
    lifecycle: Lifecycle,
    local_addr: Option<SocketAddr>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig) -> Self {
        let state = ServerState {
            root: config.root.clone(),
            routing: config.routing,
            max_body_bytes: config.max_body_bytes,
            routes: Arc::new(RwLock::new(Vec::new())),
            request_event: Event::new(),
            not_found_event: Event::new(),
        };

        Self {
            config,
            state,
            lifecycle: Lifecycle::Created,
            local_addr: None,
            shutdown_tx: None,
            thread: None,
        }
    }

    /// Register a route. `pattern` is a regular expression searched in the
    /// request target (path and query); anchor it with `^...$` for a full
    /// match. Handlers may be added before or after `setup`.
    pub fn add_handler<F>(&self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(&mut RequestContext, &[String]) + Send + Sync + 'static,
    {
        let pattern = Regex::new(pattern)
            .map_err(|e| BridgeError::InvalidPattern(format!("{}: {}", pattern, e)))?;

        self.state.routes.write().push(Arc::new(Route {
            pattern,
            handler: Arc::new(handler),
        }));
        Ok(())
    }

    pub fn clear_handlers(&self) {
        self.state.routes.write().clear();
    }

    pub fn handler_count(&self) -> usize {
        self.state.routes.read().len()
    }

    /// Fired for every request before default processing
    pub fn request_event(&self) -> &Event<RequestContext> {
        &self.state.request_event
    }

    /// Fired when neither a handler nor a static file answered
    pub fn not_found_event(&self) -> &Event<RequestContext> {
        &self.state.not_found_event
    }

    /// Bind the listening socket and start the server thread.
    ///
    /// Binding happens on the calling thread, so on success the port already
    /// accepts connections. A failed bind leaves the server ready for another
    /// attempt.
    pub fn setup(&mut self, notifier: Option<mpsc::UnboundedSender<ServerEvent>>) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Serving => return Err(BridgeError::AlreadyStarted),
            Lifecycle::Destroyed => return Err(BridgeError::Destroyed),
            Lifecycle::Created => {}
        }

        let addr = format!("{}:{}", self.config.bind_host, self.config.port);
        let listener =
            std::net::TcpListener::bind((self.config.bind_host.as_str(), self.config.port))
                .map_err(|source| BridgeError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        if self.config.verbose {
            debug!("Starting http server thread for {}", local_addr);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = self.state.clone();
        let thread = thread::Builder::new()
            .name(format!("http-server-{}", local_addr.port()))
            .spawn(move || serve(listener, local_addr, state, shutdown_rx, notifier))?;

        self.shutdown_tx = Some(shutdown_tx);
        self.thread = Some(thread);
        self.local_addr = Some(local_addr);
        self.lifecycle = Lifecycle::Serving;
        Ok(())
    }

    /// Stop serving and join the server thread.
    ///
    /// In-flight requests get half a second to finish; connections still
    /// open after that are closed. Does nothing when the server was never
    /// set up. Once destroyed, the port is free again and this instance
    /// cannot be restarted.
    pub fn destroy(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if thread.thread().id() == thread::current().id() {
            // Called from a handler: the serve loop exits after this request.
            warn!("HTTP server destroyed from its own thread, not joining");
        } else if thread.join().is_err() {
            error!("HTTP server thread panicked");
        }

        self.lifecycle = Lifecycle::Destroyed;
        self.local_addr = None;

        if self.config.verbose {
            debug!("HTTP server on port {} destroyed", self.config.port);
        }
    }

    /// True while the server thread is alive
    pub fn is_running(&self) -> bool {
        self.lifecycle == Lifecycle::Serving
            && self.thread.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Bound address while serving
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn config(&self) -> &HttpServerConfig {
        &self.config
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new(HttpServerConfig::default())
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Server thread body: a single-threaded runtime driving one axum service
fn serve(
    listener: std::net::TcpListener,
    addr: SocketAddr,
    state: ServerState,
    shutdown_rx: oneshot::Receiver<()>,
    notifier: Option<mpsc::UnboundedSender<ServerEvent>>,
) {
    let notify = |event: ServerEvent| {
        if let Some(tx) = &notifier {
            let _ = tx.send(event);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create HTTP server runtime: {}", e);
            notify(ServerEvent::Error(e.to_string()));
            return;
        }
    };

    info!("Starting HTTP server on port {}", addr.port());

    let result = runtime.block_on(async {
        let listener = tokio::net::TcpListener::from_std(listener)?;
        notify(ServerEvent::Started { addr });

        let stopping = Arc::new(Notify::new());
        let signal = Arc::clone(&stopping);

        let router = Router::new().fallback(dispatch).with_state(state);
        let server = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                signal.notify_one();
            })
            .into_future();

        // Connections still open after the grace period are dropped along
        // with the runtime.
        tokio::select! {
            result = server => result,
            _ = async {
                stopping.notified().await;
                tokio::time::sleep(SHUTDOWN_GRACE).await;
            } => {
                warn!("Dropping open connections on port {}", addr.port());
                Ok(())
            }
        }
    });

    if let Err(e) = result {
        error!("HTTP server error: {}", e);
        notify(ServerEvent::Error(e.to_string()));
    }

    info!("Closing HTTP server at port {}", addr.port());
    notify(ServerEvent::Stopped);
}

async fn dispatch(State(state): State<ServerState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(_) => return StatusCode::PAYLOAD_TOO_LARGE.into_response(),
    };

    let mut ctx = RequestContext::new(
        parts.method.clone(),
        parts.uri.clone(),
        parts.headers.clone(),
        body,
    );

    match state.routing {
        RoutingMode::HandlersFirst => {
            if state.run_handlers(&mut ctx) {
                return ctx.into_response();
            }
            state.request_event.emit(&mut ctx);
            if ctx.is_handled() {
                return ctx.into_response();
            }
            if let Some(response) = state.serve_file(&parts).await {
                return response;
            }
        }
        RoutingMode::FilesFirst => {
            state.request_event.emit(&mut ctx);
            if ctx.is_handled() {
                return ctx.into_response();
            }
            if let Some(response) = state.serve_file(&parts).await {
                return response;
            }
            if state.run_handlers(&mut ctx) {
                return ctx.into_response();
            }
        }
    }

    state.not_found_event.emit(&mut ctx);
    if ctx.is_handled() {
        return ctx.into_response();
    }

    StatusCode::NOT_FOUND.into_response()
}

impl ServerState {
    /// Offer the request to every matching handler until one handles it
    fn run_handlers(&self, ctx: &mut RequestContext) -> bool {
        let routes: Vec<Arc<Route>> = self.routes.read().iter().cloned().collect();

        for route in routes {
            let groups: Vec<String> = match route.pattern.captures(ctx.path()) {
                Some(captures) => captures
                    .iter()
                    .skip(1)
                    .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect(),
                None => continue,
            };

            (route.handler)(ctx, &groups);
            if ctx.is_handled() {
                return true;
            }
        }

        false
    }

    /// Serve an existing file under the root; `None` when there is none.
    ///
    /// Paths are always relative to the root, and paths escaping it are
    /// treated as missing.
    async fn serve_file(&self, parts: &Parts) -> Option<Response> {
        if parts.method != Method::GET && parts.method != Method::HEAD {
            return None;
        }

        let mut request = Request::new(Body::empty());
        *request.method_mut() = parts.method.clone();
        *request.uri_mut() = parts.uri.clone();
        *request.headers_mut() = parts.headers.clone();

        let service = ServeDir::new(&self.root).append_index_html_on_directories(false);
        let response = match service.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        if response.status() == StatusCode::NOT_FOUND {
            return None;
        }
        Some(response.map(Body::new))
    }
}
