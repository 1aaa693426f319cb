//! Static file server - binding with a port probe, serving, teardown

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path as UrlPath, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::report;

/// How long `stop` waits for in-flight connections before aborting
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves one directory read-only over plain HTTP
pub struct StaticFileServer {
    config: ServerConfig,
}

impl StaticFileServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind at or above `preferred_port` and start serving in the background.
    ///
    /// Returns once the listener is accepting and the settle delay has passed.
    pub async fn start(&self, preferred_port: u16) -> HarnessResult<ServerHandle> {
        let root = canonical_root(&self.config.root_dir).await?;
        let listener = bind_with_probe(self.config.host, preferred_port).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(root.clone());

        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                    debug!("Static server shutting down");
                })
                .await
        });

        info!("Serving {} on http://{}", root.display(), local_addr);
        report::print_server_started(local_addr.port());

        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        Ok(ServerHandle {
            local_addr,
            root_directory: root,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }
}

/// Handle to a running static server
pub struct ServerHandle {
    local_addr: SocketAddr,
    root_directory: PathBuf,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

impl ServerHandle {
    /// The port actually bound, after probing
    pub fn bound_port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// URL a local client should use to reach the server
    pub fn base_url(&self) -> String {
        let host = match self.local_addr.ip() {
            IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        format!("http://{}", SocketAddr::new(host, self.local_addr.port()))
    }

    /// Stop the server. Safe to call more than once; never fails.
    pub async fn stop(&mut self) {
        match self.shutdown().await {
            Ok(true) => {
                info!("Static server on port {} stopped", self.bound_port());
                report::print_server_stopped();
            }
            Ok(false) => debug!("Static server on port {} already stopped", self.bound_port()),
            Err(e) => {
                warn!("Error stopping server: {}", e);
                report::print_warning(&format!("Error stopping server: {}", e));
            }
        }
    }

    async fn shutdown(&mut self) -> HarnessResult<bool> {
        let Some(mut task) = self.task.take() else {
            return Ok(false);
        };

        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                debug!("Serve task exited before shutdown was requested");
            }
        }

        match tokio::time::timeout(STOP_TIMEOUT, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(true),
            Ok(Ok(Err(e))) => Err(HarnessError::Teardown(format!("serve loop failed: {}", e))),
            Ok(Err(e)) => Err(HarnessError::Teardown(format!("serve task failed: {}", e))),
            Err(_) => {
                task.abort();
                Err(HarnessError::Teardown(format!(
                    "server did not stop within {:?}, aborted",
                    STOP_TIMEOUT
                )))
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn canonical_root(root: &Path) -> HarnessResult<PathBuf> {
    let canon = tokio::fs::canonicalize(root)
        .await
        .map_err(|_| HarnessError::InvalidRoot(root.to_path_buf()))?;

    let is_dir = tokio::fs::metadata(&canon)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(HarnessError::InvalidRoot(root.to_path_buf()));
    }

    Ok(canon)
}

/// Bind `host:port`, moving to `port + 1` for as long as the port is taken.
async fn bind_with_probe(host: IpAddr, preferred_port: u16) -> HarnessResult<TcpListener> {
    let mut port = preferred_port;

    loop {
        match TcpListener::bind(SocketAddr::new(host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                let next = port.checked_add(1).ok_or(HarnessError::PortSpaceExhausted {
                    preferred: preferred_port,
                })?;
                warn!("Port {} in use, trying {}", port, next);
                report::print_warning(&format!("Port {} in use, trying {}", port, next));
                port = next;
            }
            Err(source) => return Err(HarnessError::Bind { port, source }),
        }
    }
}

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
}

// No access log.
fn router(root: PathBuf) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/*path", get(file_handler))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(ServeState {
            root: Arc::new(root),
        })
}

async fn root_handler(State(state): State<ServeState>) -> Response {
    serve_path(&state.root, "").await
}

async fn file_handler(State(state): State<ServeState>, UrlPath(path): UrlPath<String>) -> Response {
    serve_path(&state.root, &path).await
}

async fn serve_path(root: &Path, rel: &str) -> Response {
    let file = match resolve(root, rel).await {
        Ok(file) => file,
        Err(status) => {
            debug!("GET /{} -> {}", rel, status);
            let body = if status == StatusCode::FORBIDDEN {
                "Forbidden"
            } else {
                "Not found"
            };
            return (status, body).into_response();
        }
    };

    match tokio::fs::read(&file).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                bytes,
            )
                .into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "Not found").into_response(),
    }
}

/// Map a request path to a file under `root`, serving `index.html` for
/// directories. Anything that resolves outside `root` is forbidden.
async fn resolve(root: &Path, rel: &str) -> Result<PathBuf, StatusCode> {
    let requested = contained(root, &root.join(rel.trim_start_matches('/'))).await?;

    let is_dir = tokio::fs::metadata(&requested)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if is_dir {
        return contained(root, &requested.join("index.html")).await;
    }

    Ok(requested)
}

async fn contained(root: &Path, path: &Path) -> Result<PathBuf, StatusCode> {
    let canon = tokio::fs::canonicalize(path)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    if !canon.starts_with(root) {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(canon)
}
