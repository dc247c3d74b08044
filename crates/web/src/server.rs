//! Accept loop, admission control and graceful shutdown.
//!
//! One task per accepted connection; the accept loop itself is a single
//! task. A [`ServerHandle`] taken before `serve` consumes the server stops
//! accepts and then waits for in-flight connections to drain.

use crate::config::ServerConfig;
use crate::router::Router;
use bytes::BytesMut;
use rill_http::codec::ResponseEncoder;
use rill_http::connection::HttpConnection;
use rill_http::protocol::Response;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpSocket, TcpStream};
use tokio::sync::Notify;
use tokio_util::codec::Encoder;
use tracing::{info, warn, Level};

const LISTEN_BACKLOG: u32 = 128;
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DRAIN_POLL_ROUNDS: usize = 300;

pub struct ServerBuilder {
    router: Option<Router>,
    config: Option<ServerConfig>,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("config must be set")]
    MissingConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, config: None }
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let config = self.config.ok_or(ServerBuildError::MissingConfig)?;
        Ok(Server { router: Arc::new(router), config, state: Arc::new(ServerState::new()) })
    }
}

struct ServerState {
    shutting_down: AtomicBool,
    active_connections: AtomicUsize,
    shutdown_notify: Notify,
    bound_addr: OnceLock<SocketAddr>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            shutting_down: AtomicBool::new(false),
            active_connections: AtomicUsize::new(0),
            shutdown_notify: Notify::new(),
            bound_addr: OnceLock::new(),
        }
    }
}

/// Decrements the active-connection counter when the task ends, panics
/// included.
struct ConnectionGuard {
    state: Arc<ServerState>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.state.active_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Server {
    router: Arc<Router>,
    config: ServerConfig,
    state: Arc<ServerState>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// A handle for observing and shutting down this server. Valid before
    /// and after `serve` starts.
    pub fn handle(&self) -> ServerHandle {
        ServerHandle { state: self.state.clone() }
    }

    /// Binds the configured port and runs the accept loop until shutdown.
    pub async fn serve(self) -> io::Result<()> {
        let _ = tracing_subscriber::fmt().with_max_level(Level::INFO).try_init();

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let socket = TcpSocket::new_v4()?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(LISTEN_BACKLOG)?;

        let bound = listener.local_addr()?;
        let _ = self.state.bound_addr.set(bound);
        info!(addr = %bound, "listening");
        for route in self.router.routes() {
            info!(method = %route.method, pattern = %route.pattern, "route registered");
        }

        loop {
            if self.state.shutting_down.load(Ordering::SeqCst) {
                break;
            }

            let (stream, remote_addr) = tokio::select! {
                _ = self.state.shutdown_notify.notified() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let active = self.state.active_connections.load(Ordering::SeqCst);
            if active >= self.config.max_connections {
                warn!(active, max = self.config.max_connections, "connection limit reached, rejecting");
                tokio::spawn(reject(stream));
                continue;
            }

            self.state.active_connections.fetch_add(1, Ordering::SeqCst);
            let guard = ConnectionGuard { state: self.state.clone() };
            let router = self.router.clone();
            let connection_config = self.config.connection_config();

            tokio::spawn(async move {
                let _guard = guard;
                let (reader, writer) = stream.into_split();
                let connection = HttpConnection::new(reader, writer, connection_config);
                match connection.process(router).await {
                    Ok(()) => info!(remote = %remote_addr, "connection closed"),
                    Err(e) => warn!(remote = %remote_addr, cause = %e, "connection closed with error"),
                }
            });
        }

        info!("accept loop stopped");
        Ok(())
    }
}

/// Answers an over-capacity connection with a plain 503 and closes it.
async fn reject(mut stream: TcpStream) {
    let mut buffer = BytesMut::new();
    if ResponseEncoder::new().encode(Response::service_unavailable(), &mut buffer).is_ok() {
        let _ = stream.write_all(&buffer).await;
    }
    let _ = stream.shutdown().await;
}

/// Cloneable handle over the shared server state.
#[derive(Clone)]
pub struct ServerHandle {
    state: Arc<ServerState>,
}

impl ServerHandle {
    /// The address the listener actually bound, once `serve` got that far.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.bound_addr.get().copied()
    }

    pub fn active_connections(&self) -> usize {
        self.state.active_connections.load(Ordering::SeqCst)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.shutting_down.load(Ordering::SeqCst)
    }

    /// Stops accepting and waits for in-flight connections to drain, polling
    /// for up to thirty seconds. Returns whether the drain completed;
    /// connections still active after the deadline are left running.
    pub async fn shutdown(&self) -> bool {
        info!("shutdown requested, stopping accepts");
        self.state.shutting_down.store(true, Ordering::SeqCst);
        self.state.shutdown_notify.notify_one();

        for _ in 0..DRAIN_POLL_ROUNDS {
            if self.state.active_connections.load(Ordering::SeqCst) == 0 {
                info!("all connections drained");
                return true;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        warn!(
            active = self.state.active_connections.load(Ordering::SeqCst),
            "shutdown deadline reached with connections still active"
        );
        false
    }
}
