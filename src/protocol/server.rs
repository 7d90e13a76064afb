use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::Instrument;

use super::error::ServerError;
use super::handler::Session;
use crate::config::ServerConfig;
use crate::queue::QueueRegistry;

/// Pause before accepting again after an error that is not tied to one
/// client, such as running out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Source of inbound connections for the accept loop.
trait Acceptor {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

/// TCP listener that serves the queue protocol, one task per connection.
pub struct QueueServer {
    config: ServerConfig,
    registry: Arc<QueueRegistry>,
    started: AtomicBool,
    shutdown: Notify,
}

impl QueueServer {
    pub fn new(config: ServerConfig, registry: Arc<QueueRegistry>) -> Self {
        Self {
            config,
            registry,
            started: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    pub fn registry(&self) -> &Arc<QueueRegistry> {
        &self.registry
    }

    /// Bind and accept until [`QueueServer::stop`] is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind the configured address. A server can only be bound once.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted);
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        TcpListener::bind(&addr).await.map_err(|source| {
            self.started.store(false, Ordering::SeqCst);
            ServerError::Bind { addr, source }
        })
    }

    /// Accept loop. Returns once the server is stopped; the listening socket
    /// is closed on return.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener.local_addr().map_err(ServerError::LocalAddr)?;
        tracing::info!(
            allow_duplicates = self.registry.allow_duplicates(),
            "queued listening on {}",
            local_addr
        );

        self.accept_loop(&listener, local_addr).await;
        Ok(())
    }

    /// Accept until stopped. Accept errors are logged and never end the loop.
    async fn accept_loop<A: Acceptor>(&self, acceptor: &A, local_addr: SocketAddr) {
        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    tracing::info!("listener on {} stopped", local_addr);
                    return;
                }
                accepted = acceptor.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.spawn_connection(socket, peer_addr),
                    Err(e) => {
                        let backoff = accept_backoff(&e);
                        tracing::warn!("accept failed: {} (kind: {:?})", e, e.kind());
                        if let Some(delay) = backoff {
                            tokio::time::sleep(delay).await;
                        }
                    }
                },
            }
        }
    }

    fn spawn_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        tracing::info!("new connection from {}", peer_addr);

        let registry = self.registry.clone();
        let span = tracing::info_span!("connection", peer = %peer_addr);
        tokio::spawn(
            async move {
                if let Err(e) = handle_connection(socket, registry).await {
                    tracing::error!("connection error: {} (kind: {:?})", e, e.kind());
                }
            }
            .instrument(span),
        );
    }

    /// Close the listening socket. Connections already accepted keep running.
    pub fn stop(&self) -> Result<(), ServerError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(ServerError::NotStarted);
        }
        self.shutdown.notify_one();
        Ok(())
    }
}

/// Serve one client until it hangs up.
pub async fn handle_connection(
    socket: TcpStream,
    registry: Arc<QueueRegistry>,
) -> std::io::Result<()> {
    let peer_addr: Option<SocketAddr> = socket.peer_addr().ok();
    let (mut reader, writer) = socket.into_split();
    let mut writer = BufWriter::new(writer);
    let mut session = Session::new(registry);
    let mut buffer = BytesMut::with_capacity(4096);

    loop {
        let n = reader.read_buf(&mut buffer).await?;
        tracing::trace!("read {} bytes, buffer len: {}", n, buffer.len());

        if n == 0 {
            // Last line may arrive without a trailing newline.
            if !buffer.is_empty() {
                let line = buffer.split();
                let response = session.handle_line(trim_line_ending(&line));
                writer.write_all(&response.encode()).await?;
            }
            break;
        }

        while let Some(line) = next_line(&mut buffer) {
            let response = session.handle_line(trim_line_ending(&line));
            writer.write_all(&response.encode()).await?;
        }
        writer.flush().await?;
    }

    writer.flush().await?;
    if let Err(e) = writer.shutdown().await {
        tracing::debug!("write half already closed: {}", e);
    }
    tracing::debug!(peer = ?peer_addr, queue = session.active_queue(), "connection closed");
    Ok(())
}

/// Errors scoped to a single half-open connection are retried at once;
/// anything else (fd exhaustion, memory pressure) waits a little first.
fn accept_backoff(err: &io::Error) -> Option<Duration> {
    match err.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

/// Split one complete `\n`-terminated line off the front of the buffer.
fn next_line(buffer: &mut BytesMut) -> Option<BytesMut> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    Some(buffer.split_to(pos + 1))
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
