//! Media HTTP server streaming local files to a receiver.
//!
//! One thread accepts connections and hands each of them to a fixed pool of
//! worker threads through a rendezvous channel: when every worker is busy
//! the accept loop waits for one to become free, or for the server to stop.

use std::io::{self, BufReader, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use tracing::{debug, info, warn};

use crate::errors::{RequestError, ServerError};
use crate::http::{ByteRange, FileBody, Request, Status, read_request, resolve, write_error, write_file};
use crate::media;
use crate::path_codec;
use crate::resource::Resource;

pub const DEFAULT_PORT: u16 = 9999;
pub const DEFAULT_WORKERS: usize = 10;

/// Pause after a failed accept, so persistent errors (EMFILE) do not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    /// Listening port, `0` for an ephemeral one.
    pub port: u16,
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }
}

/// Handle on a running media server.
pub struct MediaHttpServer {
    local_addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    // dropped to interrupt a pending hand-off to the workers
    stop_tx: Option<Sender<()>>,
    accept_thread: Option<JoinHandle<()>>,
}

impl MediaHttpServer {
    /// Bind the listening socket and spawn the accept loop and workers.
    pub fn start(config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind((config.bind_addr, config.port))
            .map_err(|e| ServerError::Bind(config.port, e))?;
        let local_addr = listener.local_addr()?;

        let (conn_tx, conn_rx) = bounded::<TcpStream>(0);
        for index in 0..config.workers.max(1) {
            let conn_rx = conn_rx.clone();
            thread::Builder::new()
                .name(format!("media-http-worker-{}", index))
                .spawn(move || run_worker(conn_rx))
                .map_err(ServerError::Spawn)?;
        }

        let stopping = Arc::new(AtomicBool::new(false));
        let stopping_flag = Arc::clone(&stopping);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let accept_thread = thread::Builder::new()
            .name("media-http-accept".into())
            .spawn(move || accept_loop(listener.incoming(), conn_tx, stop_rx, stopping_flag))
            .map_err(ServerError::Spawn)?;

        info!(
            "Media server listening on {} with {} workers",
            local_addr,
            config.workers.max(1)
        );

        Ok(Self {
            local_addr,
            stopping,
            stop_tx: Some(stop_tx),
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Block until the accept loop terminates.
    pub fn join(mut self) {
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }

    /// Stop accepting connections and release the listening socket.
    ///
    /// Connections already handed to a worker are served to completion.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.accept_thread.take() else {
            return;
        };
        self.stopping.store(true, Ordering::SeqCst);
        self.stop_tx.take();

        // unblock accept() with a throwaway connection
        let mut wake_addr = self.local_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(match wake_addr {
                SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                SocketAddr::V6(_) => IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
            });
        }
        match TcpStream::connect(wake_addr) {
            Ok(_) => {}
            // the loop left its hand-off wait and already dropped the listener
            Err(err) if err.kind() == io::ErrorKind::ConnectionRefused => {}
            Err(err) => {
                warn!(
                    "Cannot wake media server accept loop: {}; {} stays bound until the next connection",
                    err, self.local_addr
                );
                return;
            }
        }
        let _ = handle.join();
        info!("Media server on {} stopped", self.local_addr);
    }
}

impl Drop for MediaHttpServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Hand accepted connections to the workers until stopped.
fn accept_loop<I>(incoming: I, conn_tx: Sender<TcpStream>, stop_rx: Receiver<()>, stopping: Arc<AtomicBool>)
where
    I: Iterator<Item = io::Result<TcpStream>>,
{
    for stream in incoming {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!("Incoming media connection failed: {}", err);
                thread::sleep(ACCEPT_BACKOFF);
                continue;
            }
        };
        select! {
            send(conn_tx, stream) -> sent => {
                if sent.is_err() {
                    warn!("No media server worker left, stopping accept loop");
                    break;
                }
            }
            recv(stop_rx) -> _ => {
                debug!("Media server stopped while waiting for a free worker");
                break;
            }
        }
    }
    debug!("Media server accept loop exited");
}

static CONNECTION_IDS: AtomicU64 = AtomicU64::new(1);

fn run_worker(conn_rx: Receiver<TcpStream>) {
    for stream in conn_rx.iter() {
        let conn = CONNECTION_IDS.fetch_add(1, Ordering::Relaxed);
        if let Err(err) = serve_connection(stream, conn) {
            warn!(conn, "Media connection aborted: {}", err);
        }
    }
}

/// Run request/response cycles on one connection until it must be closed.
fn serve_connection(stream: TcpStream, conn: u64) -> io::Result<()> {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());
    debug!(conn, peer = peer.as_str(), "Client connection");

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    loop {
        let request = match read_request(&mut reader) {
            Ok(request) => request,
            Err(RequestError::ConnectionClosed) => {
                debug!(conn, "Client closed the connection");
                break;
            }
            Err(err) => {
                warn!(conn, peer = peer.as_str(), "Bad request: {}", err);
                write_error(&mut writer, Status::BadRequest, true)?;
                break;
            }
        };

        let close = request.wants_close();
        debug!(
            conn,
            method = request.method.as_str(),
            target = request.target.as_str(),
            close,
            "Request"
        );

        respond(&mut writer, &request, close, conn)?;
        if close {
            break;
        }
    }

    let _ = writer.shutdown(Shutdown::Both);
    Ok(())
}

/// Answer one parsed request. I/O errors are transport failures: the caller
/// drops the connection.
fn respond<W: Write>(sink: &mut W, request: &Request, close: bool, conn: u64) -> io::Result<Status> {
    let path = match path_codec::decode(&request.target) {
        Ok(path) => path,
        Err(err) => {
            warn!(conn, target = request.target.as_str(), "Cannot decode target: {}", err);
            write_error(sink, Status::BadRequest, close)?;
            return Ok(Status::BadRequest);
        }
    };

    let (resource, mut file) = match Resource::open(&path) {
        Ok(opened) => opened,
        Err(err) => {
            warn!(conn, "{}", err);
            let status = err.status();
            write_error(sink, status, close)?;
            return Ok(status);
        }
    };

    let range = request
        .header("range")
        .and_then(|value| usable_range(value, resource.length, conn));

    let body = FileBody {
        length: resource.length,
        modified: resource.modified,
        content_type: media::content_type(&resource.path),
    };

    match range {
        Some(r) => debug!(conn, path = %resource.path.display(), "Range download {}-{}", r.start, r.end),
        None => debug!(conn, path = %resource.path.display(), "Full download of {} bytes", resource.length),
    }

    let written = write_file(sink, &mut file, &body, range, close)?;
    debug!(conn, bytes = written, "Download complete");

    Ok(if range.is_some() {
        Status::PartialContent
    } else {
        Status::Ok
    })
}

/// A resolved range that fits the resource, or `None` to serve it whole.
fn usable_range(value: &str, length: u64, conn: u64) -> Option<ByteRange> {
    match resolve(value, length) {
        Some(range) if range.is_satisfiable(length) => Some(range),
        Some(range) => {
            debug!(
                conn,
                "Range {}-{} outside of {} bytes, serving whole file", range.start, range.end, length
            );
            None
        }
        None => {
            debug!(conn, range = value, "Unusable range header, serving whole file");
            None
        }
    }
}
