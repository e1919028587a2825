//! # Blocking Transport
//!
//! Purpose: Open and drive one Redis connection over TCP or a Unix socket,
//! with bounded connect and command round-trips.
//!
//! ## Design Principles
//! 1. **Seam for Testing**: The session only sees the `Transport` and
//!    `Handle` traits, so tests can script replies and count I/O.
//! 2. **Buffer Reuse**: Each connection keeps its own framing buffers.
//! 3. **RAII Release**: Dropping a handle closes its socket; nothing else
//!    frees it.
//! 4. **Timeout Classification**: Timed-out I/O is reported distinctly so
//!    callers can tell a slow server from a broken one.

use std::io::{self, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::time::Duration;

use sstore_common::StorageError;
use thiserror::Error;

use crate::config::Endpoint;
use crate::resp::{encode_command, read_reply, Reply};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure below the reply-classification layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network or IO failure while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// RESP2 framing or parse error.
    #[error("protocol error")]
    Protocol,
    /// Server closed the connection.
    #[error("connection closed by server")]
    Closed,
}

impl TransportError {
    /// Returns true when a connect or command bound was exceeded.
    ///
    /// Socket read timeouts surface as `WouldBlock` on Unix and `TimedOut`
    /// on Windows; both count.
    pub fn is_timeout(&self) -> bool {
        match self {
            TransportError::Io(err) => matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock),
            _ => false,
        }
    }
}

impl From<&TransportError> for StorageError {
    fn from(err: &TransportError) -> Self {
        if err.is_timeout() {
            StorageError::Timeout
        } else {
            StorageError::Error
        }
    }
}

impl From<TransportError> for StorageError {
    fn from(err: TransportError) -> Self {
        StorageError::from(&err)
    }
}

/// Opens connections to an endpoint.
pub trait Transport {
    type Handle: Handle;

    /// Connects to `endpoint`, giving up after `connect_timeout`.
    fn open(&self, endpoint: &Endpoint, connect_timeout: Duration) -> TransportResult<Self::Handle>;
}

/// A live connection able to run one command at a time.
pub trait Handle {
    /// Re-establishes the connection to the same endpoint in place.
    fn reconnect(&mut self, connect_timeout: Duration) -> TransportResult<()>;

    /// Bounds every subsequent read and write.
    fn set_timeout(&mut self, timeout: Duration) -> TransportResult<()>;

    /// Sends one command and waits for its reply.
    fn exec(&mut self, args: &[&[u8]]) -> TransportResult<Reply>;
}

/// Socket-backed transport used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketTransport;

impl Transport for SocketTransport {
    type Handle = Connection;

    fn open(&self, endpoint: &Endpoint, connect_timeout: Duration) -> TransportResult<Connection> {
        Connection::connect(endpoint, connect_timeout)
    }
}

enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn connect(endpoint: &Endpoint, timeout: Duration) -> io::Result<Self> {
        match endpoint {
            Endpoint::Tcp { host, port } => connect_tcp(host, *port, timeout).map(Stream::Tcp),
            #[cfg(unix)]
            Endpoint::Unix { path } => connect_unix(path, timeout).map(Stream::Unix),
            #[cfg(not(unix))]
            Endpoint::Unix { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }

    fn set_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => {
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)
            }
            #[cfg(unix)]
            Stream::Unix(stream) => {
                stream.set_read_timeout(timeout)?;
                stream.set_write_timeout(timeout)
            }
        }
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Stream::Unix(stream) => stream.flush(),
        }
    }
}

/// Single Redis connection with reusable buffers.
pub struct Connection {
    endpoint: Endpoint,
    // Buffered reader reduces syscalls while still allowing direct writes.
    reader: BufReader<Stream>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    fn connect(endpoint: &Endpoint, timeout: Duration) -> TransportResult<Self> {
        let stream = Stream::connect(endpoint, timeout)?;
        Ok(Connection {
            endpoint: endpoint.clone(),
            reader: BufReader::new(stream),
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        })
    }
}

impl Handle for Connection {
    fn reconnect(&mut self, connect_timeout: Duration) -> TransportResult<()> {
        let stream = Stream::connect(&self.endpoint, connect_timeout)?;
        // Replacing the reader drops (closes) the old socket and any
        // half-read reply left in its buffer.
        self.reader = BufReader::new(stream);
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> TransportResult<()> {
        self.reader.get_ref().set_timeout(Some(timeout))?;
        Ok(())
    }

    fn exec(&mut self, args: &[&[u8]]) -> TransportResult<Reply> {
        self.write_buf.clear();
        encode_command(args, &mut self.write_buf);

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buf)?;
        stream.flush()?;

        read_reply(&mut self.reader, &mut self.line_buf)
    }
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                // Disable Nagle to keep request latency low for small payloads.
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no addresses found for {}", host))
    }))
}

#[cfg(unix)]
fn connect_unix(path: &std::path::Path, timeout: Duration) -> io::Result<UnixStream> {
    use socket2::{Domain, SockAddr, Socket, Type};
    use std::os::fd::OwnedFd;

    let addr = SockAddr::unix(path)?;
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.connect_timeout(&addr, timeout)?;
    socket.set_nonblocking(false)?;
    Ok(UnixStream::from(OwnedFd::from(socket)))
}
