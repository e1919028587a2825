//! # Redis Secondary Storage Backend
//!
//! Purpose: Persist and retrieve cache blobs in a Redis-compatible server
//! over RESP2, as one implementation of `SecondaryStorage`.
//!
//! ## Design Principles
//! 1. **Lazy Session**: Nothing touches the network until the first call.
//! 2. **Terminal Invalid State**: One unrecoverable connect failure disables
//!    the instance instead of paying the timeout again on every call.
//! 3. **Precise Outcomes**: Found, missing, timed out and failed stay
//!    distinct all the way to the caller.
//! 4. **Blocking I/O**: Every call is bounded by the connect and operation
//!    timeouts; there are no background threads.

mod auth;
mod config;
mod resp;
mod session;
mod storage;
mod transport;

pub use config::{
    ConfigError, Endpoint, EndpointError, RedisConfig, DEFAULT_CONNECT_TIMEOUT, DEFAULT_OPERATION_TIMEOUT,
    DEFAULT_PORT, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS, SCHEME,
};
pub use resp::Reply;
pub use storage::{encode_key, RedisStorage, KEY_PREFIX};
pub use transport::{Connection, Handle, SocketTransport, Transport, TransportError, TransportResult};
