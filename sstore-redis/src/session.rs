//! # Session Manager
//!
//! Purpose: Own the single connection of a backend instance and hand out a
//! usable handle, connecting lazily and reconnecting after failures.
//!
//! ## Design Principles
//! 1. **Explicit State Machine**: `Unconnected -> Ready`, `Ready -> Stale`
//!    after a transport failure, `Stale -> Ready` on reconnect, and any
//!    unrecoverable failure lands in the terminal `Invalid` state.
//! 2. **Fail Fast**: `Invalid` answers without I/O so a dead endpoint costs
//!    at most one connect timeout per instance.
//! 3. **Single Owner**: The handle lives inside the state; dropping the state
//!    closes the socket exactly once.
//!
//! ## State Diagram
//!
//! ```text
//!   Unconnected ──connect ok──▶ Ready ──command I/O error──▶ Stale
//!        │                        ▲                            │
//!        │                        └──────reconnect ok──────────┤
//!        │                                                     │ reconnect failed
//!        │                                                     ▼
//!        └──────────connect/auth failed──▶ Invalid ◀───fresh connect failed
//! ```

use std::mem;

use sstore_common::{StorageError, StorageResult};
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::authenticate;
use crate::config::{Endpoint, RedisConfig};
use crate::resp::Reply;
use crate::transport::{Handle, Transport};

enum State<H> {
    Unconnected,
    Ready(H),
    Stale(H),
    Invalid,
}

/// Lazily connected session to one Redis endpoint.
pub(crate) struct Session<T: Transport> {
    transport: T,
    url: Url,
    config: RedisConfig,
    state: State<T::Handle>,
}

impl<T: Transport> Session<T> {
    pub(crate) fn new(transport: T, url: Url, config: RedisConfig) -> Self {
        Session {
            transport,
            url,
            config,
            state: State::Unconnected,
        }
    }

    pub(crate) fn config(&self) -> &RedisConfig {
        &self.config
    }

    pub(crate) fn is_invalid(&self) -> bool {
        matches!(self.state, State::Invalid)
    }

    pub(crate) fn is_connected(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Returns a ready handle, connecting or reconnecting first if needed.
    pub(crate) fn ensure_connected(&mut self) -> StorageResult<&mut T::Handle> {
        match mem::replace(&mut self.state, State::Unconnected) {
            State::Ready(handle) => self.state = State::Ready(handle),
            State::Invalid => {
                self.state = State::Invalid;
                return Err(StorageError::Error);
            }
            State::Stale(handle) => self.revive(handle)?,
            State::Unconnected => self.connect_fresh()?,
        }

        match &mut self.state {
            State::Ready(handle) => Ok(handle),
            _ => Err(StorageError::Error),
        }
    }

    /// Runs one command on a ready handle.
    ///
    /// A transport failure leaves the connection in an unknown framing
    /// state, so the session is marked stale.
    pub(crate) fn execute(&mut self, args: &[&[u8]]) -> StorageResult<Reply> {
        let result = self.ensure_connected()?.exec(args);
        result.map_err(|err| {
            warn!(
                "Redis {} failed: {}",
                String::from_utf8_lossy(args.first().copied().unwrap_or_default()),
                err
            );
            self.mark_stale();
            StorageError::from(&err)
        })
    }

    fn mark_stale(&mut self) {
        self.state = match mem::replace(&mut self.state, State::Unconnected) {
            State::Ready(handle) => State::Stale(handle),
            other => other,
        };
    }

    fn revive(&mut self, mut handle: T::Handle) -> StorageResult<()> {
        match handle.reconnect(self.config.connect_timeout) {
            Ok(()) => {
                debug!("Redis reconnected to {}", self.url);
                self.prepare(handle)
            }
            Err(err) => {
                warn!("Redis reconnection error: {}", err);
                drop(handle);
                self.connect_fresh()
            }
        }
    }

    fn connect_fresh(&mut self) -> StorageResult<()> {
        let endpoint = match Endpoint::from_url(&self.url) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                warn!("Invalid Redis URL: {}", err);
                self.state = State::Invalid;
                return Err(StorageError::Error);
            }
        };

        info!(
            "Redis connecting to {} (timeout {} ms)",
            endpoint,
            self.config.connect_timeout.as_millis()
        );
        match self.transport.open(&endpoint, self.config.connect_timeout) {
            Ok(handle) => {
                info!("Redis connection to {} OK", endpoint);
                self.prepare(handle)
            }
            Err(err) => {
                warn!("Redis connection error: {}", err);
                self.state = State::Invalid;
                Err(StorageError::from(&err))
            }
        }
    }

    /// Applies the operation timeout and authenticates a freshly opened
    /// handle. Becomes `Ready` on success, `Invalid` otherwise.
    fn prepare(&mut self, mut handle: T::Handle) -> StorageResult<()> {
        if let Err(err) = handle.set_timeout(self.config.operation_timeout) {
            warn!("Failed to set operation timeout: {}", err);
        }
        match authenticate(&self.config, &mut handle) {
            Ok(()) => {
                self.state = State::Ready(handle);
                Ok(())
            }
            Err(err) => {
                self.state = State::Invalid;
                Err(err)
            }
        }
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if matches!(self.state, State::Ready(_) | State::Stale(_)) {
            debug!("Redis disconnect");
        }
    }
}
