//! # Redis Secondary Storage
//!
//! Purpose: Implement fetch/store/delete on top of the session and classify
//! every Redis reply into the storage result taxonomy.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `RedisStorage` hides the session and RESP details
//!    behind the `SecondaryStorage` trait.
//! 2. **Exhaustive Reply Matching**: Each command matches the reply tag it
//!    expects and treats every other shape as a failure.
//! 3. **Miss vs. Failure**: Nil, zero counts and existing keys are normal
//!    outcomes; only broken interactions become `Err`.

use sstore_common::{AttributeMap, Digest, SecondaryStorage, StorageError, StorageResult};
use tracing::{debug, warn};
use url::Url;

use crate::config::{ConfigError, RedisConfig, SCHEME};
use crate::resp::Reply;
use crate::session::Session;
use crate::transport::{SocketTransport, Transport};

/// Namespace for every key written by this backend.
pub const KEY_PREFIX: &str = "ccache";

/// Maps a digest to its namespaced Redis key.
pub fn encode_key(digest: &Digest) -> String {
    format!("{}:{}", KEY_PREFIX, digest)
}

/// Secondary storage backed by one Redis server.
///
/// The connection is opened on first use. Not meant for concurrent use;
/// wrap it in a lock or create one instance per thread.
pub struct RedisStorage<T: Transport = SocketTransport> {
    session: Session<T>,
}

impl RedisStorage<SocketTransport> {
    /// Creates a backend that talks to `url` over TCP or a Unix socket.
    ///
    /// # Errors
    /// Returns `ConfigError` for a non-`redis` URL or invalid attributes.
    pub fn new(url: Url, attributes: &AttributeMap) -> Result<Self, ConfigError> {
        Self::with_transport(SocketTransport, url, attributes)
    }
}

impl<T: Transport> RedisStorage<T> {
    /// Creates a backend on a custom transport.
    pub fn with_transport(transport: T, url: Url, attributes: &AttributeMap) -> Result<Self, ConfigError> {
        let config = RedisConfig::from_attributes(attributes)?;
        Self::with_config(transport, url, config)
    }

    /// Creates a backend from an already parsed configuration.
    pub fn with_config(transport: T, url: Url, config: RedisConfig) -> Result<Self, ConfigError> {
        if url.scheme() != SCHEME {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
        }
        Ok(RedisStorage {
            session: Session::new(transport, url, config),
        })
    }

    /// Configuration fixed at construction.
    pub fn config(&self) -> &RedisConfig {
        self.session.config()
    }

    /// True once a connection attempt failed for good; every operation then
    /// fails without touching the network.
    pub fn is_invalid(&self) -> bool {
        self.session.is_invalid()
    }

    /// True while a ready connection is held.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }
}

impl<T: Transport> SecondaryStorage for RedisStorage<T> {
    fn fetch(&mut self, digest: &Digest) -> StorageResult<Option<Vec<u8>>> {
        let key = encode_key(digest);
        debug!("Redis GET {}", key);
        match self.session.execute(&[b"GET", key.as_bytes()])? {
            Reply::Bulk(value) => Ok(Some(value)),
            Reply::Nil => Ok(None),
            Reply::Error(message) => {
                warn!("Failed to get {} from Redis: {}", key, String::from_utf8_lossy(&message));
                Err(StorageError::Error)
            }
            other => {
                warn!("Failed to get {} from Redis: unexpected {} reply", key, other.kind());
                Err(StorageError::Error)
            }
        }
    }

    fn store(&mut self, digest: &Digest, value: &[u8], only_if_absent: bool) -> StorageResult<bool> {
        let key = encode_key(digest);

        if only_if_absent {
            debug!("Redis EXISTS {}", key);
            match self.session.execute(&[b"EXISTS", key.as_bytes()])? {
                Reply::Integer(count) if count > 0 => {
                    debug!("Redis {} already present, not overwriting", key);
                    return Ok(false);
                }
                Reply::Integer(_) => {}
                Reply::Error(message) => {
                    warn!("Failed to check {} in Redis: {}", key, String::from_utf8_lossy(&message));
                }
                other => {
                    warn!("Failed to check {} in Redis: unexpected {} reply", key, other.kind());
                }
            }
        }

        debug!("Redis SET {} ({} bytes)", key, value.len());
        match self.session.execute(&[b"SET", key.as_bytes(), value])? {
            Reply::Status(_) => Ok(true),
            Reply::Error(message) => {
                warn!("Failed to set {} to Redis: {}", key, String::from_utf8_lossy(&message));
                Err(StorageError::Error)
            }
            other => {
                warn!("Failed to set {} to Redis: unexpected {} reply", key, other.kind());
                Err(StorageError::Error)
            }
        }
    }

    fn delete(&mut self, digest: &Digest) -> StorageResult<bool> {
        let key = encode_key(digest);
        debug!("Redis DEL {}", key);
        match self.session.execute(&[b"DEL", key.as_bytes()])? {
            Reply::Integer(count) => Ok(count > 0),
            Reply::Error(message) => {
                warn!("Failed to del {} in Redis: {}", key, String::from_utf8_lossy(&message));
                Err(StorageError::Error)
            }
            other => {
                warn!("Failed to del {} in Redis: unexpected {} reply", key, other.kind());
                Err(StorageError::Error)
            }
        }
    }
}
