//! # Backend Configuration
//!
//! Purpose: Turn the storage URL and attribute map into an `Endpoint` and a
//! `RedisConfig`.
//!
//! ## Usage Notes
//!
//! - `redis://host[:port]` connects over TCP, port 6379 by default.
//! - `redis:///path/to/socket` connects to a Unix domain socket.
//! - Endpoint resolution is deferred to the first connect so that a bad URL
//!   invalidates the backend instead of failing construction.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use sstore_common::AttributeMap;
use thiserror::Error;
use url::{Host, Url};

/// URL scheme handled by this backend.
pub const SCHEME: &str = "redis";

/// Port used when the URL names a host without one.
pub const DEFAULT_PORT: u16 = 6379;

/// Default bound for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(100);

/// Default bound for each command round-trip.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Smallest accepted timeout attribute, in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 1;

/// Largest accepted timeout attribute, in milliseconds (one hour).
pub const MAX_TIMEOUT_MS: u64 = 1000 * 3600;

const MASKED: &str = "*******";

/// Errors raised while building a backend from its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported URL scheme \"{0}\", expected \"redis\"")]
    UnsupportedScheme(String),
    #[error("invalid {name} value \"{value}\": expected milliseconds in 1..=3600000")]
    InvalidTimeout { name: &'static str, value: String },
}

/// Errors raised while resolving the URL into a connect target.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("URL names neither a host nor a socket path: {0}")]
    MissingTarget(String),
    #[error("URL has port 0: {0}")]
    InvalidPort(String),
}

/// Resolved connect target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix { path: PathBuf },
}

impl Endpoint {
    /// Resolves a `redis://` URL into a connect target.
    ///
    /// A host wins over a path; a path alone selects a Unix socket.
    pub fn from_url(url: &Url) -> Result<Self, EndpointError> {
        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => Some(domain.to_string()),
            Some(Host::Ipv4(addr)) => Some(addr.to_string()),
            Some(Host::Ipv6(addr)) => Some(addr.to_string()),
            _ => None,
        };

        if let Some(host) = host {
            let port = match url.port() {
                Some(0) => return Err(EndpointError::InvalidPort(url.to_string())),
                Some(port) => port,
                None => DEFAULT_PORT,
            };
            return Ok(Endpoint::Tcp { host, port });
        }

        let path = url.path();
        if path.is_empty() || path == "/" {
            return Err(EndpointError::MissingTarget(url.to_string()));
        }
        Ok(Endpoint::Unix {
            path: PathBuf::from(path),
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Endpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Unix { path } => write!(f, "{}", path.display()),
        }
    }
}

/// Timeouts and credentials for the Redis backend.
///
/// Fixed at construction. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct RedisConfig {
    /// Bound for establishing a connection.
    pub connect_timeout: Duration,
    /// Bound for each command round-trip (applied to reads and writes).
    pub operation_timeout: Duration,
    /// ACL user; the server's default user when absent.
    pub username: Option<String>,
    /// Enables `AUTH` after connecting when present.
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            username: None,
            password: None,
        }
    }
}

impl RedisConfig {
    /// Reads `connect-timeout`, `operation-timeout`, `username` and
    /// `password`. Other attributes are ignored.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidTimeout` for a timeout that is not an
    /// integer in `MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS`.
    pub fn from_attributes(attributes: &AttributeMap) -> Result<Self, ConfigError> {
        Ok(RedisConfig {
            connect_timeout: parse_timeout(attributes, "connect-timeout", DEFAULT_CONNECT_TIMEOUT)?,
            operation_timeout: parse_timeout(attributes, "operation-timeout", DEFAULT_OPERATION_TIMEOUT)?,
            username: attributes.get("username").cloned(),
            password: attributes.get("password").cloned(),
        })
    }
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("operation_timeout", &self.operation_timeout)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| MASKED))
            .finish()
    }
}

fn parse_timeout(attributes: &AttributeMap, name: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let raw = match attributes.get(name) {
        Some(raw) => raw,
        None => return Ok(default),
    };
    match raw.trim().parse::<u64>() {
        Ok(ms) if (MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&ms) => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidTimeout {
            name,
            value: raw.clone(),
        }),
    }
}
