//! # Authenticator
//!
//! Issues the optional `AUTH` handshake right after a connection opens. The
//! configured secret is sent to the server only; diagnostics show a mask.

use sstore_common::{StorageError, StorageResult};
use tracing::{debug, warn};

use crate::config::RedisConfig;
use crate::resp::Reply;
use crate::transport::Handle;

/// Identity reported in diagnostics when no username is configured.
const DEFAULT_USERNAME: &str = "default";

/// Stand-in for the password in every log line.
pub(crate) const MASKED_PASSWORD: &str = "*******";

/// Authenticates `handle` when a password is configured.
///
/// Any reply other than an error reply counts as accepted.
pub(crate) fn authenticate<H: Handle>(config: &RedisConfig, handle: &mut H) -> StorageResult<()> {
    let password = match config.password.as_deref() {
        Some(password) => password,
        None => return Ok(()),
    };
    let username = config.username.as_deref().unwrap_or(DEFAULT_USERNAME);
    debug!("Redis AUTH {} {}", username, MASKED_PASSWORD);

    let reply = match config.username.as_deref() {
        Some(user) => handle.exec(&[b"AUTH", user.as_bytes(), password.as_bytes()]),
        None => handle.exec(&[b"AUTH", password.as_bytes()]),
    };
    match reply {
        Ok(Reply::Error(message)) => {
            warn!(
                "Failed to auth {} in Redis: {}",
                username,
                String::from_utf8_lossy(&message)
            );
            Err(StorageError::Error)
        }
        Ok(_) => Ok(()),
        Err(err) => {
            warn!("Failed to auth {} in Redis: {}", username, err);
            Err(StorageError::Error)
        }
    }
}
