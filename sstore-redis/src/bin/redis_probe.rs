//! # Redis Backend Probe
//!
//! Purpose: Exercise a live Redis endpoint through the storage backend and
//! print a JSON report, so an operator can check URL, credentials and
//! timeouts before pointing a build cache at it.
//!
//! ## Usage
//!
//! ```text
//! redis_probe redis://localhost:6379 [connect-timeout=100] [password=...]
//! redis_probe --digest 0123456789abcdef0123456789abcdef01234567 redis://cache:6379
//! RUST_LOG=sstore_redis=debug redis_probe redis:///run/redis.sock
//! ```
//!
//! The probe writes one throwaway key, reads it back, checks that an
//! only-if-absent write leaves it alone, and deletes it twice. `--digest`
//! pins the key instead of deriving one from the clock.

use std::env;
use std::fmt::Debug;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use sstore_common::{AttributeMap, Digest, SecondaryStorage, StorageResult, DIGEST_SIZE};
use sstore_redis::{encode_key, RedisStorage};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Serialize)]
struct Step {
    operation: &'static str,
    outcome: String,
    passed: bool,
    timed_out: bool,
    micros: u64,
}

#[derive(Debug, Serialize)]
struct Report {
    url: String,
    key: String,
    passed: bool,
    steps: Vec<Step>,
}

struct ProbeArgs {
    url: Url,
    digest: Option<Digest>,
    attributes: AttributeMap,
}

impl ProbeArgs {
    fn from_args(args: impl Iterator<Item = String>) -> Result<Self> {
        let mut args = args.peekable();
        let mut digest = None;
        if args.peek().map(String::as_str) == Some("--digest") {
            args.next();
            let hex = args.next().context("--digest needs a hex value")?;
            digest = Some(Digest::from_hex(&hex).with_context(|| format!("invalid digest {hex:?}"))?);
        }
        let raw_url = match args.next() {
            Some(url) => url,
            None => bail!("usage: redis_probe [--digest <hex>] <redis-url> [name=value ...]"),
        };
        let url = Url::parse(&raw_url).with_context(|| format!("invalid URL {raw_url:?}"))?;

        let mut attributes = AttributeMap::new();
        for pair in args {
            let (name, value) = pair
                .split_once('=')
                .with_context(|| format!("attribute {pair:?} is not name=value"))?;
            attributes.insert(name.to_string(), value.to_string());
        }
        Ok(ProbeArgs {
            url,
            digest,
            attributes,
        })
    }
}

/// Digest unique enough that concurrent probes do not collide.
fn probe_digest() -> Digest {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut bytes = [0u8; DIGEST_SIZE];
    bytes[..16].copy_from_slice(&nanos.to_le_bytes());
    bytes[16..].copy_from_slice(&std::process::id().to_le_bytes());
    Digest::from_bytes(bytes)
}

fn step<T: Debug + PartialEq>(operation: &'static str, expected: T, run: impl FnOnce() -> StorageResult<T>) -> Step {
    let start = Instant::now();
    let result = run();
    let micros = start.elapsed().as_micros() as u64;
    let passed = matches!(&result, Ok(value) if *value == expected);
    let timed_out = matches!(&result, Err(err) if err.is_timeout());
    let outcome = match result {
        Ok(value) => format!("{value:?}"),
        Err(err) => err.to_string(),
    };
    Step {
        operation,
        outcome,
        passed,
        timed_out,
        micros,
    }
}

fn run() -> Result<bool> {
    let args = ProbeArgs::from_args(env::args().skip(1))?;
    let url_text = args.url.to_string();
    let mut storage = RedisStorage::new(args.url, &args.attributes).context("invalid backend configuration")?;
    tracing::info!(config = ?storage.config(), "probing {}", url_text);

    let digest = args.digest.unwrap_or_else(probe_digest);
    let payload = b"redis_probe\0payload".to_vec();

    let mut steps = Vec::new();
    steps.push(step("fetch-missing", None, || storage.fetch(&digest)));
    steps.push(step("store", true, || storage.store(&digest, &payload, false)));
    steps.push(step("fetch", Some(payload.clone()), || storage.fetch(&digest)));
    steps.push(step("store-if-absent", false, || storage.store(&digest, b"other", true)));
    steps.push(step("delete", true, || storage.delete(&digest)));
    steps.push(step("delete-again", false, || storage.delete(&digest)));

    let report = Report {
        url: url_text,
        key: encode_key(&digest),
        passed: steps.iter().all(|s| s.passed),
        steps,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.passed)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("redis_probe failed: {err:#}");
            std::process::exit(2);
        }
    }
}
