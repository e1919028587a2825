#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sstore_common::{AttributeMap, Digest, DIGEST_SIZE};
use url::Url;

/// In-memory Redis stand-in speaking enough RESP2 for the backend.
#[derive(Clone, Default)]
pub struct FakeRedis {
    pub data: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    pub connections: Arc<AtomicUsize>,
    pub commands: Arc<Mutex<Vec<Vec<Vec<u8>>>>>,
    /// Closes the connection instead of answering the next command.
    pub hang_up: Arc<AtomicBool>,
    pub password: Option<String>,
}

impl FakeRedis {
    pub fn with_password(password: &str) -> Self {
        FakeRedis {
            password: Some(password.to_string()),
            ..FakeRedis::default()
        }
    }

    /// Serves clients on a background thread and returns the TCP URL.
    pub fn spawn_tcp(&self) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = self.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => return,
                };
                let server = server.clone();
                thread::spawn(move || {
                    let reader = BufReader::new(stream.try_clone().expect("clone"));
                    server.serve(reader, stream);
                });
            }
        });
        Url::parse(&format!("redis://{}", addr)).expect("url")
    }

    /// Serves clients on a Unix socket and returns the socket URL.
    #[cfg(unix)]
    pub fn spawn_unix(&self, path: &std::path::Path) -> Url {
        use std::os::unix::net::UnixListener;

        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path).expect("bind unix");
        let server = self.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(stream) => stream,
                    Err(_) => return,
                };
                let server = server.clone();
                thread::spawn(move || {
                    let reader = BufReader::new(stream.try_clone().expect("clone"));
                    server.serve(reader, stream);
                });
            }
        });
        Url::parse(&format!("redis://{}", path.display())).expect("url")
    }

    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.data.lock().unwrap().get(key.as_bytes()).cloned()
    }

    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .map(|args| String::from_utf8_lossy(&args[0]).into_owned())
            .collect()
    }

    fn serve<R: Read, W: Write>(&self, mut reader: BufReader<R>, mut writer: W) {
        self.connections.fetch_add(1, Ordering::SeqCst);
        let mut authed = self.password.is_none();
        while let Ok(Some(args)) = read_command(&mut reader) {
            self.commands.lock().unwrap().push(args.clone());
            if self.hang_up.swap(false, Ordering::SeqCst) {
                return;
            }
            let name = String::from_utf8_lossy(&args[0]).to_ascii_uppercase();
            if name == "AUTH" {
                let given = args.last().map(|p| p.as_slice()).unwrap_or_default();
                if self.password.as_deref().map(str::as_bytes) == Some(given) {
                    authed = true;
                    write_simple(&mut writer, "OK");
                } else {
                    write_error(&mut writer, "WRONGPASS invalid username-password pair or user is disabled.");
                }
                continue;
            }
            if !authed {
                write_error(&mut writer, "NOAUTH Authentication required.");
                continue;
            }
            let mut data = self.data.lock().unwrap();
            match (name.as_str(), args.len()) {
                ("GET", 2) => match data.get(&args[1]) {
                    Some(value) => write_bulk(&mut writer, value),
                    None => write_nil(&mut writer),
                },
                ("SET", 3) => {
                    data.insert(args[1].clone(), args[2].clone());
                    write_simple(&mut writer, "OK");
                }
                ("EXISTS", 2) => write_integer(&mut writer, data.contains_key(&args[1]) as i64),
                ("DEL", 2) => write_integer(&mut writer, data.remove(&args[1]).is_some() as i64),
                _ => write_error(&mut writer, "ERR unknown command"),
            }
        }
    }
}

/// One-connection server that hands each command to `handler`.
pub fn spawn_server(expected_commands: usize, handler: fn(usize, Vec<Vec<u8>>, &mut TcpStream)) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
        let mut reader = BufReader::new(stream.try_clone().expect("clone"));
        for idx in 0..expected_commands {
            let args = match read_command(&mut reader) {
                Ok(Some(args)) => args,
                _ => return,
            };
            handler(idx, args, &mut stream);
        }
        // Keep the socket open until the client hangs up.
        let mut sink = Vec::new();
        let _ = reader.read_to_end(&mut sink);
    });

    Url::parse(&format!("redis://{}", addr)).expect("url")
}

pub fn read_command<R: BufRead>(reader: &mut R) -> std::io::Result<Option<Vec<Vec<u8>>>> {
    let mut line = Vec::new();
    if read_line(reader, &mut line)?.is_none() {
        return Ok(None);
    }
    if line.first() != Some(&b'*') {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected array"));
    }
    let count = parse_usize(&line[1..])?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        read_line(reader, &mut line)?
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"))?;
        if line.first() != Some(&b'$') {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "expected bulk"));
        }
        let len = parse_usize(&line[1..])?;
        let mut data = vec![0u8; len];
        reader.read_exact(&mut data)?;
        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != [b'\r', b'\n'] {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "missing crlf"));
        }
        args.push(data);
    }
    Ok(Some(args))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<()>> {
    buf.clear();
    let bytes = reader.read_until(b'\n', buf)?;
    if bytes == 0 {
        return Ok(None);
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid line"));
    }
    buf.truncate(buf.len() - 2);
    Ok(Some(()))
}

fn parse_usize(data: &[u8]) -> std::io::Result<usize> {
    if data.is_empty() {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "empty"));
    }
    let mut value = 0usize;
    for &b in data {
        if !b.is_ascii_digit() {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "digit"));
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as usize);
    }
    Ok(value)
}

pub fn write_simple<W: Write>(stream: &mut W, msg: &str) {
    let _ = stream.write_all(format!("+{}\r\n", msg).as_bytes());
    let _ = stream.flush();
}

pub fn write_error<W: Write>(stream: &mut W, msg: &str) {
    let _ = stream.write_all(format!("-{}\r\n", msg).as_bytes());
    let _ = stream.flush();
}

pub fn write_bulk<W: Write>(stream: &mut W, data: &[u8]) {
    let _ = stream.write_all(format!("${}\r\n", data.len()).as_bytes());
    let _ = stream.write_all(data);
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn write_nil<W: Write>(stream: &mut W) {
    let _ = stream.write_all(b"$-1\r\n");
    let _ = stream.flush();
}

pub fn write_integer<W: Write>(stream: &mut W, value: i64) {
    let _ = stream.write_all(format!(":{}\r\n", value).as_bytes());
    let _ = stream.flush();
}

pub fn digest(seed: u8) -> Digest {
    let mut bytes = [0u8; DIGEST_SIZE];
    bytes[0] = seed;
    bytes[DIGEST_SIZE - 1] = seed.wrapping_mul(31);
    Digest::from_bytes(bytes)
}

pub fn attributes(pairs: &[(&str, &str)]) -> AttributeMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
