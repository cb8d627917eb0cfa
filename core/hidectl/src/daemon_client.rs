//! Client helper for talking to hide-daemon over its Unix socket.
//!
//! One request per connection; the daemon closes the stream after replying.

use hide_daemon_protocol::{Method, Request, Response, MAX_REQUEST_BYTES};
use rand::RngCore;
use serde_json::Value;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

const SOCKET_ENV: &str = "HIDE_DAEMON_SOCKET";
const HOME_ENV: &str = "HIDE_HOME";
const DEFAULT_HOME_DIR: &str = ".process-hide";
const SOCKET_NAME: &str = "daemon.sock";
// Enable may run a full app-data scan before replying.
const READ_TIMEOUT_MS: u64 = 10_000;
const WRITE_TIMEOUT_MS: u64 = 600;

pub struct DaemonClient {
    socket: PathBuf,
}

impl DaemonClient {
    pub fn new(socket: PathBuf) -> Self {
        Self { socket }
    }

    /// `--socket`, else `$HIDE_DAEMON_SOCKET`, else the daemon home.
    pub fn resolve(socket: Option<PathBuf>) -> Result<Self, String> {
        let socket = match socket {
            Some(socket) => socket,
            None => default_socket_path()?,
        };
        Ok(Self::new(socket))
    }

    pub fn call(&self, method: Method, params: Option<Value>) -> Result<Response, String> {
        let request = Request::new(method, Some(make_request_id()), params);
        tracing::debug!(method = ?method, id = ?request.id, "Sending daemon request");
        self.send_request(&request)
    }

    fn send_request(&self, request: &Request) -> Result<Response, String> {
        let mut stream = UnixStream::connect(&self.socket).map_err(|err| {
            format!(
                "Failed to connect to daemon socket {}: {}",
                self.socket.display(),
                err
            )
        })?;
        let _ = stream.set_read_timeout(Some(Duration::from_millis(READ_TIMEOUT_MS)));
        let _ = stream.set_write_timeout(Some(Duration::from_millis(WRITE_TIMEOUT_MS)));

        serde_json::to_writer(&mut stream, request)
            .map_err(|err| format!("Failed to write request: {}", err))?;
        stream
            .write_all(b"\n")
            .map_err(|err| format!("Failed to flush request: {}", err))?;
        stream.flush().ok();

        read_response(&mut stream)
    }
}

fn default_socket_path() -> Result<PathBuf, String> {
    if let Some(path) = non_empty_env(SOCKET_ENV) {
        return Ok(path);
    }
    if let Some(home) = non_empty_env(HOME_ENV) {
        return Ok(home.join(SOCKET_NAME));
    }
    let home = dirs::home_dir().ok_or_else(|| "Home directory not found".to_string())?;
    Ok(home.join(DEFAULT_HOME_DIR).join(SOCKET_NAME))
}

fn non_empty_env(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn read_response(stream: &mut UnixStream) -> Result<Response, String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err("Response exceeded maximum size".to_string());
                }
                if chunk[..n].contains(&b'\n') {
                    break;
                }
            }
            Err(err)
                if matches!(
                    err.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                return Err("Timed out waiting for daemon response".to_string());
            }
            Err(err) => return Err(format!("Failed to read response: {}", err)),
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    if response_bytes.is_empty() {
        return Err("Daemon response was empty".to_string());
    }

    serde_json::from_slice(response_bytes)
        .map_err(|err| format!("Failed to parse response JSON: {}", err))
}

fn make_request_id() -> String {
    format!(
        "hidectl-{}-{:x}",
        std::process::id(),
        rand::thread_rng().next_u64()
    )
}
