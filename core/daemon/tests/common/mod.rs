//! Spawns hide-daemon against a temp home with a fake device layout.

#![allow(dead_code)]

use fs_err as fs;
use hide_daemon_protocol::{Method, Request, Response};
use serde_json::Value;
use std::io::{Read, Write};
use std::os::unix::fs::MetadataExt;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub struct DaemonGuard {
    child: Child,
}

impl DaemonGuard {
    pub fn stop(mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Daemon home plus app-data, registry, proc and namespace stand-ins.
pub struct Device {
    home: TempDir,
}

impl Device {
    pub fn new() -> Self {
        let home = TempDir::new().expect("Failed to create temp home");
        let root = home.path().join("device");
        for dir in ["user_de/0", "system", "proc", "ns"] {
            fs::create_dir_all(root.join(dir)).expect("create device dir");
        }
        fs::write(root.join("system/packages.xml"), "<packages/>").expect("write registry");
        fs::write(root.join("ns/mnt"), "").expect("write ns marker");
        fs::write(
            home.path().join("hide.toml"),
            format!(
                "app_data_dir = '{root}/user_de'\n\
                 packages_xml = '{root}/system/packages.xml'\n\
                 proc_root = '{root}/proc'\n\
                 mnt_ns_path = '{root}/ns/mnt'\n",
                root = root.display()
            ),
        )
        .expect("write config");
        Self { home }
    }

    pub fn home(&self) -> &Path {
        self.home.path()
    }

    pub fn socket_path(&self) -> PathBuf {
        self.home().join("daemon.sock")
    }

    /// Creates the package's data dir and returns its owner UID.
    pub fn install(&self, package: &str) -> u32 {
        let dir = self.home().join("device/user_de/0").join(package);
        fs::create_dir_all(&dir).expect("install package");
        fs::metadata(&dir).expect("stat package").uid()
    }

    pub fn spawn(&self) -> DaemonGuard {
        let socket = self.socket_path();
        let _ = fs::remove_file(&socket);
        let child = Command::new(env!("CARGO_BIN_EXE_hide-daemon"))
            .env("HIDE_HOME", self.home())
            .env_remove("HIDE_CONFIG")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to spawn hide-daemon");
        let guard = DaemonGuard { child };
        wait_for_socket(&socket, Duration::from_secs(2));
        guard
    }

    pub fn call(&self, method: Method, params: Option<Value>) -> Response {
        send_request(
            &self.socket_path(),
            &Request::new(method, Some(format!("{:?}", method)), params),
        )
    }
}

pub fn wait_for_socket(path: &Path, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.exists() && UnixStream::connect(path).is_ok() {
            return;
        }
        sleep(Duration::from_millis(25));
    }
    panic!("Timed out waiting for daemon socket at {}", path.display());
}

pub fn send_request(socket: &Path, request: &Request) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    serde_json::to_writer(&mut stream, request).expect("Failed to serialize request");
    stream.write_all(b"\n").expect("Failed to write request");
    stream.flush().ok();
    read_response(&mut stream)
}

pub fn send_raw_request(socket: &Path, payload: &[u8]) -> Response {
    let mut stream = UnixStream::connect(socket).expect("Failed to connect to daemon socket");
    stream.write_all(payload).expect("Failed to write payload");
    stream.flush().ok();
    read_response(&mut stream)
}

pub fn read_response(stream: &mut UnixStream) -> Response {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).expect("Failed to read response");
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n') {
            break;
        }
    }

    let response_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => &buffer[..index],
        None => buffer.as_slice(),
    };

    serde_json::from_slice(response_bytes).expect("Failed to parse response JSON")
}
