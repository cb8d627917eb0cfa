//! hide-daemon entrypoint.
//!
//! A small single-writer service that owns the hide controller: a socket
//! listener, strict request validation, and a SQLite-backed hide list.

use fs_err as fs;
use std::env;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hide_core::{
    AddOutcome, Collaborators, HideController, HideError, RemoveOutcome, DEFAULT_MAX_LEN,
};
use hide_daemon_protocol::{
    format_record, parse_enable_params, parse_entry_params, parse_query_params, ErrorInfo,
    HideStatus, Method, Request, Response, MAX_REQUEST_BYTES, PROTOCOL_VERSION,
};

mod config;
mod db;
mod hooks;

use config::DaemonConfig;
use db::Db;
use hooks::{PropertyLog, SignalMonitor};

const READ_TIMEOUT_SECS: u64 = 2;
const READ_CHUNK_SIZE: usize = 4096;

struct Daemon {
    controller: HideController,
    monitor: Arc<SignalMonitor>,
    props: Arc<PropertyLog>,
    started_at: String,
}

fn main() {
    init_logging();

    let home = match config::hide_home() {
        Ok(home) => home,
        Err(err) => {
            error!(error = %err, "Failed to resolve daemon home directory");
            std::process::exit(1);
        }
    };

    let config = match config::load_config(&config::config_path(&home)) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            DaemonConfig::default()
        }
    };

    let socket_path = config.socket_path(&home);

    if let Err(err) = prepare_socket_dir(&socket_path) {
        error!(error = %err, "Failed to prepare daemon socket directory");
        std::process::exit(1);
    }

    if let Err(err) = remove_existing_socket(&socket_path) {
        error!(error = %err, path = %socket_path.display(), "Failed to remove existing socket");
        std::process::exit(1);
    }

    let listener = match UnixListener::bind(&socket_path) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, path = %socket_path.display(), "Failed to bind daemon socket");
            std::process::exit(1);
        }
    };

    let db = match Db::new(config.db_path(&home)) {
        Ok(db) => db,
        Err(err) => {
            error!(error = %err, "Failed to initialize daemon database");
            std::process::exit(1);
        }
    };

    let daemon = Arc::new(build_daemon(&config, db));
    daemon.controller.auto_start(config.late_props);

    info!(
        path = %socket_path.display(),
        enabled = daemon.controller.status(),
        sdk_int = config.sdk_int,
        "hide-daemon started"
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let daemon = Arc::clone(&daemon);
                thread::spawn(move || handle_connection(stream, &daemon));
            }
            Err(err) => {
                warn!(error = %err, "Failed to accept daemon connection");
            }
        }
    }
}

fn build_daemon(config: &DaemonConfig, db: Db) -> Daemon {
    let options = config.hide_options();
    let monitor = Arc::new(SignalMonitor::default());
    let props = Arc::new(PropertyLog::default());
    let collaborators = Collaborators::system(
        &options.paths,
        Arc::new(db),
        monitor.clone(),
        props.clone(),
    );

    Daemon {
        controller: HideController::new(collaborators, options),
        monitor,
        props,
        started_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn init_logging() {
    let debug_enabled = env::var("HIDE_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn prepare_socket_dir(socket_path: &Path) -> Result<(), String> {
    let parent = socket_path
        .parent()
        .ok_or_else(|| "Socket path has no parent".to_string())?;
    fs::create_dir_all(parent).map_err(|err| format!("Failed to create socket directory: {}", err))
}

fn remove_existing_socket(socket_path: &Path) -> Result<(), String> {
    if socket_path.exists() {
        fs::remove_file(socket_path)
            .map_err(|err| format!("Failed to remove existing socket: {}", err))?;
    }
    Ok(())
}

fn handle_connection(mut stream: UnixStream, daemon: &Daemon) {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            warn!(code = %err.code, message = %err.message, "Failed to read request");
            let response = Response::error_with_info(None, HideStatus::DaemonError, err);
            let _ = write_response(&mut stream, response);
            return;
        }
    };

    tracing::debug!(method = ?request.method, id = ?request.id, "Daemon request received");
    let response = handle_request(request, daemon);
    let _ = write_response(&mut stream, response);
}

fn read_request(stream: &mut UnixStream) -> Result<Request, ErrorInfo> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(READ_TIMEOUT_SECS)));

    let mut buffer = Vec::new();
    let mut chunk = [0u8; READ_CHUNK_SIZE];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if buffer.len() > MAX_REQUEST_BYTES {
                    return Err(ErrorInfo::new(
                        "request_too_large",
                        "request exceeded maximum size",
                    ));
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
                return Err(ErrorInfo::new("read_timeout", "request timed out"));
            }
            Err(err) => {
                return Err(ErrorInfo::new(
                    "read_error",
                    format!("failed to read request: {}", err),
                ));
            }
        }
    }

    let request_bytes = match buffer.iter().position(|b| *b == b'\n') {
        Some(index) => {
            if buffer[index + 1..].iter().any(|b| !b.is_ascii_whitespace()) {
                warn!("Extra bytes detected after newline; ignoring trailing data");
            }
            &buffer[..index]
        }
        None => buffer.as_slice(),
    };

    if request_bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ErrorInfo::new("empty_request", "request body was empty"));
    }

    serde_json::from_slice(request_bytes).map_err(|err| {
        ErrorInfo::new(
            "invalid_json",
            format!("request was not valid JSON: {}", err),
        )
    })
}

fn handle_request(request: Request, daemon: &Daemon) -> Response {
    if request.protocol_version != PROTOCOL_VERSION {
        return Response::error(
            request.id,
            HideStatus::DaemonError,
            "protocol_mismatch",
            "unsupported protocol version",
        );
    }

    let controller = &daemon.controller;
    let id = request.id;

    match request.method {
        Method::GetHealth => {
            let mut data = serde_json::json!({
                "status": "ok",
                "pid": std::process::id(),
                "version": env!("CARGO_PKG_VERSION"),
                "protocol_version": PROTOCOL_VERSION,
                "started_at": daemon.started_at,
                "enabled": controller.status(),
                "monitor_running": controller.monitor_running(),
                "scan_count": controller.scan_count(),
                "manager_app_id": controller.manager_app_id(),
            });
            if let Ok(value) = serde_json::to_value(daemon.monitor.snapshot()) {
                data["monitor"] = value;
            }
            if let Ok(value) = serde_json::to_value(daemon.props.snapshot()) {
                data["properties"] = value;
            }
            Response::ok(id, data)
        }
        Method::Status => Response::ok(id, serde_json::json!({ "enabled": controller.status() })),
        Method::Enable => {
            let params = match parse_enable_params(request.params) {
                Ok(params) => params,
                Err(err) => return Response::error_with_info(id, HideStatus::DaemonError, err),
            };
            match controller.enable(params.late_props) {
                Ok(()) => Response::status(id, HideStatus::Success),
                Err(err) => error_response(id, err),
            }
        }
        Method::Disable => match controller.disable() {
            Ok(()) => Response::status(id, HideStatus::Success),
            Err(err) => error_response(id, err),
        },
        Method::Add => {
            let entry = match parse_entry_params(request.params) {
                Ok(entry) => entry,
                Err(err) => return Response::error_with_info(id, HideStatus::InvalidName, err),
            };
            match controller.add(&entry.package, &entry.process) {
                Ok(AddOutcome::Inserted) => Response::status(id, HideStatus::Success),
                Ok(AddOutcome::AlreadyExists) => Response::status(id, HideStatus::ItemExists),
                Err(err) => error_response(id, err),
            }
        }
        Method::Remove => {
            let entry = match parse_entry_params(request.params) {
                Ok(entry) => entry,
                Err(err) => return Response::error_with_info(id, HideStatus::InvalidName, err),
            };
            match controller.remove(&entry.package, &entry.process) {
                Ok(RemoveOutcome::Removed) => Response::status(id, HideStatus::Success),
                Ok(RemoveOutcome::NotFound) => Response::status(id, HideStatus::ItemNotFound),
                Err(err) => error_response(id, err),
            }
        }
        Method::List => match controller.list() {
            Ok(entries) => {
                tracing::debug!(entries = entries.len(), "Hide list snapshot");
                let records: Vec<String> = entries
                    .iter()
                    .map(|entry| format_record(&entry.package, &entry.process))
                    .collect();
                Response::ok(id, serde_json::json!(records))
            }
            Err(err) => error_response(id, err),
        },
        Method::Query => {
            let query = match parse_query_params(request.params) {
                Ok(query) => query,
                Err(err) => return Response::error_with_info(id, HideStatus::DaemonError, err),
            };
            let hidden = controller.is_hide_target(
                query.uid,
                &query.process,
                query.max_len.unwrap_or(DEFAULT_MAX_LEN),
            );
            Response::ok(id, serde_json::json!({ "hidden": hidden }))
        }
    }
}

/// Maps controller errors onto wire status codes.
fn error_response(id: Option<String>, err: HideError) -> Response {
    let (status, code) = match &err {
        HideError::InvalidName { .. } => (HideStatus::InvalidName, "invalid_name"),
        HideError::NamespaceUnsupported => {
            (HideStatus::NamespaceUnsupported, "namespace_unsupported")
        }
        HideError::Storage(_) => (HideStatus::DaemonError, "storage_error"),
        HideError::Daemon(_) => (HideStatus::DaemonError, "daemon_error"),
    };
    warn!(code, error = %err, "Request failed");
    Response::error(id, status, code, err.to_string())
}

fn write_response(stream: &mut UnixStream, response: Response) -> std::io::Result<()> {
    serde_json::to_writer(&mut *stream, &response)?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    Ok(())
}
