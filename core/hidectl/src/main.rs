//! hidectl: command-line client for hide-daemon.
//!
//! Exits 0 when the daemon reports success and 1 otherwise.

mod daemon_client;

use clap::{Parser, Subcommand};
use hide_daemon_protocol::{parse_record, HideStatus, Method, Response};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use daemon_client::DaemonClient;

#[derive(Parser)]
#[command(name = "hidectl")]
#[command(about = "Manage the process hide list")]
#[command(version)]
struct Cli {
    /// Daemon socket path (defaults to $HIDE_DAEMON_SOCKET)
    #[arg(long, global = true, value_name = "PATH")]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show whether process hiding is enabled
    Status,

    /// Enable process hiding
    Enable {
        /// Also run the late-boot property pass
        #[arg(long)]
        late_props: bool,
    },

    /// Disable process hiding
    Disable,

    /// Add a package (and optionally one of its processes) to the hide list
    Add {
        #[arg(value_name = "PKG")]
        package: String,

        /// Defaults to the package name
        #[arg(value_name = "PROC")]
        process: Option<String>,
    },

    /// Remove a process, or the whole package when no process is given
    Rm {
        #[arg(value_name = "PKG")]
        package: String,

        #[arg(value_name = "PROC")]
        process: Option<String>,
    },

    /// List hide list entries as `pkg|proc`
    Ls,

    /// Ask whether a process started as UID would be hidden
    Query {
        #[arg(value_name = "UID")]
        uid: u32,

        #[arg(value_name = "PROC")]
        process: String,
    },
}

impl Commands {
    fn request(&self) -> (Method, Option<Value>) {
        match self {
            Commands::Status => (Method::Status, None),
            Commands::Enable { late_props } => {
                (Method::Enable, Some(json!({ "late_props": late_props })))
            }
            Commands::Disable => (Method::Disable, None),
            Commands::Add { package, process } => (Method::Add, Some(entry(package, process))),
            Commands::Rm { package, process } => (Method::Remove, Some(entry(package, process))),
            Commands::Ls => (Method::List, None),
            Commands::Query { uid, process } => (
                Method::Query,
                Some(json!({ "uid": uid, "process": process })),
            ),
        }
    }
}

fn entry(package: &str, process: &Option<String>) -> Value {
    json!({
        "package": package,
        "process": process.as_deref().unwrap_or_default(),
    })
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let client = match DaemonClient::resolve(cli.socket) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("hidectl: {}", err);
            std::process::exit(1);
        }
    };

    let (method, params) = cli.command.request();
    match client.call(method, params) {
        Ok(response) => {
            let ok = response.status == HideStatus::Success;
            for line in render(&cli.command, &response) {
                if ok {
                    println!("{}", line);
                } else {
                    eprintln!("{}", line);
                }
            }
            std::process::exit(if ok { 0 } else { 1 });
        }
        Err(err) => {
            tracing::warn!(error = %err, "Daemon request failed");
            eprintln!("hidectl: {}", err);
            std::process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Output lines for a daemon response.
fn render(command: &Commands, response: &Response) -> Vec<String> {
    if response.status != HideStatus::Success {
        let mut line = format!("{} ({})", status_label(response.status), response.status.code());
        if let Some(error) = &response.error {
            line.push_str(&format!(": {}", error.message));
        }
        return vec![line];
    }

    let data = response.data.as_ref();
    match command {
        Commands::Status => {
            let enabled = data
                .and_then(|data| data.get("enabled"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            vec![if enabled { "enabled" } else { "disabled" }.to_string()]
        }
        Commands::Ls => data
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|record| {
                        let valid = parse_record(record).is_some();
                        if !valid {
                            tracing::warn!(record = *record, "Skipping malformed hide list record");
                        }
                        valid
                    })
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default(),
        Commands::Query { .. } => {
            let hidden = data
                .and_then(|data| data.get("hidden"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            vec![if hidden { "hidden" } else { "visible" }.to_string()]
        }
        _ => Vec::new(),
    }
}

fn status_label(status: HideStatus) -> &'static str {
    match status {
        HideStatus::Success => "success",
        HideStatus::DaemonError => "daemon error",
        HideStatus::ItemExists => "item already exists",
        HideStatus::ItemNotFound => "item not found",
        HideStatus::NamespaceUnsupported => "mount namespace not supported",
        HideStatus::InvalidName => "invalid package or process name",
    }
}
