//! # hide-core
//!
//! Decision engine for process hiding. Given a UID and a process name it
//! answers whether that process is a configured hide target, and it owns the
//! state needed to answer quickly:
//!
//! - the hide list (package → process names), loaded lazily from persistence
//! - the app ID index (app ID → hidden packages), rebuilt from the app-data
//!   layout when the package registry changes
//! - the matching policy for exact names, truncated names and isolated
//!   process prefixes
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime. One mutex guards all mutable state.
//! - **Collaborators behind traits**: persistence, the process table, the
//!   app-data scanner, the monitor thread body and property hiding are all
//!   injected, so the engine runs against temp directories and fakes in tests.
//! - **Scans never fail wholesale**: an unreadable entry is skipped, not fatal.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hide_core::{HideController, HideOptions};
//!
//! let controller = HideController::new(collaborators, HideOptions::default());
//! controller.enable(false)?;
//! controller.add("com.example.app", "")?;
//! assert!(controller.is_hide_target(10123, "com.example.app", 1024));
//! ```

pub mod controller;
pub mod error;
pub mod hide_list;
pub mod matcher;
pub mod monitor;
pub mod patterns;
pub mod persistence;
pub mod procfs;
pub mod scanner;
pub mod types;
pub mod uid_index;

pub use controller::{Collaborators, HideController, HideOptions, HidePaths};
pub use error::{HideError, Result};
pub use hide_list::{HideList, Removed};
pub use matcher::{is_match, validate, KillPolicy, MatchRule};
pub use monitor::{MonitorHandle, MonitorSignal, MonitorSignals, ProcessMonitor};
pub use persistence::{Persistence, PropertyHider};
pub use procfs::{kill_matching, ProcFs, ProcessTable};
pub use scanner::{AppDataScanner, PackageOwner, PackageScanner};
pub use types::*;
pub use uid_index::UidIndex;
