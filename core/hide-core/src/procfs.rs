//! Process table access.
//!
//! The process root is opened once and rewound for every crawl, so repeated
//! scans on the query path cost no extra open/close. The handle is not safe
//! for concurrent crawls; callers hold the controller lock.

use std::ffi::{CStr, CString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use tracing::debug;

use crate::matcher::KillPolicy;

/// Longest command line prefix that is compared.
const CMDLINE_MAX: usize = 4019;

pub trait ProcessTable: Send {
    /// Opens the process root if it is not open yet.
    fn open(&mut self) -> io::Result<()>;

    /// Numeric entries of the process root, in directory order.
    fn pids(&mut self) -> Vec<i32>;

    /// First command line argument of `pid`.
    fn cmdline(&self, pid: i32) -> Option<String>;

    fn kill(&self, pid: i32) -> io::Result<()>;
}

/// Kills processes whose command line matches `name` under `policy`.
///
/// Stops after the first kill unless `multi` is set. Returns the number of
/// processes signalled.
pub fn kill_matching(
    table: &mut dyn ProcessTable,
    name: &str,
    policy: KillPolicy,
    multi: bool,
) -> usize {
    if let Err(err) = table.open() {
        debug!(error = %err, "Process table unavailable; skipping kill");
        return 0;
    }

    let mut killed = 0;
    for pid in table.pids() {
        let Some(cmdline) = table.cmdline(pid) else {
            continue;
        };
        if !policy.matches(&cmdline, name) {
            continue;
        }
        debug!(pid, cmdline = %cmdline, "hide: kill");
        match table.kill(pid) {
            Ok(()) => killed += 1,
            Err(err) => debug!(pid, error = %err, "Failed to kill process"),
        }
        if !multi {
            break;
        }
    }
    killed
}

/// `/proc` backed process table.
pub struct ProcFs {
    root: PathBuf,
    dir: Option<ProcDir>,
}

impl ProcFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir: None,
        }
    }
}

impl ProcessTable for ProcFs {
    fn open(&mut self) -> io::Result<()> {
        if self.dir.is_none() {
            self.dir = Some(ProcDir::open(&self.root)?);
        }
        Ok(())
    }

    fn pids(&mut self) -> Vec<i32> {
        match self.dir.as_mut() {
            Some(dir) => dir.pids(),
            None => Vec::new(),
        }
    }

    fn cmdline(&self, pid: i32) -> Option<String> {
        let raw = fs_err::read(self.root.join(pid.to_string()).join("cmdline")).ok()?;
        Some(first_arg(&raw))
    }

    fn kill(&self, pid: i32) -> io::Result<()> {
        // SAFETY: kill(2) takes plain integers and has no memory effects.
        if unsafe { libc::kill(pid, libc::SIGKILL) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

fn first_arg(raw: &[u8]) -> String {
    let raw = &raw[..raw.len().min(CMDLINE_MAX)];
    let end = raw
        .iter()
        .position(|b| *b == 0 || *b == b'\n')
        .unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Owned `DIR*` that is rewound rather than reopened.
struct ProcDir(NonNull<libc::DIR>);

// SAFETY: the handle is only touched through &mut self, never shared.
unsafe impl Send for ProcDir {}

impl ProcDir {
    fn open(path: &Path) -> io::Result<Self> {
        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL"))?;
        // SAFETY: c_path is a valid NUL-terminated string.
        let dir = unsafe { libc::opendir(c_path.as_ptr()) };
        NonNull::new(dir)
            .map(ProcDir)
            .ok_or_else(io::Error::last_os_error)
    }

    fn pids(&mut self) -> Vec<i32> {
        let mut pids = Vec::new();
        // SAFETY: self.0 is an open DIR* owned by this value; each dirent is
        // read before the next readdir call invalidates it.
        unsafe {
            libc::rewinddir(self.0.as_ptr());
            loop {
                let entry = libc::readdir(self.0.as_ptr());
                if entry.is_null() {
                    break;
                }
                let name = CStr::from_ptr((*entry).d_name.as_ptr());
                if let Some(pid) = name
                    .to_str()
                    .ok()
                    .and_then(|name| name.parse::<i32>().ok())
                    .filter(|pid| *pid > 0)
                {
                    pids.push(pid);
                }
            }
        }
        pids
    }
}

impl Drop for ProcDir {
    fn drop(&mut self) {
        // SAFETY: the pointer came from opendir and is closed exactly once.
        unsafe {
            libc::closedir(self.0.as_ptr());
        }
    }
}
