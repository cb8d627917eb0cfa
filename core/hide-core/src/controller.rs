//! Top-level hide controller.
//!
//! Owns the enabled flag, the lazily loaded hide list and app ID index, the
//! process table handle and the monitor thread handle. One mutex guards all
//! of it; the enabled flag is mirrored in an atomic for the fast path.
//!
//! # Lifecycle
//!
//! ```text
//! Disabled ──enable──► Enabled ──disable──► Disabled
//!              ▲  │
//!              └──┘ enable (no-op)
//! ```
//!
//! `enable` is the one operation that drops the lock before finishing: the
//! index rebuild and the flag persistence run after the monitor thread is
//! started, so the monitor can query immediately. A query racing the rebuild
//! sees a slightly stale index, which heals on the next stale check.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use crate::error::{HideError, Result};
use crate::hide_list::{HideList, Removed};
use crate::matcher::{is_match, validate, KillPolicy, MatchRule};
use crate::monitor::{MonitorHandle, ProcessMonitor};
use crate::persistence::{Persistence, PropertyHider};
use crate::procfs::{kill_matching, ProcFs, ProcessTable};
use crate::scanner::{AppDataScanner, PackageScanner};
use crate::types::{
    is_isolated_app_id, to_app_id, AddOutcome, HideEntry, RemoveOutcome, ISOLATED_MAGIC,
    UNRESOLVED_APP_ID, WEBVIEW_ZYGOTE,
};
use crate::uid_index::UidIndex;

/// First SDK level with the unspecialized app process pool and app zygotes.
const SDK_APP_ZYGOTE: u32 = 29;

/// Filesystem locations the engine reads.
#[derive(Debug, Clone)]
pub struct HidePaths {
    pub app_data_dir: PathBuf,
    pub packages_xml: PathBuf,
    pub proc_root: PathBuf,
    /// Present only on kernels with mount namespace support.
    pub mnt_ns_path: PathBuf,
}

impl Default for HidePaths {
    fn default() -> Self {
        Self {
            app_data_dir: PathBuf::from("/data/user_de"),
            packages_xml: PathBuf::from("/data/system/packages.xml"),
            proc_root: PathBuf::from("/proc"),
            mnt_ns_path: PathBuf::from("/proc/self/ns/mnt"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HideOptions {
    pub paths: HidePaths,
    pub sdk_int: u32,
    pub manager_package: Option<String>,
}

impl Default for HideOptions {
    fn default() -> Self {
        Self {
            paths: HidePaths::default(),
            sdk_int: SDK_APP_ZYGOTE,
            manager_package: None,
        }
    }
}

/// Everything the controller calls out to.
pub struct Collaborators {
    pub persistence: Arc<dyn Persistence>,
    pub scanner: Box<dyn PackageScanner>,
    pub processes: Box<dyn ProcessTable>,
    pub monitor: Arc<dyn ProcessMonitor>,
    pub props: Arc<dyn PropertyHider>,
}

impl Collaborators {
    /// Filesystem-backed scanner and process table rooted at `paths`.
    pub fn system(
        paths: &HidePaths,
        persistence: Arc<dyn Persistence>,
        monitor: Arc<dyn ProcessMonitor>,
        props: Arc<dyn PropertyHider>,
    ) -> Self {
        Self {
            persistence,
            scanner: Box::new(AppDataScanner::new(
                &paths.app_data_dir,
                &paths.packages_xml,
            )),
            processes: Box::new(ProcFs::new(&paths.proc_root)),
            monitor,
            props,
        }
    }
}

struct Tables {
    list: HideList,
    index: UidIndex,
}

enum Lists {
    Uninitialized,
    Ready(Tables),
}

struct HideState {
    lists: Lists,
    scanner: Box<dyn PackageScanner>,
    processes: Box<dyn ProcessTable>,
    monitor: MonitorHandle,
}

/// Split borrows of an initialized state.
struct Ready<'a> {
    list: &'a mut HideList,
    index: &'a mut UidIndex,
    scanner: &'a dyn PackageScanner,
    processes: &'a mut dyn ProcessTable,
}

impl HideState {
    fn refresh_index(&mut self) {
        if let Lists::Ready(tables) = &mut self.lists {
            tables.index.rescan_if_stale(self.scanner.as_ref(), &tables.list);
        }
    }

    /// Loads the hide list and builds the index on first use.
    fn ready(&mut self, persistence: &dyn Persistence) -> Result<Ready<'_>> {
        if let Lists::Uninitialized = self.lists {
            let list = HideList::load(persistence, self.processes.as_mut())?;
            let mut index = UidIndex::new();
            index.rescan_if_stale(self.scanner.as_ref(), &list);
            self.lists = Lists::Ready(Tables { list, index });
        }
        let Lists::Ready(tables) = &mut self.lists else {
            return Err(HideError::Daemon("hide list unavailable".to_string()));
        };
        Ok(Ready {
            list: &mut tables.list,
            index: &mut tables.index,
            scanner: self.scanner.as_ref(),
            processes: self.processes.as_mut(),
        })
    }
}

pub struct HideController {
    state: Mutex<HideState>,
    enabled: AtomicBool,
    persistence: Arc<dyn Persistence>,
    props: Arc<dyn PropertyHider>,
    options: HideOptions,
}

impl HideController {
    pub fn new(collaborators: Collaborators, options: HideOptions) -> Self {
        let Collaborators {
            persistence,
            scanner,
            processes,
            monitor,
            props,
        } = collaborators;
        Self {
            state: Mutex::new(HideState {
                lists: Lists::Uninitialized,
                scanner,
                processes,
                monitor: MonitorHandle::new(monitor),
            }),
            enabled: AtomicBool::new(false),
            persistence,
            props,
            options,
        }
    }

    pub fn status(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn enable(&self, late_props: bool) -> Result<()> {
        if self.status() {
            return Ok(());
        }

        {
            let mut state = self.lock();
            // A racing enable may have finished while we waited for the lock.
            if self.status() {
                return Ok(());
            }

            if !self.options.paths.mnt_ns_path.exists() {
                warn!("The kernel does not support mount namespace");
                return Err(HideError::NamespaceUnsupported);
            }

            state.processes.open().map_err(|err| {
                HideError::Daemon(format!("Failed to open process table: {}", err))
            })?;

            info!("* Enable process hiding");

            self.enabled.store(true, Ordering::Release);
            if let Err(err) = state.ready(self.persistence.as_ref()) {
                self.enabled.store(false, Ordering::Release);
                return Err(err);
            }

            // App zygotes and pooled processes must restart under hiding.
            if self.options.sdk_int >= SDK_APP_ZYGOTE {
                let processes = state.processes.as_mut();
                kill_matching(processes, "usap32", KillPolicy::Exact, true);
                kill_matching(processes, "usap64", KillPolicy::Exact, true);
                kill_matching(processes, "_zygote", KillPolicy::Suffix, true);
            }

            self.props.hide_sensitive();
            if late_props {
                self.props.hide_late_sensitive();
            }

            if let Err(err) = state.monitor.start() {
                self.enabled.store(false, Ordering::Release);
                return Err(HideError::Daemon(format!(
                    "Failed to start monitor thread: {}",
                    err
                )));
            }
        }

        // Relock so a disable that raced in after the unlock persists last.
        let mut state = self.lock();
        state.refresh_index();
        self.persist_enabled(&state);
        Ok(())
    }

    /// Always succeeds; the next enable reloads from persistence.
    pub fn disable(&self) -> Result<()> {
        let mut state = self.lock();

        if self.status() {
            info!("* Disable process hiding");
            state.lists = Lists::Uninitialized;
        }

        state.monitor.stop();
        self.enabled.store(false, Ordering::Release);
        self.persist_enabled(&state);
        Ok(())
    }

    /// Startup hook: refresh a running instance, or restore the persisted flag.
    pub fn auto_start(&self, late_props: bool) {
        if self.status() {
            self.lock().monitor.poke();
            self.props.hide_late_sensitive();
            return;
        }

        match self.persistence.hide_enabled() {
            Ok(true) => {
                if let Err(err) = self.enable(late_props) {
                    warn!(error = %err, "Failed to auto-start process hiding");
                }
            }
            Ok(false) => {}
            Err(err) => warn!(error = %err, "Failed to read hide setting"),
        }
    }

    pub fn add(&self, package: &str, process: &str) -> Result<AddOutcome> {
        let process = if process.is_empty() { package } else { process };
        if !validate(package, process) {
            return Err(HideError::InvalidName {
                package: package.to_string(),
                process: process.to_string(),
            });
        }

        let mut state = self.lock();
        let ready = state.ready(self.persistence.as_ref())?;
        if ready.list.insert(package, process, ready.processes) == AddOutcome::AlreadyExists {
            return Ok(AddOutcome::AlreadyExists);
        }
        ready.index.patch_one(ready.scanner, package, false);

        self.persistence
            .insert_entry(package, process)
            .map_err(HideError::Storage)?;
        Ok(AddOutcome::Inserted)
    }

    /// An empty `process` removes the whole package.
    pub fn remove(&self, package: &str, process: &str) -> Result<RemoveOutcome> {
        let process = (!process.is_empty()).then_some(process);

        let mut state = self.lock();
        let ready = state.ready(self.persistence.as_ref())?;
        match ready.list.remove(package, process) {
            None => return Ok(RemoveOutcome::NotFound),
            Some(Removed::Package) => ready.index.patch_one(ready.scanner, package, true),
            Some(Removed::Process) => {}
        }

        self.persistence
            .delete_entry(package, process)
            .map_err(HideError::Storage)?;
        Ok(RemoveOutcome::Removed)
    }

    pub fn list(&self) -> Result<Vec<HideEntry>> {
        let mut state = self.lock();
        let ready = state.ready(self.persistence.as_ref())?;
        Ok(ready.list.entries())
    }

    /// Hot path: is `process` running as `uid` a hide target?
    pub fn is_hide_target(&self, uid: u32, process: &str, max_len: usize) -> bool {
        if !self.status() || process == WEBVIEW_ZYGOTE {
            return false;
        }

        let mut state = self.lock();
        let ready = match state.ready(self.persistence.as_ref()) {
            Ok(ready) => ready,
            Err(err) => {
                warn!(error = %err, "Hide list unavailable for query");
                return false;
            }
        };
        ready.index.rescan_if_stale(ready.scanner, ready.list);

        let app_id = to_app_id(uid);
        if is_isolated_app_id(app_id) {
            let isolated = ready.list.processes(ISOLATED_MAGIC);
            if isolated.is_some_and(|targets| {
                is_match(
                    targets.iter().map(String::as_str),
                    process,
                    max_len,
                    MatchRule::IsolatedPrefix,
                )
            }) {
                return true;
            }
            return ready
                .index
                .packages(UNRESOLVED_APP_ID)
                .is_some_and(|targets| {
                    is_match(
                        targets.iter().map(String::as_str),
                        process,
                        max_len,
                        MatchRule::IsolatedPrefix,
                    )
                });
        }

        let Some(packages) = ready.index.packages(app_id) else {
            return false;
        };
        let exact = packages.iter().any(|package| {
            ready
                .list
                .processes(package)
                .is_some_and(|processes| processes.contains(process))
        });
        exact
            || is_match(
                packages.iter().map(String::as_str),
                process,
                max_len,
                MatchRule::PackageName,
            )
    }

    /// App ID of the configured package-manager app.
    ///
    /// Never loads the hide list: without a loaded index the owner is looked
    /// up directly and nothing is cached.
    pub fn manager_app_id(&self) -> Option<i32> {
        let manager = self.options.manager_package.as_deref()?;
        let mut state = self.lock();
        let HideState { lists, scanner, .. } = &mut *state;
        match lists {
            Lists::Ready(tables) => tables.index.manager_app_id(scanner.as_ref(), manager),
            Lists::Uninitialized => scanner.find_owner(manager).map(to_app_id),
        }
    }

    /// Full index rescans since the hide list was last loaded.
    pub fn scan_count(&self) -> usize {
        match &self.lock().lists {
            Lists::Ready(tables) => tables.index.scan_count(),
            Lists::Uninitialized => 0,
        }
    }

    pub fn monitor_running(&self) -> bool {
        self.lock().monitor.is_running()
    }

    /// Takes the state guard so the flag read and the write cannot interleave
    /// with another enable or disable.
    fn persist_enabled(&self, _state: &HideState) {
        let enabled = self.status();
        if let Err(err) = self.persistence.set_hide_enabled(enabled) {
            warn!(error = %err, enabled, "Failed to persist hide setting");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HideState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
