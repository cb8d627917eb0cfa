//! In-memory collaborators for controller tests.

#![allow(dead_code)]

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fs_err as fs;

use hide_core::{
    Collaborators, HideController, HideOptions, HidePaths, MonitorSignal, MonitorSignals,
    PackageOwner, PackageScanner, Persistence, ProcessMonitor, ProcessTable, PropertyHider,
};

// ═══════════════════════════════════════════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct MemoryPersistence {
    rows: Mutex<Vec<(String, String)>>,
    enabled: Mutex<bool>,
    pub fail_reads: Mutex<bool>,
    pub fail_writes: Mutex<bool>,
    before_enable_write: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MemoryPersistence {
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = self.rows.lock().expect("rows").clone();
        rows.sort();
        rows
    }

    pub fn seed(&self, package: &str, process: &str) {
        self.rows
            .lock()
            .expect("rows")
            .push((package.to_string(), process.to_string()));
    }

    pub fn stored_enabled(&self) -> bool {
        *self.enabled.lock().expect("enabled")
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock().expect("flag") = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().expect("flag") = fail;
    }

    /// Runs `hook` once, just before the next `true` write of the enabled flag.
    pub fn before_enable_write(&self, hook: impl FnOnce() + Send + 'static) {
        *self.before_enable_write.lock().expect("hook") = Some(Box::new(hook));
    }

    fn check_write(&self) -> Result<(), String> {
        if *self.fail_writes.lock().expect("flag") {
            Err("database is locked".to_string())
        } else {
            Ok(())
        }
    }
}

impl Persistence for MemoryPersistence {
    fn for_each_entry(&self, row: &mut dyn FnMut(&str, &str) -> bool) -> Result<(), String> {
        if *self.fail_reads.lock().expect("flag") {
            return Err("no such table: hidelist".to_string());
        }
        for (package, process) in self.rows.lock().expect("rows").iter() {
            if !row(package, process) {
                break;
            }
        }
        Ok(())
    }

    fn insert_entry(&self, package: &str, process: &str) -> Result<(), String> {
        self.check_write()?;
        self.seed(package, process);
        Ok(())
    }

    fn delete_entry(&self, package: &str, process: Option<&str>) -> Result<(), String> {
        self.check_write()?;
        self.rows.lock().expect("rows").retain(|(p, proc_name)| {
            p != package || process.is_some_and(|process| process != proc_name)
        });
        Ok(())
    }

    fn hide_enabled(&self) -> Result<bool, String> {
        Ok(self.stored_enabled())
    }

    fn set_hide_enabled(&self, enabled: bool) -> Result<(), String> {
        if enabled {
            let hook = self.before_enable_write.lock().expect("hook").take();
            if let Some(hook) = hook {
                hook();
            }
        }
        *self.enabled.lock().expect("enabled") = enabled;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// App-data scanner
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct ScannerState {
    pub fingerprint: u64,
    pub owners: Vec<(String, Option<u32>)>,
    pub full_scans: usize,
}

#[derive(Clone, Default)]
pub struct FakeScanner(pub Arc<Mutex<ScannerState>>);

impl FakeScanner {
    pub fn install(&self, package: &str, uid: u32) {
        self.0
            .lock()
            .expect("scanner")
            .owners
            .push((package.to_string(), Some(uid)));
    }

    pub fn install_unresolved(&self, package: &str) {
        self.0
            .lock()
            .expect("scanner")
            .owners
            .push((package.to_string(), None));
    }

    pub fn set_fingerprint(&self, fingerprint: u64) {
        self.0.lock().expect("scanner").fingerprint = fingerprint;
    }

    pub fn full_scans(&self) -> usize {
        self.0.lock().expect("scanner").full_scans
    }
}

impl PackageScanner for FakeScanner {
    fn fingerprint(&self) -> u64 {
        self.0.lock().expect("scanner").fingerprint
    }

    fn owners(&self) -> Vec<PackageOwner> {
        let mut state = self.0.lock().expect("scanner");
        state.full_scans += 1;
        state
            .owners
            .iter()
            .map(|(package, uid)| PackageOwner {
                package: package.clone(),
                uid: *uid,
            })
            .collect()
    }

    fn find_owner(&self, package: &str) -> Option<u32> {
        self.0
            .lock()
            .expect("scanner")
            .owners
            .iter()
            .find(|(p, uid)| p == package && uid.is_some())
            .and_then(|(_, uid)| *uid)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Process table
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct ProcessState {
    pub running: Vec<(i32, String)>,
    pub killed: Vec<i32>,
    pub fail_open: bool,
}

#[derive(Clone, Default)]
pub struct FakeProcesses(pub Arc<Mutex<ProcessState>>);

impl FakeProcesses {
    pub fn spawn(&self, pid: i32, cmdline: &str) {
        self.0
            .lock()
            .expect("procs")
            .running
            .push((pid, cmdline.to_string()));
    }

    pub fn killed(&self) -> Vec<i32> {
        self.0.lock().expect("procs").killed.clone()
    }
}

impl ProcessTable for FakeProcesses {
    fn open(&mut self) -> io::Result<()> {
        if self.0.lock().expect("procs").fail_open {
            Err(io::Error::new(io::ErrorKind::NotFound, "no process root"))
        } else {
            Ok(())
        }
    }

    fn pids(&mut self) -> Vec<i32> {
        self.0
            .lock()
            .expect("procs")
            .running
            .iter()
            .map(|(pid, _)| *pid)
            .collect()
    }

    fn cmdline(&self, pid: i32) -> Option<String> {
        self.0
            .lock()
            .expect("procs")
            .running
            .iter()
            .find(|(p, _)| *p == pid)
            .map(|(_, cmdline)| cmdline.clone())
    }

    fn kill(&self, pid: i32) -> io::Result<()> {
        let mut state = self.0.lock().expect("procs");
        state.running.retain(|(p, _)| *p != pid);
        state.killed.push(pid);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Monitor and property hooks
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct RecordingMonitor {
    pub starts: AtomicUsize,
    pub signals: Mutex<Vec<MonitorSignal>>,
}

impl RecordingMonitor {
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Vec<MonitorSignal> {
        self.signals.lock().expect("signals").clone()
    }
}

impl ProcessMonitor for RecordingMonitor {
    fn run(&self, signals: MonitorSignals) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        loop {
            let signal = signals.recv();
            self.signals.lock().expect("signals").push(signal);
            if signal == MonitorSignal::Stop {
                break;
            }
        }
    }
}

#[derive(Default)]
pub struct RecordingProps {
    pub sensitive: AtomicUsize,
    pub late: AtomicUsize,
}

impl PropertyHider for RecordingProps {
    fn hide_sensitive(&self) {
        self.sensitive.fetch_add(1, Ordering::SeqCst);
    }

    fn hide_late_sensitive(&self) {
        self.late.fetch_add(1, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Harness
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Harness {
    pub controller: HideController,
    pub db: Arc<MemoryPersistence>,
    pub scanner: FakeScanner,
    pub procs: FakeProcesses,
    pub monitor: Arc<RecordingMonitor>,
    pub props: Arc<RecordingProps>,
    _root: tempfile::TempDir,
}

pub struct HarnessOptions {
    pub namespace_supported: bool,
    pub sdk_int: u32,
    pub manager_package: Option<String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            namespace_supported: true,
            sdk_int: 29,
            manager_package: None,
        }
    }
}

pub fn harness() -> Harness {
    harness_with(HarnessOptions::default())
}

pub fn harness_with(options: HarnessOptions) -> Harness {
    let root = tempfile::tempdir().expect("temp dir");
    let mnt_ns_path = root.path().join("ns").join("mnt");
    if options.namespace_supported {
        fs::create_dir_all(root.path().join("ns")).expect("create ns dir");
        fs::write(&mnt_ns_path, "").expect("write ns marker");
    }

    let db = Arc::new(MemoryPersistence::default());
    let scanner = FakeScanner::default();
    scanner.set_fingerprint(1);
    let procs = FakeProcesses::default();
    let monitor = Arc::new(RecordingMonitor::default());
    let props = Arc::new(RecordingProps::default());

    let controller = HideController::new(
        Collaborators {
            persistence: db.clone(),
            scanner: Box::new(scanner.clone()),
            processes: Box::new(procs.clone()),
            monitor: monitor.clone(),
            props: props.clone(),
        },
        HideOptions {
            paths: HidePaths {
                mnt_ns_path,
                ..HidePaths::default()
            },
            sdk_int: options.sdk_int,
            manager_package: options.manager_package,
        },
    );

    Harness {
        controller,
        db,
        scanner,
        procs,
        monitor,
        props,
        _root: root,
    }
}

/// Polls `condition` until it holds or two seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
