//! Monitor and property hooks installed by the daemon.
//!
//! Process interception and property rewriting live outside this daemon; the
//! hooks here drive the monitor lifecycle and record what was requested so the
//! health endpoint can report it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hide_core::{MonitorSignal, MonitorSignals, ProcessMonitor, PropertyHider};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Default)]
pub struct SignalMonitor {
    running: AtomicBool,
    rescans: AtomicUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub running: bool,
    pub rescans: usize,
}

impl SignalMonitor {
    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            running: self.running.load(Ordering::SeqCst),
            rescans: self.rescans.load(Ordering::SeqCst),
        }
    }
}

impl ProcessMonitor for SignalMonitor {
    fn run(&self, signals: MonitorSignals) {
        self.running.store(true, Ordering::SeqCst);
        info!("Process monitor started");
        loop {
            match signals.recv() {
                MonitorSignal::Rescan => {
                    let count = self.rescans.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!(rescans = count, "Process monitor rescan requested");
                }
                MonitorSignal::Stop => break,
            }
        }
        self.running.store(false, Ordering::SeqCst);
        info!("Process monitor stopped");
    }
}

#[derive(Default)]
pub struct PropertyLog {
    sensitive: AtomicUsize,
    late: AtomicUsize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySnapshot {
    pub sensitive_passes: usize,
    pub late_passes: usize,
}

impl PropertyLog {
    pub fn snapshot(&self) -> PropertySnapshot {
        PropertySnapshot {
            sensitive_passes: self.sensitive.load(Ordering::SeqCst),
            late_passes: self.late.load(Ordering::SeqCst),
        }
    }
}

impl PropertyHider for PropertyLog {
    fn hide_sensitive(&self) {
        let passes = self.sensitive.fetch_add(1, Ordering::SeqCst) + 1;
        info!(passes, "Sensitive property pass requested");
    }

    fn hide_late_sensitive(&self) {
        let passes = self.late.fetch_add(1, Ordering::SeqCst) + 1;
        info!(passes, "Late sensitive property pass requested");
    }
}
