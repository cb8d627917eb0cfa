//! Lifecycle of the background monitor thread.
//!
//! The monitor body is a collaborator ([`ProcessMonitor`]). This module only
//! starts it on a named thread and delivers control signals over a channel.
//! Stopping is fire-and-forget: the thread is never joined.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::debug;

const MONITOR_THREAD_NAME: &str = "hide-monitor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorSignal {
    /// Exit the monitor loop.
    Stop,
    /// Re-read kernel hotplug state.
    Rescan,
}

/// Receiving end handed to the monitor body. A dropped sender reads as `Stop`.
pub struct MonitorSignals {
    rx: Receiver<MonitorSignal>,
}

impl MonitorSignals {
    pub fn recv(&self) -> MonitorSignal {
        self.rx.recv().unwrap_or(MonitorSignal::Stop)
    }
}

pub trait ProcessMonitor: Send + Sync {
    /// Runs until a `Stop` signal is received.
    fn run(&self, signals: MonitorSignals);
}

pub struct MonitorHandle {
    monitor: Arc<dyn ProcessMonitor>,
    sender: Option<Sender<MonitorSignal>>,
}

impl MonitorHandle {
    pub fn new(monitor: Arc<dyn ProcessMonitor>) -> Self {
        Self {
            monitor,
            sender: None,
        }
    }

    /// Spawns a fresh monitor thread, stopping any previous one.
    pub fn start(&mut self) -> io::Result<()> {
        self.stop();

        let (tx, rx) = mpsc::channel();
        let monitor = Arc::clone(&self.monitor);
        thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || monitor.run(MonitorSignals { rx }))?;
        self.sender = Some(tx);
        debug!("Monitor thread started");
        Ok(())
    }

    /// Signals the monitor to stop. A missing thread is not an error.
    pub fn stop(&mut self) {
        if let Some(tx) = self.sender.take() {
            let _ = tx.send(MonitorSignal::Stop);
            debug!("Monitor stop signalled");
        }
    }

    /// Asks a running monitor to re-read hotplug state.
    pub fn poke(&self) {
        if let Some(tx) = &self.sender {
            let _ = tx.send(MonitorSignal::Rescan);
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }
}
