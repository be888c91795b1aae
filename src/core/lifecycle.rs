//! Process lifecycle state management.
//!
//! The lifecycle moves `Starting → Running → Stopping → Stopped` exactly
//! once. The current state is published through a `watch` channel, and a
//! shared running flag lets signal handlers request a stop without doing
//! any work themselves: the mode loop notices the cleared flag at its next
//! polling granule and calls [`Lifecycle::stop`], which releases the mode's
//! resources in order, each at most once.

use std::{
    fmt, io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Represents the current lifecycle state of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    Stopping,
    /// Terminal; the process exits afterwards.
    Stopped,
}

impl LifecycleState {
    /// Returns a short string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Starting => "Starting",
            LifecycleState::Running => "Running",
            LifecycleState::Stopping => "Stopping",
            LifecycleState::Stopped => "Stopped",
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        matches!(self, LifecycleState::Stopping | LifecycleState::Stopped)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared "keep running" flag. Cleared by signal handlers and quit keys.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// A resource opened by a mode and torn down on stop.
///
/// Implementations must tolerate being released twice.
pub trait Release {
    /// Name used in teardown logs.
    fn label(&self) -> &'static str;

    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Lifecycle tracker that allows multiple components to observe state changes.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    state_tx: watch::Sender<LifecycleState>,
    state_rx: watch::Receiver<LifecycleState>,
    running: RunningFlag,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (state_tx, state_rx) = watch::channel(LifecycleState::Starting);
        Self {
            state_tx,
            state_rx,
            running: RunningFlag::new(),
        }
    }

    /// Returns a receiver that can be used to subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_rx.clone()
    }

    pub fn current_state(&self) -> LifecycleState {
        *self.state_rx.borrow()
    }

    pub fn running_flag(&self) -> RunningFlag {
        self.running.clone()
    }

    /// True while running and no stop was requested.
    pub fn is_running(&self) -> bool {
        self.running.is_running() && self.current_state() == LifecycleState::Running
    }

    fn transition(&self, to: LifecycleState) {
        let from = self.current_state();
        let _ = self.state_tx.send_replace(to);
        debug!("Lifecycle state changed: {} -> {}", from, to);
    }

    /// `Starting → Running`. Has no effect in any other state.
    pub fn start(&self) {
        if self.current_state() == LifecycleState::Starting {
            self.transition(LifecycleState::Running);
        }
    }

    /// Asks the mode loop to stop at its next granule.
    pub fn request_stop(&self) {
        self.running.stop();
    }

    /// Runs teardown: releases `resources` in the given order, then marks the
    /// lifecycle stopped. A second call does nothing.
    pub fn stop(&self, resources: &mut [&mut dyn Release]) {
        if self.current_state().is_shutting_down() {
            debug!("Teardown already performed, ignoring");
            return;
        }
        self.running.stop();
        self.transition(LifecycleState::Stopping);

        for resource in resources.iter_mut() {
            match resource.release() {
                Ok(()) => debug!("Released {}", resource.label()),
                Err(e) => warn!("Failed to release {}: {}", resource.label(), e),
            }
        }

        self.transition(LifecycleState::Stopped);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns a task that clears `flag` on SIGINT or SIGTERM.
///
/// Must be called from within a runtime. Repeated signals are harmless.
pub fn spawn_signal_listener(flag: RunningFlag) -> io::Result<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                else => break,
            };
            info!("Received {}, initiating graceful shutdown...", name);
            flag.stop();
        }
    }))
}
