//! Orchestrator state: flags and counters owned by the control flow.

use tracing::error;

use crate::core::{ProcessRole, Signal};

/// Mutable orchestration state of one process.
///
/// ## Rules
/// - `role` never changes after construction
/// - `desired_workers` only ever decreases (see [`reduce_capacity`](Self::reduce_capacity))
/// - `shutdown_lock` once set is never cleared
#[derive(Debug)]
pub(crate) struct OrchestratorState {
    pub(crate) role: ProcessRole,
    pub(crate) desired_workers: usize,
    /// True when this master started with more than one worker.
    pub(crate) pooled: bool,
    pub(crate) is_reloading: bool,
    pub(crate) reloaded_count: usize,
    pub(crate) is_shutdown: bool,
    shutdown_lock: bool,
    failed: bool,
    pub(crate) signal: Option<Signal>,
}

impl OrchestratorState {
    pub(crate) fn new(role: ProcessRole, desired_workers: usize) -> Self {
        Self {
            role,
            desired_workers,
            pooled: role == ProcessRole::Master && desired_workers > 1,
            is_reloading: false,
            reloaded_count: 0,
            is_shutdown: false,
            shutdown_lock: false,
            failed: false,
            signal: None,
        }
    }

    /// Takes the one-shot shutdown lock. Returns false if it was already taken.
    pub(crate) fn lock_shutdown(&mut self) -> bool {
        !std::mem::replace(&mut self.shutdown_lock, true)
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.shutdown_lock
    }

    /// Crash-loop transition: `desired_workers` N → N-1. Returns the new value.
    pub(crate) fn reduce_capacity(&mut self) -> usize {
        let before = self.desired_workers;
        self.desired_workers = before.saturating_sub(1);
        error!(
            before,
            after = self.desired_workers,
            "desired pool size permanently reduced"
        );
        self.desired_workers
    }

    /// Marks the run as failed; the exit code becomes 1.
    pub(crate) fn fail(&mut self) {
        self.failed = true;
    }

    pub(crate) fn exit_code(&self) -> i32 {
        i32::from(self.failed)
    }

    pub(crate) fn begin_reload(&mut self) {
        self.is_reloading = true;
        self.reloaded_count = 0;
    }

    pub(crate) fn end_reload(&mut self) {
        self.is_reloading = false;
        self.reloaded_count = 0;
    }
}
