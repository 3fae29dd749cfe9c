//! # Cluster configuration.
//!
//! Provides [`ClusterConfig`] centralized settings for one orchestrator instance.
//!
//! ## Sentinel values
//! - `workers = 0` → standalone (no pool, no master/worker split)
//! - `grace = 0s` → wait for workers to drain indefinitely during shutdown

use std::time::Duration;

use crate::core::ProcessRole;

/// Configuration for a cluster runtime.
///
/// ## Field semantics
/// - `workers`: desired pool size (`0` = standalone)
/// - `auto_spawn`: replace workers that die unexpectedly
/// - `sync`: broadcast the worker map to workers after every change
/// - `min_worker_life`: crash-loop threshold for auto-respawn
/// - `grace`: maximum wait for workers to exit on shutdown (`0s` = no limit)
/// - `bus_capacity`: event bus ring buffer size (min 1)
#[derive(Clone, Debug)]
pub struct ClusterConfig {
    /// Number of workers the master keeps alive.
    ///
    /// - `0` → standalone process
    /// - `1` → single-process master (nothing is spawned)
    /// - `n > 1` → master spawns `n` workers
    pub workers: usize,

    /// Respawn workers that exit without being asked to.
    pub auto_spawn: bool,

    /// Keep workers' read-only copy of the worker map up to date.
    ///
    /// Always treated as `false` in standalone mode.
    pub sync: bool,

    /// Minimum uptime for a crashed worker to be respawned.
    ///
    /// A worker that dies sooner is treated as a crash loop: it is not replaced and the
    /// desired pool size shrinks by one, permanently.
    pub min_worker_life: Duration,

    /// How long the master waits for workers to exit after sending EXIT.
    ///
    /// Stragglers are killed when it elapses. `Duration::ZERO` disables the limit.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl ClusterConfig {
    /// Returns a config for `workers` processes with every other field defaulted.
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Returns whether worker-map sync applies to the given role.
    #[inline]
    pub fn sync_enabled(&self, role: ProcessRole) -> bool {
        self.sync && role != ProcessRole::Standalone
    }

    /// Returns the drain grace period as an `Option`.
    ///
    /// - `None` → wait indefinitely
    /// - `Some(d)` → kill stragglers after `d`
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ClusterConfig {
    /// Default configuration:
    ///
    /// - `workers = 0` (standalone)
    /// - `auto_spawn = false`
    /// - `sync = true`
    /// - `min_worker_life = 10s`
    /// - `grace = 60s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            workers: 0,
            auto_spawn: false,
            sync: true,
            min_worker_life: Duration::from_secs(10),
            grace: Duration::from_secs(60),
            bus_capacity: 1024,
        }
    }
}
