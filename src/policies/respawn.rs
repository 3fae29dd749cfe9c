//! # Respawn policy for crashed workers.
//!
//! [`RespawnPolicy`] decides what happens after a worker exits on its own:
//!
//! ```text
//! exit ──► intentional (master asked)   ─► Respawn::Skip
//!      ──► auto_spawn disabled          ─► Respawn::Skip
//!      ──► uptime <  min_life           ─► Respawn::CrashLoop  (desired -= 1, permanent)
//!      ──► uptime >= min_life           ─► Respawn::Replace
//! ```
//!
//! The crash-loop branch is what keeps a worker that dies during startup from being
//! restarted forever.

use std::time::Duration;

use crate::config::ClusterConfig;

/// Outcome of a respawn decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Respawn {
    /// Leave the slot empty; the exit was expected or respawn is off.
    Skip,
    /// Spawn a replacement.
    Replace,
    /// Do not replace and shrink the desired pool size by one.
    CrashLoop,
}

/// Auto-respawn gate with crash-loop protection.
#[derive(Clone, Copy, Debug)]
pub struct RespawnPolicy {
    /// Replace workers that die unexpectedly.
    pub enabled: bool,
    /// Minimum uptime for a replacement to be allowed.
    pub min_life: Duration,
}

impl RespawnPolicy {
    /// Builds the policy from cluster configuration.
    pub fn from_config(cfg: &ClusterConfig) -> Self {
        Self {
            enabled: cfg.auto_spawn,
            min_life: cfg.min_worker_life,
        }
    }

    /// Decides what to do with a worker that exited after `uptime`.
    pub fn decide(&self, intentional: bool, uptime: Duration) -> Respawn {
        if intentional || !self.enabled {
            Respawn::Skip
        } else if uptime < self.min_life {
            Respawn::CrashLoop
        } else {
            Respawn::Replace
        }
    }
}

impl Default for RespawnPolicy {
    /// Disabled, with the default 10s minimum lifetime.
    fn default() -> Self {
        Self::from_config(&ClusterConfig::default())
    }
}
