//! # procvisor
//!
//! **Procvisor** is a single-host process cluster orchestrator for Rust services.
//!
//! One coordinating process (the *master*) supervises a pool of worker processes:
//! it starts them, replaces the ones that crash (with crash-loop protection), replaces
//! all of them one at a time on demand (rolling reload) and shuts the whole pool down in
//! a coordinated way. Master and workers talk over a newline-delimited JSON channel.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                 ┌──────────────────── master process ─────────────────────┐
//!  signals ──────►│                                                         │
//!  ClusterHandle ►│  Inbox ──► Orchestrator (single control flow)           │
//!                 │              ├─ OrchestratorState (role, flags, counts) │
//!                 │              ├─ Registry (id → pid, link, kill switch)  │
//!                 │              ├─ ReloadPlan / shutdown tasks / exit hook │
//!                 │              └─ publish ──► Bus ──► SubscriberSet       │
//!                 └───────┬───────────────────────────────▲─────────────────┘
//!                  Link (stdin)                      Inbox (stdout, exit)
//!                         ▼                               │
//!                 ┌──────────────── worker process (re-executed binary) ────┐
//!                 │  StdioChannel ──► Orchestrator (role = Worker)          │
//!                 └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Roles
//! ```text
//! workers == 0                       ─► Standalone (own master and worker)
//! workers >= 1, no PROCVISOR_WORKER_ID ─► Master (spawns `workers` when > 1)
//! workers >= 1, PROCVISOR_WORKER_ID    ─► Worker
//! ```
//!
//! ### Worker exits (master)
//! ```text
//! exit ──► reload target?       ─► spawn replacement, RELOAD the next one
//!      ──► intentional / off     ─► nothing
//!      ──► uptime <  min life    ─► desired -= 1 (permanent)
//!      ──► uptime >= min life    ─► spawn replacement (AutoSpawn)
//!      ──► registry empty        ─► final shutdown (if shutting down or the exit failed)
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Cluster**       | Role resolution, pool, reload and shutdown orchestration.    | [`Cluster`], [`ClusterHandle`]            |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, alerting).     | [`Subscribe`], [`LogWriter`]              |
//! | **Policies**      | Auto-respawn with crash-loop protection.                     | [`RespawnPolicy`]                         |
//! | **Shutdown**      | Ordered cleanup tasks and a final exit hook.                 | [`ShutdownTask`], [`Done`]                |
//! | **Processes**     | Pluggable spawn/connect seams with OS-process defaults.      | [`Spawn`], [`Connect`], [`ProcessSpawner`]|
//! | **Errors**        | Typed errors for orchestration, transport and tasks.         | [`ClusterError`], [`TaskError`]           |
//! | **Configuration** | Centralized runtime settings.                                | [`ClusterConfig`]                         |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use procvisor::{Cluster, ClusterConfig, LogWriter, ShutdownTask, Subscribe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ClusterConfig::with_workers(2);
//!     cfg.auto_spawn = true;
//!
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let cluster = Cluster::builder(cfg).with_subscribers(subs).build()?;
//!     let handle = cluster.handle();
//!
//!     handle.add_shutdown_task(ShutdownTask::new("close-db", |done| {
//!         // close connections ...
//!         done.ok();
//!     }))?;
//!
//!     cluster.run().await.terminate()
//! }
//! ```
mod config;
mod core;
pub mod diag;
mod error;
mod events;
mod policies;
mod process;
mod subscribers;
mod tasks;
pub mod transport;

// ---- Public re-exports ----

pub use config::ClusterConfig;
pub use core::{Cluster, ClusterBuilder, ClusterExit, ClusterHandle, Inbox, ProcessRole, Signal};
pub use error::{ClusterError, RemoteError, TaskError, TransportError};
pub use events::{Bus, Event, EventKind};
pub use policies::{Respawn, RespawnPolicy};
pub use process::{Connect, ProcessSpawner, Spawn, Spawned, StdioChannel, WORKER_ID_ENV, WorkerExit};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{Done, ExitHook, ShutdownTask};
pub use transport::{Command, Envelope, Link, Peer, WorkerId, WorkerInfo, WorkerMap};
