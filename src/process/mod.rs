//! OS process plumbing: spawn/connect seams and their default implementations.
//!
//! - [`Spawn`] / [`Connect`] traits the orchestrator depends on
//! - [`ProcessSpawner`] master side, `tokio::process` children over stdio pipes
//! - [`StdioChannel`] worker side of those pipes

mod child;
mod spawn;
mod stdio;

pub use child::ProcessSpawner;
pub use spawn::{Connect, Spawn, Spawned, WorkerExit};
pub use stdio::StdioChannel;

/// Environment variable carrying a worker's id; its presence marks a non-primary process.
pub const WORKER_ID_ENV: &str = "PROCVISOR_WORKER_ID";
