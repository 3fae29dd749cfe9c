//! Orchestration engine.
//!
//! ## Contents
//! - [`Cluster`], [`ClusterBuilder`], [`ClusterHandle`], [`ClusterExit`] public entry points
//! - [`ProcessRole`] role resolution, [`Signal`] handled OS signals
//! - [`Inbox`] inbound handle for spawn/connect implementations
//! - orchestrator internals: control queue, state, registry and the mode, pool,
//!   reload, shutdown and messaging handlers

mod builder;
mod cluster;
mod control;
mod messaging;
mod mode;
mod orchestrator;
mod pool;
mod registry;
mod reload;
mod role;
mod shutdown;
mod signals;
mod state;

pub use builder::ClusterBuilder;
pub use cluster::{Cluster, ClusterExit, ClusterHandle};
pub use control::Inbox;
pub use role::ProcessRole;
pub use signals::Signal;
