//! Cluster events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the orchestrator (readiness, pool, reload, messaging, shutdown) and
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the subscriber listener started by `Cluster::run` and any receiver
//!   from `ClusterHandle::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
