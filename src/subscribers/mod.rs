//! # Event subscribers for the cluster runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and a
//! built-in [`LogWriter`].
//!
//! ## Architecture
//! ```text
//! Orchestrator ── publish(Event) ──► Bus ──► subscriber listener (Cluster::run)
//!                                                 │
//!                                          SubscriberSet::emit(&Event)
//!                                        ┌────────┼────────┐
//!                                        ▼        ▼        ▼
//!                                    LogWriter  Metrics  Custom
//! ```

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
