//! Worker replacement policies.
//!
//! ## Contents
//! - [`RespawnPolicy`] whether a worker that exited on its own is replaced
//! - [`Respawn`] the decision: skip, replace, or treat as a crash loop
//!
//! ## Defaults
//! - auto-respawn disabled
//! - minimum worker lifetime 10s

mod respawn;

pub use respawn::{Respawn, RespawnPolicy};
