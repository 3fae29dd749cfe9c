//! Shutdown tasks, the exit hook and their completion handle.
//!
//! ## Contents
//! - [`ShutdownTask`] named cleanup action, optionally master-only
//! - [`ExitHook`] single final callback before termination
//! - [`Done`] one-shot completion signal passed to both

mod done;
mod task;

pub use done::Done;
pub(crate) use task::panic_message;
pub use task::{ExitHook, ShutdownTask};
