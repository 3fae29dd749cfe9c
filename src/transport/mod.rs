//! Master/worker messaging: envelope schema, framing and links.
//!
//! ## Contents
//! - [`Envelope`], [`Command`], [`Peer`] the tagged message schema
//! - [`codec`] newline-delimited JSON framing over async pipes
//! - [`Link`] outbound queue to one peer
//!
//! Inbound frames are not decoded here: spawners and connectors push raw frames into
//! the orchestrator's [`Inbox`](crate::Inbox), and the orchestrator decodes them on its
//! own control flow so a malformed frame is logged and dropped in one place.
//!
//! Routing (`send` / `relay`) lives with the orchestrator in `core::messaging`, since it
//! needs the worker registry.

pub mod codec;
mod envelope;
mod link;

pub use envelope::{Command, Envelope, Peer, WorkerId, WorkerInfo, WorkerMap};
pub use link::Link;
