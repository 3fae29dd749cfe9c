//! # Cross-platform OS signal handling.
//!
//! [`SignalListener`] turns process signals into [`Signal`] values the orchestrator
//! routes as control messages.
//!
//! ## Signals
//! **Unix platforms:**
//! - `SIGHUP` → rolling reload (master only)
//! - `SIGINT` (Ctrl-C in terminal) → graceful shutdown
//! - `SIGQUIT` → graceful shutdown
//! - `SIGTERM` (default kill signal, used by systemd/Kubernetes) → graceful shutdown
//!
//! **Windows platforms:**
//! - `Ctrl-C` via [`tokio::signal::ctrl_c`] → graceful shutdown

use std::fmt;

/// Signals the cluster reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
    /// `SIGHUP`
    Hangup,
    /// `SIGINT`
    Interrupt,
    /// `SIGQUIT`
    Quit,
    /// `SIGTERM`
    Terminate,
}

impl Signal {
    /// Conventional signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Hangup => "SIGHUP",
            Signal::Interrupt => "SIGINT",
            Signal::Quit => "SIGQUIT",
            Signal::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persistent signal listeners.
///
/// Listeners are registered once in [`SignalListener::new`]; `recv` can be called in a
/// loop without losing signals between calls.
#[cfg(unix)]
pub(crate) struct SignalListener {
    hangup: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
    quit: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalListener {
    /// Registers the handlers. Fails if signal registration fails.
    pub(crate) fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            quit: signal(SignalKind::quit())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next signal. Returns `None` once the listeners are gone.
    pub(crate) async fn recv(&mut self) -> Option<Signal> {
        tokio::select! {
            s = self.hangup.recv() => s.map(|_| Signal::Hangup),
            s = self.interrupt.recv() => s.map(|_| Signal::Interrupt),
            s = self.quit.recv() => s.map(|_| Signal::Quit),
            s = self.terminate.recv() => s.map(|_| Signal::Terminate),
        }
    }
}

#[cfg(not(unix))]
pub(crate) struct SignalListener;

#[cfg(not(unix))]
impl SignalListener {
    pub(crate) fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    pub(crate) async fn recv(&mut self) -> Option<Signal> {
        tokio::signal::ctrl_c().await.ok().map(|_| Signal::Interrupt)
    }
}
