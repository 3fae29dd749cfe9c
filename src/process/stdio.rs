//! Worker end of the pipes opened by [`ProcessSpawner`](crate::ProcessSpawner).
//!
//! Frames from the master arrive on stdin; frames to the master leave on stdout. A
//! worker process must therefore keep stdout free of anything else and log to stderr.

use tracing::debug;

use crate::core::Inbox;
use crate::error::ClusterError;
use crate::process::spawn::Connect;
use crate::transport::{Link, codec};

/// Connects a worker to its master over stdin/stdout.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdioChannel;

impl Connect for StdioChannel {
    fn connect(&self, inbox: Inbox) -> Result<Link, ClusterError> {
        let (link, outbound) = Link::channel();
        tokio::spawn(codec::write_frames(tokio::io::stdout(), outbound));

        tokio::spawn(async move {
            let read = codec::read_frames(tokio::io::stdin(), |frame| {
                inbox.master_frame(frame).is_ok()
            });
            if let Err(err) = read.await {
                debug!(error = %err, "master channel failed");
            }
            let _ = inbox.master_closed();
        });

        Ok(link)
    }
}
