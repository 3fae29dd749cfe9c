//! Newline-delimited JSON framing.
//!
//! One envelope per line. Frames travel as raw bytes up to the orchestrator, which
//! decodes them; a frame that is not UTF-8 or not a valid envelope is a malformed
//! message and never tears the reader down.

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::transport::Envelope;

/// Serializes an envelope into one frame, including the trailing newline.
pub fn encode(envelope: &Envelope) -> Result<Vec<u8>, TransportError> {
    let mut frame = serde_json::to_vec(envelope).map_err(TransportError::Encode)?;
    frame.push(b'\n');
    Ok(frame)
}

/// Parses one frame. Trailing `\r\n` / `\n` is ignored.
pub fn decode(frame: &[u8]) -> Result<Envelope, TransportError> {
    let end = frame
        .iter()
        .rposition(|b| !matches!(b, b'\n' | b'\r'))
        .map_or(0, |i| i + 1);
    serde_json::from_slice(&frame[..end]).map_err(TransportError::Malformed)
}

/// Reads frames until EOF or an I/O error, handing each non-empty one to `on_frame`.
pub async fn read_frames<R, F>(reader: R, mut on_frame: F) -> Result<(), TransportError>
where
    R: AsyncRead + Unpin,
    F: FnMut(Vec<u8>) -> bool,
{
    let mut reader = BufReader::new(reader);
    loop {
        let mut frame = Vec::new();
        if reader.read_until(b'\n', &mut frame).await? == 0 {
            return Ok(());
        }
        if frame.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        if !on_frame(frame) {
            return Ok(());
        }
    }
}

/// Drains `outbound`, writing one frame per envelope, until the link is dropped.
pub async fn write_frames<W>(mut writer: W, mut outbound: mpsc::UnboundedReceiver<Envelope>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(envelope) = outbound.recv().await {
        let frame = match encode(&envelope) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, command = envelope.command.name(), "dropping unencodable envelope");
                continue;
            }
        };
        if let Err(err) = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        }
        .await
        {
            debug!(error = %err, "peer pipe closed; stopping writer");
            return;
        }
    }
}
