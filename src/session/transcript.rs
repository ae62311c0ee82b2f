//! Output fan-out: transcript file + live stream queue.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::sync::mpsc::UnboundedSender;

use super::StreamEvent;

/// Fans every output chunk to the append-only transcript and the run's
/// output queue, in the same order for both.
///
/// The file write happens first; if the process dies between the two
/// writes the queue may be momentarily ahead of the file, which is
/// tolerated — cross-channel atomicity is not a requirement. A failed
/// file write is logged and the chunk still reaches the stream, so a
/// full disk degrades persistence, not interactivity.
pub struct OutputMux {
    file: File,
    tx: UnboundedSender<StreamEvent>,
}

impl std::fmt::Debug for OutputMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMux").finish()
    }
}

impl OutputMux {
    /// Open `path` in append mode and bind the queue sender.
    pub(crate) fn create(path: &Path, tx: UnboundedSender<StreamEvent>) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open transcript at {}", path.display()))?;
        Ok(Self { file, tx })
    }

    /// Emit `text` to both the transcript and the queue.
    pub fn emit(&mut self, text: &str) {
        self.append(text);
        self.push(text.to_owned());
    }

    /// Emit a banner: `file_text` to the transcript, `queue_text` (the
    /// ANSI-styled variant) to the queue.
    pub fn emit_styled(&mut self, file_text: &str, queue_text: String) {
        self.append(file_text);
        self.push(queue_text);
    }

    /// Emit to the queue only, bypassing the transcript. Notary status
    /// lines use this: appending them to the file would invalidate the
    /// hash that was just recorded.
    pub fn queue_only(&mut self, text: String) {
        self.push(text);
    }

    /// Clone of the queue sender, for completion signaling outside the
    /// multiplexer.
    pub(crate) fn sender(&self) -> UnboundedSender<StreamEvent> {
        self.tx.clone()
    }

    fn append(&mut self, text: &str) {
        if let Err(err) = self.file.write_all(text.as_bytes()) {
            log::error!("transcript write failed: {err}");
        }
    }

    fn push(&self, text: String) {
        // A send error means the consumer hung up; the run still finishes
        // and the transcript still records everything.
        let _ = self.tx.send(StreamEvent::Chunk(text));
    }
}
