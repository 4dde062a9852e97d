//! Frame decoder
//!
//! Turns an arbitrarily chunked byte stream into `data: ` frames. Lines are
//! split on raw bytes before UTF-8 decoding, so a line (or a multi-byte
//! character) split across chunk boundaries is reassembled exactly.

use crate::error::TransportError;
use futures::stream::{self, Stream, StreamExt};

/// Prefix that marks a meaningful line
pub const FRAME_PREFIX: &str = "data: ";

/// Default bound on a single line
pub const DEFAULT_MAX_FRAME_BYTES: usize = 1024 * 1024;

/// How much of a discarded partial line is echoed into logs
const LOG_PREFIX_BYTES: usize = 64;

/// One decoded `data: ` line, prefix stripped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame {
    pub raw: String,
}

impl StreamFrame {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

/// Incremental line-oriented decoder
///
/// A line longer than `max_frame_bytes` (the `\n` excluded) fails the
/// decoder whether it arrives whole or in pieces. Once failed it yields the
/// same error for every later chunk.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
    failed: Option<TransportError>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
            failed: None,
        }
    }

    /// Feed one chunk, appending every frame it completes to `frames`.
    ///
    /// Lines without the `data: ` prefix (blank separators, `:` comments,
    /// `event:` fields) are dropped. On error, frames from lines before the
    /// oversized one are still appended.
    pub fn push(
        &mut self,
        chunk: &[u8],
        frames: &mut Vec<StreamFrame>,
    ) -> Result<(), TransportError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        if chunk.is_empty() {
            return Ok(());
        }
        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        while let Some(len) = self.buffer[consumed..].iter().position(|&b| b == b'\n') {
            if len > self.max_frame_bytes {
                return Err(self.overflow());
            }
            if let Some(frame) = decode_line(&self.buffer[consumed..consumed + len]) {
                frames.push(frame);
            }
            consumed += len + 1;
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_frame_bytes {
            return Err(self.overflow());
        }
        Ok(())
    }

    /// Bytes held for a line that has not seen its terminator yet
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream. A trailing unterminated line is never treated as a
    /// frame; it is logged and handed back to the caller.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let shown = self.buffer.len().min(LOG_PREFIX_BYTES);
        tracing::warn!(
            bytes = self.buffer.len(),
            prefix = %String::from_utf8_lossy(&self.buffer[..shown]),
            "Discarding unterminated line at end of stream"
        );
        Some(String::from_utf8_lossy(&self.buffer).into_owned())
    }

    fn overflow(&mut self) -> TransportError {
        self.buffer.clear();
        let err = TransportError::protocol(format!(
            "line exceeds limit of {} bytes",
            self.max_frame_bytes
        ));
        self.failed = Some(err.clone());
        err
    }
}

fn decode_line(bytes: &[u8]) -> Option<StreamFrame> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    let payload = bytes.strip_prefix(FRAME_PREFIX.as_bytes())?;
    let raw = match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Invalid UTF-8 in frame, replacing");
            String::from_utf8_lossy(payload).into_owned()
        }
    };
    Some(StreamFrame { raw })
}

/// Adapt a chunk stream into a lazy frame stream.
///
/// Frames come out in arrival order. After the first transport error the
/// stream yields that error and then ends.
pub fn decode_stream<S>(
    chunks: S,
    max_frame_bytes: usize,
) -> impl Stream<Item = Result<StreamFrame, TransportError>>
where
    S: Stream<Item = Result<Vec<u8>, TransportError>> + Unpin,
{
    let state = Some((chunks, FrameDecoder::new(max_frame_bytes)));
    stream::unfold(state, |state| async move {
        let (mut chunks, mut decoder) = state?;
        match chunks.next().await {
            Some(Ok(chunk)) => {
                let mut frames = Vec::new();
                let pushed = decoder.push(&chunk, &mut frames);
                let mut items: Vec<_> = frames.into_iter().map(Ok).collect();
                match pushed {
                    Ok(()) => Some((items, Some((chunks, decoder)))),
                    Err(e) => {
                        items.push(Err(e));
                        Some((items, None))
                    }
                }
            }
            Some(Err(e)) => Some((vec![Err(e)], None)),
            None => {
                decoder.finish();
                None
            }
        }
    })
    .flat_map(stream::iter)
}
