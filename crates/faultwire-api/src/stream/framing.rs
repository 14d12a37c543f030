// ── Block framing ──
//
// The alarm stream is free text. Structured messages sit between a literal
// start marker and a literal end marker; everything else (banners, login
// prompts, keepalive noise) is discarded by the extractor.

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

pub const START_MARKER: &[u8] = b"<+++>";
pub const END_MARKER: &[u8] = b"<--->";

/// Default upper bound on buffered bytes (64 KiB).
pub const DEFAULT_BUFFER_LIMIT: usize = 64 * 1024;

/// Accumulates raw chunks and yields complete block contents in arrival order.
#[derive(Debug)]
pub struct BlockBuffer {
    buf: BytesMut,
    limit: usize,
    in_block: bool,
}

impl Default for BlockBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_LIMIT)
    }
}

impl BlockBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit.min(DEFAULT_BUFFER_LIMIT)),
            limit: limit.max(END_MARKER.len() + START_MARKER.len()),
            in_block: false,
        }
    }

    /// `true` while a start marker has been seen without its end marker.
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop buffered bytes and leave any partial block.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.in_block = false;
    }

    /// Append a chunk and extract every block it completes.
    ///
    /// Returned strings are the text between the markers, trimmed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut blocks = Vec::new();

        loop {
            let Some(start) = find(&self.buf, START_MARKER) else {
                self.in_block = false;
                if self.buf.len() > self.limit {
                    // Keep the tail: it may hold the front half of a marker.
                    let excess = self.buf.len() - self.limit / 2;
                    self.buf.advance(excess);
                    debug!(dropped = excess, "alarm buffer over limit without a block, truncated");
                }
                break;
            };

            self.buf.advance(start);
            self.in_block = true;

            let Some(end) = find(&self.buf[START_MARKER.len()..], END_MARKER) else {
                if self.buf.len() > self.limit {
                    warn!(
                        buffered = self.buf.len(),
                        "unterminated alarm block exceeded buffer limit, discarding"
                    );
                    self.clear();
                }
                break;
            };

            let body_end = START_MARKER.len() + end;
            let content = String::from_utf8_lossy(&self.buf[START_MARKER.len()..body_end]);
            blocks.push(content.trim().to_owned());

            self.buf.advance(body_end + END_MARKER.len());
            self.in_block = false;
        }

        blocks
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
