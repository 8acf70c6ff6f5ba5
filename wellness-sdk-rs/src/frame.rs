use crate::events::StreamRecord;
use tracing::trace;

const FRAME_DELIMITER: &str = "\n\n";
const DATA_PREFIX: &str = "data:";

/// Incremental UTF-8 decoder for network chunks.
///
/// A multi-byte character split across two chunks is held back until the
/// rest of it arrives. Invalid sequences are replaced with U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // `from_utf8` already validated this prefix.
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending = self.pending.split_off(valid + bad);
                        }
                        None => {
                            self.pending = self.pending.split_off(valid);
                            return out;
                        }
                    }
                }
            }
        }
    }

    /// Flushes whatever is still buffered, lossily.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

/// Splits an event-stream body into frames and decodes each frame's payload.
///
/// Frames are separated by a blank line. The trailing partial frame is kept
/// in the buffer and completed by later chunks.
#[derive(Debug, Default)]
pub struct FrameParser {
    decoder: Utf8Decoder,
    buffer: String,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> Vec<StreamRecord> {
        let text = self.decoder.decode(bytes);
        self.push(&text)
    }

    /// Appends decoded text and returns the records of every frame it completed.
    pub fn push(&mut self, chunk: &str) -> Vec<StreamRecord> {
        self.buffer.push_str(chunk);
        if self.buffer.contains('\r') {
            self.buffer = self.buffer.replace("\r\n", "\n");
        }

        let mut records = Vec::new();
        while let Some(end) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..end + FRAME_DELIMITER.len()).collect();
            records.extend(parse_frame(&frame[..end]));
        }
        records
    }

    /// Flushes the decoder and parses whatever partial frame is left over.
    pub fn finish(&mut self) -> Vec<StreamRecord> {
        let tail = self.decoder.finish();
        self.buffer.push_str(&tail);
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            return Vec::new();
        }
        parse_frame(&rest).into_iter().collect()
    }

    /// Bytes of text currently waiting for a frame delimiter.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Parses one complete frame. Frames without data lines yield nothing.
pub fn parse_frame(frame: &str) -> Option<StreamRecord> {
    if frame.trim().is_empty() {
        return None;
    }
    let payload = frame_payload(frame)?;
    trace!("SSE payload: {:?}", payload);
    StreamRecord::from_payload(&payload)
}

/// Joins the `data:` lines of a frame with newlines, prefix and one optional
/// space stripped.
pub fn frame_payload(frame: &str) -> Option<String> {
    let lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix(DATA_PREFIX))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
