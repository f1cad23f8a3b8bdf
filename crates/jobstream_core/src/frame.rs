use encoding_rs::{CoderResult, Decoder, UTF_8};

/// One complete `event:`/`data:` pair terminated by a blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }
}

/// Incremental decoder for the line-oriented event-stream framing.
///
/// Bytes are fed in whatever chunks the transport delivers. A UTF-8 sequence
/// split across chunks is held inside the streaming decoder until it
/// completes, and a trailing partial line stays buffered for the next chunk.
/// Malformed input never fails; it just produces no frame.
pub struct FrameDecoder {
    decoder: Decoder,
    buffer: String,
    pending_event: String,
    pending_data: String,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            decoder: UTF_8.new_decoder_with_bom_removal(),
            buffer: String::new(),
            pending_event: String::new(),
            pending_data: String::new(),
        }
    }

    /// Feeds one transport chunk and returns every frame it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        self.decode_into_buffer(chunk, false);
        self.drain_complete_lines()
    }

    /// Ends the stream. Anything not terminated by a blank line is discarded.
    ///
    /// Returns `true` when a partial line or an uncommitted field was dropped.
    pub fn finish(&mut self) -> bool {
        self.decode_into_buffer(&[], true);
        let had_partial = !self.buffer.is_empty() || self.has_pending_fields();
        self.buffer.clear();
        self.pending_event.clear();
        self.pending_data.clear();
        had_partial
    }

    /// Whether an `event:` or `data:` value is waiting for its terminator.
    pub fn has_pending_fields(&self) -> bool {
        !self.pending_event.is_empty() || !self.pending_data.is_empty()
    }

    fn decode_into_buffer(&mut self, bytes: &[u8], last: bool) {
        let mut remaining = bytes;
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(remaining.len())
                .unwrap_or(remaining.len());
            self.buffer.reserve(needed.max(4));

            let (result, read, _had_replacements) =
                self.decoder.decode_to_string(remaining, &mut self.buffer, last);
            remaining = &remaining[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn drain_complete_lines(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let Some(last_newline) = self.buffer.rfind('\n') else {
            return frames;
        };

        let tail = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, tail);
        let complete = complete.strip_suffix('\n').unwrap_or(&complete);

        for line in complete.split('\n') {
            if let Some(frame) = self.accept_line(line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn accept_line(&mut self, line: &str) -> Option<Frame> {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if line.is_empty() {
            // Terminator: both fields are reset whether or not a frame was produced.
            let event = std::mem::take(&mut self.pending_event);
            let data = std::mem::take(&mut self.pending_data);
            if event.is_empty() || data.is_empty() {
                return None;
            }
            return Some(Frame { event, data });
        }

        if let Some(rest) = line.strip_prefix("event:") {
            self.pending_event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            self.pending_data = rest.trim().to_string();
        }
        // `:` keepalives and any other field (`id:`, `retry:`) are ignored.
        None
    }
}

#[cfg(test)]
mod tests {
    use super::{Frame, FrameDecoder};

    #[test]
    fn crlf_line_endings_are_accepted() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"event: progress\r\ndata: {}\r\n\r\n");
        assert_eq!(frames, vec![Frame::new("progress", "{}")]);
    }

    #[test]
    fn finish_reports_dangling_fields() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"event: complete\n").is_empty());
        assert!(decoder.has_pending_fields());
        assert!(decoder.finish());
        assert!(!decoder.has_pending_fields());
    }

    #[test]
    fn finish_on_clean_boundary_reports_nothing() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"event: error\ndata: {}\n\n");
        assert_eq!(frames.len(), 1);
        assert!(!decoder.finish());
    }

    #[test]
    fn truncated_character_at_end_is_dropped_on_finish() {
        let mut decoder = FrameDecoder::new();
        // First two bytes of a three-byte sequence, never completed.
        assert!(decoder.push(b"data: \xe2\x82").is_empty());
        assert!(decoder.finish());
    }
}
