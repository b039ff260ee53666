//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; only complete lines are decoded, so a
//! chunk boundary inside a UTF-8 sequence or between `\r` and `\n` is safe.
//! A line that never ends is cut off at a fixed size.

/// One dispatched server-sent event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Longest line the decoder buffers before giving up on the stream
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("SSE line exceeds {limit} bytes")]
pub struct LineTooLong {
    pub limit: usize,
}

#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Previous chunk ended in `\r`; a leading `\n` belongs to that line ending
    after_cr: bool,
    line_limit: usize,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_line_limit(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_limit(line_limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            after_cr: false,
            line_limit,
            event: None,
            data: Vec::new(),
            id: None,
        }
    }

    /// Feed a chunk, returning every frame it completes. Lines end with
    /// `\n`, `\r\n` or a lone `\r`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, LineTooLong> {
        let mut chunk = chunk;
        if self.after_cr && !chunk.is_empty() {
            self.after_cr = false;
            if chunk[0] == b'\n' {
                chunk = &chunk[1..];
            }
        }
        self.buf.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[start..]
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        {
            let end = start + offset;
            let mut next = end + 1;
            if self.buf[end] == b'\r' {
                match self.buf.get(next) {
                    Some(&b'\n') => next += 1,
                    Some(_) => {}
                    None => self.after_cr = true,
                }
            }
            let line = String::from_utf8_lossy(&self.buf[start..end]).into_owned();
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
            start = next;
        }
        self.buf.drain(..start);

        if self.buf.len() > self.line_limit {
            self.buf.clear();
            return Err(LineTooLong {
                limit: self.line_limit,
            });
        }
        Ok(frames)
    }

    /// Flush at end of input. A trailing line without newline still counts,
    /// and a frame missing its blank-line terminator is dispatched.
    pub fn finish(&mut self) -> Option<SseFrame> {
        self.after_cr = false;
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            // retry and unknown fields carry nothing we act on
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() && event.is_none() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data, id })
    }
}
