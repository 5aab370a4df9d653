//! Newline framing over a byte stream that arrives in arbitrary chunks.

use std::collections::VecDeque;

/// Longest accepted command: a maximal path, a one-letter verb, a space, and slack.
pub const MAX_COMMAND_LEN: usize = 4096 + 5;

/// One unit taken out of the stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Extracted {
    /// A complete line without its terminator (`\n`, or `\r\n`).
    Line(String),
    /// A line exceeded the capacity and was discarded up to its terminator.
    TooLong,
}

/// Accumulates bytes across reads and hands out complete lines one at a time.
#[derive(Debug)]
pub struct LineReassembler {
    partial: Vec<u8>,
    ready: VecDeque<Extracted>,
    capacity: usize,
    discarding: bool,
}

impl Default for LineReassembler {
    fn default() -> Self {
        Self::with_capacity(MAX_COMMAND_LEN)
    }
}

impl LineReassembler {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            partial: Vec::new(),
            ready: VecDeque::new(),
            capacity,
            discarding: false,
        }
    }

    /// Append newly read bytes.
    pub fn push(&mut self, mut bytes: &[u8]) {
        while let Some(pos) = bytes.iter().position(|&b| b == b'\n') {
            self.absorb(&bytes[..pos]);
            self.complete();
            bytes = &bytes[pos + 1..];
        }
        self.absorb(bytes);
    }

    /// Take the next complete line, if one is buffered.
    pub fn next_line(&mut self) -> Option<Extracted> {
        self.ready.pop_front()
    }

    /// The stream closed: flush an unterminated trailing line, then drain.
    pub fn finish(&mut self) -> Option<Extracted> {
        if !self.partial.is_empty() || self.discarding {
            self.complete();
        }
        self.next_line()
    }

    /// Bytes held for the line in progress.
    pub fn pending_len(&self) -> usize {
        self.partial.len()
    }

    fn absorb(&mut self, segment: &[u8]) {
        if self.discarding || segment.is_empty() {
            return;
        }
        if self.partial.len() + segment.len() > self.capacity {
            tracing::warn!(capacity = self.capacity, "command line too long; discarding");
            self.partial.clear();
            self.discarding = true;
            self.ready.push_back(Extracted::TooLong);
            return;
        }
        self.partial.extend_from_slice(segment);
    }

    fn complete(&mut self) {
        if std::mem::take(&mut self.discarding) {
            return;
        }
        let mut line = std::mem::take(&mut self.partial);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        self.ready
            .push_back(Extracted::Line(String::from_utf8_lossy(&line).into_owned()));
    }
}
