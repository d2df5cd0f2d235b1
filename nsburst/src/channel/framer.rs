//! Incremental line framing over the raw shell byte stream.
//!
//! Output is fed in as it arrives. VT100 control sequences are stripped by a
//! `vte` parser that keeps its state between chunks, so an escape sequence
//! split across two reads is still removed. Complete lines are queued; the
//! unterminated tail stays available because the device prompt is never
//! followed by a newline.

use std::collections::VecDeque;
use std::fmt;

use memchr::memchr;
use vte::{Parser, Perform};

/// Splits an accumulating byte stream into logical lines.
pub struct LineFramer {
    parser: Parser,
    partial: String,
    lines: VecDeque<String>,
}

impl LineFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
            partial: String::with_capacity(256),
            lines: VecDeque::new(),
        }
    }

    /// Feed raw bytes from the channel.
    pub fn push(&mut self, data: &[u8]) {
        let mut sink = TextSink {
            out: &mut self.partial,
        };
        self.parser.advance(&mut sink, data);

        while let Some(pos) = memchr(b'\n', self.partial.as_bytes()) {
            let mut line: String = self.partial.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            self.lines.push_back(line);
        }
    }

    /// Pop the next complete line, if any.
    pub fn next_line(&mut self) -> Option<String> {
        self.lines.pop_front()
    }

    /// The unterminated text after the last newline.
    pub fn partial(&self) -> &str {
        self.partial.trim_end_matches('\r')
    }

    /// Take the unterminated tail, leaving it empty.
    pub fn take_partial(&mut self) -> String {
        let mut tail = std::mem::take(&mut self.partial);
        if tail.ends_with('\r') {
            tail.pop();
        }
        tail
    }

    /// Number of complete lines waiting to be read.
    pub fn pending_lines(&self) -> usize {
        self.lines.len()
    }

    /// Whether there is neither a complete line nor a partial tail buffered.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.partial.is_empty()
    }

    /// Drop everything buffered. Parser state is kept.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.partial.clear();
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LineFramer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineFramer")
            .field("partial", &self.partial)
            .field("lines", &self.lines)
            .finish()
    }
}

/// Collects printable text and line structure, dropping everything else.
struct TextSink<'a> {
    out: &'a mut String,
}

impl Perform for TextSink<'_> {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.out.push('\n'),
            b'\r' => self.out.push('\r'),
            b'\t' => self.out.push('\t'),
            // backspace, used to erase the pager banner
            0x08 => {
                if !self.out.ends_with('\n') {
                    self.out.pop();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_lines() {
        let mut framer = LineFramer::new();
        framer.push(b"get hostname\r\nHostname: fw-edge-1\r\nfw-edge-1->");

        assert_eq!(framer.next_line().as_deref(), Some("get hostname"));
        assert_eq!(framer.next_line().as_deref(), Some("Hostname: fw-edge-1"));
        assert_eq!(framer.next_line(), None);
        assert_eq!(framer.partial(), "fw-edge-1->");
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut framer = LineFramer::new();
        framer.push(b"Product Na");
        assert_eq!(framer.pending_lines(), 0);
        framer.push(b"me: NetScreen-2000\r");
        assert_eq!(framer.pending_lines(), 0);
        framer.push(b"\nfw->");

        assert_eq!(framer.next_line().as_deref(), Some("Product Name: NetScreen-2000"));
        assert_eq!(framer.take_partial(), "fw->");
        assert!(framer.is_empty());
    }

    #[test]
    fn test_ansi_stripping() {
        let mut framer = LineFramer::new();
        framer.push(b"\x1b[1mSerial\x1b[0m Number: 1\r\n");
        assert_eq!(framer.next_line().as_deref(), Some("Serial Number: 1"));
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut framer = LineFramer::new();
        framer.push(b"abc\x1b[");
        framer.push(b"32mdef\n");
        assert_eq!(framer.next_line().as_deref(), Some("abcdef"));
    }

    #[test]
    fn test_backspace_erases() {
        let mut framer = LineFramer::new();
        framer.push(b"--- more ---\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08\x08line\n");
        assert_eq!(framer.next_line().as_deref(), Some("line"));
    }

    #[test]
    fn test_clear() {
        let mut framer = LineFramer::new();
        framer.push(b"stale\nfw->");
        framer.clear();
        assert!(framer.is_empty());
        assert_eq!(framer.partial(), "");
    }
}
