//! Expect buffer with ANSI filtering and earliest-match search.
//!
//! Incoming terminal output is run through a `vte` parser so colour codes
//! and cursor movement never reach the patterns, while carriage returns and
//! line feeds are kept. The parser state survives between chunks, so an
//! escape sequence split across two reads is still removed.
//!
//! Searching honours an optional tail depth: only the last N bytes of the
//! buffer are searched, which keeps large outputs cheap.

use std::fmt;

use regex::bytes::Regex;
use vte::{Parser, Perform};

use super::event::Event;

/// Position of a pattern match inside the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Found {
    /// Index of the matching event in the searched list.
    pub index: usize,
    /// Start of the match (absolute offset).
    pub start: usize,
    /// End of the match (absolute offset, exclusive).
    pub end: usize,
}

/// Collects printable text and the control bytes that carry layout.
struct Printable<'a> {
    out: &'a mut Vec<u8>,
}

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\r' | b'\n' | b'\t' | 0x08) {
            self.out.push(byte);
        }
    }
}

/// Buffer accumulating session output until a pattern consumes it.
pub struct ExpectBuffer {
    buffer: Vec<u8>,
    parser: Parser,
    search_depth: Option<usize>,
}

impl ExpectBuffer {
    /// Create a buffer. `search_depth` limits pattern search to the last N
    /// bytes; `None` searches everything.
    pub fn new(search_depth: Option<usize>) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            parser: Parser::new(),
            search_depth,
        }
    }

    /// Append raw terminal output, dropping escape sequences.
    ///
    /// Returns the number of bytes that made it into the buffer.
    pub fn extend(&mut self, data: &[u8]) -> usize {
        let before = self.buffer.len();
        let mut printable = Printable {
            out: &mut self.buffer,
        };
        self.parser.advance(&mut printable, data);
        self.buffer.len() - before
    }

    /// Find the earliest match among `events`.
    ///
    /// Ties on the start offset go to the event listed first. Sentinel
    /// events never match here.
    pub fn find_earliest(&self, events: &[Event]) -> Option<Found> {
        let offset = self.search_offset();
        let haystack = &self.buffer[offset..];
        let mut best: Option<Found> = None;
        for (index, event) in events.iter().enumerate() {
            let Some(re) = event.as_regex() else {
                continue;
            };
            if let Some(m) = re.find(haystack) {
                let found = Found {
                    index,
                    start: m.start() + offset,
                    end: m.end() + offset,
                };
                if best.is_none_or(|b| found.start < b.start) {
                    best = Some(found);
                }
            }
        }
        best
    }

    /// Search a single pattern in the searchable region.
    pub fn search(&self, pattern: &Regex) -> Option<(usize, usize)> {
        let offset = self.search_offset();
        pattern
            .find(&self.buffer[offset..])
            .map(|m| (m.start() + offset, m.end() + offset))
    }

    /// Remove everything up to `found.end`, returning the text before the
    /// match and the matched text.
    pub fn consume(&mut self, found: Found) -> (Vec<u8>, Vec<u8>) {
        let rest = self.buffer.split_off(found.end);
        let matched = self.buffer.split_off(found.start);
        let before = std::mem::replace(&mut self.buffer, rest);
        (before, matched)
    }

    /// Remove and return up to `size` bytes from the front.
    pub fn pop_front(&mut self, size: usize) -> Vec<u8> {
        let n = size.min(self.buffer.len());
        self.buffer.drain(..n).collect()
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Get a reference to the buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    fn search_offset(&self) -> usize {
        match self.search_depth {
            Some(depth) => self.buffer.len().saturating_sub(depth),
            None => 0,
        }
    }
}

impl Default for ExpectBuffer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl fmt::Debug for ExpectBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectBuffer")
            .field("len", &self.buffer.len())
            .field("search_depth", &self.search_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events(patterns: &[&str]) -> Vec<Event> {
        patterns.iter().map(|p| Event::regex(p).unwrap()).collect()
    }

    #[test]
    fn test_ansi_stripping_keeps_line_endings() {
        let mut buffer = ExpectBuffer::default();
        buffer.extend(b"\x1b[32mGreen text\x1b[0m\r\nrouter#");
        assert_eq!(buffer.as_slice(), b"Green text\r\nrouter#");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut buffer = ExpectBuffer::default();
        buffer.extend(b"abc\x1b[3");
        buffer.extend(b"2mdef");
        assert_eq!(buffer.as_slice(), b"abcdef");
    }

    #[test]
    fn test_earliest_match_wins() {
        let mut buffer = ExpectBuffer::default();
        buffer.extend(b"Login incorrect\r\n\r\nlogin: ");
        let list = events(&[r"[Ll]ogin: ", r"Login incorrect"]);
        let found = buffer.find_earliest(&list).unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.start, 0);
    }

    #[test]
    fn test_tie_goes_to_first_event() {
        let mut buffer = ExpectBuffer::default();
        buffer.extend(b"router#");
        let list = events(&[r"router", r"router#"]);
        assert_eq!(buffer.find_earliest(&list).unwrap().index, 0);
    }

    #[test]
    fn test_consume_splits_before_and_after() {
        let mut buffer = ExpectBuffer::default();
        buffer.extend(b"output line\r\nrouter#rest");
        let list = events(&[r"router#"]);
        let found = buffer.find_earliest(&list).unwrap();
        let (before, matched) = buffer.consume(found);
        assert_eq!(before, b"output line\r\n");
        assert_eq!(matched, b"router#");
        assert_eq!(buffer.as_slice(), b"rest");
    }

    #[test]
    fn test_tail_search_depth() {
        let mut buffer = ExpectBuffer::new(Some(10));
        buffer.extend(b"router#");
        buffer.extend(&[b'x'; 100]);
        let list = events(&[r"router#"]);
        assert!(buffer.find_earliest(&list).is_none());

        buffer.extend(b"\nrouter#");
        let found = buffer.find_earliest(&list).unwrap();
        assert_eq!(found.end, buffer.len());
    }

    #[test]
    fn test_pop_front() {
        let mut buffer = ExpectBuffer::default();
        buffer.extend(b"ab");
        assert_eq!(buffer.pop_front(1), b"a");
        assert_eq!(buffer.pop_front(5), b"b");
        assert!(buffer.is_empty());
    }
}
