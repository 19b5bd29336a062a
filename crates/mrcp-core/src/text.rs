//! Byte-stream primitives shared by the parser and generator.
//!
//! [`TextCursor`] is a read cursor over one contiguous buffer; it never
//! owns data. Line reads follow the wire conventions of the protocol:
//! lines end with CRLF (a lone LF is tolerated), and a line whose CR is
//! the last byte of the buffer is reported complete so the caller can
//! arrange to skip the LF delivered in the next buffer.

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const SP: u8 = b' ';
const HTAB: u8 = b'\t';

/// True for SP and HTAB.
pub fn is_wsp(byte: u8) -> bool {
    byte == SP || byte == HTAB
}

/// Outcome of a line read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnd {
    /// Line terminated by CRLF or LF inside the buffer.
    Full,
    /// Line terminated by a CR that was the last byte of the buffer;
    /// the matching LF is expected at the start of the next buffer.
    CrAtEnd,
}

/// Read cursor over a contiguous byte buffer.
#[derive(Debug)]
pub struct TextCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> TextCursor<'a> {
    /// Wrap a buffer, cursor at the start.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// True when the cursor reached the end of the buffer.
    pub fn is_eos(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Next byte without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Consume one byte when it equals `expected`.
    pub fn skip_char(&mut self, expected: u8) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume exactly `count` bytes, returning the consumed slice.
    /// Consumes fewer when the buffer is short.
    pub fn take(&mut self, count: usize) -> &'a [u8] {
        let end = usize::min(self.pos.saturating_add(count), self.buf.len());
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        slice
    }

    /// Read one line without its terminator.
    ///
    /// Returns `None` when no terminator is present in the remaining
    /// bytes; the cursor does not move in that case.
    pub fn read_line(&mut self) -> Option<(&'a [u8], LineEnd)> {
        let rest = &self.buf[self.pos..];
        for (i, &byte) in rest.iter().enumerate() {
            match byte {
                LF => {
                    let mut line = &rest[..i];
                    if line.last() == Some(&CR) {
                        line = &line[..line.len() - 1];
                    }
                    self.pos += i + 1;
                    return Some((line, LineEnd::Full));
                }
                CR if i + 1 == rest.len() => {
                    // CR is the last byte available; the LF belongs to
                    // the next buffer.
                    let line = &rest[..i];
                    self.pos += i + 1;
                    return Some((line, LineEnd::CrAtEnd));
                }
                _ => {}
            }
        }
        None
    }
}

/// Split a `name: value` header line; the value keeps inner whitespace
/// but loses the surrounding one.
pub fn split_header_pair(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    let name = trim_wsp(&line[..colon]);
    let value = trim_wsp(&line[colon + 1..]);
    if name.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Strip leading and trailing SP/HTAB.
pub fn trim_wsp(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| !is_wsp(b)).unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&b| !is_wsp(b))
        .map(|i| i + 1)
        .unwrap_or(start);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line_crlf() {
        let mut cursor = TextCursor::new(b"first\r\nsecond\r\n");
        assert_eq!(cursor.read_line(), Some((&b"first"[..], LineEnd::Full)));
        assert_eq!(cursor.read_line(), Some((&b"second"[..], LineEnd::Full)));
        assert_eq!(cursor.read_line(), None);
        assert!(cursor.is_eos());
    }

    #[test]
    fn test_read_line_bare_lf() {
        let mut cursor = TextCursor::new(b"line\nrest");
        assert_eq!(cursor.read_line(), Some((&b"line"[..], LineEnd::Full)));
        assert_eq!(cursor.remaining(), b"rest");
    }

    #[test]
    fn test_read_line_without_terminator() {
        let mut cursor = TextCursor::new(b"partial");
        assert_eq!(cursor.read_line(), None);
        assert_eq!(cursor.pos(), 0);
    }

    #[test]
    fn test_read_line_cr_at_end() {
        let mut cursor = TextCursor::new(b"line\r");
        assert_eq!(cursor.read_line(), Some((&b"line"[..], LineEnd::CrAtEnd)));
        assert!(cursor.is_eos());
    }

    #[test]
    fn test_skip_char() {
        let mut cursor = TextCursor::new(b"\nabc");
        assert!(cursor.skip_char(b'\n'));
        assert!(!cursor.skip_char(b'\n'));
        assert_eq!(cursor.remaining(), b"abc");
    }

    #[test]
    fn test_split_header_pair() {
        let (name, value) = split_header_pair(b"Content-Type:  text/plain ").unwrap();
        assert_eq!(name, b"Content-Type");
        assert_eq!(value, b"text/plain");

        let (name, value) = split_header_pair(b"Empty-Value:").unwrap();
        assert_eq!(name, b"Empty-Value");
        assert_eq!(value, b"");

        assert!(split_header_pair(b"no colon here").is_none());
        assert!(split_header_pair(b": broken").is_none());
    }
}
