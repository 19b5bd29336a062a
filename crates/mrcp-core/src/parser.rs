//! Resumable MRCP message parser and generator.
//!
//! Both sides are driven across arbitrarily segmented buffers. The
//! parser is a three-stage machine (start line, header section, body)
//! that retains its position between calls: feeding it a byte stream in
//! any segmentation yields the same message sequence as feeding it in
//! one piece. The generator builds the message head once, back-patching
//! the total message length into the start line, and then streams head
//! and body through whatever buffer the caller provides.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::message::{
    ChannelId, Message, StartLine, Version, CHANNEL_ID_HEADER,
};
use crate::resource::ResourceCatalog;
use crate::text::{is_wsp, split_header_pair, LineEnd, TextCursor};

/// Upper bound on an accepted body, to keep a bad peer from pinning
/// memory through a huge Content-Length.
const MAX_BODY_SIZE: usize = 4 * 1024 * 1024;

/// Outcome of one parser run.
#[derive(Debug)]
pub enum ParseStatus {
    /// A full message was parsed; remaining buffer bytes belong to the
    /// next message.
    Complete(Box<Message>),
    /// More data is needed; the parser consumed the whole buffer.
    Incomplete,
    /// The current message is broken. When `recoverable` is set the
    /// parser resynchronises by skipping to the end of the message as
    /// declared in its start line; otherwise the connection should be
    /// dropped.
    Invalid {
        /// True when the parser can skip past the broken message.
        recoverable: bool,
    },
}

#[derive(Debug)]
enum Stage {
    StartLine,
    Header,
    Body,
    /// Skipping the remainder of a broken message.
    Resync { remaining: usize },
}

/// A raw header field mid-assembly (value may still grow by folding).
struct PendingField {
    name: String,
    value: String,
}

/// Streaming, segmentation-tolerant MRCP parser.
///
/// One parser per connection; internal state carries everything needed
/// to resume at the next read.
pub struct MessageParser {
    catalog: Arc<ResourceCatalog>,
    stage: Stage,
    /// Unterminated line bytes carried over from the previous buffer.
    carry: Vec<u8>,
    /// Field waiting for possible folded continuation lines.
    pending_field: Option<PendingField>,
    /// Set when a line ended on a CR that was the last byte of a buffer;
    /// the matching LF is skipped on the next run.
    skip_lf: bool,
    /// True until the channel identifier has been seen (v2 only).
    awaiting_channel_id: bool,
    message: Option<Box<Message>>,
    body: Vec<u8>,
    content_length: usize,
    /// Bytes consumed for the message being parsed, for resync.
    consumed: usize,
}

impl MessageParser {
    /// Parser bound to a resource catalogue.
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            catalog,
            stage: Stage::StartLine,
            carry: Vec::new(),
            pending_field: None,
            skip_lf: false,
            awaiting_channel_id: false,
            message: None,
            body: Vec::new(),
            content_length: 0,
            consumed: 0,
        }
    }

    /// Drive the parser over the next buffer segment.
    pub fn run(&mut self, cursor: &mut TextCursor<'_>) -> ParseStatus {
        if self.skip_lf {
            if cursor.is_eos() {
                return ParseStatus::Incomplete;
            }
            if cursor.skip_char(b'\n') && self.message.is_some() {
                // Mid-message the LF counts toward the declared length;
                // between messages it belongs to the previous one.
                self.consumed += 1;
            }
            self.skip_lf = false;
        }

        loop {
            match self.stage {
                Stage::StartLine => match self.run_start_line(cursor) {
                    StepOutcome::Advance => {}
                    StepOutcome::Yield(status) => return status,
                },
                Stage::Header => match self.run_header(cursor) {
                    StepOutcome::Advance => {}
                    StepOutcome::Yield(status) => return status,
                },
                Stage::Body => match self.run_body(cursor) {
                    StepOutcome::Advance => {}
                    StepOutcome::Yield(status) => return status,
                },
                Stage::Resync { remaining } => {
                    let skipped = cursor.take(remaining).len();
                    self.consumed += skipped;
                    if skipped < remaining {
                        self.stage = Stage::Resync {
                            remaining: remaining - skipped,
                        };
                        return ParseStatus::Incomplete;
                    }
                    debug!("Resynchronised after {} skipped bytes", remaining);
                    self.reset();
                }
            }
        }
    }

    fn reset(&mut self) {
        self.stage = Stage::StartLine;
        self.pending_field = None;
        self.awaiting_channel_id = false;
        self.message = None;
        self.body = Vec::new();
        self.content_length = 0;
        self.consumed = 0;
    }

    fn invalid(&mut self, declared_length: usize) -> StepOutcome {
        // Resynchronise via the declared message length when the start
        // line got far enough to supply one.
        let declared = self
            .message
            .as_ref()
            .map(|m| m.start_line.length())
            .unwrap_or(declared_length);
        let consumed = self.consumed;
        self.pending_field = None;
        self.message = None;
        self.body = Vec::new();
        self.carry.clear();
        self.skip_lf = false;
        if declared > consumed {
            self.stage = Stage::Resync {
                remaining: declared - consumed,
            };
            StepOutcome::Yield(ParseStatus::Invalid { recoverable: true })
        } else {
            self.reset();
            StepOutcome::Yield(ParseStatus::Invalid { recoverable: false })
        }
    }

    fn run_start_line(&mut self, cursor: &mut TextCursor<'_>) -> StepOutcome {
        let Some(line) = self.next_line(cursor) else {
            return StepOutcome::Yield(ParseStatus::Incomplete);
        };
        match StartLine::parse(&line) {
            Ok(start_line) => {
                let version = start_line.version();
                self.message = Some(Box::new(Message::new(start_line)));
                self.awaiting_channel_id = version == Version::V2;
                self.stage = Stage::Header;
                StepOutcome::Advance
            }
            Err(e) => {
                warn!("Failed to parse start line: {}", e);
                // Assume at least the length field is valid so the
                // connection can skip the broken message.
                self.invalid(declared_length(&line).unwrap_or(0))
            }
        }
    }

    fn run_header(&mut self, cursor: &mut TextCursor<'_>) -> StepOutcome {
        loop {
            // A committed field may continue on folded lines; the fold is
            // only over once the first byte of the next line is known.
            if self.pending_field.is_some() {
                if !self.carry.is_empty() || matches!(cursor.peek(), Some(b) if is_wsp(b)) {
                    let Some(line) = self.next_line(cursor) else {
                        return StepOutcome::Yield(ParseStatus::Incomplete);
                    };
                    let content = crate::text::trim_wsp(&line);
                    let field = self.pending_field.as_mut().expect("pending field");
                    field.value.push_str(&String::from_utf8_lossy(content));
                    continue;
                }
                if cursor.is_eos() {
                    return StepOutcome::Yield(ParseStatus::Incomplete);
                }
                let field = self.pending_field.take().expect("pending field");
                if let Some(status) = self.commit_field(field) {
                    return status;
                }
                continue;
            }

            let Some(line) = self.next_line(cursor) else {
                return StepOutcome::Yield(ParseStatus::Incomplete);
            };
            if line.is_empty() {
                // Empty line terminates the header section.
                return self.finish_header_section();
            }
            match split_header_pair(&line) {
                Some((name, value)) => {
                    self.pending_field = Some(PendingField {
                        name: String::from_utf8_lossy(name).into_owned(),
                        value: String::from_utf8_lossy(value).into_owned(),
                    });
                }
                None => {
                    // Malformed header, skip to the next one.
                    warn!(
                        "Dropping malformed header line '{}'",
                        String::from_utf8_lossy(&line)
                    );
                }
            }
        }
    }

    /// Dispatch one assembled field. Returns an outcome only on error.
    fn commit_field(&mut self, field: PendingField) -> Option<StepOutcome> {
        let message = self.message.as_mut().expect("message in header stage");
        if self.awaiting_channel_id {
            // The channel identifier must lead the header section on v2.
            if !field.name.eq_ignore_ascii_case(CHANNEL_ID_HEADER) {
                warn!(
                    "Expected {} first, got '{}'",
                    CHANNEL_ID_HEADER, field.name
                );
                return Some(self.invalid(0));
            }
            let channel_id: ChannelId = match field.value.parse() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Failed to parse channel identifier: {}", e);
                    return Some(self.invalid(0));
                }
            };
            message.channel_id = channel_id;
            match message.associate_by_name(&self.catalog) {
                Ok(()) => {}
                Err(Error::UnknownMethod(name)) => {
                    // Known resource, unknown method: the message is
                    // framed fine, so it parses through and the owner
                    // answers it with a method failure.
                    warn!("Unknown method or event '{}'", name);
                }
                Err(e) => {
                    warn!("Failed to associate resource: {}", e);
                    return Some(self.invalid(0));
                }
            }
            self.awaiting_channel_id = false;
            return None;
        }

        let resource = message
            .resource_id
            .and_then(|id| self.catalog.get_by_id(id));
        match message.add_wire_field(&field.name, &field.value, resource) {
            Ok(true) => {}
            Ok(false) => {
                warn!("Dropping unknown header '{}'", field.name);
            }
            Err(e) => {
                // Known header with a broken value; drop the field, keep
                // the message.
                warn!("Dropping header '{}': {}", field.name, e);
            }
        }
        None
    }

    fn finish_header_section(&mut self) -> StepOutcome {
        if self.awaiting_channel_id {
            warn!("Message without {}", CHANNEL_ID_HEADER);
            return self.invalid(0);
        }
        let message = self.message.as_mut().expect("message in header stage");
        self.content_length = message.generic().content_length.unwrap_or(0);
        if self.content_length > MAX_BODY_SIZE {
            warn!("Content-Length {} exceeds limit", self.content_length);
            return self.invalid(0);
        }
        if self.content_length > 0 {
            self.body = Vec::with_capacity(self.content_length);
            self.stage = Stage::Body;
            StepOutcome::Advance
        } else {
            self.complete()
        }
    }

    fn run_body(&mut self, cursor: &mut TextCursor<'_>) -> StepOutcome {
        let needed = self.content_length - self.body.len();
        let chunk = cursor.take(needed);
        self.consumed += chunk.len();
        self.body.extend_from_slice(chunk);
        if self.body.len() < self.content_length {
            return StepOutcome::Yield(ParseStatus::Incomplete);
        }
        self.complete()
    }

    fn complete(&mut self) -> StepOutcome {
        let mut message = self.message.take().expect("complete without message");
        message.body = Bytes::from(std::mem::take(&mut self.body));
        self.reset();
        StepOutcome::Yield(ParseStatus::Complete(message))
    }

    /// Read one logical line, joining bytes carried over from previous
    /// buffers. `None` means the terminator has not arrived yet; the
    /// remainder of the buffer moved into the carry.
    fn next_line(&mut self, cursor: &mut TextCursor<'_>) -> Option<Vec<u8>> {
        if self.carry.is_empty() {
            let before = cursor.pos();
            match cursor.read_line() {
                Some((line, end)) => {
                    self.consumed += cursor.pos() - before;
                    if end == LineEnd::CrAtEnd {
                        self.skip_lf = true;
                    }
                    Some(line.to_vec())
                }
                None => {
                    let rest = cursor.take(usize::MAX);
                    self.consumed += rest.len();
                    self.carry.extend_from_slice(rest);
                    None
                }
            }
        } else {
            let rest = cursor.remaining();
            if let Some(i) = rest.iter().position(|&b| b == b'\n') {
                let mut line = std::mem::take(&mut self.carry);
                line.extend_from_slice(&rest[..i]);
                cursor.take(i + 1);
                self.consumed += i + 1;
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                Some(line)
            } else if rest.last() == Some(&b'\r') {
                let mut line = std::mem::take(&mut self.carry);
                line.extend_from_slice(&rest[..rest.len() - 1]);
                cursor.take(rest.len());
                self.consumed += rest.len();
                self.skip_lf = true;
                Some(line)
            } else {
                cursor.take(usize::MAX);
                self.consumed += rest.len();
                self.carry.extend_from_slice(rest);
                None
            }
        }
    }
}

/// Best-effort extraction of the message-length field from a start line
/// that failed to parse.
fn declared_length(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let mut fields = line.split(' ');
    if fields.next()? != "MRCP/2.0" {
        return None;
    }
    fields.next()?.parse().ok()
}

enum StepOutcome {
    Advance,
    Yield(ParseStatus),
}

/// Outcome of one generator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenStatus {
    /// The whole message has been written.
    Complete,
    /// The buffer filled up; call again with a fresh buffer.
    Incomplete,
}

/// Streaming MRCP generator.
///
/// [`initialize`](Self::initialize) associates the message with its
/// resource, validates it, and builds the message head with the total
/// length back-patched into the start line. [`run`](Self::run) then
/// copies head and body into caller buffers of any size.
pub struct MessageGenerator {
    catalog: Arc<ResourceCatalog>,
    head: Vec<u8>,
    head_written: usize,
    body: Bytes,
    body_written: usize,
    active: bool,
}

impl MessageGenerator {
    /// Generator bound to a resource catalogue.
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            catalog,
            head: Vec::new(),
            head_written: 0,
            body: Bytes::new(),
            body_written: 0,
            active: false,
        }
    }

    /// Prepare a message for emission. The message's method/event name
    /// is derived from its id, `Content-Length` is fixed up, and on v2
    /// the total message length is computed and patched into the start
    /// line.
    pub fn initialize(&mut self, message: &mut Message) -> Result<()> {
        message.associate_by_id(&self.catalog)?;
        message.validate()?;

        let mut headers = Vec::new();
        if message.start_line.version() == Version::V2 {
            if !message.channel_id.is_complete() {
                return Err(Error::InvalidMessage(
                    "channel identifier incomplete".into(),
                ));
            }
            headers.extend_from_slice(CHANNEL_ID_HEADER.as_bytes());
            headers.extend_from_slice(b": ");
            headers.extend_from_slice(message.channel_id.to_string().as_bytes());
            headers.extend_from_slice(b"\r\n");
        }
        for field in message.header().iter() {
            headers.extend_from_slice(field.name.as_bytes());
            headers.extend_from_slice(b": ");
            headers.extend_from_slice(field.value.as_bytes());
            headers.extend_from_slice(b"\r\n");
        }
        headers.extend_from_slice(b"\r\n");

        let tail = message.start_line.wire_tail();
        let mut head = Vec::new();
        match message.start_line.version() {
            Version::V2 => {
                let prefix = "MRCP/2.0 ";
                let base = prefix.len() + tail.len() + headers.len() + message.body.len();
                let total = patch_length(base)?;
                message.start_line.set_length(total);
                head.extend_from_slice(prefix.as_bytes());
                head.extend_from_slice(total.to_string().as_bytes());
            }
            Version::V1 => {
                head.extend_from_slice(b"MRCP/1.0");
            }
        }
        head.extend_from_slice(tail.as_bytes());
        head.extend_from_slice(&headers);

        self.head = head;
        self.head_written = 0;
        self.body = message.body.clone();
        self.body_written = 0;
        self.active = true;
        Ok(())
    }

    /// Write as much of the message as fits into `buf`; returns the
    /// byte count written and whether the message is finished.
    pub fn run(&mut self, buf: &mut [u8]) -> Result<(usize, GenStatus)> {
        if !self.active {
            return Err(Error::InvalidMessage("generator not initialized".into()));
        }
        let mut written = 0;

        if self.head_written < self.head.len() {
            let chunk = usize::min(buf.len(), self.head.len() - self.head_written);
            buf[..chunk].copy_from_slice(&self.head[self.head_written..self.head_written + chunk]);
            self.head_written += chunk;
            written += chunk;
        }

        if self.head_written == self.head.len() {
            let room = buf.len() - written;
            let chunk = usize::min(room, self.body.len() - self.body_written);
            buf[written..written + chunk]
                .copy_from_slice(&self.body[self.body_written..self.body_written + chunk]);
            self.body_written += chunk;
            written += chunk;

            if self.body_written == self.body.len() {
                self.active = false;
                return Ok((written, GenStatus::Complete));
            }
        }

        Ok((written, GenStatus::Incomplete))
    }

    /// Generate a whole message into one owned buffer.
    pub fn generate_to_vec(&mut self, message: &mut Message) -> Result<Vec<u8>> {
        self.initialize(message)?;
        let mut out = vec![0u8; self.head.len() + self.body.len()];
        let (written, status) = self.run(&mut out)?;
        debug_assert_eq!(status, GenStatus::Complete);
        out.truncate(written);
        Ok(out)
    }
}

/// Find the total length whose own decimal digit count is consistent
/// with itself: the head contains the length, so the length depends on
/// the number of digits used to write it.
fn patch_length(base: usize) -> Result<usize> {
    for digits in 1..=20usize {
        let total = base + digits;
        if decimal_digits(total) == digits {
            return Ok(total);
        }
    }
    Err(Error::InvalidMessage("message length overflow".into()))
}

fn decimal_digits(mut value: usize) -> usize {
    let mut digits = 1;
    while value >= 10 {
        value /= 10;
        digits += 1;
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{GenericHeaderId, MessageType, RequestState, StatusCode};

    fn catalog() -> Arc<ResourceCatalog> {
        Arc::new(ResourceCatalog::default_catalog())
    }

    fn parse_all(parser: &mut MessageParser, data: &[u8]) -> Vec<Message> {
        let mut cursor = TextCursor::new(data);
        let mut out = Vec::new();
        loop {
            match parser.run(&mut cursor) {
                ParseStatus::Complete(m) => out.push(*m),
                ParseStatus::Incomplete => break,
                ParseStatus::Invalid { .. } => panic!("unexpected invalid"),
            }
            if cursor.is_eos() {
                break;
            }
        }
        out
    }

    fn speak_request_bytes() -> Vec<u8> {
        let catalog = catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        let mut message = Message::request(synth, Version::V2, speak, 1).unwrap();
        message.channel_id.session_id = "abcd".to_string();
        message.set_content_type("application/ssml+xml").unwrap();
        message.set_body("<?xml version=\"1.0\"?>\r\n<speak><p>Hello world.</p></speak>");
        MessageGenerator::new(catalog.clone())
            .generate_to_vec(&mut message)
            .unwrap()
    }

    #[test]
    fn test_generated_length_matches_wire_size() {
        let bytes = speak_request_bytes();
        let text = String::from_utf8_lossy(&bytes);
        let length: usize = text
            .split(' ')
            .nth(1)
            .and_then(|t| t.parse().ok())
            .expect("length field");
        assert_eq!(length, bytes.len());
        assert!(text.starts_with("MRCP/2.0 "));
        assert!(text.contains("Channel-Identifier: abcd@speechsynth\r\n"));
    }

    #[test]
    fn test_parse_generated_round_trip() {
        let bytes = speak_request_bytes();
        let mut parser = MessageParser::new(catalog());
        let messages = parse_all(&mut parser, &bytes);
        assert_eq!(messages.len(), 1);
        let message = &messages[0];

        assert_eq!(message.start_line.message_type(), MessageType::Request);
        assert_eq!(message.start_line.name(), Some("SPEAK"));
        assert_eq!(message.start_line.request_id(), 1);
        assert_eq!(message.channel_id.session_id, "abcd");
        assert_eq!(message.channel_id.resource_name, "speechsynth");
        assert_eq!(
            message.generic().content_type.as_deref(),
            Some("application/ssml+xml")
        );
        assert_eq!(message.generic().content_length, Some(message.body.len()));

        // Second round trip reproduces the exact bytes.
        let mut again = message.clone();
        let regenerated = MessageGenerator::new(catalog())
            .generate_to_vec(&mut again)
            .unwrap();
        assert_eq!(regenerated, bytes);
    }

    #[test]
    fn test_segmentation_at_header_terminator_cr_lf() {
        let bytes = speak_request_bytes();
        // Split exactly between the CR and LF of the empty header line.
        let marker = b"\r\n\r\n";
        let pos = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .unwrap();
        let split = pos + 3;

        let mut parser = MessageParser::new(catalog());
        let mut cursor = TextCursor::new(&bytes[..split]);
        assert!(matches!(
            parser.run(&mut cursor),
            ParseStatus::Incomplete
        ));

        let mut cursor = TextCursor::new(&bytes[split..]);
        match parser.run(&mut cursor) {
            ParseStatus::Complete(message) => {
                assert_eq!(message.start_line.name(), Some("SPEAK"));
                assert!(!message.body.is_empty());
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn test_every_split_point_yields_same_message() {
        let bytes = speak_request_bytes();
        let mut reference = MessageParser::new(catalog());
        let expected = parse_all(&mut reference, &bytes);

        for split in 1..bytes.len() {
            let mut parser = MessageParser::new(catalog());
            let mut messages = Vec::new();
            for chunk in [&bytes[..split], &bytes[split..]] {
                let mut cursor = TextCursor::new(chunk);
                loop {
                    match parser.run(&mut cursor) {
                        ParseStatus::Complete(m) => messages.push(*m),
                        ParseStatus::Incomplete => break,
                        ParseStatus::Invalid { .. } => {
                            panic!("invalid at split {split}")
                        }
                    }
                    if cursor.is_eos() {
                        break;
                    }
                }
            }
            assert_eq!(messages.len(), 1, "split at {split}");
            assert_eq!(messages[0].body, expected[0].body, "split at {split}");
            assert_eq!(
                messages[0].start_line, expected[0].start_line,
                "split at {split}"
            );
        }
    }

    #[test]
    fn test_pipelined_messages_in_one_buffer() {
        let catalog = catalog();
        let recog = catalog.get_by_name("speechrecog").unwrap();
        let recognize = recog.method_id("RECOGNIZE").unwrap();
        let mut generator = MessageGenerator::new(catalog.clone());

        let mut buffer = Vec::new();
        for (rid, grammar) in [(10u64, "<grammar-one/>"), (11, "<grammar-two longer/>")] {
            let mut message = Message::request(recog, Version::V2, recognize, rid).unwrap();
            message.channel_id.session_id = "feed".to_string();
            message.set_content_type("application/srgs+xml").unwrap();
            message.set_body(grammar.to_string());
            buffer.extend_from_slice(&generator.generate_to_vec(&mut message).unwrap());
        }

        let mut parser = MessageParser::new(catalog);
        let mut cursor = TextCursor::new(&buffer);
        let mut messages = Vec::new();
        loop {
            match parser.run(&mut cursor) {
                ParseStatus::Complete(m) => messages.push(*m),
                ParseStatus::Incomplete => break,
                ParseStatus::Invalid { .. } => panic!("unexpected invalid"),
            }
            if cursor.is_eos() {
                break;
            }
        }
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].start_line.request_id(), 10);
        assert_eq!(messages[1].start_line.request_id(), 11);
        assert_eq!(cursor.pos(), buffer.len());
    }

    #[test]
    fn test_folded_header_value() {
        let body = b"";
        let mut raw = Vec::new();
        let head = "Channel-Identifier: fold@speechsynth\r\nLogging-Tag: first\r\n  and-second\r\n\r\n";
        let tail = format!(" SPEAK 9\r\n{head}");
        let base = "MRCP/2.0 ".len() + tail.len() + body.len();
        let total = patch_length(base).unwrap();
        raw.extend_from_slice(format!("MRCP/2.0 {total}{tail}").as_bytes());

        let mut parser = MessageParser::new(catalog());
        let mut cursor = TextCursor::new(&raw);
        match parser.run(&mut cursor) {
            ParseStatus::Complete(message) => {
                assert_eq!(
                    message.generic().logging_tag.as_deref(),
                    Some("firstand-second")
                );
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_start_line_is_unrecoverable() {
        let mut parser = MessageParser::new(catalog());
        let mut cursor = TextCursor::new(b"HTTP/1.1 200 OK\r\n\r\n");
        match parser.run(&mut cursor) {
            ParseStatus::Invalid { recoverable } => assert!(!recoverable),
            other => panic!("expected invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_resource_resynchronises() {
        // Valid framing, unknown resource name: the parser skips to the
        // end of the message and parses the next one.
        let bogus_head =
            "Channel-Identifier: x@nosuchresource\r\nContent-Length: 4\r\n\r\nBODY";
        let tail = format!(" SPEAK 1\r\n{bogus_head}");
        let total = patch_length("MRCP/2.0 ".len() + tail.len()).unwrap();
        let mut buffer = format!("MRCP/2.0 {total}{tail}").into_bytes();
        let good = speak_request_bytes();
        buffer.extend_from_slice(&good);

        let mut parser = MessageParser::new(catalog());
        let mut cursor = TextCursor::new(&buffer);
        match parser.run(&mut cursor) {
            ParseStatus::Invalid { recoverable } => assert!(recoverable),
            other => panic!("expected invalid, got {other:?}"),
        }
        match parser.run(&mut cursor) {
            ParseStatus::Complete(message) => {
                assert_eq!(message.start_line.name(), Some("SPEAK"));
                assert_eq!(message.channel_id.session_id, "abcd");
            }
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_method_parses_with_unset_id() {
        // Known resource, bogus method: framing is intact, so the
        // message parses and the owner can answer it with a failure.
        let head = "Channel-Identifier: m@speechsynth\r\n\r\n";
        let tail = format!(" TELEPORT 4\r\n{head}");
        let total = patch_length("MRCP/2.0 ".len() + tail.len()).unwrap();
        let raw = format!("MRCP/2.0 {total}{tail}").into_bytes();

        let mut parser = MessageParser::new(catalog());
        let mut cursor = TextCursor::new(&raw);
        match parser.run(&mut cursor) {
            ParseStatus::Complete(message) => match &message.start_line {
                StartLine::Request(line) => {
                    assert_eq!(line.method_name, "TELEPORT");
                    assert!(line.method_id.is_none());
                    assert_eq!(message.resource_id, Some(0));
                }
                other => panic!("expected request, got {other:?}"),
            },
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn test_generator_resumes_across_small_buffers() {
        let catalog = catalog();
        let bytes = speak_request_bytes();

        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        let mut message = Message::request(synth, Version::V2, speak, 1).unwrap();
        message.channel_id.session_id = "abcd".to_string();
        message.set_content_type("application/ssml+xml").unwrap();
        message.set_body("<?xml version=\"1.0\"?>\r\n<speak><p>Hello world.</p></speak>");

        let mut generator = MessageGenerator::new(catalog);
        generator.initialize(&mut message).unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 16];
        loop {
            let (written, status) = generator.run(&mut buf).unwrap();
            out.extend_from_slice(&buf[..written]);
            if status == GenStatus::Complete {
                break;
            }
        }
        assert_eq!(out, bytes);
    }

    #[test]
    fn test_response_round_trip() {
        let catalog = catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        let mut request = Message::request(synth, Version::V2, speak, 3).unwrap();
        request.channel_id.session_id = "r1".to_string();

        let mut response = Message::response_to(&request);
        if let StartLine::Response(line) = &mut response.start_line {
            line.request_state = RequestState::InProgress;
        }
        let bytes = MessageGenerator::new(catalog.clone())
            .generate_to_vec(&mut response)
            .unwrap();

        let mut parser = MessageParser::new(catalog);
        let mut cursor = TextCursor::new(&bytes);
        match parser.run(&mut cursor) {
            ParseStatus::Complete(message) => match &message.start_line {
                StartLine::Response(line) => {
                    assert_eq!(line.request_id, 3);
                    assert_eq!(line.status_code, StatusCode::SUCCESS);
                    assert_eq!(line.request_state, RequestState::InProgress);
                }
                other => panic!("expected response, got {other:?}"),
            },
            other => panic!("expected complete, got {other:?}"),
        }
    }

    #[test]
    fn test_content_length_header_tracks_body() {
        let bytes = speak_request_bytes();
        let mut parser = MessageParser::new(catalog());
        let mut cursor = TextCursor::new(&bytes);
        let ParseStatus::Complete(message) = parser.run(&mut cursor) else {
            panic!("expected complete");
        };
        assert_eq!(
            message.generic().content_length,
            Some(message.body.len())
        );
        assert!(message
            .header()
            .field_check(GenericHeaderId::ContentLength.id()));
    }
}
