//! MRCP start-line variants.
//!
//! On the wire an MRCPv2 start line is one of:
//!
//! ```text
//! MRCP/2.0 <message-length> <method-name> <request-id>
//! MRCP/2.0 <message-length> <request-id> <status-code> <request-state>
//! MRCP/2.0 <message-length> <event-name> <request-id> <request-state>
//! ```
//!
//! The three forms are told apart by field count and by whether the
//! second field is numeric: three fields mean a request; four fields
//! with a numeric second field mean a response, otherwise an event.
//! MRCPv1 start lines omit the message length and lead with the
//! request id.

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::value,
    multi::many0,
    sequence::preceded,
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Request identifier correlating a request with its response and events.
pub type RequestId = u64;

/// MRCP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Version {
    /// MRCPv1 (RTSP-framed)
    V1,
    /// MRCPv2 (RFC 6787)
    #[default]
    V2,
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V1 => write!(f, "MRCP/1.0"),
            Version::V2 => write!(f, "MRCP/2.0"),
        }
    }
}

/// State of a request reported on responses and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RequestState {
    /// The request is queued behind another one
    Pending,
    /// The request is being fulfilled; events may follow
    InProgress,
    /// The request finished; no further events will follow
    #[default]
    Complete,
}

impl RequestState {
    /// Canonical wire form.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "PENDING",
            RequestState::InProgress => "IN-PROGRESS",
            RequestState::Complete => "COMPLETE",
        }
    }

    /// Parse the wire form (exact match).
    pub fn parse(token: &str) -> Result<Self> {
        match token {
            "PENDING" => Ok(RequestState::Pending),
            "IN-PROGRESS" => Ok(RequestState::InProgress),
            "COMPLETE" => Ok(RequestState::Complete),
            other => Err(Error::InvalidStartLine(format!(
                "unknown request state '{other}'"
            ))),
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MRCP status code carried on responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// The request was processed normally.
    pub const SUCCESS: StatusCode = StatusCode(200);
    /// The server could not process the method.
    pub const METHOD_FAILED: StatusCode = StatusCode(401);
    /// The method is not supported by the resource.
    pub const UNSUPPORTED_METHOD: StatusCode = StatusCode(405);

    /// True for the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Discriminant of the three message forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Client-to-server method invocation
    Request,
    /// Server reply to a request
    Response,
    /// Server-originated notification tied to a request
    Event,
}

/// Start line of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    /// Protocol version
    pub version: Version,
    /// Total message length (v2 only, back-patched on generation)
    pub length: usize,
    /// Method name, e.g. `SPEAK`
    pub method_name: String,
    /// Method id within the resource's method table, set on association
    pub method_id: Option<usize>,
    /// Request identifier
    pub request_id: RequestId,
}

/// Start line of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// Protocol version
    pub version: Version,
    /// Total message length (v2 only)
    pub length: usize,
    /// Request identifier being answered
    pub request_id: RequestId,
    /// Outcome of the request
    pub status_code: StatusCode,
    /// State of the request after this response
    pub request_state: RequestState,
}

/// Start line of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLine {
    /// Protocol version
    pub version: Version,
    /// Total message length (v2 only)
    pub length: usize,
    /// Event name, e.g. `SPEAK-COMPLETE`
    pub event_name: String,
    /// Event id within the resource's event table, set on association
    pub event_id: Option<usize>,
    /// Request identifier the event belongs to
    pub request_id: RequestId,
    /// State of the originating request
    pub request_state: RequestState,
}

/// Parsed start line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    /// Request form
    Request(RequestLine),
    /// Response form
    Response(ResponseLine),
    /// Event form
    Event(EventLine),
}

impl StartLine {
    /// Message form discriminant.
    pub fn message_type(&self) -> MessageType {
        match self {
            StartLine::Request(_) => MessageType::Request,
            StartLine::Response(_) => MessageType::Response,
            StartLine::Event(_) => MessageType::Event,
        }
    }

    /// Protocol version.
    pub fn version(&self) -> Version {
        match self {
            StartLine::Request(l) => l.version,
            StartLine::Response(l) => l.version,
            StartLine::Event(l) => l.version,
        }
    }

    /// Total message length from the start line (zero until known).
    pub fn length(&self) -> usize {
        match self {
            StartLine::Request(l) => l.length,
            StartLine::Response(l) => l.length,
            StartLine::Event(l) => l.length,
        }
    }

    /// Store the total message length (used by the generator back-patch).
    pub fn set_length(&mut self, length: usize) {
        match self {
            StartLine::Request(l) => l.length = length,
            StartLine::Response(l) => l.length = length,
            StartLine::Event(l) => l.length = length,
        }
    }

    /// Request identifier.
    pub fn request_id(&self) -> RequestId {
        match self {
            StartLine::Request(l) => l.request_id,
            StartLine::Response(l) => l.request_id,
            StartLine::Event(l) => l.request_id,
        }
    }

    /// Method or event name for requests and events.
    pub fn name(&self) -> Option<&str> {
        match self {
            StartLine::Request(l) => Some(&l.method_name),
            StartLine::Event(l) => Some(&l.event_name),
            StartLine::Response(_) => None,
        }
    }

    /// Parse one start line (without the terminator).
    pub fn parse(line: &[u8]) -> Result<StartLine> {
        let line = std::str::from_utf8(line)
            .map_err(|_| Error::InvalidStartLine("not valid UTF-8".into()))?;
        let (rest, version) = parse_version(line)
            .map_err(|_| Error::InvalidStartLine(format!("bad version in '{line}'")))?;
        let (rest, fields) = many0(field)(rest)?;
        if !rest.is_empty() {
            return Err(Error::InvalidStartLine(format!("trailing input '{rest}'")));
        }
        match version {
            Version::V2 => Self::classify_v2(&fields),
            Version::V1 => Self::classify_v1(&fields),
        }
    }

    fn classify_v2(fields: &[&str]) -> Result<StartLine> {
        match fields {
            [length, name, request_id] => Ok(StartLine::Request(RequestLine {
                version: Version::V2,
                length: length.parse()?,
                method_name: (*name).to_string(),
                method_id: None,
                request_id: request_id.parse()?,
            })),
            [length, second, third, state] if is_numeric(second) => {
                Ok(StartLine::Response(ResponseLine {
                    version: Version::V2,
                    length: length.parse()?,
                    request_id: second.parse()?,
                    status_code: StatusCode(third.parse()?),
                    request_state: RequestState::parse(state)?,
                }))
            }
            [length, name, request_id, state] => Ok(StartLine::Event(EventLine {
                version: Version::V2,
                length: length.parse()?,
                event_name: (*name).to_string(),
                event_id: None,
                request_id: request_id.parse()?,
                request_state: RequestState::parse(state)?,
            })),
            _ => Err(Error::InvalidStartLine(format!(
                "unexpected field count {}",
                fields.len()
            ))),
        }
    }

    fn classify_v1(fields: &[&str]) -> Result<StartLine> {
        match fields {
            [request_id, name] => Ok(StartLine::Request(RequestLine {
                version: Version::V1,
                length: 0,
                method_name: (*name).to_string(),
                method_id: None,
                request_id: request_id.parse()?,
            })),
            [request_id, status, state] if is_numeric(status) => {
                Ok(StartLine::Response(ResponseLine {
                    version: Version::V1,
                    length: 0,
                    request_id: request_id.parse()?,
                    status_code: StatusCode(status.parse()?),
                    request_state: RequestState::parse(state)?,
                }))
            }
            [request_id, name, state] => Ok(StartLine::Event(EventLine {
                version: Version::V1,
                length: 0,
                event_name: (*name).to_string(),
                event_id: None,
                request_id: request_id.parse()?,
                request_state: RequestState::parse(state)?,
            })),
            _ => Err(Error::InvalidStartLine(format!(
                "unexpected field count {}",
                fields.len()
            ))),
        }
    }

    /// The wire form of everything after the message-length field,
    /// including the leading separator and the CRLF terminator. For
    /// MRCPv1, which has no length field and leads with the request id,
    /// this is everything after the version token.
    pub fn wire_tail(&self) -> String {
        match self {
            StartLine::Request(l) => match l.version {
                Version::V2 => format!(" {} {}\r\n", l.method_name, l.request_id),
                Version::V1 => format!(" {} {}\r\n", l.request_id, l.method_name),
            },
            StartLine::Response(l) => format!(
                " {} {} {}\r\n",
                l.request_id, l.status_code, l.request_state
            ),
            StartLine::Event(l) => match l.version {
                Version::V2 => format!(
                    " {} {} {}\r\n",
                    l.event_name, l.request_id, l.request_state
                ),
                Version::V1 => format!(
                    " {} {} {}\r\n",
                    l.request_id, l.event_name, l.request_state
                ),
            },
        }
    }
}

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn parse_version(input: &str) -> IResult<&str, Version> {
    alt((
        value(Version::V2, tag("MRCP/2.0")),
        value(Version::V1, tag("MRCP/1.0")),
    ))(input)
}

fn field(input: &str) -> IResult<&str, &str> {
    preceded(char(' '), take_while1(|c| c != ' '))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_line() {
        let line = StartLine::parse(b"MRCP/2.0 267 SPEAK 543257").unwrap();
        match line {
            StartLine::Request(l) => {
                assert_eq!(l.version, Version::V2);
                assert_eq!(l.length, 267);
                assert_eq!(l.method_name, "SPEAK");
                assert_eq!(l.request_id, 543257);
                assert!(l.method_id.is_none());
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_response_line() {
        let line = StartLine::parse(b"MRCP/2.0 79 543257 200 IN-PROGRESS").unwrap();
        match line {
            StartLine::Response(l) => {
                assert_eq!(l.request_id, 543257);
                assert_eq!(l.status_code, StatusCode::SUCCESS);
                assert_eq!(l.request_state, RequestState::InProgress);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_event_line() {
        let line = StartLine::parse(b"MRCP/2.0 93 SPEAK-COMPLETE 543257 COMPLETE").unwrap();
        match line {
            StartLine::Event(l) => {
                assert_eq!(l.event_name, "SPEAK-COMPLETE");
                assert_eq!(l.request_id, 543257);
                assert_eq!(l.request_state, RequestState::Complete);
            }
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_v1_request_line() {
        let line = StartLine::parse(b"MRCP/1.0 5 RECOGNIZE").unwrap();
        match line {
            StartLine::Request(l) => {
                assert_eq!(l.version, Version::V1);
                assert_eq!(l.request_id, 5);
                assert_eq!(l.method_name, "RECOGNIZE");
            }
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_lines() {
        assert!(StartLine::parse(b"").is_err());
        assert!(StartLine::parse(b"SIP/2.0 200 OK").is_err());
        assert!(StartLine::parse(b"MRCP/2.0").is_err());
        assert!(StartLine::parse(b"MRCP/2.0 abc SPEAK 1").is_err());
        assert!(StartLine::parse(b"MRCP/2.0 50 1 200 WAITING").is_err());
    }
}
