//! # rspeech-mrcp-core
//!
//! MRCPv2 (RFC 6787) protocol implementation for the rspeech stack:
//! message model, resource catalogue, and the streaming parser and
//! generator the connection agent is built on.
//!
//! ## Overview
//!
//! - **Message model**: [`Message`] with its three start-line forms
//!   ([`StartLine`]), the channel identifier ([`ChannelId`]), the ordered
//!   header section with id indexing, and typed generic headers.
//! - **Resource catalogue**: [`ResourceCatalog`] mapping resource names
//!   and ids to method/event vocabularies and per-resource header tables.
//! - **Codec**: [`MessageParser`] and [`MessageGenerator`], both
//!   resumable across arbitrarily segmented buffers.
//!
//! ## Building and generating a message
//!
//! ```rust
//! use std::sync::Arc;
//! use rspeech_mrcp_core::prelude::*;
//!
//! let catalog = Arc::new(ResourceCatalog::default_catalog());
//! let synth = catalog.get_by_name("speechsynth").unwrap();
//! let speak = synth.method_id("SPEAK").unwrap();
//!
//! let mut message = Message::request(synth, Version::V2, speak, 1).unwrap();
//! message.channel_id.session_id = "32AECB23433801".to_string();
//! message.set_content_type("application/ssml+xml").unwrap();
//! message.set_body("<speak>hi</speak>");
//!
//! let bytes = MessageGenerator::new(catalog.clone())
//!     .generate_to_vec(&mut message)
//!     .unwrap();
//! assert!(bytes.starts_with(b"MRCP/2.0 "));
//! ```
//!
//! ## Parsing from the wire
//!
//! ```rust
//! use std::sync::Arc;
//! use rspeech_mrcp_core::prelude::*;
//!
//! let catalog = Arc::new(ResourceCatalog::default_catalog());
//! let data = b"MRCP/2.0 79 543257 200 IN-PROGRESS\r\n\
//!              Channel-Identifier: 32AECB23433801@speechsynth\r\n\r\n";
//!
//! let mut parser = MessageParser::new(catalog);
//! let mut cursor = TextCursor::new(data);
//! match parser.run(&mut cursor) {
//!     ParseStatus::Complete(message) => {
//!         assert_eq!(message.start_line.request_id(), 543257);
//!     }
//!     other => panic!("unexpected status {other:?}"),
//! }
//! ```

pub mod error;
pub mod message;
pub mod parser;
pub mod resource;
pub mod text;

/// Prelude module that exports commonly used types and traits
pub mod prelude;

pub use error::{Error, Result};
pub use message::{
    ChannelId, EventLine, GenericHeaderId, GenericHeaders, HeaderField, HeaderSection, Message,
    MessageType, RequestId, RequestLine, RequestState, ResponseLine, StartLine, StatusCode,
    Version, CHANNEL_ID_HEADER, GENERIC_HEADER_COUNT,
};
pub use parser::{GenStatus, MessageGenerator, MessageParser, ParseStatus};
pub use resource::{
    recognizer_resource, synthesizer_resource, FieldKind, HeaderTable, Resource, ResourceCatalog,
    ResourceId, StaticHeaderTable,
};
pub use text::TextCursor;
