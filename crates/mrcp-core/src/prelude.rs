//! Commonly used types, re-exported in one place.

pub use crate::error::{Error, Result};
pub use crate::message::{
    ChannelId, EventLine, GenericHeaderId, GenericHeaders, HeaderField, HeaderSection, Message,
    MessageType, RequestId, RequestLine, RequestState, ResponseLine, StartLine, StatusCode,
    Version, CHANNEL_ID_HEADER, GENERIC_HEADER_COUNT,
};
pub use crate::parser::{GenStatus, MessageGenerator, MessageParser, ParseStatus};
pub use crate::resource::{
    FieldKind, HeaderTable, Resource, ResourceCatalog, ResourceId, StaticHeaderTable,
};
pub use crate::text::TextCursor;
