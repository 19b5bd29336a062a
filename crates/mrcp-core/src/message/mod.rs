//! MRCP message model.
//!
//! A [`Message`] bundles a start line, the channel identifier, the header
//! section with its typed generic accessor, and the body. Messages are
//! associated with a resource from the catalogue either by id (names are
//! derived, the construction path) or by name (ids are derived, the
//! parse path); after association the id and name of the method or event
//! are always consistent.

pub mod channel_id;
pub mod generic;
pub mod header_section;
pub mod start_line;

pub use channel_id::{ChannelId, CHANNEL_ID_HEADER};
pub use generic::{GenericHeaderId, GenericHeaders, GENERIC_HEADER_COUNT};
pub use header_section::{HeaderField, HeaderSection};
pub use start_line::{
    EventLine, MessageType, RequestId, RequestLine, RequestState, ResponseLine, StartLine,
    StatusCode, Version,
};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::resource::{HeaderTable, Resource, ResourceCatalog, ResourceId};

/// One MRCP message.
#[derive(Debug, Clone)]
pub struct Message {
    /// Start line (request, response or event form)
    pub start_line: StartLine,
    /// Channel identifier (`<session-id>@<resource-name>`)
    pub channel_id: ChannelId,
    /// Resource id, set on association
    pub resource_id: Option<ResourceId>,
    header: HeaderSection,
    generic: GenericHeaders,
    /// Message body
    pub body: Bytes,
}

impl Message {
    /// Message with an empty header section; association grows the id
    /// space to include the resource-specific range.
    pub fn new(start_line: StartLine) -> Self {
        Self {
            start_line,
            channel_id: ChannelId::default(),
            resource_id: None,
            header: HeaderSection::new(GENERIC_HEADER_COUNT),
            generic: GenericHeaders::default(),
            body: Bytes::new(),
        }
    }

    /// Create a request for a resource; the method name is derived from
    /// the method id.
    pub fn request(
        resource: &Resource,
        version: Version,
        method_id: usize,
        request_id: RequestId,
    ) -> Result<Self> {
        let method_name = resource
            .method_name(method_id)
            .ok_or_else(|| Error::UnknownMethod(format!("method id {method_id}")))?;
        let mut message = Self::new(StartLine::Request(RequestLine {
            version,
            length: 0,
            method_name: method_name.to_string(),
            method_id: Some(method_id),
            request_id,
        }));
        message.resource_id = Some(resource.id);
        message.channel_id.resource_name = resource.name.to_string();
        message
            .header
            .resize_ids(GENERIC_HEADER_COUNT + resource.header_table.field_count());
        Ok(message)
    }

    /// Create the response to a request, inheriting channel id, request
    /// id, version and resource. Defaults to `200 COMPLETE`.
    pub fn response_to(request: &Message) -> Self {
        let mut message = Self::new(StartLine::Response(ResponseLine {
            version: request.start_line.version(),
            length: 0,
            request_id: request.start_line.request_id(),
            status_code: StatusCode::SUCCESS,
            request_state: RequestState::Complete,
        }));
        message.channel_id = request.channel_id.clone();
        message.resource_id = request.resource_id;
        message.header.resize_ids(request.header.id_count());
        message
    }

    /// Create an event tied to a request; the event name is derived from
    /// the event id.
    pub fn event_from(resource: &Resource, request: &Message, event_id: usize) -> Result<Self> {
        let event_name = resource
            .event_name(event_id)
            .ok_or_else(|| Error::UnknownMethod(format!("event id {event_id}")))?;
        let mut message = Self::new(StartLine::Event(EventLine {
            version: request.start_line.version(),
            length: 0,
            event_name: event_name.to_string(),
            event_id: Some(event_id),
            request_id: request.start_line.request_id(),
            request_state: RequestState::InProgress,
        }));
        message.channel_id = request.channel_id.clone();
        message.resource_id = Some(resource.id);
        message
            .header
            .resize_ids(GENERIC_HEADER_COUNT + resource.header_table.field_count());
        Ok(message)
    }

    /// Associate by resource name (the parse path): the resource id and
    /// the method/event id are derived from their names.
    pub fn associate_by_name(&mut self, catalog: &ResourceCatalog) -> Result<()> {
        let resource = catalog.require_by_name(&self.channel_id.resource_name)?;
        self.resource_id = Some(resource.id);
        self.header
            .resize_ids(GENERIC_HEADER_COUNT + resource.header_table.field_count());
        match &mut self.start_line {
            StartLine::Request(line) => {
                line.method_id = Some(
                    resource
                        .method_id(&line.method_name)
                        .ok_or_else(|| Error::UnknownMethod(line.method_name.clone()))?,
                );
            }
            StartLine::Event(line) => {
                line.event_id = Some(
                    resource
                        .event_id(&line.event_name)
                        .ok_or_else(|| Error::UnknownMethod(line.event_name.clone()))?,
                );
            }
            StartLine::Response(_) => {}
        }
        Ok(())
    }

    /// Associate by resource id (the construction path): names are
    /// derived from ids.
    pub fn associate_by_id(&mut self, catalog: &ResourceCatalog) -> Result<()> {
        let id = self
            .resource_id
            .ok_or_else(|| Error::InvalidMessage("no resource id to associate by".into()))?;
        let resource = catalog.require_by_id(id)?;
        self.channel_id.resource_name = resource.name.to_string();
        self.header
            .resize_ids(GENERIC_HEADER_COUNT + resource.header_table.field_count());
        match &mut self.start_line {
            StartLine::Request(line) => {
                let method_id = line
                    .method_id
                    .ok_or_else(|| Error::UnknownMethod(line.method_name.clone()))?;
                line.method_name = resource
                    .method_name(method_id)
                    .ok_or_else(|| Error::UnknownMethod(format!("method id {method_id}")))?
                    .to_string();
            }
            StartLine::Event(line) => {
                let event_id = line
                    .event_id
                    .ok_or_else(|| Error::UnknownMethod(line.event_name.clone()))?;
                line.event_name = resource
                    .event_name(event_id)
                    .ok_or_else(|| Error::UnknownMethod(format!("event id {event_id}")))?
                    .to_string();
            }
            StartLine::Response(_) => {}
        }
        Ok(())
    }

    /// The header section (ordered fields with ids).
    pub fn header(&self) -> &HeaderSection {
        &self.header
    }

    /// Typed generic header values; the populated options mirror the
    /// generic ids present in the section.
    pub fn generic(&self) -> &GenericHeaders {
        &self.generic
    }

    /// Set a generic header from its raw value; updates the typed slot
    /// and the section together.
    pub fn set_generic_field(&mut self, id: GenericHeaderId, value: &str) -> Result<()> {
        self.generic.parse_field(id, value)?;
        let canonical = self
            .generic
            .generate_field(id)
            .unwrap_or_else(|| value.to_string());
        self.header
            .set(HeaderField::new(id.name(), canonical, id.id()))
    }

    /// `Content-Type` convenience setter.
    pub fn set_content_type(&mut self, value: &str) -> Result<()> {
        self.set_generic_field(GenericHeaderId::ContentType, value)
    }

    /// `Logging-Tag` convenience setter.
    pub fn set_logging_tag(&mut self, value: &str) -> Result<()> {
        self.set_generic_field(GenericHeaderId::LoggingTag, value)
    }

    /// Set a resource-specific header by name; the value is validated
    /// against the resource's header table.
    pub fn set_resource_field(
        &mut self,
        resource: &Resource,
        name: &str,
        value: &str,
    ) -> Result<()> {
        let table_id = resource
            .header_table
            .find_id(name)
            .ok_or_else(|| Error::InvalidHeader(format!("unknown header '{name}'")))?;
        use crate::resource::HeaderTable;
        resource.header_table.parse_field(table_id, value)?;
        let canonical = resource.header_table.field_name(table_id).unwrap_or(name);
        self.header.set(HeaderField::new(
            canonical,
            value,
            GENERIC_HEADER_COUNT + table_id,
        ))
    }

    /// Remove a header by id, clearing the typed slot when generic.
    pub fn remove_field(&mut self, id: usize) -> Option<HeaderField> {
        let field = self.header.remove(id)?;
        if let Some(generic_id) = GenericHeaderId::from_id(id) {
            self.generic.clear_field(generic_id);
        }
        Some(field)
    }

    /// Dispatch one parsed wire field: the resource table is consulted
    /// first (a resource may override a generic name), then the generic
    /// table. Returns false when neither table knows the name.
    pub fn add_wire_field(
        &mut self,
        name: &str,
        value: &str,
        resource: Option<&Resource>,
    ) -> Result<bool> {
        if let Some(resource) = resource {
            if let Some(table_id) = resource.header_table.find_id(name) {
                use crate::resource::HeaderTable;
                resource.header_table.parse_field(table_id, value)?;
                let canonical = resource.header_table.field_name(table_id).unwrap_or(name);
                self.header.set(HeaderField::new(
                    canonical,
                    value,
                    GENERIC_HEADER_COUNT + table_id,
                ))?;
                return Ok(true);
            }
        }
        if let Some(generic_id) = GenericHeaderId::from_name(name) {
            self.generic.parse_field(generic_id, value)?;
            self.header.set(HeaderField::new(
                generic_id.name(),
                value,
                generic_id.id(),
            ))?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Copy fields from `other` that are not present here. Used for
    /// parameter inheritance between related messages.
    pub fn inherit_from(&mut self, other: &Message) -> Result<()> {
        for field in other.header.iter() {
            if !self.header.field_check(field.id) {
                if let Some(generic_id) = GenericHeaderId::from_id(field.id) {
                    self.generic.parse_field(generic_id, &field.value)?;
                }
                self.header.add(field.clone())?;
            }
        }
        Ok(())
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Ensure the invariants a message must satisfy before generation:
    /// with a non-empty body, `Content-Length` is present and equals the
    /// body length.
    pub fn validate(&mut self) -> Result<()> {
        if !self.body.is_empty() && self.generic.content_length != Some(self.body.len()) {
            let body_len = self.body.len();
            self.set_generic_field(GenericHeaderId::ContentLength, &body_len.to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceCatalog;

    fn catalog() -> ResourceCatalog {
        ResourceCatalog::default_catalog()
    }

    #[test]
    fn test_request_constructor_derives_names() {
        let catalog = catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        let message = Message::request(synth, Version::V2, speak, 7).unwrap();
        match &message.start_line {
            StartLine::Request(line) => {
                assert_eq!(line.method_name, "SPEAK");
                assert_eq!(line.method_id, Some(speak));
                assert_eq!(line.request_id, 7);
            }
            other => panic!("expected request, got {other:?}"),
        }
        assert_eq!(message.channel_id.resource_name, "speechsynth");
    }

    #[test]
    fn test_response_and_event_inherit() {
        let catalog = catalog();
        let recog = catalog.get_by_name("speechrecog").unwrap();
        let recognize = recog.method_id("RECOGNIZE").unwrap();
        let mut request = Message::request(recog, Version::V2, recognize, 41).unwrap();
        request.channel_id.session_id = "s1".to_string();

        let response = Message::response_to(&request);
        assert_eq!(response.start_line.request_id(), 41);
        assert_eq!(response.channel_id, request.channel_id);

        let event_id = recog.event_id("START-OF-INPUT").unwrap();
        let event = Message::event_from(recog, &request, event_id).unwrap();
        assert_eq!(event.start_line.name(), Some("START-OF-INPUT"));
        assert_eq!(event.start_line.request_id(), 41);
    }

    #[test]
    fn test_associate_by_name_fills_ids() {
        let catalog = catalog();
        let mut message = Message::new(StartLine::Request(RequestLine {
            version: Version::V2,
            length: 0,
            method_name: "RECOGNIZE".to_string(),
            method_id: None,
            request_id: 1,
        }));
        message.channel_id = ChannelId::new("sess", "speechrecog");
        message.associate_by_name(&catalog).unwrap();
        assert_eq!(message.resource_id, Some(1));
        match &message.start_line {
            StartLine::Request(line) => assert!(line.method_id.is_some()),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn test_associate_unknown_method_fails() {
        let catalog = catalog();
        let mut message = Message::new(StartLine::Request(RequestLine {
            version: Version::V2,
            length: 0,
            method_name: "TELEPORT".to_string(),
            method_id: None,
            request_id: 1,
        }));
        message.channel_id = ChannelId::new("sess", "speechsynth");
        assert!(message.associate_by_name(&catalog).is_err());
    }

    #[test]
    fn test_validate_fixes_content_length() {
        let catalog = catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        let mut message = Message::request(synth, Version::V2, speak, 1).unwrap();
        message.set_body("hello world");
        message.validate().unwrap();
        assert_eq!(message.generic().content_length, Some(11));
        assert!(message
            .header()
            .field_check(GenericHeaderId::ContentLength.id()));
    }

    #[test]
    fn test_wire_field_dispatch_resource_first() {
        let catalog = catalog();
        let recog = catalog.get_by_name("speechrecog").unwrap();
        let recognize = recog.method_id("RECOGNIZE").unwrap();
        let mut message = Message::request(recog, Version::V2, recognize, 1).unwrap();

        assert!(message
            .add_wire_field("Confidence-Threshold", "0.8", Some(recog))
            .unwrap());
        assert!(message
            .add_wire_field("Content-Type", "application/srgs+xml", Some(recog))
            .unwrap());
        assert!(!message
            .add_wire_field("X-Vendor-Specific", "1", Some(recog))
            .unwrap());

        let table_id = recog.header_table.find_id("Confidence-Threshold").unwrap();
        assert!(message
            .header()
            .field_check(GENERIC_HEADER_COUNT + table_id));
        assert_eq!(
            message.generic().content_type.as_deref(),
            Some("application/srgs+xml")
        );
    }

    #[test]
    fn test_inherit_from_copies_missing_fields() {
        let catalog = catalog();
        let synth = catalog.get_by_name("speechsynth").unwrap();
        let speak = synth.method_id("SPEAK").unwrap();
        let mut base = Message::request(synth, Version::V2, speak, 1).unwrap();
        base.set_content_type("application/ssml+xml").unwrap();
        base.set_resource_field(synth, "Voice-Name", "carol").unwrap();

        let mut derived = Message::request(synth, Version::V2, speak, 2).unwrap();
        derived.set_content_type("text/plain").unwrap();
        derived.inherit_from(&base).unwrap();

        // The existing field wins, missing fields are copied.
        assert_eq!(derived.generic().content_type.as_deref(), Some("text/plain"));
        let voice_id = GENERIC_HEADER_COUNT + synth.header_table.find_id("Voice-Name").unwrap();
        assert_eq!(derived.header().field_get(voice_id).unwrap().value, "carol");
    }
}
