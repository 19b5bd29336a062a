//! Generic (resource-independent) MRCP headers.
//!
//! The generic header table is fixed: eleven fields with ids `0..=10`.
//! [`GenericHeaders`] is the typed accessor; a field's typed value is
//! populated exactly when the corresponding id is present in the
//! message's header section, so the set of populated options is the
//! property bitmap.

use crate::error::{Error, Result};
use crate::message::start_line::RequestId;

/// Number of generic header ids.
pub const GENERIC_HEADER_COUNT: usize = 11;

/// Identifier of a generic header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum GenericHeaderId {
    /// `Active-Request-Id-List`
    ActiveRequestIdList = 0,
    /// `Proxy-Sync-Id`
    ProxySyncId = 1,
    /// `Accept-Charset`
    AcceptCharset = 2,
    /// `Content-Type`
    ContentType = 3,
    /// `Content-Id`
    ContentId = 4,
    /// `Content-Base`
    ContentBase = 5,
    /// `Content-Encoding`
    ContentEncoding = 6,
    /// `Content-Location`
    ContentLocation = 7,
    /// `Content-Length`
    ContentLength = 8,
    /// `Cache-Control`
    CacheControl = 9,
    /// `Logging-Tag`
    LoggingTag = 10,
}

const GENERIC_HEADER_NAMES: [&str; GENERIC_HEADER_COUNT] = [
    "Active-Request-Id-List",
    "Proxy-Sync-Id",
    "Accept-Charset",
    "Content-Type",
    "Content-Id",
    "Content-Base",
    "Content-Encoding",
    "Content-Location",
    "Content-Length",
    "Cache-Control",
    "Logging-Tag",
];

impl GenericHeaderId {
    /// Canonical generation case.
    pub fn name(&self) -> &'static str {
        GENERIC_HEADER_NAMES[*self as usize]
    }

    /// Numeric id within the generic table.
    pub fn id(&self) -> usize {
        *self as usize
    }

    /// Case-insensitive lookup by field name.
    pub fn from_name(name: &str) -> Option<Self> {
        GENERIC_HEADER_NAMES
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .and_then(Self::from_id)
    }

    /// Lookup by numeric id.
    pub fn from_id(id: usize) -> Option<Self> {
        use GenericHeaderId::*;
        match id {
            0 => Some(ActiveRequestIdList),
            1 => Some(ProxySyncId),
            2 => Some(AcceptCharset),
            3 => Some(ContentType),
            4 => Some(ContentId),
            5 => Some(ContentBase),
            6 => Some(ContentEncoding),
            7 => Some(ContentLocation),
            8 => Some(ContentLength),
            9 => Some(CacheControl),
            10 => Some(LoggingTag),
            _ => None,
        }
    }
}

/// Typed values of the generic headers present on a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericHeaders {
    /// `Active-Request-Id-List`
    pub active_request_id_list: Option<Vec<RequestId>>,
    /// `Proxy-Sync-Id`
    pub proxy_sync_id: Option<String>,
    /// `Accept-Charset`
    pub accept_charset: Option<String>,
    /// `Content-Type`
    pub content_type: Option<String>,
    /// `Content-Id`
    pub content_id: Option<String>,
    /// `Content-Base`
    pub content_base: Option<String>,
    /// `Content-Encoding`
    pub content_encoding: Option<String>,
    /// `Content-Location`
    pub content_location: Option<String>,
    /// `Content-Length`
    pub content_length: Option<usize>,
    /// `Cache-Control`
    pub cache_control: Option<String>,
    /// `Logging-Tag`
    pub logging_tag: Option<String>,
}

impl GenericHeaders {
    /// Parse a raw value into the typed slot for `id`.
    pub fn parse_field(&mut self, id: GenericHeaderId, value: &str) -> Result<()> {
        use GenericHeaderId::*;
        match id {
            ActiveRequestIdList => {
                let mut list = Vec::new();
                for part in value.split(',') {
                    let part = part.trim();
                    if part.is_empty() {
                        continue;
                    }
                    list.push(part.parse::<RequestId>().map_err(|_| {
                        Error::InvalidHeader(format!("bad request id '{part}'"))
                    })?);
                }
                self.active_request_id_list = Some(list);
            }
            ProxySyncId => self.proxy_sync_id = Some(value.to_string()),
            AcceptCharset => self.accept_charset = Some(value.to_string()),
            ContentType => self.content_type = Some(value.to_string()),
            ContentId => self.content_id = Some(value.to_string()),
            ContentBase => self.content_base = Some(value.to_string()),
            ContentEncoding => self.content_encoding = Some(value.to_string()),
            ContentLocation => self.content_location = Some(value.to_string()),
            ContentLength => {
                self.content_length = Some(value.trim().parse::<usize>().map_err(|_| {
                    Error::InvalidHeader(format!("bad content length '{value}'"))
                })?);
            }
            CacheControl => self.cache_control = Some(value.to_string()),
            LoggingTag => self.logging_tag = Some(value.to_string()),
        }
        Ok(())
    }

    /// Wire value for `id`, `None` when the field is not set.
    pub fn generate_field(&self, id: GenericHeaderId) -> Option<String> {
        use GenericHeaderId::*;
        match id {
            ActiveRequestIdList => self.active_request_id_list.as_ref().map(|list| {
                list.iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            }),
            ProxySyncId => self.proxy_sync_id.clone(),
            AcceptCharset => self.accept_charset.clone(),
            ContentType => self.content_type.clone(),
            ContentId => self.content_id.clone(),
            ContentBase => self.content_base.clone(),
            ContentEncoding => self.content_encoding.clone(),
            ContentLocation => self.content_location.clone(),
            ContentLength => self.content_length.map(|len| len.to_string()),
            CacheControl => self.cache_control.clone(),
            LoggingTag => self.logging_tag.clone(),
        }
    }

    /// True when the typed slot for `id` is populated.
    pub fn property_check(&self, id: GenericHeaderId) -> bool {
        self.generate_field(id).is_some()
    }

    /// Clear the typed slot for `id`.
    pub fn clear_field(&mut self, id: GenericHeaderId) {
        use GenericHeaderId::*;
        match id {
            ActiveRequestIdList => self.active_request_id_list = None,
            ProxySyncId => self.proxy_sync_id = None,
            AcceptCharset => self.accept_charset = None,
            ContentType => self.content_type = None,
            ContentId => self.content_id = None,
            ContentBase => self.content_base = None,
            ContentEncoding => self.content_encoding = None,
            ContentLocation => self.content_location = None,
            ContentLength => self.content_length = None,
            CacheControl => self.cache_control = None,
            LoggingTag => self.logging_tag = None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_lookup_is_case_insensitive() {
        assert_eq!(
            GenericHeaderId::from_name("content-length"),
            Some(GenericHeaderId::ContentLength)
        );
        assert_eq!(
            GenericHeaderId::from_name("CONTENT-TYPE"),
            Some(GenericHeaderId::ContentType)
        );
        assert_eq!(GenericHeaderId::from_name("X-Unknown"), None);
    }

    #[test]
    fn test_parse_and_generate_content_length() {
        let mut headers = GenericHeaders::default();
        headers
            .parse_field(GenericHeaderId::ContentLength, "142")
            .unwrap();
        assert_eq!(headers.content_length, Some(142));
        assert_eq!(
            headers.generate_field(GenericHeaderId::ContentLength),
            Some("142".to_string())
        );
        assert!(headers
            .parse_field(GenericHeaderId::ContentLength, "not-a-number")
            .is_err());
    }

    #[test]
    fn test_parse_active_request_id_list() {
        let mut headers = GenericHeaders::default();
        headers
            .parse_field(GenericHeaderId::ActiveRequestIdList, "1, 2,3")
            .unwrap();
        assert_eq!(headers.active_request_id_list, Some(vec![1, 2, 3]));
        assert_eq!(
            headers.generate_field(GenericHeaderId::ActiveRequestIdList),
            Some("1,2,3".to_string())
        );
    }

    #[test]
    fn test_property_check_tracks_fields() {
        let mut headers = GenericHeaders::default();
        assert!(!headers.property_check(GenericHeaderId::LoggingTag));
        headers
            .parse_field(GenericHeaderId::LoggingTag, "call-77")
            .unwrap();
        assert!(headers.property_check(GenericHeaderId::LoggingTag));
        headers.clear_field(GenericHeaderId::LoggingTag);
        assert!(!headers.property_check(GenericHeaderId::LoggingTag));
    }
}
