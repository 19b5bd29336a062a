//! MRCPv2 channel identifier.
//!
//! Every MRCPv2 message carries `Channel-Identifier:
//! <session-id>@<resource-name>` right after the start line. The header
//! is not part of the regular header section; it is parsed and generated
//! alongside the start line. Malformed values are rejected outright and
//! the connection resynchronises via the message length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Canonical header name.
pub const CHANNEL_ID_HEADER: &str = "Channel-Identifier";

/// The `(session-id, resource-name)` pair identifying an MRCP channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelId {
    /// Session identifier shared with the signalling plane
    pub session_id: String,
    /// Resource name, e.g. `speechsynth`
    pub resource_name: String,
}

impl ChannelId {
    /// Build from parts.
    pub fn new(session_id: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            resource_name: resource_name.into(),
        }
    }

    /// True when both parts are present.
    pub fn is_complete(&self) -> bool {
        !self.session_id.is_empty() && !self.resource_name.is_empty()
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.session_id, self.resource_name)
    }
}

impl FromStr for ChannelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (session_id, resource_name) = s
            .split_once('@')
            .ok_or_else(|| Error::InvalidChannelId(format!("missing '@' in '{s}'")))?;
        if session_id.is_empty() || resource_name.is_empty() || resource_name.contains('@') {
            return Err(Error::InvalidChannelId(format!("malformed value '{s}'")));
        }
        Ok(ChannelId {
            session_id: session_id.to_string(),
            resource_name: resource_name.to_string(),
        })
    }
}
