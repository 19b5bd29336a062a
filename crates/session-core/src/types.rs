//! Session-level descriptors exchanged with the signalling agent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rspeech_media_core::CodecDescriptor;
use rspeech_mrcp_transport::ControlDescriptor;

/// Session identifier, shared with the signalling plane and carried in
/// every channel identifier.
pub type SessionId = String;

/// Fresh random session identifier.
pub fn generate_session_id() -> SessionId {
    Uuid::new_v4().simple().to_string()
}

/// Stable media-context id derived from a session id (FNV-1a).
pub(crate) fn context_id_for(session_id: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in session_id.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Which side of a media flow a descriptor talks about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DescriptorMask {
    /// The local side is described
    pub local: bool,
    /// The remote side is described
    pub remote: bool,
}

/// Direction of an RTP media flow from the describing side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MediaMode {
    /// No media
    #[default]
    Inactive,
    /// Only sending
    SendOnly,
    /// Only receiving
    ReceiveOnly,
    /// Both directions
    SendReceive,
}

/// One RTP media stream in an offer or answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtpMediaDescriptor {
    /// Declared direction
    pub mode: MediaMode,
    /// Transport address
    pub ip: String,
    /// RTP port; zero when the stream is declined
    pub port: u16,
    /// Codecs in preference order
    pub codec_list: Vec<CodecDescriptor>,
    /// Which side this entry describes
    pub mask: DescriptorMask,
}

impl RtpMediaDescriptor {
    /// A declined stream entry.
    pub fn declined() -> Self {
        Self {
            mode: MediaMode::Inactive,
            ip: "0.0.0.0".to_string(),
            port: 0,
            codec_list: Vec::new(),
            mask: DescriptorMask::default(),
        }
    }
}

/// Outcome carried on an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DescriptorStatus {
    /// The offer was accepted
    #[default]
    Ok,
    /// The offer was rejected as a whole
    Failed,
}

/// The full offer or answer for one session: the control channels and
/// the media streams, in matching order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Originating address
    pub origin_ip: String,
    /// Control-plane entries, one per MRCP channel
    pub control: Vec<ControlDescriptor>,
    /// Media-plane entries, one per termination
    pub media: Vec<RtpMediaDescriptor>,
    /// Offer/answer outcome
    pub status: DescriptorStatus,
}

impl SessionDescriptor {
    /// Empty descriptor originating from `ip`.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            origin_ip: ip.into(),
            ..Default::default()
        }
    }

    /// True when the descriptor carries nothing to negotiate.
    pub fn is_empty(&self) -> bool {
        self.control.is_empty() && self.media.is_empty()
    }
}
