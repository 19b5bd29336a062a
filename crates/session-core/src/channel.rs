//! MRCP channel bookkeeping inside a session.

use rspeech_media_core::TerminationId;
use rspeech_mrcp_core::{ChannelId, ResourceId};
use rspeech_mrcp_transport::ControlChannel;

/// The session-scoped binding between the application and one resource.
///
/// A channel is created inside its session, attached via offer/answer
/// and removed via the symmetric teardown. It is destroyed only after
/// both the control side and the media side have acknowledged.
pub struct Channel {
    /// Identifier carried on every message of this channel
    pub channel_id: ChannelId,
    /// Resource the channel controls
    pub resource_id: ResourceId,
    /// Control-plane handle, present once registered with the agent
    pub control: Option<ControlChannel>,
    /// Media-plane termination, present when the channel carries media
    pub termination_id: Option<TerminationId>,
    /// An ack from the connection agent is outstanding
    pub waiting_for_channel: bool,
    /// An ack from the media engine is outstanding
    pub waiting_for_termination: bool,
}

impl Channel {
    /// New channel, not yet attached anywhere.
    pub fn new(channel_id: ChannelId, resource_id: ResourceId) -> Self {
        Self {
            channel_id,
            resource_id,
            control: None,
            termination_id: None,
            waiting_for_channel: false,
            waiting_for_termination: false,
        }
    }

    /// True when no acknowledgement is outstanding and the channel may
    /// be destroyed.
    pub fn is_settled(&self) -> bool {
        !self.waiting_for_channel && !self.waiting_for_termination
    }
}
