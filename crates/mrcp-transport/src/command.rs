//! Commands and events crossing the agent boundary.
//!
//! The agent runs a single event loop; other threads hand it work
//! through a command channel bundled into that loop's select. Each
//! command carries a discriminated record, the channel it concerns and
//! whatever payload the operation needs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use rspeech_mrcp_core::{ChannelId, Message};

/// How a channel binds to a TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionType {
    /// Open a dedicated connection
    #[default]
    New,
    /// Share an existing connection to the same remote address
    Existing,
}

/// Control side of an offer/answer: where the channel's MRCP messages
/// flow and how the connection is shared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    /// Remote (server) IP address
    pub ip: String,
    /// Remote MRCPv2 port; zero means "not offered"
    pub port: u16,
    /// Connection sharing policy
    pub connection_type: ConnectionType,
    /// Session identifier
    pub session_id: String,
    /// Resource name the channel controls
    pub resource_name: String,
}

impl ControlDescriptor {
    /// The channel identifier this descriptor addresses.
    pub fn channel_id(&self) -> ChannelId {
        ChannelId::new(self.session_id.clone(), self.resource_name.clone())
    }
}

/// Events an agent raises toward the channel owner.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A modify finished; the answer descriptor and outcome
    ModifyCompleted {
        /// The (possibly adjusted) answer
        descriptor: ControlDescriptor,
        /// Whether a usable connection is attached
        connected: bool,
    },
    /// A remove finished
    RemoveCompleted,
    /// An inbound message addressed to this channel
    MessageReceived(Box<Message>),
    /// The underlying connection dropped; the channel object survives
    /// until it is explicitly removed
    Disconnected,
}

/// Where a channel's events are delivered; owners wrap their inbox
/// sender here.
pub type ChannelEventSink = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Point-in-time view of the agent's connections, for diagnostics.
#[derive(Debug, Clone)]
pub struct AgentStats {
    /// `(remote address, channel reference count, open)` per connection
    pub connections: Vec<(std::net::SocketAddr, usize, bool)>,
}

/// The four-discriminant command record the public API sends into the
/// agent loop.
pub enum AgentCommand {
    /// Attach or re-negotiate a channel
    ModifyChannel {
        /// Channel being modified
        channel_id: ChannelId,
        /// Event sink for this channel
        sink: ChannelEventSink,
        /// The answer descriptor driving the connection choice
        descriptor: ControlDescriptor,
    },
    /// Detach a channel; the last channel on a connection closes it
    RemoveChannel {
        /// Channel being removed
        channel_id: ChannelId,
    },
    /// Serialise and send one MRCP message on the channel's connection
    SendMessage {
        /// Originating channel
        channel_id: ChannelId,
        /// Message to put on the wire
        message: Box<Message>,
    },
    /// Stop the agent loop
    Terminate,
    /// Diagnostics snapshot
    QueryStats {
        /// Where to deliver the snapshot
        reply: oneshot::Sender<AgentStats>,
    },
}
