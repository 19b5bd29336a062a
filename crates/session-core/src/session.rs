//! State and events shared by the client and server sessions.

use std::sync::Arc;

use rspeech_mrcp_core::{ChannelId, Message};

/// Observable lifecycle of a session.
///
/// ```text
/// Idle --offer--> OfferInProgress --all-acks--> Active
/// Active --update--> OfferInProgress
/// Active --terminate--> Terminating --all-acks--> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Nothing negotiated yet
    #[default]
    Idle,
    /// An offer is outstanding; barrier counters are draining
    OfferInProgress,
    /// Channels are usable
    Active,
    /// Teardown in progress; waiting for every acknowledgement
    Terminating,
    /// Fully torn down
    Closed,
}

/// Events a session reports to its application.
#[derive(Debug)]
pub enum SessionEvent {
    /// The offer/answer cycle finished; `success` is the composite
    /// outcome over every acknowledgement
    OfferCompleted {
        /// All acks succeeded
        success: bool,
    },
    /// An MRCP message arrived (response or event)
    MessageReceived {
        /// Channel the message belongs to
        channel_id: ChannelId,
        /// The message
        message: Box<Message>,
    },
    /// A channel's connection dropped
    ChannelDisconnected {
        /// Affected channel
        channel_id: ChannelId,
    },
    /// Teardown finished
    TerminateCompleted {
        /// All acks succeeded
        success: bool,
    },
}

/// Where session events are delivered.
pub type SessionEventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;
