//! The signalling seam.
//!
//! SIP/SDP (or RTSP) signalling stays outside this crate; sessions see
//! only an agent that transports offers and brings back answers.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{SessionDescriptor, SessionId};

/// Transport for offers and answers, implemented by the signalling
/// integration.
#[async_trait]
pub trait SignalingAgent: Send + Sync {
    /// Deliver an offer; resolves with the peer's answer.
    async fn offer(
        &self,
        session_id: &SessionId,
        offer: &SessionDescriptor,
    ) -> Result<SessionDescriptor>;

    /// Tear down the signalling leg of the session.
    async fn terminate(&self, session_id: &SessionId) -> Result<()>;
}
