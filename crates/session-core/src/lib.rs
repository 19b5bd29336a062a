//! # rspeech-session-core
//!
//! Session coordination for the rspeech stack: the client and server
//! state machines that tie the signalling agent, the MRCPv2 connection
//! agent and the media engine together through offer/answer cycles.
//!
//! A session is a task. Its observable lifecycle is
//!
//! ```text
//! Idle --offer--> OfferInProgress --all-acks--> Active
//! Active --update--> OfferInProgress
//! Active --terminate--> Terminating --all-acks--> Closed
//! ```
//!
//! where "all acks" is the partial-failure discipline at the heart of
//! the stack: each phase counts the acknowledgements it is owed, keeps
//! waiting even after one of them fails, and reports a composite result
//! once the counter reaches zero.

pub mod channel;
pub mod client;
pub mod error;
pub mod server;
pub mod session;
pub mod signaling;
pub mod types;

pub use channel::Channel;
pub use client::{
    AppRequest, ClientSession, ClientSessionConfig, ClientSessionHandle, ClientSessionMsg,
};
pub use error::{Error, Result};
pub use server::{ServerSession, ServerSessionHandle, ServerSessionMsg, TerminationFactory};
pub use session::{SessionEvent, SessionEventSink, SessionState};
pub use signaling::SignalingAgent;
pub use types::{
    generate_session_id, DescriptorMask, DescriptorStatus, MediaMode, RtpMediaDescriptor,
    SessionDescriptor, SessionId,
};
