//! # rspeech-mrcp-transport
//!
//! The MRCPv2 connection agent: a single event loop per agent that
//! multiplexes many persistent TCP connections, demultiplexes inbound
//! messages to their channels by `Channel-Identifier`, serialises
//! outbound writes, and takes commands from other threads over a
//! channel bundled into the same loop.
//!
//! Two roles share the machinery:
//!
//! - [`ClientConnectionAgent`] dials out and reuses connections by
//!   remote address when the answer says `Existing`; connections are
//!   reference-counted by the channels sharing them.
//! - [`ServerConnectionAgent`] listens, accepts, and binds channels to
//!   connections when the first message naming them arrives.
//!
//! A send failure anywhere is converted into a locally synthesised
//! `METHOD_FAILED` (401) response delivered through the normal receive
//! path, so applications observe a uniform error surface.

pub mod client;
pub mod command;
pub mod error;
pub mod server;

mod connection;

pub use client::{ClientAgentHandle, ClientConnectionAgent, ControlChannel};
pub use command::{
    AgentCommand, AgentStats, ChannelEvent, ChannelEventSink, ConnectionType, ControlDescriptor,
};
pub use error::{Error, Result};
pub use server::{ServerAgentHandle, ServerConnectionAgent};
