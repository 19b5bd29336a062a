//! # rspeech
//!
//! Umbrella crate for the rspeech MRCPv2 stack. Re-exports the member
//! crates under one roof:
//!
//! - [`mrcp`]: message model, resource catalogue, streaming codec
//! - [`transport`]: the MRCPv2 connection agents (client and server)
//! - [`media`]: codecs, streams, bridges, contexts and the media engine
//! - [`session`]: the client and server session state machines
//! - [`infra`]: task framework, cyclic queue and logging setup
//!
//! ## A minimal client
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rspeech::prelude::*;
//!
//! # async fn run(signaling: Arc<dyn SignalingAgent>) -> anyhow::Result<()> {
//! let catalog = Arc::new(ResourceCatalog::default_catalog());
//!
//! let engine = MediaEngine::new();
//! let timers = engine.timer_manager();
//! let mut engine_task = rspeech::infra::Task::new(engine);
//! let media = MediaEngineHandle::new(engine_task.sender());
//! engine_task.start()?;
//!
//! let (mut agent_task, agent) = ClientConnectionAgent::start(catalog.clone());
//! agent_task.start()?;
//!
//! let events: SessionEventSink = Arc::new(|event| println!("{event:?}"));
//! let (mut session_task, session) = ClientSession::create(
//!     generate_session_id(),
//!     ClientSessionConfig::default(),
//!     catalog,
//!     signaling,
//!     agent,
//!     media,
//!     timers,
//!     events,
//! );
//! session_task.start()?;
//!
//! session.submit(AppRequest::AddChannel {
//!     resource_name: "speechsynth".into(),
//!     termination: None,
//!     media: None,
//! })?;
//! # Ok(())
//! # }
//! ```

/// Shared infrastructure: tasks, queue, logging.
pub mod infra {
    pub use rspeech_infra_common::*;
}

/// MRCP message model and codec.
pub mod mrcp {
    pub use rspeech_mrcp_core::*;
}

/// MRCPv2 connection agents.
pub mod transport {
    pub use rspeech_mrcp_transport::*;
}

/// Media plane: codecs, streams, bridges, engine.
pub mod media {
    pub use rspeech_media_core::*;
}

/// Session state machines.
pub mod session {
    pub use rspeech_session_core::*;
}

/// Commonly used types across the stack.
pub mod prelude {
    pub use rspeech_infra_common::{CyclicQueue, Task, TaskHandler};
    pub use rspeech_media_core::{
        AudioBuffer, AudioStream, CodecDescriptor, CodecManager, MediaEngine, MediaEngineHandle,
        MediaFrame, Termination,
    };
    pub use rspeech_mrcp_core::prelude::*;
    pub use rspeech_mrcp_transport::{
        ClientConnectionAgent, ControlDescriptor, ServerConnectionAgent,
    };
    pub use rspeech_session_core::{
        generate_session_id, AppRequest, ClientSession, ClientSessionConfig, ServerSession,
        SessionDescriptor, SessionEvent, SessionEventSink, SignalingAgent,
    };
}
