//! Media engine: the frame-cadenced worker that owns every context.
//!
//! The engine runs as a task ticking every [`FRAME_TIME_BASE_MS`]
//! milliseconds. Requests from sessions queue up between ticks and are
//! drained at the start of each tick, applied synchronously, and
//! answered through the originator's response sink. After the drain,
//! every context processes its objects in slot order.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rspeech_infra_common::task::{TaskContext, TaskHandler};

use crate::codec::{CodecManager, FRAME_TIME_BASE_MS};
use crate::context::{ContextId, MediaContext};
use crate::error::{Error, Result};
use crate::termination::{Termination, TerminationId};
use crate::timer::TimerManager;

/// Operations a session can ask of the engine.
pub enum EngineCommand {
    /// Create an empty context
    AddContext {
        /// Identifier chosen by the caller
        context_id: ContextId,
        /// Name for diagnostics
        name: String,
    },
    /// Destroy a context with everything attached
    SubtractContext {
        /// Context to destroy
        context_id: ContextId,
    },
    /// Attach a termination to a context
    AddTermination {
        /// Target context
        context_id: ContextId,
        /// Endpoint to attach
        termination: Termination,
    },
    /// Rebuild the topology after a termination changed
    ModifyTermination {
        /// Owning context
        context_id: ContextId,
        /// Changed termination
        termination_id: TerminationId,
    },
    /// Detach a termination
    SubtractTermination {
        /// Owning context
        context_id: ContextId,
        /// Endpoint to detach
        termination_id: TerminationId,
    },
    /// Detach from one context and attach to another
    MoveTermination {
        /// Termination to move
        termination_id: TerminationId,
        /// Current context
        from_context: ContextId,
        /// Destination context
        to_context: ContextId,
    },
}

impl EngineCommand {
    fn kind(&self) -> CommandKind {
        match self {
            EngineCommand::AddContext { .. } => CommandKind::AddContext,
            EngineCommand::SubtractContext { .. } => CommandKind::SubtractContext,
            EngineCommand::AddTermination { .. } => CommandKind::AddTermination,
            EngineCommand::ModifyTermination { .. } => CommandKind::ModifyTermination,
            EngineCommand::SubtractTermination { .. } => CommandKind::SubtractTermination,
            EngineCommand::MoveTermination { .. } => CommandKind::MoveTermination,
        }
    }
}

/// Discriminant of an [`EngineCommand`], echoed on responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Context creation
    AddContext,
    /// Context destruction
    SubtractContext,
    /// Termination attach
    AddTermination,
    /// Topology rebuild
    ModifyTermination,
    /// Termination detach
    SubtractTermination,
    /// Termination move
    MoveTermination,
}

/// Outcome of one engine command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// The command was applied
    Success,
    /// The command was rejected
    Failure,
}

/// Response posted back to the originating session.
#[derive(Debug, Clone)]
pub struct EngineResponse {
    /// Which command this answers
    pub kind: CommandKind,
    /// Outcome
    pub status: EngineStatus,
    /// Context the command addressed
    pub context_id: ContextId,
    /// Termination the command addressed, when any
    pub termination_id: Option<TerminationId>,
}

/// Where a request's response goes; sessions wrap their own inbox
/// sender here.
pub type ResponseSink = Box<dyn Fn(EngineResponse) + Send>;

/// One queued engine request.
pub struct EngineRequest {
    /// Operation to apply at the next tick
    pub command: EngineCommand,
    /// Response sink, `None` for fire-and-forget
    pub reply: Option<ResponseSink>,
}

/// Cloneable submission handle to a running engine.
#[derive(Clone)]
pub struct MediaEngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl MediaEngineHandle {
    /// Handle over the engine task's inbox sender.
    pub fn new(tx: mpsc::Sender<EngineRequest>) -> Self {
        Self { tx }
    }

    /// Queue a request for the next tick.
    pub fn submit(&self, command: EngineCommand, reply: Option<ResponseSink>) -> Result<()> {
        self.tx
            .try_send(EngineRequest { command, reply })
            .map_err(|_| Error::Engine("engine request queue full or closed".into()))
    }
}

/// The engine task handler.
pub struct MediaEngine {
    codec_manager: Arc<CodecManager>,
    timers: Arc<TimerManager>,
    contexts: HashMap<ContextId, MediaContext>,
    pending: VecDeque<EngineRequest>,
}

impl MediaEngine {
    /// Engine with the default codec set.
    pub fn new() -> Self {
        Self {
            codec_manager: Arc::new(CodecManager::new()),
            timers: Arc::new(TimerManager::new()),
            contexts: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    /// The engine's codec manager.
    pub fn codec_manager(&self) -> Arc<CodecManager> {
        self.codec_manager.clone()
    }

    /// The engine's timer manager.
    pub fn timer_manager(&self) -> Arc<TimerManager> {
        self.timers.clone()
    }

    fn apply(&mut self, command: EngineCommand) -> EngineResponse {
        let kind = command.kind();
        let (status, context_id, termination_id) = match command {
            EngineCommand::AddContext { context_id, name } => {
                let status = if self.contexts.contains_key(&context_id) {
                    EngineStatus::Failure
                } else {
                    info!("Add media context [{}]", name);
                    self.contexts.insert(
                        context_id,
                        MediaContext::new(context_id, name, self.codec_manager.clone()),
                    );
                    EngineStatus::Success
                };
                (status, context_id, None)
            }
            EngineCommand::SubtractContext { context_id } => {
                let status = match self.contexts.remove(&context_id) {
                    Some(mut context) => {
                        info!("Subtract media context [{}]", context.name);
                        context.destroy();
                        EngineStatus::Success
                    }
                    None => EngineStatus::Failure,
                };
                (status, context_id, None)
            }
            EngineCommand::AddTermination {
                context_id,
                termination,
            } => {
                let termination_id = termination.id;
                let status = match self.contexts.get_mut(&context_id) {
                    Some(context) => match context.add_termination(termination) {
                        Ok(_) => EngineStatus::Success,
                        Err(e) => {
                            warn!("Failed to add termination: {}", e);
                            EngineStatus::Failure
                        }
                    },
                    None => EngineStatus::Failure,
                };
                (status, context_id, Some(termination_id))
            }
            EngineCommand::ModifyTermination {
                context_id,
                termination_id,
            } => {
                let status = match self.contexts.get_mut(&context_id) {
                    Some(context) => match context.modify_termination(termination_id) {
                        Ok(()) => EngineStatus::Success,
                        Err(_) => EngineStatus::Failure,
                    },
                    None => EngineStatus::Failure,
                };
                (status, context_id, Some(termination_id))
            }
            EngineCommand::SubtractTermination {
                context_id,
                termination_id,
            } => {
                let status = match self.contexts.get_mut(&context_id) {
                    Some(context) => match context.subtract_termination(termination_id) {
                        Ok(_) => EngineStatus::Success,
                        Err(_) => EngineStatus::Failure,
                    },
                    None => EngineStatus::Failure,
                };
                (status, context_id, Some(termination_id))
            }
            EngineCommand::MoveTermination {
                termination_id,
                from_context,
                to_context,
            } => {
                let moved = self
                    .contexts
                    .get_mut(&from_context)
                    .and_then(|ctx| ctx.subtract_termination(termination_id).ok());
                let status = match moved {
                    Some(termination) => match self.contexts.get_mut(&to_context) {
                        Some(context) => match context.add_termination(termination) {
                            Ok(_) => EngineStatus::Success,
                            Err(_) => EngineStatus::Failure,
                        },
                        None => EngineStatus::Failure,
                    },
                    None => EngineStatus::Failure,
                };
                (status, to_context, Some(termination_id))
            }
        };
        EngineResponse {
            kind,
            status,
            context_id,
            termination_id,
        }
    }

    fn drain_requests(&mut self) {
        while let Some(request) = self.pending.pop_front() {
            let response = self.apply(request.command);
            if let Some(reply) = request.reply {
                reply(response);
            }
        }
    }
}

impl Default for MediaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for MediaEngine {
    type Msg = EngineRequest;

    fn name(&self) -> &str {
        "media-engine"
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(Duration::from_millis(FRAME_TIME_BASE_MS as u64))
    }

    async fn process(&mut self, msg: EngineRequest, _ctx: &TaskContext<EngineRequest>) {
        self.pending.push_back(msg);
    }

    async fn on_tick(&mut self, _ctx: &TaskContext<EngineRequest>) {
        self.drain_requests();
        for context in self.contexts.values_mut() {
            context.process();
        }
    }

    async fn post_run(&mut self, _ctx: &TaskContext<EngineRequest>) {
        debug!("Media engine shutting down");
        self.drain_requests();
        self.timers.shutdown();
        for (_, mut context) in self.contexts.drain() {
            context.destroy();
        }
    }
}
