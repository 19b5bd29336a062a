//! Server-side session state machine.
//!
//! The signalling agent delivers an inbound offer; the session
//! allocates the channels it names, asks the connection agent to accept
//! them and the media engine to add the matching terminations, and only
//! when every acknowledgement is in does it emit the composite answer.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use rspeech_infra_common::task::{Task, TaskContext, TaskHandler};
use rspeech_media_core::{
    CommandKind, ContextId, EngineCommand, EngineResponse, EngineStatus, MediaEngineHandle,
    Termination, TerminationId,
};
use rspeech_mrcp_core::{ChannelId, Message, ResourceCatalog};
use rspeech_mrcp_transport::{ChannelEvent, ControlDescriptor, ServerAgentHandle};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::session::{SessionEvent, SessionEventSink, SessionState};
use crate::types::{DescriptorStatus, RtpMediaDescriptor, SessionDescriptor, SessionId};

/// Builds the media endpoint backing one answered stream. The resource
/// engines behind the server supply this.
pub type TerminationFactory =
    Arc<dyn Fn(TerminationId, &RtpMediaDescriptor) -> Option<Termination> + Send + Sync>;

/// Everything the server session task processes.
pub enum ServerSessionMsg {
    /// Inbound offer from the signalling agent
    Offer {
        /// The client's offer
        offer: SessionDescriptor,
        /// Where the composite answer goes
        reply: oneshot::Sender<SessionDescriptor>,
    },
    /// Event from the connection agent
    Channel {
        /// Affected channel
        channel_id: ChannelId,
        /// What happened
        event: ChannelEvent,
    },
    /// Response from the media engine
    Media(EngineResponse),
    /// Send a response or event to the client
    SendMrcp(Box<Message>),
    /// Tear the session down
    Terminate {
        /// Optional completion signal
        reply: Option<oneshot::Sender<bool>>,
    },
}

/// Cloneable handle for the signalling integration and resource engines.
#[derive(Clone)]
pub struct ServerSessionHandle {
    id: SessionId,
    tx: mpsc::Sender<ServerSessionMsg>,
}

impl ServerSessionHandle {
    /// The session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Deliver an inbound offer; resolves with the answer.
    pub async fn process_offer(&self, offer: SessionDescriptor) -> Result<SessionDescriptor> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(ServerSessionMsg::Offer { offer, reply })
            .map_err(|_| Error::SignalFailed(self.id.clone()))?;
        rx.await.map_err(|_| Error::SignalFailed(self.id.clone()))
    }

    /// Send an MRCP response or event to the client.
    pub fn send_message(&self, message: Message) -> Result<()> {
        self.tx
            .try_send(ServerSessionMsg::SendMrcp(Box::new(message)))
            .map_err(|_| Error::SignalFailed(self.id.clone()))
    }

    /// Start teardown; resolves with the composite outcome.
    pub async fn terminate(&self) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .try_send(ServerSessionMsg::Terminate { reply: Some(reply) })
            .map_err(|_| Error::SignalFailed(self.id.clone()))?;
        rx.await.map_err(|_| Error::SignalFailed(self.id.clone()))
    }
}

/// The server session task handler.
pub struct ServerSession {
    id: SessionId,
    state: SessionState,
    channels: Vec<Channel>,

    answer_flags: usize,
    terminate_flags: usize,
    composite_ok: bool,

    pending_answer: Option<SessionDescriptor>,
    answer_reply: Option<oneshot::Sender<SessionDescriptor>>,
    terminate_reply: Option<oneshot::Sender<bool>>,

    context_id: ContextId,
    context_created: bool,
    next_termination_id: TerminationId,

    catalog: Arc<ResourceCatalog>,
    agent: ServerAgentHandle,
    media: MediaEngineHandle,
    terminations: TerminationFactory,
    events: SessionEventSink,
}

impl ServerSession {
    /// Build a session and its handle around the server-side
    /// collaborators.
    pub fn create(
        id: SessionId,
        catalog: Arc<ResourceCatalog>,
        agent: ServerAgentHandle,
        media: MediaEngineHandle,
        terminations: TerminationFactory,
        events: SessionEventSink,
    ) -> (Task<ServerSession>, ServerSessionHandle) {
        let context_id = crate::types::context_id_for(&id);
        let session = Self {
            id: id.clone(),
            state: SessionState::Idle,
            channels: Vec::new(),
            answer_flags: 0,
            terminate_flags: 0,
            composite_ok: true,
            pending_answer: None,
            answer_reply: None,
            terminate_reply: None,
            context_id,
            context_created: false,
            next_termination_id: 1,
            catalog,
            agent,
            media,
            terminations,
            events,
        };
        let task = Task::new(session);
        let handle = ServerSessionHandle {
            id,
            tx: task.sender(),
        };
        (task, handle)
    }

    fn channel_sink(
        &self,
        ctx: &TaskContext<ServerSessionMsg>,
        channel_id: ChannelId,
    ) -> rspeech_mrcp_transport::ChannelEventSink {
        let tx = ctx.sender();
        Arc::new(move |event| {
            let _ = tx.try_send(ServerSessionMsg::Channel {
                channel_id: channel_id.clone(),
                event,
            });
        })
    }

    fn on_offer(
        &mut self,
        offer: SessionDescriptor,
        reply: oneshot::Sender<SessionDescriptor>,
        ctx: &TaskContext<ServerSessionMsg>,
    ) {
        info!(
            "[{}] inbound offer: {} control, {} media",
            self.id,
            offer.control.len(),
            offer.media.len()
        );
        self.state = SessionState::OfferInProgress;
        self.composite_ok = true;
        self.answer_reply = Some(reply);

        let mut answer = SessionDescriptor::new(self.agent.local_addr().ip().to_string());

        for (index, control) in offer.control.iter().enumerate() {
            let Some(resource) = self.catalog.get_by_name(&control.resource_name) else {
                warn!("[{}] unknown resource '{}'", self.id, control.resource_name);
                self.composite_ok = false;
                answer.control.push(control.clone());
                answer.media.push(RtpMediaDescriptor::declined());
                continue;
            };
            let channel_id = ChannelId::new(
                control.session_id.clone(),
                control.resource_name.clone(),
            );
            let mut channel = Channel::new(channel_id.clone(), resource.id);

            // Accept the control leg: the agent answers asynchronously.
            let answered = ControlDescriptor {
                ip: self.agent.local_addr().ip().to_string(),
                port: self.agent.local_addr().port(),
                connection_type: control.connection_type,
                session_id: control.session_id.clone(),
                resource_name: control.resource_name.clone(),
            };
            channel.waiting_for_channel = true;
            self.answer_flags += 1;
            if self
                .agent
                .modify_channel(
                    channel_id.clone(),
                    self.channel_sink(ctx, channel_id.clone()),
                    answered.clone(),
                )
                .is_err()
            {
                channel.waiting_for_channel = false;
                self.answer_flags -= 1;
                self.composite_ok = false;
            }
            answer.control.push(answered);

            // Attach the media leg when the offer carries a live stream.
            let media_entry = offer.media.get(index);
            let answered_media = match media_entry {
                Some(media) if media.port != 0 || !media.codec_list.is_empty() => {
                    let termination_id = self.next_termination_id;
                    self.next_termination_id += 1;
                    match (self.terminations)(termination_id, media) {
                        Some(termination) => {
                            if !self.context_created {
                                self.answer_flags += 1;
                                let _ = self.media.submit(
                                    EngineCommand::AddContext {
                                        context_id: self.context_id,
                                        name: format!("session-{}", self.id),
                                    },
                                    Some(self.media_sink(ctx)),
                                );
                                self.context_created = true;
                            }
                            channel.termination_id = Some(termination_id);
                            channel.waiting_for_termination = true;
                            self.answer_flags += 1;
                            let _ = self.media.submit(
                                EngineCommand::AddTermination {
                                    context_id: self.context_id,
                                    termination,
                                },
                                Some(self.media_sink(ctx)),
                            );
                            media.clone()
                        }
                        None => RtpMediaDescriptor::declined(),
                    }
                }
                _ => RtpMediaDescriptor::declined(),
            };
            answer.media.push(answered_media);
            self.channels.push(channel);
        }

        self.pending_answer = Some(answer);
        if self.answer_flags == 0 {
            self.emit_answer();
        }
    }

    fn media_sink(&self, ctx: &TaskContext<ServerSessionMsg>) -> rspeech_media_core::ResponseSink {
        let tx = ctx.sender();
        Box::new(move |response| {
            let _ = tx.try_send(ServerSessionMsg::Media(response));
        })
    }

    fn emit_answer(&mut self) {
        let Some(mut answer) = self.pending_answer.take() else {
            return;
        };
        answer.status = if self.composite_ok {
            DescriptorStatus::Ok
        } else {
            DescriptorStatus::Failed
        };
        self.state = SessionState::Active;
        debug!("[{}] emitting composite answer", self.id);
        if let Some(reply) = self.answer_reply.take() {
            let _ = reply.send(answer);
        }
    }

    fn on_channel_event(
        &mut self,
        channel_id: ChannelId,
        event: ChannelEvent,
        ctx: &TaskContext<ServerSessionMsg>,
    ) {
        match event {
            ChannelEvent::ModifyCompleted { connected, .. } => {
                if let Some(channel) = self
                    .channels
                    .iter_mut()
                    .find(|c| c.channel_id == channel_id)
                {
                    channel.waiting_for_channel = false;
                }
                if !connected {
                    self.composite_ok = false;
                }
                if self.answer_flags > 0 {
                    self.answer_flags -= 1;
                    if self.answer_flags == 0 {
                        self.emit_answer();
                    }
                }
            }
            ChannelEvent::RemoveCompleted => {
                if let Some(channel) = self
                    .channels
                    .iter_mut()
                    .find(|c| c.channel_id == channel_id)
                {
                    channel.waiting_for_channel = false;
                    channel.control = None;
                }
                if self.terminate_flags > 0 {
                    self.terminate_flags -= 1;
                    if self.terminate_flags == 0 {
                        self.finish_terminate(ctx);
                    }
                }
            }
            ChannelEvent::MessageReceived(message) => {
                // A request whose method the catalogue does not know is
                // answered with a method failure instead of reaching
                // the resource plane.
                if let rspeech_mrcp_core::StartLine::Request(line) = &message.start_line {
                    if line.method_id.is_none() {
                        warn!(
                            "[{}] unknown method '{}' on [{}]",
                            self.id, line.method_name, message.channel_id
                        );
                        let mut response = Message::response_to(&message);
                        if let rspeech_mrcp_core::StartLine::Response(response_line) =
                            &mut response.start_line
                        {
                            response_line.status_code =
                                rspeech_mrcp_core::StatusCode::METHOD_FAILED;
                        }
                        self.send_mrcp(Box::new(response));
                        return;
                    }
                }
                self.emit(SessionEvent::MessageReceived {
                    channel_id: message.channel_id.clone(),
                    message,
                });
            }
            ChannelEvent::Disconnected => {
                self.emit(SessionEvent::ChannelDisconnected { channel_id });
            }
        }
    }

    fn on_media_response(
        &mut self,
        response: EngineResponse,
        ctx: &TaskContext<ServerSessionMsg>,
    ) {
        if response.status == EngineStatus::Failure {
            self.composite_ok = false;
        }
        if let Some(termination_id) = response.termination_id {
            if let Some(channel) = self
                .channels
                .iter_mut()
                .find(|c| c.termination_id == Some(termination_id))
            {
                channel.waiting_for_termination = false;
            }
        }
        match response.kind {
            CommandKind::AddContext | CommandKind::AddTermination => {
                if self.answer_flags > 0 {
                    self.answer_flags -= 1;
                    if self.answer_flags == 0 {
                        self.emit_answer();
                    }
                }
            }
            CommandKind::SubtractTermination => {
                if self.terminate_flags > 0 {
                    self.terminate_flags -= 1;
                    if self.terminate_flags == 0 {
                        self.finish_terminate(ctx);
                    }
                }
            }
            _ => {}
        }
    }

    fn send_mrcp(&mut self, message: Box<Message>) {
        let channel_id = message.channel_id.clone();
        if self
            .channels
            .iter()
            .all(|c| c.channel_id != channel_id)
        {
            warn!("[{}] no channel for outbound message [{}]", self.id, channel_id);
            return;
        }
        if let Err(e) = self.agent.send_message(channel_id, *message) {
            warn!("[{}] failed to queue outbound message: {}", self.id, e);
        }
    }

    fn start_terminate(
        &mut self,
        reply: Option<oneshot::Sender<bool>>,
        ctx: &TaskContext<ServerSessionMsg>,
    ) {
        if self.state == SessionState::Terminating || self.state == SessionState::Closed {
            if let Some(reply) = reply {
                let _ = reply.send(false);
            }
            return;
        }
        info!("[{}] terminating", self.id);
        self.state = SessionState::Terminating;
        self.composite_ok = true;
        self.terminate_reply = reply;

        for channel in &mut self.channels {
            channel.waiting_for_channel = true;
            self.terminate_flags += 1;
            if self.agent.remove_channel(channel.channel_id.clone()).is_err() {
                channel.waiting_for_channel = false;
                self.terminate_flags -= 1;
                self.composite_ok = false;
            }
            if let Some(termination_id) = channel.termination_id {
                channel.waiting_for_termination = true;
                self.terminate_flags += 1;
                let tx = ctx.sender();
                let sink: rspeech_media_core::ResponseSink = Box::new(move |response| {
                    let _ = tx.try_send(ServerSessionMsg::Media(response));
                });
                if self
                    .media
                    .submit(
                        EngineCommand::SubtractTermination {
                            context_id: self.context_id,
                            termination_id,
                        },
                        Some(sink),
                    )
                    .is_err()
                {
                    channel.waiting_for_termination = false;
                    self.terminate_flags -= 1;
                    self.composite_ok = false;
                }
            }
        }

        if self.terminate_flags == 0 {
            self.finish_terminate(ctx);
        }
    }

    fn finish_terminate(&mut self, ctx: &TaskContext<ServerSessionMsg>) {
        debug_assert!(self.channels.iter().all(|c| c.is_settled()));
        if self.context_created {
            let _ = self.media.submit(
                EngineCommand::SubtractContext {
                    context_id: self.context_id,
                },
                None,
            );
            self.context_created = false;
        }
        self.state = SessionState::Closed;
        self.channels.clear();
        info!("[{}] closed", self.id);
        self.emit(SessionEvent::TerminateCompleted {
            success: self.composite_ok,
        });
        if let Some(reply) = self.terminate_reply.take() {
            let _ = reply.send(self.composite_ok);
        }
        ctx.request_termination();
    }

    fn emit(&self, event: SessionEvent) {
        (self.events)(event);
    }
}

#[async_trait]
impl TaskHandler for ServerSession {
    type Msg = ServerSessionMsg;

    fn name(&self) -> &str {
        "mrcp-server-session"
    }

    async fn process(&mut self, msg: ServerSessionMsg, ctx: &TaskContext<ServerSessionMsg>) {
        match msg {
            ServerSessionMsg::Offer { offer, reply } => self.on_offer(offer, reply, ctx),
            ServerSessionMsg::Channel { channel_id, event } => {
                self.on_channel_event(channel_id, event, ctx)
            }
            ServerSessionMsg::Media(response) => self.on_media_response(response, ctx),
            ServerSessionMsg::SendMrcp(message) => self.send_mrcp(message),
            ServerSessionMsg::Terminate { reply } => self.start_terminate(reply, ctx),
        }
    }
}
