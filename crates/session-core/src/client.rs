//! Client-side session state machine.
//!
//! One task per session. An application offer is partitioned into the
//! collaborator calls it needs (media engine, signalling agent,
//! connection agent); each outstanding acknowledgement raises the
//! phase's barrier counter and the state advances only when the counter
//! reaches zero. A failed acknowledgement never abandons the ones still
//! in flight: the session waits for all of them, then reports the
//! composite outcome.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rspeech_infra_common::task::{Task, TaskContext, TaskHandler};
use rspeech_media_core::{
    CommandKind, ContextId, EngineCommand, EngineResponse, EngineStatus, MediaEngineHandle,
    Termination, TerminationId, TimerManager,
};
use rspeech_mrcp_core::{
    ChannelId, Message, RequestId, RequestState, ResourceCatalog, StartLine, StatusCode,
};
use rspeech_mrcp_transport::{
    ChannelEvent, ClientAgentHandle, ConnectionType, ControlDescriptor,
};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::session::{SessionEvent, SessionEventSink, SessionState};
use crate::signaling::SignalingAgent;
use crate::types::{RtpMediaDescriptor, SessionDescriptor, SessionId};

/// Client session settings.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientSessionConfig {
    /// Local address placed in offers
    pub local_ip: String,
    /// How long to wait for a response before synthesising a failure
    pub request_timeout_ms: u64,
    /// Whether answers should reuse existing connections
    pub reuse_connections: bool,
}

impl Default for ClientSessionConfig {
    fn default() -> Self {
        Self {
            local_ip: "127.0.0.1".to_string(),
            request_timeout_ms: 5000,
            reuse_connections: true,
        }
    }
}

/// Requests the application can submit. One request is active at a
/// time; the rest wait in FIFO order.
pub enum AppRequest {
    /// Add a channel (and optionally a media termination), triggering
    /// an offer/answer cycle
    AddChannel {
        /// Resource to bind, e.g. `speechsynth`
        resource_name: String,
        /// Media endpoint to add alongside the channel
        termination: Option<Termination>,
        /// Media stream entry for the offer
        media: Option<RtpMediaDescriptor>,
    },
    /// Send one MRCP request on the channel named by the message
    SendMessage {
        /// The request; its channel identifier picks the channel
        message: Box<Message>,
    },
    /// Tear the session down
    Terminate,
}

/// Everything the session task processes.
pub enum ClientSessionMsg {
    /// Application request
    App(AppRequest),
    /// Event from the connection agent for one of our channels
    Channel {
        /// Affected channel
        channel_id: ChannelId,
        /// What happened
        event: ChannelEvent,
    },
    /// Response from the media engine
    Media(EngineResponse),
    /// Answer (or failure) from the signalling agent
    Answer(std::result::Result<SessionDescriptor, String>),
    /// The signalling leg finished terminating
    SignalingTerminated(bool),
    /// A response timer fired
    RequestTimeout {
        /// Request the timer guarded
        request_id: RequestId,
    },
}

/// Cloneable handle applications use to drive a session.
#[derive(Clone)]
pub struct ClientSessionHandle {
    id: SessionId,
    tx: mpsc::Sender<ClientSessionMsg>,
}

impl ClientSessionHandle {
    /// The session identifier.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Submit an application request.
    pub fn submit(&self, request: AppRequest) -> Result<()> {
        self.tx
            .try_send(ClientSessionMsg::App(request))
            .map_err(|_| Error::SignalFailed(self.id.clone()))
    }
}

/// The client session task handler.
pub struct ClientSession {
    id: SessionId,
    config: ClientSessionConfig,
    state: SessionState,
    channels: Vec<Channel>,

    offer: Option<SessionDescriptor>,
    answer: Option<SessionDescriptor>,

    active_request: Option<AppRequest>,
    request_queue: VecDeque<AppRequest>,
    /// Request awaiting its MRCP response, for timeout synthesis.
    pending_mrcp: Option<Box<Message>>,

    offer_flags: usize,
    answer_flags: usize,
    terminate_flags: usize,
    composite_ok: bool,

    context_id: ContextId,
    context_created: bool,
    next_termination_id: TerminationId,

    catalog: Arc<ResourceCatalog>,
    signaling: Arc<dyn SignalingAgent>,
    connection: ClientAgentHandle,
    media: MediaEngineHandle,
    timers: Arc<TimerManager>,
    events: SessionEventSink,
    timer_sender: Option<mpsc::Sender<ClientSessionMsg>>,
}

impl ClientSession {
    /// Build a session and its handle. The session participates once
    /// the returned task is started.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: SessionId,
        config: ClientSessionConfig,
        catalog: Arc<ResourceCatalog>,
        signaling: Arc<dyn SignalingAgent>,
        connection: ClientAgentHandle,
        media: MediaEngineHandle,
        timers: Arc<TimerManager>,
        events: SessionEventSink,
    ) -> (Task<ClientSession>, ClientSessionHandle) {
        // Contexts are keyed per session; derive a stable id.
        let context_id = crate::types::context_id_for(&id);
        let session = Self {
            id: id.clone(),
            config,
            state: SessionState::Idle,
            channels: Vec::new(),
            offer: None,
            answer: None,
            active_request: None,
            request_queue: VecDeque::new(),
            pending_mrcp: None,
            offer_flags: 0,
            answer_flags: 0,
            terminate_flags: 0,
            composite_ok: true,
            context_id,
            context_created: false,
            next_termination_id: 1,
            catalog,
            signaling,
            connection,
            media,
            timers,
            events,
            timer_sender: None,
        };
        let task = Task::new(session);
        let handle = ClientSessionHandle {
            id,
            tx: task.sender(),
        };
        (task, handle)
    }

    fn emit(&self, event: SessionEvent) {
        (self.events)(event);
    }

    fn media_sink(&self, ctx: &TaskContext<ClientSessionMsg>) -> rspeech_media_core::ResponseSink {
        let tx = ctx.sender();
        Box::new(move |response| {
            let _ = tx.try_send(ClientSessionMsg::Media(response));
        })
    }

    fn channel_sink(
        &self,
        ctx: &TaskContext<ClientSessionMsg>,
        channel_id: ChannelId,
    ) -> rspeech_mrcp_transport::ChannelEventSink {
        let tx = ctx.sender();
        Arc::new(move |event| {
            let _ = tx.try_send(ClientSessionMsg::Channel {
                channel_id: channel_id.clone(),
                event,
            });
        })
    }

    /// Take the next queued request when nothing is active.
    fn schedule_next(&mut self, ctx: &TaskContext<ClientSessionMsg>) {
        if self.active_request.is_none() {
            if let Some(request) = self.request_queue.pop_front() {
                let tx = ctx.sender();
                let _ = tx.try_send(ClientSessionMsg::App(request));
            }
        }
    }

    async fn on_app_request(&mut self, request: AppRequest, ctx: &TaskContext<ClientSessionMsg>) {
        if self.active_request.is_some() {
            self.request_queue.push_back(request);
            return;
        }
        match request {
            AppRequest::AddChannel {
                resource_name,
                termination,
                media,
            } => self.start_offer(resource_name, termination, media, ctx),
            AppRequest::SendMessage { message } => self.send_mrcp_message(message),
            AppRequest::Terminate => self.start_terminate(ctx),
        }
    }

    fn start_offer(
        &mut self,
        resource_name: String,
        termination: Option<Termination>,
        media: Option<RtpMediaDescriptor>,
        ctx: &TaskContext<ClientSessionMsg>,
    ) {
        if !matches!(self.state, SessionState::Idle | SessionState::Active) {
            warn!("[{}] offer rejected in state {:?}", self.id, self.state);
            self.emit(SessionEvent::OfferCompleted { success: false });
            return;
        }
        let Some(resource) = self.catalog.get_by_name(&resource_name) else {
            warn!("[{}] unknown resource '{}'", self.id, resource_name);
            self.emit(SessionEvent::OfferCompleted { success: false });
            return;
        };

        info!("[{}] offering channel for {}", self.id, resource_name);
        self.active_request = Some(AppRequest::AddChannel {
            resource_name: resource_name.clone(),
            termination: None,
            media: None,
        });
        self.state = SessionState::OfferInProgress;
        self.composite_ok = true;

        let channel_id = ChannelId::new(self.id.clone(), resource_name.clone());
        let mut channel = Channel::new(channel_id.clone(), resource.id);
        channel.control = Some(
            self.connection
                .create_channel(channel_id.clone(), self.channel_sink(ctx, channel_id)),
        );

        // Partition the offer: media-engine calls raise the barrier,
        // signalling follows once they acknowledge.
        if !self.context_created {
            self.offer_flags += 1;
            let _ = self.media.submit(
                EngineCommand::AddContext {
                    context_id: self.context_id,
                    name: format!("session-{}", self.id),
                },
                Some(self.media_sink(ctx)),
            );
            self.context_created = true;
        }
        if let Some(mut termination) = termination {
            termination.id = self.next_termination_id;
            self.next_termination_id += 1;
            channel.termination_id = Some(termination.id);
            channel.waiting_for_termination = true;
            self.offer_flags += 1;
            let _ = self.media.submit(
                EngineCommand::AddTermination {
                    context_id: self.context_id,
                    termination,
                },
                Some(self.media_sink(ctx)),
            );
        }

        let mut offer = self
            .offer
            .take()
            .unwrap_or_else(|| SessionDescriptor::new(self.config.local_ip.clone()));
        offer.control.push(ControlDescriptor {
            ip: self.config.local_ip.clone(),
            port: 0,
            connection_type: if self.config.reuse_connections {
                ConnectionType::Existing
            } else {
                ConnectionType::New
            },
            session_id: self.id.clone(),
            resource_name,
        });
        offer
            .media
            .push(media.unwrap_or_else(RtpMediaDescriptor::declined));
        self.offer = Some(offer);
        self.channels.push(channel);

        if self.offer_flags == 0 {
            self.send_offer(ctx);
        }
    }

    fn send_offer(&mut self, ctx: &TaskContext<ClientSessionMsg>) {
        let Some(offer) = self.offer.clone() else {
            return;
        };
        debug!("[{}] dispatching offer to signalling agent", self.id);
        let signaling = self.signaling.clone();
        let session_id = self.id.clone();
        let tx = ctx.sender();
        tokio::spawn(async move {
            let result = signaling
                .offer(&session_id, &offer)
                .await
                .map_err(|e| e.to_string());
            let _ = tx.send(ClientSessionMsg::Answer(result)).await;
        });
    }

    fn on_answer(
        &mut self,
        answer: std::result::Result<SessionDescriptor, String>,
        ctx: &TaskContext<ClientSessionMsg>,
    ) {
        let answer = match answer {
            Ok(answer) => answer,
            Err(e) => {
                warn!("[{}] offer failed: {}", self.id, e);
                self.composite_ok = false;
                self.finish_offer(ctx);
                return;
            }
        };

        // Apply the answer: every control entry asks the connection
        // agent, every live media entry asks the engine.
        for descriptor in &answer.control {
            let Some(channel) = self
                .channels
                .iter_mut()
                .find(|c| c.channel_id.resource_name == descriptor.resource_name)
            else {
                continue;
            };
            if let Some(control) = &channel.control {
                channel.waiting_for_channel = true;
                self.answer_flags += 1;
                if control.modify(descriptor.clone()).is_err() {
                    channel.waiting_for_channel = false;
                    self.answer_flags -= 1;
                    self.composite_ok = false;
                }
            }
        }
        for channel in &mut self.channels {
            if let Some(termination_id) = channel.termination_id {
                channel.waiting_for_termination = true;
                self.answer_flags += 1;
                let tx = ctx.sender();
                let sink: rspeech_media_core::ResponseSink = Box::new(move |response| {
                    let _ = tx.try_send(ClientSessionMsg::Media(response));
                });
                if self
                    .media
                    .submit(
                        EngineCommand::ModifyTermination {
                            context_id: self.context_id,
                            termination_id,
                        },
                        Some(sink),
                    )
                    .is_err()
                {
                    channel.waiting_for_termination = false;
                    self.answer_flags -= 1;
                    self.composite_ok = false;
                }
            }
        }
        self.answer = Some(answer);

        if self.answer_flags == 0 {
            self.finish_offer(ctx);
        }
    }

    fn finish_offer(&mut self, ctx: &TaskContext<ClientSessionMsg>) {
        let success = self.composite_ok;
        self.state = if success {
            SessionState::Active
        } else if self.answer.is_none() {
            SessionState::Idle
        } else {
            SessionState::Active
        };
        info!("[{}] offer finished, success={}", self.id, success);
        self.active_request = None;
        self.emit(SessionEvent::OfferCompleted { success });
        self.schedule_next(ctx);
    }

    fn send_mrcp_message(&mut self, message: Box<Message>) {
        if self.state != SessionState::Active {
            warn!("[{}] message rejected in state {:?}", self.id, self.state);
            self.synthesize_failure(&message);
            return;
        }
        let key = &message.channel_id.resource_name;
        let Some(channel) = self
            .channels
            .iter()
            .find(|c| &c.channel_id.resource_name == key)
        else {
            warn!("[{}] no channel for resource '{}'", self.id, key);
            self.synthesize_failure(&message);
            return;
        };
        let Some(control) = &channel.control else {
            self.synthesize_failure(&message);
            return;
        };

        self.active_request = Some(AppRequest::SendMessage {
            message: Box::new((*message).clone()),
        });
        self.pending_mrcp = Some(message.clone());
        let request_id = message.start_line.request_id();
        if let Err(e) = control.send_message(*message) {
            warn!("[{}] send failed: {}", self.id, e);
        }
        // The timer posts back; expiry on a still-pending id becomes a
        // synthesised failure.
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let sender = self.timer_sender.clone();
        self.timers.schedule(timeout, move || {
            if let Some(sender) = &sender {
                let _ = sender.try_send(ClientSessionMsg::RequestTimeout { request_id });
            }
        });
    }

    fn synthesize_failure(&self, request: &Message) {
        let mut response = Box::new(Message::response_to(request));
        if let StartLine::Response(line) = &mut response.start_line {
            line.status_code = StatusCode::METHOD_FAILED;
            line.request_state = RequestState::Complete;
        }
        self.emit(SessionEvent::MessageReceived {
            channel_id: request.channel_id.clone(),
            message: response,
        });
    }

    fn on_channel_event(
        &mut self,
        channel_id: ChannelId,
        event: ChannelEvent,
        ctx: &TaskContext<ClientSessionMsg>,
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
                        self.finish_offer(ctx);
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
            ChannelEvent::MessageReceived(message) => self.on_mrcp_message(message, ctx),
            ChannelEvent::Disconnected => {
                self.emit(SessionEvent::ChannelDisconnected { channel_id });
            }
        }
    }

    fn on_mrcp_message(&mut self, message: Box<Message>, ctx: &TaskContext<ClientSessionMsg>) {
        let is_final_response = matches!(&message.start_line, StartLine::Response(_));
        if is_final_response {
            let answered = self
                .pending_mrcp
                .as_ref()
                .map(|m| m.start_line.request_id() == message.start_line.request_id())
                .unwrap_or(false);
            if answered {
                self.pending_mrcp = None;
                self.active_request = None;
            }
        }
        self.emit(SessionEvent::MessageReceived {
            channel_id: message.channel_id.clone(),
            message,
        });
        self.schedule_next(ctx);
    }

    fn on_request_timeout(&mut self, request_id: RequestId, ctx: &TaskContext<ClientSessionMsg>) {
        let timed_out = self
            .pending_mrcp
            .as_ref()
            .map(|m| m.start_line.request_id() == request_id)
            .unwrap_or(false);
        if !timed_out {
            return;
        }
        warn!("[{}] request {} timed out", self.id, request_id);
        let request = self.pending_mrcp.take().expect("pending request");
        self.active_request = None;
        self.synthesize_failure(&request);
        self.schedule_next(ctx);
    }

    fn start_terminate(&mut self, ctx: &TaskContext<ClientSessionMsg>) {
        if self.state == SessionState::Terminating || self.state == SessionState::Closed {
            return;
        }
        info!("[{}] terminating", self.id);
        self.state = SessionState::Terminating;
        self.composite_ok = true;
        self.active_request = Some(AppRequest::Terminate);

        for channel in &mut self.channels {
            if let Some(control) = &channel.control {
                channel.waiting_for_channel = true;
                self.terminate_flags += 1;
                if control.remove().is_err() {
                    channel.waiting_for_channel = false;
                    self.terminate_flags -= 1;
                    self.composite_ok = false;
                }
            }
            if let Some(termination_id) = channel.termination_id {
                channel.waiting_for_termination = true;
                self.terminate_flags += 1;
                let tx = ctx.sender();
                let sink: rspeech_media_core::ResponseSink = Box::new(move |response| {
                    let _ = tx.try_send(ClientSessionMsg::Media(response));
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

        // The signalling leg counts as one more acknowledgement.
        self.terminate_flags += 1;
        let signaling = self.signaling.clone();
        let session_id = self.id.clone();
        let tx = ctx.sender();
        tokio::spawn(async move {
            let ok = signaling.terminate(&session_id).await.is_ok();
            let _ = tx.send(ClientSessionMsg::SignalingTerminated(ok)).await;
        });

        if self.terminate_flags == 0 {
            self.finish_terminate(ctx);
        }
    }

    fn finish_terminate(&mut self, ctx: &TaskContext<ClientSessionMsg>) {
        debug_assert!(self.channels.iter().all(|c| c.is_settled()));
        if self.context_created {
            let _ = self
                .media
                .submit(
                    EngineCommand::SubtractContext {
                        context_id: self.context_id,
                    },
                    None,
                )
                .ok();
            self.context_created = false;
        }
        self.state = SessionState::Closed;
        self.active_request = None;
        self.channels.clear();
        info!("[{}] closed", self.id);
        self.emit(SessionEvent::TerminateCompleted {
            success: self.composite_ok,
        });
        ctx.request_termination();
    }

    fn on_media_response(&mut self, response: EngineResponse, ctx: &TaskContext<ClientSessionMsg>) {
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
                if self.offer_flags > 0 {
                    self.offer_flags -= 1;
                    if self.offer_flags == 0 {
                        self.send_offer(ctx);
                    }
                }
            }
            CommandKind::ModifyTermination => {
                if self.answer_flags > 0 {
                    self.answer_flags -= 1;
                    if self.answer_flags == 0 {
                        self.finish_offer(ctx);
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
            CommandKind::SubtractContext | CommandKind::MoveTermination => {}
        }
    }
}

#[async_trait]
impl TaskHandler for ClientSession {
    type Msg = ClientSessionMsg;

    fn name(&self) -> &str {
        "mrcp-client-session"
    }

    async fn pre_run(&mut self, ctx: &TaskContext<ClientSessionMsg>) {
        self.timer_sender = Some(ctx.sender());
    }

    async fn process(&mut self, msg: ClientSessionMsg, ctx: &TaskContext<ClientSessionMsg>) {
        match msg {
            ClientSessionMsg::App(request) => self.on_app_request(request, ctx).await,
            ClientSessionMsg::Channel { channel_id, event } => {
                self.on_channel_event(channel_id, event, ctx)
            }
            ClientSessionMsg::Media(response) => self.on_media_response(response, ctx),
            ClientSessionMsg::Answer(answer) => self.on_answer(answer, ctx),
            ClientSessionMsg::SignalingTerminated(ok) => {
                if !ok {
                    self.composite_ok = false;
                }
                if self.terminate_flags > 0 {
                    self.terminate_flags -= 1;
                    if self.terminate_flags == 0 {
                        self.finish_terminate(ctx);
                    }
                }
            }
            ClientSessionMsg::RequestTimeout { request_id } => {
                self.on_request_timeout(request_id, ctx)
            }
        }
    }
}
