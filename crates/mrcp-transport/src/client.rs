//! Client-side MRCPv2 connection agent.
//!
//! One event loop multiplexes the command channel and every reader's
//! events. Channels bind to outbound TCP connections; an answer with
//! `connection_type = Existing` reuses a connection to the same remote
//! address and bumps its reference count, and removing the last channel
//! closes the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rspeech_infra_common::task::{Task, TaskContext, TaskHandler};
use rspeech_mrcp_core::{ChannelId, Message, ResourceCatalog};

use crate::command::{
    AgentCommand, ChannelEvent, ChannelEventSink, ConnectionType, ControlDescriptor,
};
use crate::connection::{AgentCore, AgentMsg, ChannelState, InboundEvent};
use crate::error::{Error, Result};

/// Handle to a channel registered with a client agent.
///
/// Mirrors the channel lifecycle: `modify` with an answer descriptor,
/// `send_message` while active, `remove` on teardown.
pub struct ControlChannel {
    channel_id: ChannelId,
    sink: ChannelEventSink,
    agent: mpsc::Sender<AgentMsg>,
}

impl ControlChannel {
    /// The channel identifier.
    pub fn channel_id(&self) -> &ChannelId {
        &self.channel_id
    }

    /// Attach or re-negotiate the channel per the answer descriptor.
    pub fn modify(&self, descriptor: ControlDescriptor) -> Result<()> {
        self.signal(AgentCommand::ModifyChannel {
            channel_id: self.channel_id.clone(),
            sink: self.sink.clone(),
            descriptor,
        })
    }

    /// Detach the channel; the agent answers with `RemoveCompleted`.
    pub fn remove(&self) -> Result<()> {
        self.signal(AgentCommand::RemoveChannel {
            channel_id: self.channel_id.clone(),
        })
    }

    /// Queue a message for the agent loop to serialise and send.
    pub fn send_message(&self, message: Message) -> Result<()> {
        self.signal(AgentCommand::SendMessage {
            channel_id: self.channel_id.clone(),
            message: Box::new(message),
        })
    }

    fn signal(&self, command: AgentCommand) -> Result<()> {
        self.agent
            .try_send(AgentMsg::Command(command))
            .map_err(|_| Error::SignalFailed(self.channel_id.to_string()))
    }
}

/// Public handle to a running client agent.
#[derive(Clone)]
pub struct ClientAgentHandle {
    tx: mpsc::Sender<AgentMsg>,
}

impl ClientAgentHandle {
    /// Create a channel object; it participates once `modify` is called.
    pub fn create_channel(&self, channel_id: ChannelId, sink: ChannelEventSink) -> ControlChannel {
        ControlChannel {
            channel_id,
            sink,
            agent: self.tx.clone(),
        }
    }

    /// Ask the agent loop to stop.
    pub fn terminate(&self) -> Result<()> {
        self.tx
            .try_send(AgentMsg::Command(AgentCommand::Terminate))
            .map_err(|_| Error::SignalFailed("terminate".into()))
    }

    /// Diagnostics snapshot of the connection table.
    pub async fn stats(&self) -> Result<crate::command::AgentStats> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.tx
            .try_send(AgentMsg::Command(AgentCommand::QueryStats { reply }))
            .map_err(|_| Error::SignalFailed("stats".into()))?;
        rx.await.map_err(|_| Error::SignalFailed("stats".into()))
    }
}

/// The client agent task handler.
pub struct ClientConnectionAgent {
    core: AgentCore,
    events_tx: Option<mpsc::Sender<AgentMsg>>,
}

impl ClientConnectionAgent {
    /// Agent bound to a resource catalogue.
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        info!("Create TCP/MRCPv2 client connection agent");
        Self {
            core: AgentCore::new(catalog),
            events_tx: None,
        }
    }

    /// Build the agent task and its public handle.
    pub fn start(catalog: Arc<ResourceCatalog>) -> (Task<ClientConnectionAgent>, ClientAgentHandle) {
        let agent = Self::new(catalog);
        let task = Task::new(agent);
        let handle = ClientAgentHandle { tx: task.sender() };
        (task, handle)
    }

    async fn modify_channel(
        &mut self,
        channel_id: ChannelId,
        sink: ChannelEventSink,
        descriptor: ControlDescriptor,
    ) {
        let key = channel_id.to_string();
        let already_connected = self
            .core
            .channels
            .get(&key)
            .map(|c| c.conn_id.is_some())
            .unwrap_or(false);

        let mut conn_id = self.core.channels.get(&key).and_then(|c| c.conn_id);
        if descriptor.port != 0 && !already_connected {
            conn_id = self.bind_connection(&descriptor).await;
        }

        self.core.channels.insert(
            key,
            ChannelState {
                sink: sink.clone(),
                conn_id,
            },
        );
        sink(ChannelEvent::ModifyCompleted {
            descriptor,
            connected: conn_id.is_some(),
        });
    }

    /// Pick or establish the TCP connection an answer calls for.
    async fn bind_connection(&mut self, descriptor: &ControlDescriptor) -> Option<u64> {
        let remote: SocketAddr = match descriptor.ip.parse() {
            Ok(ip) => SocketAddr::new(ip, descriptor.port),
            Err(_) => {
                warn!("Bad remote address '{}'", descriptor.ip);
                return None;
            }
        };

        if descriptor.connection_type == ConnectionType::Existing {
            if let Some(conn_id) = self.core.find_by_addr(&remote) {
                debug!("Reusing TCP/MRCPv2 connection to {}", remote);
                if let Some(connection) = self.core.connection_mut(conn_id) {
                    connection.access_count += 1;
                }
                return Some(conn_id);
            }
            // No existing connection found, proceed with a new one.
        }

        match TcpStream::connect(remote).await {
            Ok(stream) => {
                let events = self.events_tx.clone().expect("agent started");
                let conn_id = self.core.register_connection(stream, remote, events);
                if let Some(connection) = self.core.connection_mut(conn_id) {
                    connection.access_count += 1;
                }
                Some(conn_id)
            }
            Err(e) => {
                warn!("Failed to establish TCP/MRCPv2 connection to {}: {}", remote, e);
                None
            }
        }
    }

    async fn remove_channel(&mut self, channel_id: ChannelId) {
        let key = channel_id.to_string();
        if let Some(channel) = self.core.channels.remove(&key) {
            if let Some(conn_id) = channel.conn_id {
                self.core.release_connection(conn_id).await;
            }
            (channel.sink)(ChannelEvent::RemoveCompleted);
        }
    }

    async fn handle_command(&mut self, command: AgentCommand, ctx: &TaskContext<AgentMsg>) {
        match command {
            AgentCommand::ModifyChannel {
                channel_id,
                sink,
                descriptor,
            } => self.modify_channel(channel_id, sink, descriptor).await,
            AgentCommand::RemoveChannel { channel_id } => self.remove_channel(channel_id).await,
            AgentCommand::SendMessage {
                channel_id,
                message,
            } => self.core.send_message(&channel_id, message).await,
            AgentCommand::Terminate => ctx.request_termination(),
            AgentCommand::QueryStats { reply } => {
                let _ = reply.send(self.core.stats());
            }
        }
    }
}

#[async_trait]
impl TaskHandler for ClientConnectionAgent {
    type Msg = AgentMsg;

    fn name(&self) -> &str {
        "mrcpv2-client-agent"
    }

    async fn pre_run(&mut self, ctx: &TaskContext<AgentMsg>) {
        self.events_tx = Some(ctx.sender());
    }

    async fn process(&mut self, msg: AgentMsg, ctx: &TaskContext<AgentMsg>) {
        match msg {
            AgentMsg::Command(command) => self.handle_command(command, ctx).await,
            AgentMsg::Inbound(InboundEvent::Message { message, .. }) => {
                self.core.dispatch_message(message);
            }
            AgentMsg::Inbound(InboundEvent::Closed { conn_id }) => {
                self.core.handle_closed(conn_id);
            }
            AgentMsg::Accepted(..) => {
                warn!("Client agent does not accept inbound connections");
            }
        }
    }

    async fn post_run(&mut self, _ctx: &TaskContext<AgentMsg>) {
        info!("Client connection agent terminated");
        self.core.shutdown().await;
    }
}
