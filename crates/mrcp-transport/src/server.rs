//! Server-side MRCPv2 connection agent.
//!
//! Listens for client connections, parses each peer's byte stream, and
//! binds channels to connections by the `Channel-Identifier` of the
//! first message that names them. Offer/answer registration and removal
//! come from the server sessions through the same command channel the
//! client agent uses.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use rspeech_infra_common::task::{Task, TaskContext, TaskHandler};
use rspeech_mrcp_core::{ChannelId, ResourceCatalog};

use crate::command::{AgentCommand, ChannelEvent, ChannelEventSink, ControlDescriptor};
use crate::connection::{AgentCore, AgentMsg, ChannelState, InboundEvent};
use crate::error::{Error, Result};

/// Public handle to a running server agent.
#[derive(Clone)]
pub struct ServerAgentHandle {
    tx: mpsc::Sender<AgentMsg>,
    local_addr: SocketAddr,
}

impl ServerAgentHandle {
    /// The address the agent listens on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register a channel ahead of the client's connection; the agent
    /// answers with `ModifyCompleted`.
    pub fn modify_channel(
        &self,
        channel_id: ChannelId,
        sink: ChannelEventSink,
        descriptor: ControlDescriptor,
    ) -> Result<()> {
        self.signal(AgentCommand::ModifyChannel {
            channel_id,
            sink,
            descriptor,
        })
    }

    /// Remove a channel registration.
    pub fn remove_channel(&self, channel_id: ChannelId) -> Result<()> {
        self.signal(AgentCommand::RemoveChannel { channel_id })
    }

    /// Send a response or event on the channel's bound connection.
    pub fn send_message(
        &self,
        channel_id: ChannelId,
        message: rspeech_mrcp_core::Message,
    ) -> Result<()> {
        self.signal(AgentCommand::SendMessage {
            channel_id,
            message: Box::new(message),
        })
    }

    /// Ask the agent loop to stop.
    pub fn terminate(&self) -> Result<()> {
        self.signal(AgentCommand::Terminate)
    }

    fn signal(&self, command: AgentCommand) -> Result<()> {
        self.tx
            .try_send(AgentMsg::Command(command))
            .map_err(|_| Error::SignalFailed("server agent".into()))
    }
}

/// The server agent task handler.
pub struct ServerConnectionAgent {
    core: AgentCore,
    listener: Option<TcpListener>,
    acceptor: Option<JoinHandle<()>>,
}

impl ServerConnectionAgent {
    /// Bind the listening socket and build the agent task plus handle.
    pub async fn bind(
        addr: SocketAddr,
        catalog: Arc<ResourceCatalog>,
    ) -> Result<(Task<ServerConnectionAgent>, ServerAgentHandle)> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Connection(e.to_string()))?;
        info!("TCP/MRCPv2 server agent listening on {}", local_addr);

        let agent = Self {
            core: AgentCore::new(catalog),
            listener: Some(listener),
            acceptor: None,
        };
        let task = Task::new(agent);
        let handle = ServerAgentHandle {
            tx: task.sender(),
            local_addr,
        };
        Ok((task, handle))
    }

    /// Bind an inbound message's channel to the connection it arrived
    /// on, counting the reference on first sight.
    fn bind_and_dispatch(&mut self, conn_id: u64, message: Box<rspeech_mrcp_core::Message>) {
        let key = message.channel_id.to_string();
        match self.core.channels.get_mut(&key) {
            Some(channel) => {
                if channel.conn_id.is_none() {
                    channel.conn_id = Some(conn_id);
                    if let Some(connection) = self.core.connection_mut(conn_id) {
                        connection.access_count += 1;
                    }
                }
                self.core.dispatch_message(message);
            }
            None => warn!("Inbound message for unknown channel [{}]", key),
        }
    }

    async fn handle_command(&mut self, command: AgentCommand, ctx: &TaskContext<AgentMsg>) {
        match command {
            AgentCommand::ModifyChannel {
                channel_id,
                sink,
                descriptor,
            } => {
                let key = channel_id.to_string();
                let conn_id = self.core.channels.get(&key).and_then(|c| c.conn_id);
                self.core.channels.insert(
                    key,
                    ChannelState {
                        sink: sink.clone(),
                        conn_id,
                    },
                );
                sink(ChannelEvent::ModifyCompleted {
                    descriptor,
                    connected: true,
                });
            }
            AgentCommand::RemoveChannel { channel_id } => {
                let key = channel_id.to_string();
                if let Some(channel) = self.core.channels.remove(&key) {
                    if let Some(conn_id) = channel.conn_id {
                        self.core.release_connection(conn_id).await;
                    }
                    (channel.sink)(ChannelEvent::RemoveCompleted);
                }
            }
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
impl TaskHandler for ServerConnectionAgent {
    type Msg = AgentMsg;

    fn name(&self) -> &str {
        "mrcpv2-server-agent"
    }

    async fn pre_run(&mut self, ctx: &TaskContext<AgentMsg>) {
        let listener = self.listener.take().expect("listener bound");
        let events = ctx.sender();
        self.acceptor = Some(tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        if events.send(AgentMsg::Accepted(stream, peer)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        break;
                    }
                }
            }
        }));
    }

    async fn process(&mut self, msg: AgentMsg, ctx: &TaskContext<AgentMsg>) {
        match msg {
            AgentMsg::Command(command) => self.handle_command(command, ctx).await,
            AgentMsg::Accepted(stream, peer) => {
                let events = ctx.sender();
                self.core.register_connection(stream, peer, events);
            }
            AgentMsg::Inbound(InboundEvent::Message { conn_id, message }) => {
                self.bind_and_dispatch(conn_id, message);
            }
            AgentMsg::Inbound(InboundEvent::Closed { conn_id }) => {
                self.core.handle_closed(conn_id);
            }
        }
    }

    async fn post_run(&mut self, _ctx: &TaskContext<AgentMsg>) {
        if let Some(acceptor) = self.acceptor.take() {
            acceptor.abort();
        }
        info!("Server connection agent terminated");
        self.core.shutdown().await;
    }
}
