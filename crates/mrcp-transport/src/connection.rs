//! Connection state shared by the client and server agents.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use rspeech_mrcp_core::{
    ChannelId, Message, MessageGenerator, MessageParser, ParseStatus, RequestState,
    ResourceCatalog, StartLine, StatusCode, TextCursor,
};

use crate::command::{AgentCommand, AgentStats, ChannelEvent, ChannelEventSink};
use crate::error::{Error, Result};

/// Read buffer size; also the generation chunk size. Messages larger
/// than this resume across chunks.
pub(crate) const BUFFER_SIZE: usize = 2048;

/// Events the per-connection readers feed into the agent loop.
#[derive(Debug)]
pub(crate) enum InboundEvent {
    /// A whole message was parsed on a connection
    Message {
        conn_id: u64,
        message: Box<Message>,
    },
    /// The peer closed or the stream broke
    Closed { conn_id: u64 },
}

/// Everything the agent loop selects over.
pub enum AgentMsg {
    /// Public API command
    Command(AgentCommand),
    /// Reader event
    Inbound(InboundEvent),
    /// Accepted peer (server role)
    Accepted(TcpStream, SocketAddr),
}

/// One TCP connection, possibly shared by several channels.
pub(crate) struct Connection {
    pub id: u64,
    pub remote: SocketAddr,
    /// `None` once the connection dropped; channel objects survive
    /// until they are removed.
    pub writer: Option<OwnedWriteHalf>,
    pub access_count: usize,
    reader: JoinHandle<()>,
}

/// Per-channel agent state.
pub(crate) struct ChannelState {
    pub sink: ChannelEventSink,
    pub conn_id: Option<u64>,
}

/// State and operations common to both agent roles.
pub(crate) struct AgentCore {
    pub catalog: Arc<ResourceCatalog>,
    pub channels: HashMap<String, ChannelState>,
    pub connections: Vec<Connection>,
    next_conn_id: u64,
}

impl AgentCore {
    pub fn new(catalog: Arc<ResourceCatalog>) -> Self {
        Self {
            catalog,
            channels: HashMap::new(),
            connections: Vec::new(),
            next_conn_id: 1,
        }
    }

    /// Adopt a connected stream: spawn its reader, track its writer.
    pub fn register_connection(
        &mut self,
        stream: TcpStream,
        remote: SocketAddr,
        events: mpsc::Sender<AgentMsg>,
    ) -> u64 {
        let conn_id = self.next_conn_id;
        self.next_conn_id += 1;
        let (read_half, write_half) = stream.into_split();
        let reader = spawn_reader(conn_id, read_half, self.catalog.clone(), events);
        info!("Established TCP/MRCPv2 connection to {}", remote);
        self.connections.push(Connection {
            id: conn_id,
            remote,
            writer: Some(write_half),
            access_count: 0,
            reader,
        });
        conn_id
    }

    pub fn connection_mut(&mut self, conn_id: u64) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == conn_id)
    }

    /// Address-equality lookup for the `Existing` reuse policy.
    pub fn find_by_addr(&self, remote: &SocketAddr) -> Option<u64> {
        self.connections
            .iter()
            .find(|c| c.remote == *remote && c.writer.is_some())
            .map(|c| c.id)
    }

    /// Route an inbound (or locally synthesised) message to its channel.
    pub fn dispatch_message(&mut self, message: Box<Message>) {
        let key = message.channel_id.to_string();
        match self.channels.get(&key) {
            Some(channel) => (channel.sink)(ChannelEvent::MessageReceived(message)),
            None => warn!("No channel for inbound message [{}]", key),
        }
    }

    /// The connection dropped: unhook its writer and tell every owning
    /// channel. Channel objects are preserved until removed.
    pub fn handle_closed(&mut self, conn_id: u64) {
        if let Some(connection) = self.connection_mut(conn_id) {
            info!("TCP/MRCPv2 connection to {} disconnected", connection.remote);
            connection.writer = None;
        }
        for channel in self.channels.values() {
            if channel.conn_id == Some(conn_id) {
                (channel.sink)(ChannelEvent::Disconnected);
            }
        }
    }

    /// Drop a channel's connection reference; the last reference closes
    /// the connection for real.
    pub async fn release_connection(&mut self, conn_id: u64) {
        let Some(pos) = self.connections.iter().position(|c| c.id == conn_id) else {
            return;
        };
        let connection = &mut self.connections[pos];
        if connection.access_count > 0 {
            connection.access_count -= 1;
        }
        if connection.access_count == 0 {
            let mut connection = self.connections.remove(pos);
            if let Some(mut writer) = connection.writer.take() {
                let _ = writer.shutdown().await;
            }
            connection.reader.abort();
            info!("Closed TCP/MRCPv2 connection to {}", connection.remote);
        }
    }

    /// Generate and send a message on the channel's connection. A
    /// failure anywhere synthesises a `METHOD_FAILED` response that is
    /// delivered up the normal receive path.
    pub async fn send_message(&mut self, channel_id: &ChannelId, mut message: Box<Message>) {
        let conn_id = self
            .channels
            .get(&channel_id.to_string())
            .and_then(|c| c.conn_id);

        let result = match conn_id {
            Some(conn_id) => self.write_message(conn_id, &mut message).await,
            None => Err(Error::SendFailed("no MRCPv2 connection".into())),
        };

        if let Err(e) = result {
            warn!("Failed to send MRCPv2 message: {}", e);
            let mut response = Box::new(Message::response_to(&message));
            if let StartLine::Response(line) = &mut response.start_line {
                line.status_code = StatusCode::METHOD_FAILED;
                line.request_state = RequestState::Complete;
            }
            self.dispatch_message(response);
        }
    }

    async fn write_message(&mut self, conn_id: u64, message: &mut Message) -> Result<()> {
        let mut generator = MessageGenerator::new(self.catalog.clone());
        generator.initialize(message)?;

        let connection = self
            .connection_mut(conn_id)
            .ok_or_else(|| Error::SendFailed("connection gone".into()))?;
        let writer = connection
            .writer
            .as_mut()
            .ok_or_else(|| Error::SendFailed("connection closed".into()))?;

        let mut chunk = [0u8; BUFFER_SIZE];
        let mut total = 0usize;
        loop {
            let (written, status) = generator.run(&mut chunk)?;
            writer
                .write_all(&chunk[..written])
                .await
                .map_err(|e| Error::SendFailed(e.to_string()))?;
            total += written;
            if status == rspeech_mrcp_core::GenStatus::Complete {
                break;
            }
        }
        debug!("Sent MRCPv2 message size={}", total);
        Ok(())
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            connections: self
                .connections
                .iter()
                .map(|c| (c.remote, c.access_count, c.writer.is_some()))
                .collect(),
        }
    }

    /// Tear everything down at agent terminate.
    pub async fn shutdown(&mut self) {
        for mut connection in self.connections.drain(..) {
            if let Some(mut writer) = connection.writer.take() {
                let _ = writer.shutdown().await;
            }
            connection.reader.abort();
        }
        self.channels.clear();
    }
}

/// Reader loop: one buffer per readiness, fed to the connection's
/// parser while whole messages keep coming out. Parser state retains
/// partial messages across reads.
fn spawn_reader(
    conn_id: u64,
    read_half: OwnedReadHalf,
    catalog: Arc<ResourceCatalog>,
    events: mpsc::Sender<AgentMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        use tokio::io::AsyncReadExt;
        let mut read_half = read_half;
        let mut parser = MessageParser::new(catalog);
        let mut buf = vec![0u8; BUFFER_SIZE];
        loop {
            let n = match read_half.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!("Read error on connection {}: {}", conn_id, e);
                    break;
                }
            };
            trace!("Received {} bytes on connection {}", n, conn_id);

            let mut cursor = TextCursor::new(&buf[..n]);
            let mut fatal = false;
            loop {
                match parser.run(&mut cursor) {
                    ParseStatus::Complete(message) => {
                        if events
                            .send(AgentMsg::Inbound(InboundEvent::Message { conn_id, message }))
                            .await
                            .is_err()
                        {
                            return;
                        }
                    }
                    ParseStatus::Incomplete => break,
                    ParseStatus::Invalid { recoverable } => {
                        warn!("Failed to parse MRCPv2 message on connection {}", conn_id);
                        if !recoverable {
                            fatal = true;
                            break;
                        }
                    }
                }
                if cursor.is_eos() {
                    break;
                }
            }
            if fatal {
                break;
            }
        }
        let _ = events
            .send(AgentMsg::Inbound(InboundEvent::Closed { conn_id }))
            .await;
    })
}
