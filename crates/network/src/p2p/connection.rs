//! Peer connections.
//!
//! Messages travel as one JSON object per line.

use super::MAX_MESSAGE_SIZE;
use crate::{NetAddress, NetworkError, NetworkResult, NodeInfo};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

/// Messages exchanged between nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// First message on every connection
    Handshake { node_info: NodeInfo },
    /// Asks the peer for addresses it knows
    PexRequest,
    /// Answer to a [`Message::PexRequest`]
    PexAddrs { addrs: Vec<NetAddress> },
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Handshake { .. } => "handshake",
            Message::PexRequest => "pex_request",
            Message::PexAddrs { .. } => "pex_addrs",
        }
    }
}

/// An established TCP connection to a peer
#[derive(Debug)]
pub struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    remote: SocketAddr,
    outbound: bool,
}

impl Connection {
    /// Wraps a connected stream
    pub fn new(stream: TcpStream, outbound: bool) -> NetworkResult<Self> {
        let remote = stream.peer_addr()?;
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read),
            writer: write,
            remote,
            outbound,
        })
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Whether we dialed this connection
    pub fn is_outbound(&self) -> bool {
        self.outbound
    }

    /// Sends one message
    pub async fn send(&mut self, message: &Message) -> NetworkResult<()> {
        let mut frame = serde_json::to_vec(message)?;
        if frame.len() > MAX_MESSAGE_SIZE {
            return Err(NetworkError::Codec(format!(
                "{} message of {} bytes exceeds limit",
                message.kind(),
                frame.len()
            )));
        }
        frame.push(b'\n');

        tracing::trace!(remote = %self.remote, kind = message.kind(), bytes = frame.len(), "send");
        self.writer.write_all(&frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receives one message. `Ok(None)` means the peer closed the connection.
    pub async fn recv(&mut self) -> NetworkResult<Option<Message>> {
        let mut frame = Vec::new();
        let limit = (MAX_MESSAGE_SIZE + 1) as u64;
        let read = (&mut self.reader)
            .take(limit)
            .read_until(b'\n', &mut frame)
            .await?;

        if read == 0 {
            return Ok(None);
        }
        if frame.last() != Some(&b'\n') {
            return Err(NetworkError::Codec(if read > MAX_MESSAGE_SIZE {
                format!("frame from {} exceeds {} bytes", self.remote, MAX_MESSAGE_SIZE)
            } else {
                format!("connection to {} closed mid-frame", self.remote)
            }));
        }
        frame.pop();

        let message: Message = serde_json::from_slice(&frame)?;
        tracing::trace!(remote = %self.remote, kind = message.kind(), "recv");
        Ok(Some(message))
    }

    /// Closes the write side; the read side closes on drop
    pub async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}
