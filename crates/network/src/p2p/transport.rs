//! Listening transport.

use super::{connection::Connection, Message, DIAL_TIMEOUT_SECS, HANDSHAKE_TIMEOUT_SECS};
use crate::{NetAddress, NetworkError, NetworkResult, NodeInfo};
use parking_lot::Mutex;
use std::{net::SocketAddr, time::Duration};
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tracing::info;

/// Owns the listening socket and performs handshakes in both directions
#[derive(Debug)]
pub struct Transport {
    listener: Mutex<Option<TcpListener>>,
    local_addr: SocketAddr,
    node_info: NodeInfo,
    handshake_timeout: Duration,
    dial_timeout: Duration,
}

impl Transport {
    /// Binds `address` (`host:port`) and advertises `node_info` to peers
    pub async fn listen(address: &str, node_info: NodeInfo) -> NetworkResult<Self> {
        node_info.validate()?;

        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| NetworkError::Bind {
                address: address.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, id = %node_info.id, network = %node_info.network, "transport listening");

        Ok(Self {
            listener: Mutex::new(Some(listener)),
            local_addr,
            node_info,
            handshake_timeout: Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            dial_timeout: Duration::from_secs(DIAL_TIMEOUT_SECS),
        })
    }

    /// Overrides the handshake and dial deadlines
    pub fn with_timeouts(mut self, handshake: Duration, dial: Duration) -> Self {
        self.handshake_timeout = handshake;
        self.dial_timeout = dial;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn node_info(&self) -> &NodeInfo {
        &self.node_info
    }

    /// Hands the listening socket to the accept loop. Returns `None` once
    /// taken; dropping the listener closes the socket.
    pub fn take_listener(&self) -> Option<TcpListener> {
        self.listener.lock().take()
    }

    /// Opens a TCP connection to `addr`
    pub async fn dial(&self, addr: &NetAddress) -> NetworkResult<Connection> {
        let target = addr.dial_string();
        let stream = timeout(self.dial_timeout, TcpStream::connect(&target))
            .await
            .map_err(|_| NetworkError::Timeout {
                address: target.clone(),
                timeout_ms: self.dial_timeout.as_millis() as u64,
            })??;
        Connection::new(stream, true)
    }

    /// Exchanges node info with the peer and checks compatibility
    pub async fn handshake(&self, conn: &mut Connection) -> NetworkResult<NodeInfo> {
        let address = conn.remote_addr();
        let failed = |reason: String| NetworkError::Handshake { address, reason };

        let exchange = async {
            conn.send(&Message::Handshake {
                node_info: self.node_info.clone(),
            })
            .await?;
            match conn.recv().await? {
                Some(Message::Handshake { node_info }) => Ok(node_info),
                Some(other) => Err(failed(format!("expected handshake, got {}", other.kind()))),
                None => Err(failed("connection closed".to_string())),
            }
        };

        let theirs = timeout(self.handshake_timeout, exchange)
            .await
            .map_err(|_| failed(format!("timed out after {:?}", self.handshake_timeout)))??;

        if theirs.id == self.node_info.id {
            return Err(failed("connected to ourselves".to_string()));
        }
        self.node_info.compatible_with(&theirs)?;
        Ok(theirs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NodeKey, PEX_CHANNEL, PROTOCOL_VERSION};

    fn node_info(network: &str) -> NodeInfo {
        NodeInfo {
            protocol_version: PROTOCOL_VERSION,
            id: NodeKey::generate().id(),
            listen_addr: "tcp://127.0.0.1:0".to_string(),
            network: network.to_string(),
            version: "test".to_string(),
            channels: vec![PEX_CHANNEL],
            moniker: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = Transport::listen("127.0.0.1:0", node_info("a")).await.unwrap();
        let taken = first.local_addr().to_string();
        let second = Transport::listen(&taken, node_info("a")).await;
        assert!(matches!(second, Err(NetworkError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_handshake_between_transports() {
        let server = Transport::listen("127.0.0.1:0", node_info("chain-1")).await.unwrap();
        let client = Transport::listen("127.0.0.1:0", node_info("chain-1")).await.unwrap();
        let listener = server.take_listener().unwrap();
        assert!(server.take_listener().is_none());

        let target = NetAddress::from_socket(server.node_info().id.clone(), server.local_addr());
        let accept = async {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream, false).unwrap();
            server.handshake(&mut conn).await
        };
        let dial = async {
            let mut conn = client.dial(&target).await.unwrap();
            client.handshake(&mut conn).await
        };
        let (accepted, dialed) = tokio::join!(accept, dial);

        assert_eq!(accepted.unwrap().id, client.node_info().id);
        assert_eq!(dialed.unwrap().id, server.node_info().id);
    }

    #[tokio::test]
    async fn test_handshake_rejects_other_network() {
        let server = Transport::listen("127.0.0.1:0", node_info("chain-1")).await.unwrap();
        let client = Transport::listen("127.0.0.1:0", node_info("chain-2")).await.unwrap();
        let listener = server.take_listener().unwrap();
        let target = NetAddress::from_socket(server.node_info().id.clone(), server.local_addr());

        let accept = async {
            let (stream, _) = listener.accept().await.unwrap();
            let mut conn = Connection::new(stream, false).unwrap();
            server.handshake(&mut conn).await
        };
        let dial = async {
            let mut conn = client.dial(&target).await.unwrap();
            client.handshake(&mut conn).await
        };
        let (accepted, dialed) = tokio::join!(accept, dial);

        assert!(matches!(accepted, Err(NetworkError::Incompatible(_))));
        assert!(matches!(dialed, Err(NetworkError::Incompatible(_))));
    }
}
