//! Peer network addresses of the form `id@host:port`.

use crate::{NetworkError, NodeId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

/// Address of a remote node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetAddress {
    pub id: NodeId,
    pub host: String,
    pub port: u16,
}

impl NetAddress {
    pub fn new(id: NodeId, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    /// Address of a connected socket, tagged with the id the peer announced
    pub fn from_socket(id: NodeId, addr: SocketAddr) -> Self {
        Self::new(id, addr.ip().to_string(), addr.port())
    }

    /// The host as an IP, when it is not a DNS name
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }

    /// `host:port`, bracketing IPv6 literals
    pub fn dial_string(&self) -> String {
        match self.ip() {
            Some(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// Whether the address is reachable over the public internet.
    /// DNS names are assumed routable.
    pub fn is_routable(&self) -> bool {
        if self.port == 0 {
            return false;
        }
        match self.ip() {
            Some(IpAddr::V4(ip)) => is_routable_v4(&ip),
            Some(IpAddr::V6(ip)) => is_routable_v6(&ip),
            None => !self.host.is_empty() && self.host != "localhost",
        }
    }
}

fn is_routable_v4(ip: &Ipv4Addr) -> bool {
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast())
}

fn is_routable_v6(ip: &Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_routable_v4(&v4);
    }
    let first = ip.segments()[0];
    let unique_local = (first & 0xfe00) == 0xfc00;
    let link_local = (first & 0xffc0) == 0xfe80;
    !(ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() || unique_local || link_local)
}

impl fmt::Display for NetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.dial_string())
    }
}

impl FromStr for NetAddress {
    type Err = NetworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| NetworkError::InvalidAddress {
            address: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s.strip_prefix("tcp://").unwrap_or(s);
        let (id, host_port) = rest.split_once('@').ok_or_else(|| invalid("missing node id"))?;
        let id: NodeId = id.parse()?;
        let (host, port) = host_port
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

        Ok(Self::new(id, host, port))
    }
}

impl TryFrom<String> for NetAddress {
    type Error = NetworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetAddress> for String {
    fn from(addr: NetAddress) -> Self {
        addr.to_string()
    }
}
