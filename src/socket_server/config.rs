use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketServerConfig {
    pub listen: SocketAddr,
    pub max_connections: usize,
    /// Longest accepted request line in bytes.
    pub max_line_length: usize,
    /// Peers allowed to issue any command, status queries included.
    pub control_ips: Vec<IpAddr>,
}

impl SocketServerConfig {
    pub fn allows(&self, peer: IpAddr) -> bool {
        self.control_ips.contains(&peer.to_canonical())
    }
}

impl Default for SocketServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::LOCALHOST, 9030)),
            max_connections: 100,
            max_line_length: 8192,
            control_ips: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        }
    }
}
