use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const DISCOVERY_PORT: u16 = 4001;
pub const LISTEN_PORT: u16 = 4002;
pub const CONTROL_PORT: u16 = 4003;
pub const MULTICAST_TTL: u32 = 2;
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(2);
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Addresses, ports and deadlines used by discovery and device control.
///
/// The defaults match what devices with LAN control enabled expect. Tests
/// and unusual networks can override single values with the `with_*`
/// methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanConfig {
    pub multicast_address: Ipv4Addr,
    pub discovery_port: u16,
    /// Local port that scan replies are sent back to.
    pub listen_port: u16,
    pub control_port: u16,
    pub multicast_ttl: u32,
    pub discovery_timeout: Duration,
    pub status_timeout: Duration,
    pub max_datagram_size: usize,
}

impl Default for LanConfig {
    fn default() -> Self {
        LanConfig {
            multicast_address: MULTICAST_ADDRESS,
            discovery_port: DISCOVERY_PORT,
            listen_port: LISTEN_PORT,
            control_port: CONTROL_PORT,
            multicast_ttl: MULTICAST_TTL,
            discovery_timeout: DISCOVERY_TIMEOUT,
            status_timeout: STATUS_TIMEOUT,
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl LanConfig {
    /// Where scan requests are sent.
    pub fn discovery_target(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(
            self.multicast_address,
            self.discovery_port,
        ))
    }

    pub fn with_multicast_address(mut self, address: Ipv4Addr) -> Self {
        self.multicast_address = address;
        self
    }

    pub fn with_discovery_port(mut self, port: u16) -> Self {
        self.discovery_port = port;
        self
    }

    /// Port `0` lets the OS choose, which is what tests use.
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_control_port(mut self, port: u16) -> Self {
        self.control_port = port;
        self
    }

    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }
}
