use core::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Address of a station on a data link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataLinkAddress {
    Ip(SocketAddr),
}

impl DataLinkAddress {
    pub const BACNET_IP_DEFAULT_PORT: u16 = 47808;

    /// Limited broadcast (255.255.255.255) on `port`. BACnet/IP transports
    /// rewrite this to their directed broadcast address when they have one.
    pub fn local_broadcast(port: u16) -> Self {
        Self::Ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port))
    }

    pub fn as_socket_addr(self) -> SocketAddr {
        match self {
            Self::Ip(addr) => addr,
        }
    }

    pub fn is_limited_broadcast(self) -> bool {
        matches!(self.as_socket_addr().ip(), IpAddr::V4(v4) if v4.is_broadcast())
    }
}

impl From<SocketAddr> for DataLinkAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::Ip(addr)
    }
}

impl fmt::Display for DataLinkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ip(addr) => write!(f, "{addr}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DataLinkAddress;
    use std::net::SocketAddr;

    #[test]
    fn displays_as_socket_address() {
        let addr: SocketAddr = "192.168.1.20:47808".parse().unwrap();
        assert_eq!(DataLinkAddress::from(addr).to_string(), "192.168.1.20:47808");
        assert!(!DataLinkAddress::from(addr).is_limited_broadcast());
        assert!(DataLinkAddress::local_broadcast(47808).is_limited_broadcast());
    }
}
