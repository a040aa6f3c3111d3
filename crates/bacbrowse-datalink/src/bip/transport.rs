use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::net::UdpSocket;

use crate::bip::bvlc::{decode_frame, encode_frame, BvlcFunction};
use crate::{DataLink, DataLinkAddress, DataLinkError};

const MAX_BIP_FRAME_LEN: usize = 1600;
const FORWARDED_ORIGIN_LEN: usize = 6;

/// BACnet/IP over UDP (Annex J) for a plain, non-BBMD node.
#[derive(Debug)]
pub struct BacnetIpTransport {
    socket: UdpSocket,
    broadcast: Option<Ipv4Addr>,
}

impl BacnetIpTransport {
    /// Binds `bind_addr` with broadcast enabled. When `broadcast` is given,
    /// sends to the limited broadcast address go to that directed broadcast
    /// address instead, keeping them on the chosen interface's subnet.
    pub async fn bind(
        bind_addr: SocketAddr,
        broadcast: Option<Ipv4Addr>,
    ) -> Result<Self, DataLinkError> {
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.set_broadcast(true)?;
        log::debug!(
            "bacnet/ip bound on {} (broadcast {:?})",
            socket.local_addr()?,
            broadcast
        );
        Ok(Self { socket, broadcast })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DataLinkError> {
        self.socket.local_addr().map_err(DataLinkError::Io)
    }

    pub fn broadcast_addr(&self) -> Option<Ipv4Addr> {
        self.broadcast
    }

    fn route(&self, address: DataLinkAddress) -> (BvlcFunction, SocketAddr) {
        let addr = address.as_socket_addr();
        let directed = self.broadcast.map(IpAddr::V4);
        if address.is_limited_broadcast() {
            let target = directed.map_or(addr, |ip| SocketAddr::new(ip, addr.port()));
            (BvlcFunction::OriginalBroadcastNpdu, target)
        } else if directed == Some(addr.ip()) {
            (BvlcFunction::OriginalBroadcastNpdu, addr)
        } else {
            (BvlcFunction::OriginalUnicastNpdu, addr)
        }
    }
}

impl DataLink for BacnetIpTransport {
    async fn send(&self, address: DataLinkAddress, payload: &[u8]) -> Result<(), DataLinkError> {
        let (function, target) = self.route(address);
        let frame = encode_frame(function, payload)?;
        if frame.len() > MAX_BIP_FRAME_LEN {
            return Err(DataLinkError::FrameTooLarge);
        }
        self.socket.send_to(&frame, target).await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, DataLinkAddress), DataLinkError> {
        let mut datagram = [0u8; MAX_BIP_FRAME_LEN];
        let (n, src) = self.socket.recv_from(&mut datagram).await?;
        let (header, body) = decode_frame(&datagram[..n])?;

        let (payload, source) = match header.function {
            BvlcFunction::OriginalUnicastNpdu
            | BvlcFunction::OriginalBroadcastNpdu
            | BvlcFunction::DistributeBroadcastToNetwork => (body, src),
            BvlcFunction::ForwardedNpdu => {
                if body.len() < FORWARDED_ORIGIN_LEN {
                    return Err(DataLinkError::InvalidFrame);
                }
                let (origin, npdu) = body.split_at(FORWARDED_ORIGIN_LEN);
                let ip = Ipv4Addr::new(origin[0], origin[1], origin[2], origin[3]);
                let port = u16::from_be_bytes([origin[4], origin[5]]);
                (npdu, SocketAddr::new(IpAddr::V4(ip), port))
            }
            other => return Err(DataLinkError::UnsupportedBvlcFunction(other.to_u8())),
        };

        let out = buf
            .get_mut(..payload.len())
            .ok_or(DataLinkError::FrameTooLarge)?;
        out.copy_from_slice(payload);
        Ok((payload.len(), DataLinkAddress::Ip(source)))
    }
}
