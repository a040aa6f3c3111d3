//! In-memory BACnet/IP segment for engine tests.
//!
//! A [`Hub`] routes frames between [`MemoryLink`] endpoints keyed by socket
//! address. It refuses a second bind of the same address (like a real socket),
//! and keeps counters tests assert on: frames sent, clients bound at once, and
//! confirmed requests outstanding per device.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bacbrowse_client::SimulatedDevice;
use bacbrowse_core::apdu::{ApduType, ComplexAckHeader};
use bacbrowse_core::encoding::reader::Reader;
use bacbrowse_core::npdu::Npdu;
use bacbrowse_datalink::{DataLink, DataLinkAddress, DataLinkError};
use bacbrowse_engine::Connector;
use tokio::sync::mpsc;

type Frame = (DataLinkAddress, Vec<u8>);

struct Endpoint {
    tx: mpsc::UnboundedSender<Frame>,
    client: bool,
}

#[derive(Default)]
struct HubState {
    endpoints: HashMap<SocketAddr, Endpoint>,
    frames_sent: usize,
    clients_bound: usize,
    max_clients_bound: usize,
    outstanding: HashMap<SocketAddr, usize>,
    max_outstanding: HashMap<SocketAddr, usize>,
}

impl HubState {
    /// Tracks confirmed requests against devices and the replies that
    /// complete them.
    fn account(&mut self, from: SocketAddr, to: SocketAddr, frame: &[u8]) {
        let mut r = Reader::new(frame);
        if Npdu::decode(&mut r).is_err() {
            return;
        }
        match ApduType::of(r.rest()) {
            Some(ApduType::ConfirmedRequest) => {
                let count = self.outstanding.entry(to).or_default();
                *count += 1;
                let now = *count;
                let max = self.max_outstanding.entry(to).or_default();
                *max = (*max).max(now);
            }
            Some(ApduType::ComplexAck) => {
                if let Ok(header) = ComplexAckHeader::decode(&mut r) {
                    if !header.segmented || !header.more_follows {
                        self.complete(from);
                    }
                }
            }
            Some(ApduType::SimpleAck | ApduType::Error | ApduType::Reject | ApduType::Abort) => {
                self.complete(from)
            }
            _ => {}
        }
    }

    fn complete(&mut self, device: SocketAddr) {
        if let Some(count) = self.outstanding.get_mut(&device) {
            *count = count.saturating_sub(1);
        }
    }
}

#[derive(Clone, Default)]
pub struct Hub {
    state: Arc<Mutex<HubState>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn bind(&self, addr: SocketAddr, client: bool, reply_delay: Duration) -> Result<MemoryLink, DataLinkError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state();
        if state.endpoints.contains_key(&addr) {
            return Err(DataLinkError::Io(io::Error::from(io::ErrorKind::AddrInUse)));
        }
        state.endpoints.insert(addr, Endpoint { tx, client });
        if client {
            state.clients_bound += 1;
            state.max_clients_bound = state.max_clients_bound.max(state.clients_bound);
        }
        Ok(MemoryLink {
            hub: self.clone(),
            addr,
            client,
            reply_delay,
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    /// Starts a simulated device at `addr` ("ip:port").
    pub fn add_device(&self, addr: &str, instance: u32) -> Arc<SimulatedDevice<MemoryLink>> {
        self.add_slow_device(addr, instance, Duration::ZERO)
    }

    /// Like [`add_device`](Self::add_device), delaying every frame the device
    /// sends by `delay`.
    pub fn add_slow_device(
        &self,
        addr: &str,
        instance: u32,
        delay: Duration,
    ) -> Arc<SimulatedDevice<MemoryLink>> {
        let addr: SocketAddr = addr.parse().expect("device address");
        let link = self.bind(addr, false, delay).expect("device address in use");
        let device = Arc::new(SimulatedDevice::new(instance, link));
        let runner = device.clone();
        tokio::spawn(async move { runner.run().await });
        device
    }

    pub fn frames_sent(&self) -> usize {
        self.state().frames_sent
    }

    pub fn clients_bound(&self) -> usize {
        self.state().clients_bound
    }

    pub fn max_clients_bound(&self) -> usize {
        self.state().max_clients_bound
    }

    /// Addresses of the client endpoints currently bound.
    pub fn client_addresses(&self) -> Vec<SocketAddr> {
        self.state()
            .endpoints
            .iter()
            .filter(|(_, e)| e.client)
            .map(|(addr, _)| *addr)
            .collect()
    }

    /// Most confirmed requests ever in flight to `device` at once.
    pub fn max_outstanding(&self, device: &str) -> usize {
        let device: SocketAddr = device.parse().expect("device address");
        self.state().max_outstanding.get(&device).copied().unwrap_or(0)
    }

    fn deliver(&self, from: SocketAddr, to: DataLinkAddress, frame: &[u8]) {
        let to = to.as_socket_addr();
        let mut state = self.state();
        state.frames_sent += 1;
        state.account(from, to, frame);

        let broadcast = match to.ip() {
            std::net::IpAddr::V4(ip) => ip == Ipv4Addr::BROADCAST || ip.octets()[3] == 255,
            std::net::IpAddr::V6(_) => false,
        };
        for (addr, endpoint) in &state.endpoints {
            let hit = if broadcast {
                addr.port() == to.port() && *addr != from
            } else {
                *addr == to
            };
            if hit {
                let _ = endpoint.tx.send((DataLinkAddress::Ip(from), frame.to_vec()));
            }
        }
    }

    fn unbind(&self, addr: SocketAddr, client: bool) {
        let mut state = self.state();
        if state.endpoints.remove(&addr).is_some() && client {
            state.clients_bound -= 1;
        }
    }
}

pub struct MemoryLink {
    hub: Hub,
    addr: SocketAddr,
    client: bool,
    reply_delay: Duration,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryLink {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl DataLink for MemoryLink {
    async fn send(&self, address: DataLinkAddress, payload: &[u8]) -> Result<(), DataLinkError> {
        if !self.reply_delay.is_zero() {
            tokio::time::sleep(self.reply_delay).await;
        }
        self.hub.deliver(self.addr, address, payload);
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, DataLinkAddress), DataLinkError> {
        let (source, frame) = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(DataLinkError::Closed)?;
        if frame.len() > buf.len() {
            return Err(DataLinkError::FrameTooLarge);
        }
        buf[..frame.len()].copy_from_slice(&frame);
        Ok((frame.len(), source))
    }
}

impl Drop for MemoryLink {
    fn drop(&mut self) {
        self.hub.unbind(self.addr, self.client);
    }
}

/// Binds engine clients on a [`Hub`].
#[derive(Clone)]
pub struct MemoryConnector {
    hub: Hub,
    connect_delay: Duration,
}

impl MemoryConnector {
    pub fn new(hub: &Hub) -> Self {
        Self {
            hub: hub.clone(),
            connect_delay: Duration::ZERO,
        }
    }

    /// Every bind takes `delay` before it completes.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }
}

impl Connector for MemoryConnector {
    type Link = MemoryLink;

    async fn connect(
        &self,
        bind_addr: SocketAddr,
        _broadcast: Option<Ipv4Addr>,
    ) -> Result<MemoryLink, DataLinkError> {
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        self.hub.bind(bind_addr, true, Duration::ZERO)
    }
}
