use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bacbrowse_core::encoding::{reader::Reader, writer::Writer};
use bacbrowse_core::npdu::Npdu;
use bacbrowse_core::services::read_property_multiple::{
    ReadAccessResult, ReadAccessSpec, ReadPropertyMultipleAck, ReadPropertyMultipleRequest,
    SERVICE_READ_PROPERTY_MULTIPLE,
};
use bacbrowse_core::services::who_is::WhoIsRequest;
use bacbrowse_core::types::{ObjectId, PropertyId};
use bacbrowse_core::EncodeError;
use bacbrowse_datalink::{BacnetIpTransport, DataLink, DataLinkAddress};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::dispatch::{self, lock, PendingKey, PendingRequest, Shared};
use crate::{ClientError, DiscoveryListener};

const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// BACnet client bound to a single data link.
///
/// Creating a client spawns its receive task, so it must happen inside a
/// Tokio runtime. Call [`shutdown`](Self::shutdown) to stop the task and fail
/// outstanding requests; the data link itself is released when the client is
/// dropped.
pub struct BacnetClient<D: DataLink + 'static> {
    shared: Arc<Shared<D>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    invoke_id: AtomicU8,
    response_timeout: Duration,
    broadcast_port: u16,
}

impl BacnetClient<BacnetIpTransport> {
    /// Binds a BACnet/IP client. Who-Is goes to `broadcast` (or the limited
    /// broadcast address) on the same port number as `bind_addr`.
    pub async fn bind_ip(
        bind_addr: SocketAddr,
        broadcast: Option<Ipv4Addr>,
    ) -> Result<(Self, DiscoveryListener), ClientError> {
        let datalink = BacnetIpTransport::bind(bind_addr, broadcast).await?;
        let (client, listener) = Self::with_datalink(datalink);
        Ok((client.with_broadcast_port(bind_addr.port()), listener))
    }
}

impl<D: DataLink + 'static> BacnetClient<D> {
    pub fn with_datalink(datalink: D) -> (Self, DiscoveryListener) {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new(datalink, tx));
        let driver = tokio::spawn(dispatch::run(shared.clone()));
        let client = Self {
            shared,
            driver: Mutex::new(Some(driver)),
            invoke_id: AtomicU8::new(1),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            broadcast_port: DataLinkAddress::BACNET_IP_DEFAULT_PORT,
        };
        (client, DiscoveryListener::new(rx))
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_broadcast_port(mut self, port: u16) -> Self {
        self.broadcast_port = port;
        self
    }

    pub fn response_timeout(&self) -> Duration {
        self.response_timeout
    }

    pub fn datalink(&self) -> &D {
        &self.shared.datalink
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Broadcasts a Who-Is. Answers arrive on the [`DiscoveryListener`].
    pub async fn who_is(&self, request: WhoIsRequest) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let mut w = Writer::new();
        Npdu::local(false).encode(&mut w);
        request.encode(&mut w);
        self.shared
            .datalink
            .send(
                DataLinkAddress::local_broadcast(self.broadcast_port),
                w.as_written(),
            )
            .await?;
        Ok(())
    }

    pub async fn read_property_multiple(
        &self,
        address: DataLinkAddress,
        specs: Vec<ReadAccessSpec>,
    ) -> Result<Vec<ReadAccessResult>, ClientError> {
        let payload = self
            .send_confirmed(address, SERVICE_READ_PROPERTY_MULTIPLE, move |invoke_id, w| {
                ReadPropertyMultipleRequest { invoke_id, specs }.encode(w)
            })
            .await?;
        let mut r = Reader::new(&payload);
        Ok(ReadPropertyMultipleAck::decode_after_header(&mut r)?.results)
    }

    /// Reads `properties` of a single object. Per-property failures stay in
    /// the returned result; only request-level failures are errors.
    pub async fn read_properties(
        &self,
        address: DataLinkAddress,
        object_id: ObjectId,
        properties: &[PropertyId],
    ) -> Result<ReadAccessResult, ClientError> {
        let spec = ReadAccessSpec::new(object_id, properties);
        self.read_property_multiple(address, vec![spec])
            .await?
            .into_iter()
            .next()
            .ok_or(ClientError::UnsupportedResponse)
    }

    /// Stops the receive task and fails every outstanding request with
    /// [`ClientError::Closed`]. Later requests fail the same way.
    pub async fn shutdown(&self) {
        let driver = lock(&self.driver).take();
        self.shared.close();
        if let Some(driver) = driver {
            driver.abort();
            let _ = driver.await;
        }
    }

    fn next_invoke_id(&self) -> u8 {
        loop {
            let id = self.invoke_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }

    fn register(
        &self,
        address: DataLinkAddress,
        service_choice: u8,
        reply: oneshot::Sender<dispatch::Reply>,
    ) -> Result<PendingSlot<'_, D>, ClientError> {
        let mut pending = lock(&self.shared.pending);
        // `close` drains under this lock, so a slot inserted after it would
        // never be failed.
        if self.shared.is_closed() {
            return Err(ClientError::Closed);
        }
        for _ in 0..u8::MAX {
            let key = (address, self.next_invoke_id());
            if let std::collections::hash_map::Entry::Vacant(slot) = pending.entry(key) {
                slot.insert(PendingRequest::new(service_choice, reply));
                return Ok(PendingSlot {
                    shared: &self.shared,
                    key,
                });
            }
        }
        Err(EncodeError::Message("no free invoke id").into())
    }

    /// Sends a confirmed request and waits for its (reassembled) ComplexAck
    /// service payload.
    async fn send_confirmed(
        &self,
        address: DataLinkAddress,
        service_choice: u8,
        encode: impl FnOnce(u8, &mut Writer),
    ) -> Result<Vec<u8>, ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        let slot = self.register(address, service_choice, tx)?;

        let mut w = Writer::new();
        Npdu::local(true).encode(&mut w);
        encode(slot.key.1, &mut w);
        self.shared.datalink.send(address, w.as_written()).await?;

        match timeout(self.response_timeout, rx).await {
            Err(_) => {
                log::debug!(
                    "request {} to {address} timed out after {:?}",
                    slot.key.1,
                    self.response_timeout
                );
                Err(ClientError::Timeout)
            }
            Ok(Err(_)) => Err(ClientError::Closed),
            Ok(Ok(reply)) => reply,
        }
    }
}

impl<D: DataLink + 'static> Drop for BacnetClient<D> {
    fn drop(&mut self) {
        if let Some(driver) = lock(&self.driver).take() {
            driver.abort();
        }
    }
}

/// Removes a pending entry when its request finishes, times out or is
/// cancelled.
struct PendingSlot<'a, D> {
    shared: &'a Shared<D>,
    key: PendingKey,
}

impl<D> Drop for PendingSlot<'_, D> {
    fn drop(&mut self) {
        lock(&self.shared.pending).remove(&self.key);
    }
}
