//! Ownership of the single active BACnet client.
//!
//! A [`ClientLifecycle`] is either stopped or running one client. Every start
//! binds a fresh data link and gets a new generation number; work tied to an
//! older generation can check [`Session::is_current`] and drop its results.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bacbrowse_client::{BacnetClient, DiscoveryListener, WhoIsRequest};
use bacbrowse_datalink::{BacnetIpTransport, DataLink, DataLinkError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{BrowseError, ClientConfig, InterfaceCatalog};

/// How long `stop` waits for in-flight readers to drop their handle to the
/// old client before giving up on an orderly release.
const RELEASE_GRACE: Duration = Duration::from_secs(2);

/// Opens the data link a new client runs on.
pub trait Connector: Send + Sync + 'static {
    type Link: DataLink + 'static;

    fn connect(
        &self,
        bind_addr: SocketAddr,
        broadcast: Option<Ipv4Addr>,
    ) -> impl Future<Output = Result<Self::Link, DataLinkError>> + Send;
}

/// BACnet/IP over UDP.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpConnector;

impl Connector for UdpConnector {
    type Link = BacnetIpTransport;

    async fn connect(
        &self,
        bind_addr: SocketAddr,
        broadcast: Option<Ipv4Addr>,
    ) -> Result<BacnetIpTransport, DataLinkError> {
        BacnetIpTransport::bind(bind_addr, broadcast).await
    }
}

/// Handle to the client of one generation.
pub struct Session<L: DataLink + 'static> {
    client: Arc<BacnetClient<L>>,
    generation: u64,
    active: Arc<AtomicU64>,
}

impl<L: DataLink + 'static> Clone for Session<L> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            generation: self.generation,
            active: self.active.clone(),
        }
    }
}

impl<L: DataLink + 'static> Session<L> {
    pub fn client(&self) -> &BacnetClient<L> {
        &self.client
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// False once the lifecycle has stopped or replaced this client.
    pub fn is_current(&self) -> bool {
        self.active.load(Ordering::Acquire) == self.generation
    }
}

struct Active<L: DataLink + 'static> {
    session: Session<L>,
    watcher: JoinHandle<()>,
}

pub struct ClientLifecycle<C: Connector> {
    connector: C,
    active: Mutex<Option<Active<C::Link>>>,
    generation: AtomicU64,
    /// Generation of the running client, 0 when stopped.
    active_generation: Arc<AtomicU64>,
}

/// Bind address and broadcast target for `config`. An out-of-range or
/// addressless interface falls back to the unspecified address and the
/// limited broadcast.
pub fn bind_target(config: &ClientConfig, catalog: &InterfaceCatalog) -> (SocketAddr, Option<Ipv4Addr>) {
    match catalog
        .get(config.interface_index)
        .and_then(|iface| iface.address.map(|addr| (addr, iface.broadcast_address)))
    {
        Some((addr, broadcast)) => (SocketAddr::new(IpAddr::V4(addr), config.port), broadcast),
        None => (
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), config.port),
            None,
        ),
    }
}

impl<C: Connector> ClientLifecycle<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            active: Mutex::new(None),
            generation: AtomicU64::new(0),
            active_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of clients started so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn is_running(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub async fn session(&self) -> Result<Session<C::Link>, BrowseError> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|a| a.session.clone())
            .ok_or(BrowseError::NotRunning)
    }

    /// Starts a client unless one is already running. `on_start` receives the
    /// new session and its announcement stream and returns the task that
    /// consumes it; that task is aborted when the client stops.
    pub async fn start<F>(
        &self,
        config: &ClientConfig,
        catalog: &InterfaceCatalog,
        on_start: F,
    ) -> Result<Session<C::Link>, BrowseError>
    where
        F: FnOnce(Session<C::Link>, DiscoveryListener) -> JoinHandle<()>,
    {
        let mut active = self.active.lock().await;
        if let Some(running) = active.as_ref() {
            return Ok(running.session.clone());
        }
        self.start_locked(&mut active, config, catalog, on_start).await
    }

    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        self.stop_locked(&mut active).await;
    }

    /// Stops the running client (if any) and starts one for `config` while
    /// holding the lifecycle lock, so the old socket is gone before the new
    /// one binds.
    pub async fn reconfigure<F>(
        &self,
        config: &ClientConfig,
        catalog: &InterfaceCatalog,
        on_start: F,
    ) -> Result<Session<C::Link>, BrowseError>
    where
        F: FnOnce(Session<C::Link>, DiscoveryListener) -> JoinHandle<()>,
    {
        let mut active = self.active.lock().await;
        self.stop_locked(&mut active).await;
        log::info!("reconfiguring bacnet client: {config:?}");
        self.start_locked(&mut active, config, catalog, on_start).await
    }

    /// Broadcasts a global Who-Is from the running client.
    pub async fn trigger_discovery(&self) -> Result<(), BrowseError> {
        let session = self.session().await?;
        session.client().who_is(WhoIsRequest::global()).await?;
        Ok(())
    }

    async fn start_locked<F>(
        &self,
        active: &mut Option<Active<C::Link>>,
        config: &ClientConfig,
        catalog: &InterfaceCatalog,
        on_start: F,
    ) -> Result<Session<C::Link>, BrowseError>
    where
        F: FnOnce(Session<C::Link>, DiscoveryListener) -> JoinHandle<()>,
    {
        let (bind_addr, broadcast) = bind_target(config, catalog);
        let link = self
            .connector
            .connect(bind_addr, broadcast)
            .await
            .map_err(BrowseError::Bind)?;

        let (client, listener) = BacnetClient::with_datalink(link);
        let client = client
            .with_response_timeout(config.timeout())
            .with_broadcast_port(config.port);

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.active_generation.store(generation, Ordering::Release);
        let session = Session {
            client: Arc::new(client),
            generation,
            active: self.active_generation.clone(),
        };
        let watcher = on_start(session.clone(), listener);
        *active = Some(Active {
            session: session.clone(),
            watcher,
        });
        log::info!(
            "bacnet client #{generation} bound on {bind_addr} (broadcast {})",
            broadcast.map_or_else(|| "255.255.255.255".to_string(), |b| b.to_string())
        );
        Ok(session)
    }

    async fn stop_locked(&self, active: &mut Option<Active<C::Link>>) {
        let Some(Active { session, watcher }) = active.take() else {
            return;
        };
        self.active_generation.store(0, Ordering::Release);
        watcher.abort();
        let _ = watcher.await;

        let generation = session.generation;
        session.client.shutdown().await;
        release(session.client).await;
        log::info!("bacnet client #{generation} stopped");
    }
}

/// Waits until `client` is the last handle so the data link is dropped here
/// rather than by a straggling reader.
async fn release<L: DataLink + 'static>(mut client: Arc<BacnetClient<L>>) {
    let deadline = Instant::now() + RELEASE_GRACE;
    loop {
        match Arc::try_unwrap(client) {
            Ok(owned) => {
                drop(owned);
                return;
            }
            Err(shared) if Instant::now() >= deadline => {
                log::warn!(
                    "{} readers still hold the stopped client; its socket closes when they finish",
                    Arc::strong_count(&shared) - 1
                );
                return;
            }
            Err(shared) => {
                client = shared;
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }
    }
}
