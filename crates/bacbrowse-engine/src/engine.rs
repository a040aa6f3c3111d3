use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bacbrowse_client::{DiscoveryListener, ReadAccessResult};
use bacbrowse_core::types::{DataValue, ObjectId, PropertyId};
use bacbrowse_datalink::{DataLink, DataLinkAddress};
use tokio::sync::{Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};

use crate::browser::{self, BacnetObject, ObjectKey};
use crate::gate::DeviceGate;
use crate::{
    BrowseError, ClientConfig, ClientLifecycle, ConfigPatch, Connector, Device, DeviceRegistry,
    InterfaceCatalog, JsonFileStore, NetworkInterface, Property, Session, SettingsStore,
    UdpConnector,
};

/// The browsing engine: configuration, the active client, and the device
/// registry, owned together. Share it behind an `Arc`.
///
/// Lifecycle is `new` → [`start`](Self::start) → [`stop`](Self::stop) →
/// [`dispose`](Self::dispose); a disposed browser refuses to start again.
pub struct Browser<C: Connector = UdpConnector, S: SettingsStore = JsonFileStore> {
    config: RwLock<ClientConfig>,
    /// Serializes `set_config` calls; `config` itself is only locked briefly.
    update: Mutex<()>,
    store: S,
    catalog: InterfaceCatalog,
    lifecycle: ClientLifecycle<C>,
    registry: Arc<DeviceRegistry>,
    gate: Arc<DeviceGate>,
    disposed: AtomicBool,
}

impl<S: SettingsStore> Browser<UdpConnector, S> {
    /// BACnet/IP browser over this host's interfaces.
    pub async fn udp(store: S) -> Result<Self, BrowseError> {
        Self::new(UdpConnector, store, InterfaceCatalog::from_host()).await
    }
}

impl<C: Connector, S: SettingsStore> Browser<C, S> {
    /// Loads the stored configuration (defaults when none was saved). The
    /// client is not started yet.
    pub async fn new(connector: C, store: S, catalog: InterfaceCatalog) -> Result<Self, BrowseError> {
        let config = store.load().await?.unwrap_or_default();
        Ok(Self {
            config: RwLock::new(config),
            update: Mutex::new(()),
            store,
            catalog,
            lifecycle: ClientLifecycle::new(connector),
            registry: Arc::new(DeviceRegistry::new()),
            gate: Arc::new(DeviceGate::new()),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of clients started so far.
    pub fn generation(&self) -> u64 {
        self.lifecycle.generation()
    }

    pub async fn config(&self) -> ClientConfig {
        *self.config.read().await
    }

    /// Merges `patch` over the current configuration, persists it, then
    /// restarts the client with it. Nothing is applied when the store
    /// rejects the write.
    pub async fn set_config(&self, patch: ConfigPatch) -> Result<ClientConfig, BrowseError> {
        self.ensure_live()?;
        let _update = self.update.lock().await;
        let next = self.config().await.merged(&patch);
        self.store.save(&next).await?;
        *self.config.write().await = next;
        self.lifecycle
            .reconfigure(&next, &self.catalog, self.announcement_handler())
            .await?;
        Ok(next)
    }

    pub fn interfaces(&self) -> Vec<NetworkInterface> {
        self.catalog.list().to_vec()
    }

    pub async fn devices(&self) -> Vec<Device> {
        self.registry.list().await
    }

    pub async fn device(&self, key: &str) -> Option<Device> {
        self.registry.get(key).await
    }

    pub async fn clear_devices(&self) {
        self.registry.clear().await;
        self.gate.prune();
    }

    /// Broadcasts a global Who-Is. Answers show up in [`devices`](Self::devices)
    /// as they arrive.
    pub async fn trigger_scan(&self) -> Result<(), BrowseError> {
        self.ensure_live()?;
        self.lifecycle.trigger_discovery().await
    }

    pub async fn list_objects(&self, device_key: &str) -> Result<Vec<BacnetObject>, BrowseError> {
        let device = self.known_device(device_key).await?;
        let session = self.lifecycle.session().await?;
        let _permit = self.gate.acquire(device_key).await?;
        browser::list_objects(session.client(), DataLinkAddress::Ip(device.network_address)).await
    }

    pub async fn object_properties(
        &self,
        device_key: &str,
        object_key: &str,
    ) -> Result<Vec<Property>, BrowseError> {
        let device = self.known_device(device_key).await?;
        let object: ObjectKey = object_key.parse()?;
        let session = self.lifecycle.session().await?;
        let _permit = self.gate.acquire(device_key).await?;
        browser::object_properties(
            session.client(),
            DataLinkAddress::Ip(device.network_address),
            object,
        )
        .await
    }

    /// Starts the client for the current configuration; a no-op when it is
    /// already running.
    pub async fn start(&self) -> Result<(), BrowseError> {
        self.ensure_live()?;
        let config = self.config().await;
        self.lifecycle
            .start(&config, &self.catalog, self.announcement_handler())
            .await?;
        Ok(())
    }

    pub async fn stop(&self) {
        self.lifecycle.stop().await;
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.is_running().await
    }

    /// Stops the client for good. Discovered devices stay readable.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.lifecycle.stop().await;
        self.gate.close();
    }

    fn ensure_live(&self) -> Result<(), BrowseError> {
        if self.disposed.load(Ordering::Acquire) {
            Err(BrowseError::NotRunning)
        } else {
            Ok(())
        }
    }

    async fn known_device(&self, key: &str) -> Result<Device, BrowseError> {
        self.registry
            .get(key)
            .await
            .ok_or_else(|| BrowseError::DeviceNotFound(key.to_string()))
    }

    fn announcement_handler(
        &self,
    ) -> impl FnOnce(Session<C::Link>, DiscoveryListener) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let gate = self.gate.clone();
        move |session, listener| tokio::spawn(watch_announcements(session, listener, registry, gate))
    }
}

/// Registers every announcement and enriches the announcing device. Dropping
/// the task aborts the enrichment reads it started.
async fn watch_announcements<L: DataLink + 'static>(
    session: Session<L>,
    mut listener: DiscoveryListener,
    registry: Arc<DeviceRegistry>,
    gate: Arc<DeviceGate>,
) {
    let mut enrichments = JoinSet::new();
    loop {
        tokio::select! {
            found = listener.recv() => {
                let Some(found) = found else { break };
                let key = registry.on_announcement(&found).await;
                enrichments.spawn(enrich(
                    session.clone(),
                    key,
                    found.address,
                    registry.clone(),
                    gate.clone(),
                ));
            }
            Some(_) = enrichments.join_next(), if !enrichments.is_empty() => {}
        }
    }
}

fn first_text(read: &ReadAccessResult, property: PropertyId) -> Option<String> {
    read.values_of(property)?
        .first()
        .and_then(DataValue::as_str)
        .map(str::to_string)
}

async fn enrich<L: DataLink + 'static>(
    session: Session<L>,
    key: String,
    address: DataLinkAddress,
    registry: Arc<DeviceRegistry>,
    gate: Arc<DeviceGate>,
) {
    let Ok(_permit) = gate.acquire(&key).await else {
        return;
    };
    let read = session
        .client()
        .read_properties(
            address,
            ObjectId::device_wildcard(),
            &[PropertyId::ObjectName, PropertyId::Description],
        )
        .await;
    if !session.is_current() {
        log::debug!("dropping enrichment of {key} from stopped client #{}", session.generation());
        return;
    }
    match read {
        Ok(read) => {
            let name = first_text(&read, PropertyId::ObjectName);
            let description = first_text(&read, PropertyId::Description);
            log::debug!("enriched {key}: name={name:?} description={description:?}");
            registry.apply_enrichment(&key, name, description).await;
        }
        Err(err) => log::debug!("enrichment of {key} failed: {err}"),
    }
}
