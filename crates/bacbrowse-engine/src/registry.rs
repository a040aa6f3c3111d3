//! Devices seen on the network, keyed by `"<ip>:<device instance>"`.

use std::net::SocketAddr;

use bacbrowse_client::DiscoveredDevice;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub key: String,
    /// Where requests for this device are sent.
    pub network_address: SocketAddr,
    pub device_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub max_apdu: u32,
    pub segmentation: u32,
    pub vendor_id: u32,
}

impl Device {
    pub fn key_for(address: SocketAddr, device_id: u32) -> String {
        format!("{}:{device_id}", address.ip())
    }
}

/// Insertion-ordered device map. The lock is never held across network I/O.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<IndexMap<String, Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the announcing device or refreshes its I-Am metadata, and
    /// returns its key. Name and description are left alone.
    pub async fn on_announcement(&self, found: &DiscoveredDevice) -> String {
        let address = found.address.as_socket_addr();
        let device_id = found.device_id.instance();
        let key = Device::key_for(address, device_id);

        let mut devices = self.devices.write().await;
        match devices.get_mut(&key) {
            Some(device) => {
                device.network_address = address;
                device.max_apdu = found.max_apdu;
                device.segmentation = found.segmentation;
                device.vendor_id = found.vendor_id;
            }
            None => {
                log::debug!("new device {key}");
                devices.insert(
                    key.clone(),
                    Device {
                        key: key.clone(),
                        network_address: address,
                        device_id,
                        name: None,
                        description: None,
                        max_apdu: found.max_apdu,
                        segmentation: found.segmentation,
                        vendor_id: found.vendor_id,
                    },
                );
            }
        }
        key
    }

    /// Overwrites only the fields that were actually read. Returns false when
    /// the device has been cleared in the meantime.
    pub async fn apply_enrichment(
        &self,
        key: &str,
        name: Option<String>,
        description: Option<String>,
    ) -> bool {
        let mut devices = self.devices.write().await;
        let Some(device) = devices.get_mut(key) else {
            return false;
        };
        if name.is_some() {
            device.name = name;
        }
        if description.is_some() {
            device.description = description;
        }
        true
    }

    pub async fn list(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn get(&self, key: &str) -> Option<Device> {
        self.devices.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn clear(&self) {
        self.devices.write().await.clear();
    }
}
