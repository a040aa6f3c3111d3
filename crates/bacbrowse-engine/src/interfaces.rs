//! Host network interfaces a client can be bound to.

use std::net::Ipv4Addr;

use serde::Serialize;

const DEFAULT_INTERFACE_NAME: &str = "Default";

/// An IPv4 interface. The synthetic `"Default"` entry has neither address nor
/// broadcast address and leaves the choice to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Ipv4Addr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_address: Option<Ipv4Addr>,
}

impl NetworkInterface {
    pub fn default_entry() -> Self {
        Self {
            name: DEFAULT_INTERFACE_NAME.into(),
            address: None,
            broadcast_address: None,
        }
    }

    /// An interface with its broadcast address computed from `netmask`.
    pub fn ipv4(name: impl Into<String>, address: Ipv4Addr, netmask: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            address: Some(address),
            broadcast_address: Some(broadcast_of(address, netmask)),
        }
    }
}

pub fn broadcast_of(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) | !u32::from(netmask))
}

/// Interfaces enumerated once; index 0 is always the default entry.
#[derive(Debug, Clone)]
pub struct InterfaceCatalog {
    entries: Vec<NetworkInterface>,
}

impl InterfaceCatalog {
    /// Enumerates non-loopback IPv4 interfaces of this host. Enumeration
    /// failure leaves only the default entry.
    pub fn from_host() -> Self {
        let found = match if_addrs::get_if_addrs() {
            Ok(ifaces) => ifaces
                .into_iter()
                .filter(|iface| !iface.is_loopback())
                .filter_map(|iface| match iface.addr {
                    if_addrs::IfAddr::V4(v4) => {
                        Some(NetworkInterface::ipv4(iface.name, v4.ip, v4.netmask))
                    }
                    _ => None,
                })
                .collect(),
            Err(err) => {
                log::warn!("failed to enumerate network interfaces: {err}");
                Vec::new()
            }
        };
        Self::from_entries(found)
    }

    /// Catalog over an explicit interface list; the default entry is
    /// prepended.
    pub fn from_entries(entries: impl IntoIterator<Item = NetworkInterface>) -> Self {
        let mut all = vec![NetworkInterface::default_entry()];
        all.extend(entries);
        Self { entries: all }
    }

    pub fn list(&self) -> &[NetworkInterface] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&NetworkInterface> {
        self.entries.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_is_address_or_inverted_mask() {
        let iface = NetworkInterface::ipv4(
            "eth0",
            Ipv4Addr::new(192, 168, 10, 37),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert_eq!(iface.broadcast_address, Some(Ipv4Addr::new(192, 168, 10, 255)));
        assert_eq!(
            broadcast_of(Ipv4Addr::new(10, 1, 2, 3), Ipv4Addr::new(255, 255, 240, 0)),
            Ipv4Addr::new(10, 1, 15, 255)
        );
    }

    #[test]
    fn default_entry_is_always_first() {
        let catalog = InterfaceCatalog::from_entries([NetworkInterface::ipv4(
            "eth0",
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(255, 0, 0, 0),
        )]);
        assert_eq!(catalog.list().len(), 2);
        assert_eq!(catalog.get(0), Some(&NetworkInterface::default_entry()));
        assert_eq!(catalog.get(1).and_then(|i| i.address), Some(Ipv4Addr::new(10, 0, 0, 2)));
        assert!(catalog.get(2).is_none());

        let host = InterfaceCatalog::from_host();
        assert_eq!(host.list()[0].name, "Default");
        assert!(host.list()[1..].iter().all(|i| i.address.is_some()));
    }

    #[test]
    fn default_entry_serializes_without_addresses() {
        let json = serde_json::to_value(NetworkInterface::default_entry()).unwrap();
        assert_eq!(json, serde_json::json!({ "name": "Default" }));
        let json = serde_json::to_value(NetworkInterface::ipv4(
            "eth0",
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(255, 255, 255, 0),
        ))
        .unwrap();
        assert_eq!(json["broadcastAddress"], "10.0.0.255");
    }
}
