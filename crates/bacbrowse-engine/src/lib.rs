//! Discovery and property-browsing engine for BACnet/IP networks.
//!
//! [`Browser`] owns one active [`BacnetClient`](bacbrowse_client::BacnetClient)
//! at a time, keeps a registry of every device that announced itself, and
//! resolves a device's objects and properties on demand:
//!
//! ```no_run
//! # async fn demo() -> Result<(), bacbrowse_engine::BrowseError> {
//! use bacbrowse_engine::{Browser, JsonFileStore};
//!
//! let browser = Browser::udp(JsonFileStore::new("settings.json")).await?;
//! browser.start().await?;
//! browser.trigger_scan().await?;
//! for device in browser.devices().await {
//!     let objects = browser.list_objects(&device.key).await?;
//!     println!("{}: {} objects", device.key, objects.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
mod gate;
pub mod interfaces;
pub mod lifecycle;
pub mod registry;

pub use browser::{BacnetObject, ObjectKey};
pub use config::{ClientConfig, ConfigPatch, JsonFileStore, MemoryStore, SettingsStore};
pub use decoder::{Property, PropertyValue};
pub use engine::Browser;
pub use error::{BrowseError, PersistenceError};
pub use interfaces::{InterfaceCatalog, NetworkInterface};
pub use lifecycle::{ClientLifecycle, Connector, Session, UdpConnector};
pub use registry::{Device, DeviceRegistry};
