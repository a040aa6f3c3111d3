//! Async BACnet client used by the bacbrowse engine.
//!
//! A [`BacnetClient`] owns one data link and a background receive task. The
//! task routes I-Am announcements to a [`DiscoveryListener`] and responses to
//! the request that is waiting for them, so discovery and property reads can
//! share a single socket.

pub mod client;
pub mod discovery;
mod dispatch;
pub mod error;
pub mod simulator;

pub use bacbrowse_core::services::read_property_multiple::{
    PropertyAccessError, ReadAccessResult, ReadAccessSpec, ReadResult,
};
pub use bacbrowse_core::services::who_is::WhoIsRequest;
pub use client::BacnetClient;
pub use discovery::{DiscoveredDevice, DiscoveryListener};
pub use error::ClientError;
pub use simulator::SimulatedDevice;
