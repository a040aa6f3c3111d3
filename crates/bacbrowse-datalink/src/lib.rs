//! Data-link layer for bacbrowse: the [`DataLink`] trait and its BACnet/IP
//! implementation.

pub mod address;
pub mod bip;
pub mod traits;

pub use address::DataLinkAddress;
pub use bip::transport::BacnetIpTransport;
pub use traits::{DataLink, DataLinkError};
