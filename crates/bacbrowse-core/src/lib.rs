//! BACnet wire encoding for bacbrowse.
//!
//! `bacbrowse-core` covers the slice of the protocol a discovery and browsing
//! client needs: the tag system and primitive codecs, the NPDU header, APDU
//! headers, and the Who-Is, I-Am and ReadPropertyMultiple services. Decoded
//! values are owned so they can outlive the receive buffer and cross task
//! boundaries.
//!
//! # Feature flags
//!
//! - **`serde`** — derives `Serialize` on value and identifier types.

/// APDU headers for confirmed/unconfirmed requests and their responses.
pub mod apdu;
/// Tag system, primitive codecs and the byte reader/writer.
pub mod encoding;
/// Error types for encoding and decoding.
pub mod error;
/// NPDU (network layer) header.
pub mod npdu;
/// Service payload codecs.
pub mod services;
/// Object identifiers, property identifiers and data values.
pub mod types;

pub use error::{DecodeError, EncodeError};
