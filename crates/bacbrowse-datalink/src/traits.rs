use std::future::Future;

use crate::DataLinkAddress;
use thiserror::Error;

/// Errors that can occur at the data-link layer.
#[derive(Debug, Error)]
pub enum DataLinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("frame too large")]
    FrameTooLarge,
    #[error("invalid frame")]
    InvalidFrame,
    #[error("unsupported BVLC function 0x{0:02x}")]
    UnsupportedBvlcFunction(u8),
    #[error("data link closed")]
    Closed,
}

/// Sends and receives NPDUs over some medium.
///
/// The returned futures are `Send` so a receive loop over any data link can
/// be handed to `tokio::spawn`.
pub trait DataLink: Send + Sync {
    /// Sends `payload` (an NPDU) to `address`. A broadcast address asks the
    /// link to deliver to every station on the local network.
    fn send(
        &self,
        address: DataLinkAddress,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), DataLinkError>> + Send;

    /// Receives one NPDU into `buf`, returning `(bytes_read, source_address)`.
    fn recv(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(usize, DataLinkAddress), DataLinkError>> + Send;
}
