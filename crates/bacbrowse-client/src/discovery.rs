use bacbrowse_core::services::i_am::IAmRequest;
use bacbrowse_core::types::ObjectId;
use bacbrowse_datalink::DataLinkAddress;
use tokio::sync::mpsc;

/// A device that announced itself with I-Am.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: DataLinkAddress,
    pub device_id: ObjectId,
    pub max_apdu: u32,
    pub segmentation: u32,
    pub vendor_id: u32,
}

impl DiscoveredDevice {
    pub(crate) fn from_i_am(address: DataLinkAddress, i_am: IAmRequest) -> Self {
        Self {
            address,
            device_id: i_am.device_id,
            max_apdu: i_am.max_apdu,
            segmentation: i_am.segmentation,
            vendor_id: i_am.vendor_id,
        }
    }
}

/// Receiving end for I-Am announcements seen by a client's receive task.
///
/// Every I-Am is delivered, including repeats from the same device.
/// [`recv`](Self::recv) returns `None` once the client has shut down.
#[derive(Debug)]
pub struct DiscoveryListener {
    rx: mpsc::UnboundedReceiver<DiscoveredDevice>,
}

impl DiscoveryListener {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<DiscoveredDevice>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<DiscoveredDevice> {
        self.rx.recv().await
    }
}
