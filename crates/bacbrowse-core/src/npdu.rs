use crate::encoding::{reader::Reader, writer::Writer};
use crate::DecodeError;

pub const NPDU_VERSION: u8 = 0x01;

const CTRL_NETWORK_MESSAGE: u8 = 0x80;
const CTRL_DESTINATION: u8 = 0x20;
const CTRL_SOURCE: u8 = 0x08;
const CTRL_EXPECTING_REPLY: u8 = 0x04;
const CTRL_PRIORITY: u8 = 0x03;
const DEFAULT_HOP_COUNT: u8 = 255;

/// Network number plus MAC address of a remote station. An empty `mac`
/// in a destination means broadcast on that network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpduAddress {
    pub network: u16,
    pub mac: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npdu {
    pub expecting_reply: bool,
    pub priority: u8,
    pub destination: Option<NpduAddress>,
    pub source: Option<NpduAddress>,
    pub hop_count: u8,
    /// Network layer message type, present only for network messages.
    pub message_type: Option<u8>,
}

impl Npdu {
    /// Header for an APDU addressed to the local network.
    pub const fn local(expecting_reply: bool) -> Self {
        Self {
            expecting_reply,
            priority: 0,
            destination: None,
            source: None,
            hop_count: DEFAULT_HOP_COUNT,
            message_type: None,
        }
    }

    pub const fn is_network_message(&self) -> bool {
        self.message_type.is_some()
    }

    fn control(&self) -> u8 {
        let mut c = self.priority & CTRL_PRIORITY;
        if self.message_type.is_some() {
            c |= CTRL_NETWORK_MESSAGE;
        }
        if self.destination.is_some() {
            c |= CTRL_DESTINATION;
        }
        if self.source.is_some() {
            c |= CTRL_SOURCE;
        }
        if self.expecting_reply {
            c |= CTRL_EXPECTING_REPLY;
        }
        c
    }

    pub fn encode(&self, w: &mut Writer) {
        w.write_u8(NPDU_VERSION);
        w.write_u8(self.control());
        if let Some(dest) = &self.destination {
            write_address(w, dest);
        }
        if let Some(src) = &self.source {
            write_address(w, src);
        }
        if self.destination.is_some() {
            w.write_u8(self.hop_count);
        }
        if let Some(t) = self.message_type {
            w.write_u8(t);
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if r.read_u8()? != NPDU_VERSION {
            return Err(DecodeError::Message("unsupported NPDU version"));
        }
        let control = r.read_u8()?;

        let destination = if control & CTRL_DESTINATION != 0 {
            Some(read_address(r)?)
        } else {
            None
        };
        let source = if control & CTRL_SOURCE != 0 {
            let src = read_address(r)?;
            // SNET 0xFFFF and SLEN 0 are both invalid for a source.
            if src.network == 0xFFFF || src.mac.is_empty() {
                return Err(DecodeError::InvalidValue);
            }
            Some(src)
        } else {
            None
        };
        let hop_count = if destination.is_some() {
            r.read_u8()?
        } else {
            DEFAULT_HOP_COUNT
        };
        let message_type = if control & CTRL_NETWORK_MESSAGE != 0 {
            let t = r.read_u8()?;
            if t >= 0x80 {
                // Proprietary message types carry a vendor id.
                r.read_be_u16()?;
            }
            Some(t)
        } else {
            None
        };

        Ok(Self {
            expecting_reply: control & CTRL_EXPECTING_REPLY != 0,
            priority: control & CTRL_PRIORITY,
            destination,
            source,
            hop_count,
            message_type,
        })
    }
}

fn write_address(w: &mut Writer, addr: &NpduAddress) {
    w.write_be_u16(addr.network);
    w.write_u8(addr.mac.len().min(u8::MAX as usize) as u8);
    w.write_all(&addr.mac[..addr.mac.len().min(u8::MAX as usize)]);
}

fn read_address(r: &mut Reader<'_>) -> Result<NpduAddress, DecodeError> {
    let network = r.read_be_u16()?;
    let len = r.read_u8()? as usize;
    let mac = r.read_exact(len)?.to_vec();
    Ok(NpduAddress { network, mac })
}
