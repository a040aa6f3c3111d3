/// Confirmed-service request header and the responses it can draw.
pub mod confirmed;
/// Unconfirmed-service request header.
pub mod unconfirmed;

pub use confirmed::{
    AbortPdu, ComplexAckHeader, ConfirmedRequestHeader, ErrorPdu, RejectPdu, SegmentAck,
};
pub use unconfirmed::UnconfirmedRequestHeader;

use crate::encoding::reader::Reader;
use crate::DecodeError;

/// PDU type carried in the upper nibble of the first APDU octet.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApduType {
    ConfirmedRequest = 0,
    UnconfirmedRequest = 1,
    SimpleAck = 2,
    ComplexAck = 3,
    SegmentAck = 4,
    Error = 5,
    Reject = 6,
    Abort = 7,
}

impl ApduType {
    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::ConfirmedRequest,
            1 => Self::UnconfirmedRequest,
            2 => Self::SimpleAck,
            3 => Self::ComplexAck,
            4 => Self::SegmentAck,
            5 => Self::Error,
            6 => Self::Reject,
            7 => Self::Abort,
            _ => return None,
        })
    }

    /// Classifies an APDU by its first octet without consuming anything.
    pub fn of(apdu: &[u8]) -> Option<Self> {
        apdu.first().and_then(|b| Self::from_u8(b >> 4))
    }
}

/// Octet limit for a max-APDU code (clause 20.1.2.5).
pub const fn max_apdu_octets(code: u8) -> usize {
    match code & 0x0F {
        0 => 50,
        1 => 128,
        2 => 206,
        3 => 480,
        4 => 1024,
        _ => 1476,
    }
}

/// Consumes the first octet and checks its PDU type; returns the flag bits.
pub(crate) fn read_type(r: &mut Reader<'_>, expected: ApduType) -> Result<u8, DecodeError> {
    let b0 = r.read_u8()?;
    if b0 >> 4 != expected as u8 {
        return Err(DecodeError::InvalidValue);
    }
    Ok(b0 & 0x0F)
}
