use bacbrowse_core::encoding::{reader::Reader, writer::Writer};
use bacbrowse_core::DecodeError;

use crate::DataLinkError;

pub const BVLC_TYPE_BIP: u8 = 0x81;
pub const BVLC_HEADER_LEN: usize = 4;

/// BVLC functions a non-BBMD node sends or has to understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BvlcFunction {
    Result,
    ForwardedNpdu,
    DistributeBroadcastToNetwork,
    OriginalUnicastNpdu,
    OriginalBroadcastNpdu,
    Other(u8),
}

impl BvlcFunction {
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0x00 => Self::Result,
            0x04 => Self::ForwardedNpdu,
            0x09 => Self::DistributeBroadcastToNetwork,
            0x0A => Self::OriginalUnicastNpdu,
            0x0B => Self::OriginalBroadcastNpdu,
            v => Self::Other(v),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Result => 0x00,
            Self::ForwardedNpdu => 0x04,
            Self::DistributeBroadcastToNetwork => 0x09,
            Self::OriginalUnicastNpdu => 0x0A,
            Self::OriginalBroadcastNpdu => 0x0B,
            Self::Other(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BvlcHeader {
    pub function: BvlcFunction,
    /// Total frame length, header included.
    pub length: u16,
}

impl BvlcHeader {
    pub fn encode(&self, w: &mut Writer) {
        w.write_u8(BVLC_TYPE_BIP);
        w.write_u8(self.function.to_u8());
        w.write_be_u16(self.length);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        if r.read_u8()? != BVLC_TYPE_BIP {
            return Err(DecodeError::InvalidValue);
        }
        let function = BvlcFunction::from_u8(r.read_u8()?);
        let length = r.read_be_u16()?;
        if (length as usize) < BVLC_HEADER_LEN {
            return Err(DecodeError::InvalidLength);
        }
        Ok(Self { function, length })
    }
}

/// Wraps `payload` in a BVLC header.
pub fn encode_frame(function: BvlcFunction, payload: &[u8]) -> Result<Vec<u8>, DataLinkError> {
    let length = u16::try_from(BVLC_HEADER_LEN + payload.len())
        .map_err(|_| DataLinkError::FrameTooLarge)?;
    let mut w = Writer::with_capacity(length as usize);
    BvlcHeader { function, length }.encode(&mut w);
    w.write_all(payload);
    Ok(w.into_bytes())
}

/// Splits a datagram into its header and the body the header's length
/// covers. Trailing octets past that length are ignored.
pub fn decode_frame(datagram: &[u8]) -> Result<(BvlcHeader, &[u8]), DataLinkError> {
    let mut r = Reader::new(datagram);
    let header = BvlcHeader::decode(&mut r).map_err(|_| DataLinkError::InvalidFrame)?;
    let body = r
        .read_exact(header.length as usize - BVLC_HEADER_LEN)
        .map_err(|_| DataLinkError::InvalidFrame)?;
    Ok((header, body))
}

#[cfg(test)]
mod tests {
    use super::{decode_frame, encode_frame, BvlcFunction, BVLC_TYPE_BIP};
    use crate::DataLinkError;

    #[test]
    fn frame_carries_total_length() {
        let frame = encode_frame(BvlcFunction::OriginalBroadcastNpdu, &[0x01, 0x00, 0x10, 0x08])
            .unwrap();
        assert_eq!(
            frame,
            [BVLC_TYPE_BIP, 0x0B, 0x00, 0x08, 0x01, 0x00, 0x10, 0x08]
        );
        let (header, body) = decode_frame(&frame).unwrap();
        assert_eq!(header.function, BvlcFunction::OriginalBroadcastNpdu);
        assert_eq!(body, &[0x01, 0x00, 0x10, 0x08]);
    }

    #[test]
    fn short_or_foreign_frames_are_invalid() {
        assert!(matches!(
            decode_frame(&[0x81, 0x0A, 0x00, 0x09, 0x01]),
            Err(DataLinkError::InvalidFrame)
        ));
        assert!(matches!(
            decode_frame(&[0x82, 0x0A, 0x00, 0x04]),
            Err(DataLinkError::InvalidFrame)
        ));
        assert!(matches!(
            decode_frame(&[0x81, 0x0A, 0x00, 0x02]),
            Err(DataLinkError::InvalidFrame)
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = vec![0u8; usize::from(u16::MAX)];
        assert!(matches!(
            encode_frame(BvlcFunction::OriginalUnicastNpdu, &payload),
            Err(DataLinkError::FrameTooLarge)
        ));
    }
}
