use crate::apdu::{read_type, ApduType};
use crate::encoding::{
    primitives::{decode_unsigned, encode_app_enumerated},
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::DecodeError;

const FLAG_SEGMENTED: u8 = 0x08;
const FLAG_MORE_FOLLOWS: u8 = 0x04;
const FLAG_SEGMENTED_RESPONSE_ACCEPTED: u8 = 0x02;
const FLAG_NAK: u8 = 0x02;
const FLAG_SERVER: u8 = 0x01;

/// Header of an unsegmented confirmed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedRequestHeader {
    pub segmented_response_accepted: bool,
    /// Max-segments code, upper three bits of the second octet.
    pub max_segments: u8,
    /// Max-APDU code, see [`max_apdu_octets`](crate::apdu::max_apdu_octets).
    pub max_apdu: u8,
    pub invoke_id: u8,
    pub service_choice: u8,
}

impl ConfirmedRequestHeader {
    pub fn encode(&self, w: &mut Writer) {
        let mut b0 = (ApduType::ConfirmedRequest as u8) << 4;
        if self.segmented_response_accepted {
            b0 |= FLAG_SEGMENTED_RESPONSE_ACCEPTED;
        }
        w.write_u8(b0);
        w.write_u8(((self.max_segments & 0x07) << 4) | (self.max_apdu & 0x0F));
        w.write_u8(self.invoke_id);
        w.write_u8(self.service_choice);
    }

    /// Segmented requests are refused with [`DecodeError::Unsupported`].
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let flags = read_type(r, ApduType::ConfirmedRequest)?;
        if flags & FLAG_SEGMENTED != 0 {
            return Err(DecodeError::Unsupported);
        }
        let limits = r.read_u8()?;
        Ok(Self {
            segmented_response_accepted: flags & FLAG_SEGMENTED_RESPONSE_ACCEPTED != 0,
            max_segments: (limits >> 4) & 0x07,
            max_apdu: limits & 0x0F,
            invoke_id: r.read_u8()?,
            service_choice: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexAckHeader {
    pub segmented: bool,
    pub more_follows: bool,
    pub invoke_id: u8,
    /// Present only when `segmented` is set.
    pub sequence_number: Option<u8>,
    pub proposed_window_size: Option<u8>,
    pub service_choice: u8,
}

impl ComplexAckHeader {
    pub const fn unsegmented(invoke_id: u8, service_choice: u8) -> Self {
        Self {
            segmented: false,
            more_follows: false,
            invoke_id,
            sequence_number: None,
            proposed_window_size: None,
            service_choice,
        }
    }

    pub fn encode(&self, w: &mut Writer) {
        let mut b0 = (ApduType::ComplexAck as u8) << 4;
        if self.segmented {
            b0 |= FLAG_SEGMENTED;
        }
        if self.more_follows {
            b0 |= FLAG_MORE_FOLLOWS;
        }
        w.write_u8(b0);
        w.write_u8(self.invoke_id);
        if self.segmented {
            w.write_u8(self.sequence_number.unwrap_or(0));
            w.write_u8(self.proposed_window_size.unwrap_or(1));
        }
        w.write_u8(self.service_choice);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let flags = read_type(r, ApduType::ComplexAck)?;
        let segmented = flags & FLAG_SEGMENTED != 0;
        let invoke_id = r.read_u8()?;
        let (sequence_number, proposed_window_size) = if segmented {
            (Some(r.read_u8()?), Some(r.read_u8()?))
        } else {
            (None, None)
        };
        Ok(Self {
            segmented,
            more_follows: flags & FLAG_MORE_FOLLOWS != 0,
            invoke_id,
            sequence_number,
            proposed_window_size,
            service_choice: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentAck {
    pub negative_ack: bool,
    pub sent_by_server: bool,
    pub invoke_id: u8,
    pub sequence_number: u8,
    pub actual_window_size: u8,
}

impl SegmentAck {
    pub fn encode(&self, w: &mut Writer) {
        let mut b0 = (ApduType::SegmentAck as u8) << 4;
        if self.negative_ack {
            b0 |= FLAG_NAK;
        }
        if self.sent_by_server {
            b0 |= FLAG_SERVER;
        }
        w.write_all(&[
            b0,
            self.invoke_id,
            self.sequence_number,
            self.actual_window_size,
        ]);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let flags = read_type(r, ApduType::SegmentAck)?;
        Ok(Self {
            negative_ack: flags & FLAG_NAK != 0,
            sent_by_server: flags & FLAG_SERVER != 0,
            invoke_id: r.read_u8()?,
            sequence_number: r.read_u8()?,
            actual_window_size: r.read_u8()?,
        })
    }
}

/// Error-PDU with its error class and code. Either may be missing when the
/// peer sends a truncated or non-standard body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPdu {
    pub invoke_id: u8,
    pub service_choice: u8,
    pub error_class: Option<u32>,
    pub error_code: Option<u32>,
}

impl ErrorPdu {
    pub fn encode(&self, w: &mut Writer) {
        w.write_u8((ApduType::Error as u8) << 4);
        w.write_u8(self.invoke_id);
        w.write_u8(self.service_choice);
        if let (Some(class), Some(code)) = (self.error_class, self.error_code) {
            encode_app_enumerated(w, class);
            encode_app_enumerated(w, code);
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        read_type(r, ApduType::Error)?;
        let invoke_id = r.read_u8()?;
        let service_choice = r.read_u8()?;
        let (error_class, error_code) = if r.is_empty() {
            (None, None)
        } else if r.peek_tag()? == (Tag::Opening { tag_num: 0 }) {
            // Some services wrap the error in [0] (e.g. WritePropertyMultiple).
            r.expect_opening(0)?;
            let pair = read_class_and_code(r)?;
            r.expect_closing(0)?;
            pair
        } else {
            read_class_and_code(r)?
        };
        Ok(Self {
            invoke_id,
            service_choice,
            error_class,
            error_code,
        })
    }
}

fn read_class_and_code(r: &mut Reader<'_>) -> Result<(Option<u32>, Option<u32>), DecodeError> {
    let class = read_error_field(r, 0)?;
    let code = read_error_field(r, 1)?;
    Ok((Some(class), Some(code)))
}

fn read_error_field(r: &mut Reader<'_>, ctx_tag: u8) -> Result<u32, DecodeError> {
    match r.read_tag()? {
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        } => decode_unsigned(r, len as usize),
        Tag::Context { tag_num, len } if tag_num == ctx_tag => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectPdu {
    pub invoke_id: u8,
    pub reason: u8,
}

impl RejectPdu {
    pub fn encode(&self, w: &mut Writer) {
        w.write_all(&[(ApduType::Reject as u8) << 4, self.invoke_id, self.reason]);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        read_type(r, ApduType::Reject)?;
        Ok(Self {
            invoke_id: r.read_u8()?,
            reason: r.read_u8()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortPdu {
    pub server: bool,
    pub invoke_id: u8,
    pub reason: u8,
}

impl AbortPdu {
    pub fn encode(&self, w: &mut Writer) {
        let mut b0 = (ApduType::Abort as u8) << 4;
        if self.server {
            b0 |= FLAG_SERVER;
        }
        w.write_all(&[b0, self.invoke_id, self.reason]);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let flags = read_type(r, ApduType::Abort)?;
        Ok(Self {
            server: flags & FLAG_SERVER != 0,
            invoke_id: r.read_u8()?,
            reason: r.read_u8()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_request_header_layout() {
        let header = ConfirmedRequestHeader {
            segmented_response_accepted: true,
            max_segments: 0,
            max_apdu: 5,
            invoke_id: 9,
            service_choice: 0x0E,
        };
        let mut w = Writer::new();
        header.encode(&mut w);
        assert_eq!(w.as_written(), &[0x02, 0x05, 0x09, 0x0E]);
        let mut r = Reader::new(w.as_written());
        assert_eq!(ConfirmedRequestHeader::decode(&mut r).unwrap(), header);
    }

    #[test]
    fn segmented_confirmed_request_is_refused() {
        let mut r = Reader::new(&[0x0A, 0x05, 0x01, 0x00, 0x01, 0x0E]);
        assert_eq!(
            ConfirmedRequestHeader::decode(&mut r),
            Err(DecodeError::Unsupported)
        );
    }

    #[test]
    fn segmented_complex_ack_carries_sequence() {
        let header = ComplexAckHeader {
            segmented: true,
            more_follows: true,
            invoke_id: 4,
            sequence_number: Some(2),
            proposed_window_size: Some(1),
            service_choice: 0x0E,
        };
        let mut w = Writer::new();
        header.encode(&mut w);
        assert_eq!(w.as_written(), &[0x3C, 0x04, 0x02, 0x01, 0x0E]);
        let mut r = Reader::new(w.as_written());
        assert_eq!(ComplexAckHeader::decode(&mut r).unwrap(), header);
    }

    #[test]
    fn error_pdu_plain_and_wrapped() {
        let plain = [0x50, 0x01, 0x0E, 0x91, 0x02, 0x91, 0x20];
        let err = ErrorPdu::decode(&mut Reader::new(&plain)).unwrap();
        assert_eq!(err.error_class, Some(2));
        assert_eq!(err.error_code, Some(32));

        let wrapped = [0x50, 0x01, 0x10, 0x0E, 0x09, 0x01, 0x19, 0x1F, 0x0F];
        let err = ErrorPdu::decode(&mut Reader::new(&wrapped)).unwrap();
        assert_eq!(err.error_class, Some(1));
        assert_eq!(err.error_code, Some(31));

        let bare = [0x50, 0x07, 0x0E];
        let err = ErrorPdu::decode(&mut Reader::new(&bare)).unwrap();
        assert_eq!(err.error_class, None);
    }

    #[test]
    fn error_pdu_encodes_enumerated_pair() {
        let mut w = Writer::new();
        ErrorPdu {
            invoke_id: 1,
            service_choice: 0x0E,
            error_class: Some(2),
            error_code: Some(32),
        }
        .encode(&mut w);
        assert_eq!(w.as_written(), &[0x50, 0x01, 0x0E, 0x91, 0x02, 0x91, 0x20]);
    }

    #[test]
    fn abort_and_segment_ack_flags() {
        let abort = AbortPdu::decode(&mut Reader::new(&[0x71, 0x03, 0x04])).unwrap();
        assert!(abort.server);
        assert_eq!(abort.reason, 4);

        let ack = SegmentAck {
            negative_ack: true,
            sent_by_server: false,
            invoke_id: 3,
            sequence_number: 1,
            actual_window_size: 1,
        };
        let mut w = Writer::new();
        ack.encode(&mut w);
        assert_eq!(w.as_written(), &[0x42, 0x03, 0x01, 0x01]);
        assert_eq!(SegmentAck::decode(&mut Reader::new(w.as_written())).unwrap(), ack);
    }
}
