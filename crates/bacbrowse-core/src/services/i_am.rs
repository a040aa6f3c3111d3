use crate::apdu::UnconfirmedRequestHeader;
use crate::encoding::{
    primitives::{
        decode_app_enumerated, decode_app_object_id, decode_app_unsigned, encode_app_enumerated,
        encode_app_object_id, encode_app_unsigned,
    },
    reader::Reader,
    writer::Writer,
};
use crate::types::{ObjectId, ObjectType};
use crate::DecodeError;

pub const SERVICE_I_AM: u8 = 0x00;

/// Segmentation support advertised in I-Am (BACnetSegmentation).
pub mod segmentation {
    pub const BOTH: u32 = 0;
    pub const TRANSMIT: u32 = 1;
    pub const RECEIVE: u32 = 2;
    pub const NONE: u32 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IAmRequest {
    pub device_id: ObjectId,
    pub max_apdu: u32,
    pub segmentation: u32,
    pub vendor_id: u32,
}

impl IAmRequest {
    pub fn encode(&self, w: &mut Writer) {
        UnconfirmedRequestHeader {
            service_choice: SERVICE_I_AM,
        }
        .encode(w);
        encode_app_object_id(w, self.device_id);
        encode_app_unsigned(w, self.max_apdu);
        encode_app_enumerated(w, self.segmentation);
        encode_app_unsigned(w, self.vendor_id);
    }

    /// The announced identifier must name a Device object.
    pub fn decode_after_header(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let device_id = decode_app_object_id(r)?;
        if device_id.object_type() != ObjectType::Device {
            return Err(DecodeError::Message("i-am identifier is not a device"));
        }
        Ok(Self {
            device_id,
            max_apdu: decode_app_unsigned(r)?,
            segmentation: decode_app_enumerated(r)?,
            vendor_id: decode_app_unsigned(r)?,
        })
    }
}
