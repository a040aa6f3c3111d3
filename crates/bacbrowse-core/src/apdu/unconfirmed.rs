use crate::apdu::{read_type, ApduType};
use crate::encoding::{reader::Reader, writer::Writer};
use crate::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnconfirmedRequestHeader {
    pub service_choice: u8,
}

impl UnconfirmedRequestHeader {
    pub fn encode(&self, w: &mut Writer) {
        w.write_u8((ApduType::UnconfirmedRequest as u8) << 4);
        w.write_u8(self.service_choice);
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        read_type(r, ApduType::UnconfirmedRequest)?;
        Ok(Self {
            service_choice: r.read_u8()?,
        })
    }
}
