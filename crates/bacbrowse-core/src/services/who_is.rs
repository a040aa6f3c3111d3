use crate::apdu::UnconfirmedRequestHeader;
use crate::encoding::{
    primitives::{decode_optional_ctx_unsigned, encode_ctx_unsigned},
    reader::Reader,
    writer::Writer,
};
use crate::DecodeError;

pub const SERVICE_WHO_IS: u8 = 0x08;

/// Who-Is, optionally limited to a device instance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WhoIsRequest {
    pub low_limit: Option<u32>,
    pub high_limit: Option<u32>,
}

impl WhoIsRequest {
    pub const fn global() -> Self {
        Self {
            low_limit: None,
            high_limit: None,
        }
    }

    pub const fn range(low: u32, high: u32) -> Self {
        Self {
            low_limit: Some(low),
            high_limit: Some(high),
        }
    }

    /// Whether a device with `instance` should answer.
    pub fn matches(&self, instance: u32) -> bool {
        match (self.low_limit, self.high_limit) {
            (Some(low), Some(high)) => (low..=high).contains(&instance),
            _ => true,
        }
    }

    /// Limits are only sent as a pair.
    pub fn encode(&self, w: &mut Writer) {
        UnconfirmedRequestHeader {
            service_choice: SERVICE_WHO_IS,
        }
        .encode(w);
        if let (Some(low), Some(high)) = (self.low_limit, self.high_limit) {
            encode_ctx_unsigned(w, 0, low);
            encode_ctx_unsigned(w, 1, high);
        }
    }

    pub fn decode_after_header(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let low_limit = decode_optional_ctx_unsigned(r, 0)?;
        let high_limit = decode_optional_ctx_unsigned(r, 1)?;
        if low_limit.is_some() != high_limit.is_some() {
            return Err(DecodeError::Message("who-is limits must be paired"));
        }
        Ok(Self {
            low_limit,
            high_limit,
        })
    }
}
