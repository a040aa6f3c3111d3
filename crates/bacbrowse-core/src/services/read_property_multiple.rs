use crate::apdu::ConfirmedRequestHeader;
use crate::encoding::{
    primitives::{
        decode_ctx_object_id, decode_ctx_unsigned, decode_optional_ctx_unsigned, decode_unsigned,
        encode_app_enumerated, encode_ctx_object_id, encode_ctx_unsigned,
    },
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::services::value_codec::{decode_values_until, encode_value};
use crate::types::{DataValue, ObjectId, PropertyId};
use crate::{DecodeError, EncodeError};

pub const SERVICE_READ_PROPERTY_MULTIPLE: u8 = 0x0E;

/// Max-APDU code advertised in requests (1476 octets).
const REQUEST_MAX_APDU: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyReference {
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
}

impl PropertyReference {
    pub const fn new(property_id: PropertyId) -> Self {
        Self {
            property_id,
            array_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAccessSpec {
    pub object_id: ObjectId,
    pub properties: Vec<PropertyReference>,
}

impl ReadAccessSpec {
    pub fn new(object_id: ObjectId, properties: &[PropertyId]) -> Self {
        Self {
            object_id,
            properties: properties.iter().copied().map(PropertyReference::new).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPropertyMultipleRequest {
    pub invoke_id: u8,
    pub specs: Vec<ReadAccessSpec>,
}

impl ReadPropertyMultipleRequest {
    pub fn encode(&self, w: &mut Writer) {
        ConfirmedRequestHeader {
            segmented_response_accepted: true,
            max_segments: 0,
            max_apdu: REQUEST_MAX_APDU,
            invoke_id: self.invoke_id,
            service_choice: SERVICE_READ_PROPERTY_MULTIPLE,
        }
        .encode(w);

        for spec in &self.specs {
            encode_ctx_object_id(w, 0, spec.object_id);
            Tag::Opening { tag_num: 1 }.encode(w);
            for prop in &spec.properties {
                encode_ctx_unsigned(w, 0, prop.property_id.number());
                if let Some(idx) = prop.array_index {
                    encode_ctx_unsigned(w, 1, idx);
                }
            }
            Tag::Closing { tag_num: 1 }.encode(w);
        }
    }

    /// Decodes the service body following a [`ConfirmedRequestHeader`].
    pub fn decode_after_header(r: &mut Reader<'_>) -> Result<Vec<ReadAccessSpec>, DecodeError> {
        let mut specs = Vec::new();
        while !r.is_empty() {
            let object_id = decode_ctx_object_id(r, 0)?;
            r.expect_opening(1)?;
            let mut properties = Vec::new();
            while !r.at_closing(1) {
                let property_id = PropertyId::from_number(decode_ctx_unsigned(r, 0)?);
                let array_index = decode_optional_ctx_unsigned(r, 1)?;
                properties.push(PropertyReference {
                    property_id,
                    array_index,
                });
            }
            r.expect_closing(1)?;
            specs.push(ReadAccessSpec {
                object_id,
                properties,
            });
        }
        Ok(specs)
    }
}

/// Per-property failure reported inside an otherwise successful ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAccessError {
    pub error_class: u32,
    pub error_code: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadResult {
    pub property_id: PropertyId,
    pub array_index: Option<u32>,
    pub value: Result<Vec<DataValue>, PropertyAccessError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadAccessResult {
    pub object_id: ObjectId,
    pub results: Vec<ReadResult>,
}

impl ReadAccessResult {
    /// Values of the first successful result for `property_id`.
    pub fn values_of(&self, property_id: PropertyId) -> Option<&[DataValue]> {
        self.results
            .iter()
            .find(|r| r.property_id == property_id)
            .and_then(|r| r.value.as_deref().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReadPropertyMultipleAck {
    pub results: Vec<ReadAccessResult>,
}

impl ReadPropertyMultipleAck {
    /// Encodes the service body that follows a ComplexAck header.
    pub fn encode_after_header(&self, w: &mut Writer) -> Result<(), EncodeError> {
        for access in &self.results {
            encode_ctx_object_id(w, 0, access.object_id);
            Tag::Opening { tag_num: 1 }.encode(w);
            for result in &access.results {
                encode_ctx_unsigned(w, 2, result.property_id.number());
                if let Some(idx) = result.array_index {
                    encode_ctx_unsigned(w, 3, idx);
                }
                match &result.value {
                    Ok(values) => {
                        Tag::Opening { tag_num: 4 }.encode(w);
                        for v in values {
                            encode_value(w, v)?;
                        }
                        Tag::Closing { tag_num: 4 }.encode(w);
                    }
                    Err(err) => {
                        Tag::Opening { tag_num: 5 }.encode(w);
                        encode_app_enumerated(w, err.error_class);
                        encode_app_enumerated(w, err.error_code);
                        Tag::Closing { tag_num: 5 }.encode(w);
                    }
                }
            }
            Tag::Closing { tag_num: 1 }.encode(w);
        }
        Ok(())
    }

    pub fn decode_after_header(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let mut results = Vec::new();
        while !r.is_empty() {
            let object_id = decode_ctx_object_id(r, 0)?;
            r.expect_opening(1)?;
            let mut elements = Vec::new();
            while !r.at_closing(1) {
                elements.push(decode_read_result(r)?);
            }
            r.expect_closing(1)?;
            results.push(ReadAccessResult {
                object_id,
                results: elements,
            });
        }
        Ok(Self { results })
    }
}

fn decode_read_result(r: &mut Reader<'_>) -> Result<ReadResult, DecodeError> {
    let property_id = PropertyId::from_number(decode_ctx_unsigned(r, 2)?);
    let array_index = decode_optional_ctx_unsigned(r, 3)?;
    let value = match r.read_tag()? {
        Tag::Opening { tag_num: 4 } => Ok(decode_values_until(r, 4)?),
        Tag::Opening { tag_num: 5 } => {
            let error_class = read_error_enum(r, 0)?;
            let error_code = read_error_enum(r, 1)?;
            r.expect_closing(5)?;
            Err(PropertyAccessError {
                error_class,
                error_code,
            })
        }
        _ => return Err(DecodeError::InvalidTag),
    };
    Ok(ReadResult {
        property_id,
        array_index,
        value,
    })
}

/// Error class/code inside `[5]`: application enumerated per the standard,
/// context-tagged from some older stacks.
fn read_error_enum(r: &mut Reader<'_>, ctx_tag: u8) -> Result<u32, DecodeError> {
    match r.read_tag()? {
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        } => decode_unsigned(r, len as usize),
        Tag::Context { tag_num, len } if tag_num == ctx_tag => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}
