use crate::encoding::{
    primitives::{
        decode_character_string, decode_signed, decode_unsigned, encode_app_character_string,
        encode_signed, encode_unsigned, signed_len, unsigned_len,
    },
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::types::{BitString, DataValue, Date, ObjectId, Time};
use crate::{DecodeError, EncodeError};

/// Nesting limit for constructed values; deeper input is rejected.
const MAX_DEPTH: usize = 16;

fn app(w: &mut Writer, tag: AppTag, len: u32) {
    Tag::Application { tag, len }.encode(w);
}

fn octet_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::ValueOutOfRange)
}

/// Encodes a value with application tags (context tags for the two
/// context-bearing variants).
pub fn encode_value(w: &mut Writer, value: &DataValue) -> Result<(), EncodeError> {
    match value {
        DataValue::Null => app(w, AppTag::Null, 0),
        DataValue::Boolean(v) => app(w, AppTag::Boolean, u32::from(*v)),
        DataValue::Unsigned(v) => {
            app(w, AppTag::UnsignedInt, unsigned_len(*v));
            encode_unsigned(w, *v);
        }
        DataValue::Enumerated(v) => {
            app(w, AppTag::Enumerated, unsigned_len(*v));
            encode_unsigned(w, *v);
        }
        DataValue::Signed(v) => {
            app(w, AppTag::SignedInt, signed_len(*v));
            encode_signed(w, *v);
        }
        DataValue::Real(v) => {
            app(w, AppTag::Real, 4);
            w.write_all(&v.to_be_bytes());
        }
        DataValue::Double(v) => {
            app(w, AppTag::Double, 8);
            w.write_all(&v.to_be_bytes());
        }
        DataValue::OctetString(bytes) => {
            app(w, AppTag::OctetString, octet_len(bytes.len())?);
            w.write_all(bytes);
        }
        DataValue::CharacterString(s) => encode_app_character_string(w, s)?,
        DataValue::BitString(bits) => {
            if bits.unused_bits > 7 {
                return Err(EncodeError::ValueOutOfRange);
            }
            app(w, AppTag::BitString, octet_len(bits.data.len() + 1)?);
            w.write_u8(bits.unused_bits);
            w.write_all(&bits.data);
        }
        DataValue::Date(d) => {
            app(w, AppTag::Date, 4);
            w.write_all(&[d.year_since_1900, d.month, d.day, d.weekday]);
        }
        DataValue::Time(t) => {
            app(w, AppTag::Time, 4);
            w.write_all(&[t.hour, t.minute, t.second, t.hundredths]);
        }
        DataValue::ObjectId(id) => {
            app(w, AppTag::ObjectId, 4);
            w.write_be_u32(id.raw());
        }
        DataValue::Constructed { tag_num, values } => {
            Tag::Opening { tag_num: *tag_num }.encode(w);
            for v in values {
                encode_value(w, v)?;
            }
            Tag::Closing { tag_num: *tag_num }.encode(w);
        }
        DataValue::Context { tag_num, data } => {
            Tag::Context {
                tag_num: *tag_num,
                len: octet_len(data.len())?,
            }
            .encode(w);
            w.write_all(data);
        }
    }
    Ok(())
}

pub fn decode_value(r: &mut Reader<'_>) -> Result<DataValue, DecodeError> {
    let tag = r.read_tag()?;
    decode_value_after_tag(r, tag, 0)
}

/// Decodes values until the closing tag `closing` and consumes it.
pub fn decode_values_until(r: &mut Reader<'_>, closing: u8) -> Result<Vec<DataValue>, DecodeError> {
    decode_sequence(r, closing, 0)
}

fn decode_sequence(
    r: &mut Reader<'_>,
    closing: u8,
    depth: usize,
) -> Result<Vec<DataValue>, DecodeError> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::Message("constructed value nested too deeply"));
    }
    let mut values = Vec::new();
    loop {
        match r.read_tag()? {
            Tag::Closing { tag_num } if tag_num == closing => return Ok(values),
            Tag::Closing { .. } => return Err(DecodeError::InvalidTag),
            tag => values.push(decode_value_after_tag(r, tag, depth)?),
        }
    }
}

fn decode_value_after_tag(
    r: &mut Reader<'_>,
    tag: Tag,
    depth: usize,
) -> Result<DataValue, DecodeError> {
    match tag {
        Tag::Application { tag, len } => decode_application(r, tag, len as usize),
        Tag::Context { tag_num, len } => Ok(DataValue::Context {
            tag_num,
            data: r.read_exact(len as usize)?.to_vec(),
        }),
        Tag::Opening { tag_num } => Ok(DataValue::Constructed {
            tag_num,
            values: decode_sequence(r, tag_num, depth + 1)?,
        }),
        Tag::Closing { .. } => Err(DecodeError::InvalidTag),
    }
}

fn decode_application(r: &mut Reader<'_>, tag: AppTag, len: usize) -> Result<DataValue, DecodeError> {
    let fixed = |r: &mut Reader<'_>, n: usize| -> Result<(), DecodeError> {
        if len != n {
            // Skip the content so a caller could resynchronise, then fail.
            r.read_exact(len)?;
            return Err(DecodeError::InvalidLength);
        }
        Ok(())
    };
    Ok(match tag {
        AppTag::Null => DataValue::Null,
        AppTag::Boolean => DataValue::Boolean(len != 0),
        AppTag::UnsignedInt => DataValue::Unsigned(decode_unsigned(r, len)?),
        AppTag::Enumerated => DataValue::Enumerated(decode_unsigned(r, len)?),
        AppTag::SignedInt => DataValue::Signed(decode_signed(r, len)?),
        AppTag::Real => {
            fixed(r, 4)?;
            DataValue::Real(f32::from_bits(r.read_be_u32()?))
        }
        AppTag::Double => {
            fixed(r, 8)?;
            let b = r.read_exact(8)?;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(b);
            DataValue::Double(f64::from_be_bytes(raw))
        }
        AppTag::OctetString => DataValue::OctetString(r.read_exact(len)?.to_vec()),
        AppTag::CharacterString => {
            DataValue::CharacterString(decode_character_string(r.read_exact(len)?)?)
        }
        AppTag::BitString => {
            let raw = r.read_exact(len)?;
            let (&unused_bits, data) = raw.split_first().ok_or(DecodeError::InvalidLength)?;
            if unused_bits > 7 {
                return Err(DecodeError::InvalidValue);
            }
            DataValue::BitString(BitString {
                unused_bits,
                data: data.to_vec(),
            })
        }
        AppTag::Date => {
            fixed(r, 4)?;
            let b = r.read_exact(4)?;
            DataValue::Date(Date {
                year_since_1900: b[0],
                month: b[1],
                day: b[2],
                weekday: b[3],
            })
        }
        AppTag::Time => {
            fixed(r, 4)?;
            let b = r.read_exact(4)?;
            DataValue::Time(Time {
                hour: b[0],
                minute: b[1],
                second: b[2],
                hundredths: b[3],
            })
        }
        AppTag::ObjectId => {
            fixed(r, 4)?;
            DataValue::ObjectId(ObjectId::from_raw(r.read_be_u32()?))
        }
    })
}
