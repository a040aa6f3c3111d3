use crate::encoding::{
    reader::Reader,
    tag::{AppTag, Tag},
    writer::Writer,
};
use crate::types::ObjectId;
use crate::{DecodeError, EncodeError};

/// Character set codes carried in the first octet of a character string.
pub mod charset {
    pub const UTF8: u8 = 0;
    pub const UCS2: u8 = 4;
    pub const ISO_8859_1: u8 = 5;
}

/// Number of octets needed for the minimal big-endian form of `value`.
pub const fn unsigned_len(value: u32) -> u32 {
    let significant = 32 - value.leading_zeros();
    if significant == 0 {
        1
    } else {
        significant.div_ceil(8)
    }
}

/// Writes `value` in its minimal big-endian form and returns the octet count.
pub fn encode_unsigned(w: &mut Writer, value: u32) -> u32 {
    let len = unsigned_len(value);
    w.write_all(&value.to_be_bytes()[(4 - len) as usize..]);
    len
}

pub fn decode_unsigned(r: &mut Reader<'_>, len: usize) -> Result<u32, DecodeError> {
    if !(1..=4).contains(&len) {
        return Err(DecodeError::InvalidLength);
    }
    Ok(r
        .read_exact(len)?
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | *b as u32))
}

pub const fn signed_len(value: i32) -> u32 {
    match value {
        -128..=127 => 1,
        -32_768..=32_767 => 2,
        -8_388_608..=8_388_607 => 3,
        _ => 4,
    }
}

pub fn encode_signed(w: &mut Writer, value: i32) -> u32 {
    let len = signed_len(value);
    w.write_all(&value.to_be_bytes()[(4 - len) as usize..]);
    len
}

pub fn decode_signed(r: &mut Reader<'_>, len: usize) -> Result<i32, DecodeError> {
    if !(1..=4).contains(&len) {
        return Err(DecodeError::InvalidLength);
    }
    let bytes = r.read_exact(len)?;
    let fill = if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut out = [fill; 4];
    out[4 - len..].copy_from_slice(bytes);
    Ok(i32::from_be_bytes(out))
}

pub fn encode_app_unsigned(w: &mut Writer, value: u32) {
    Tag::Application {
        tag: AppTag::UnsignedInt,
        len: unsigned_len(value),
    }
    .encode(w);
    encode_unsigned(w, value);
}

pub fn encode_app_enumerated(w: &mut Writer, value: u32) {
    Tag::Application {
        tag: AppTag::Enumerated,
        len: unsigned_len(value),
    }
    .encode(w);
    encode_unsigned(w, value);
}

pub fn encode_app_object_id(w: &mut Writer, id: ObjectId) {
    Tag::Application {
        tag: AppTag::ObjectId,
        len: 4,
    }
    .encode(w);
    w.write_be_u32(id.raw());
}

pub fn encode_app_character_string(w: &mut Writer, value: &str) -> Result<(), EncodeError> {
    let len = u32::try_from(value.len() + 1).map_err(|_| EncodeError::ValueOutOfRange)?;
    Tag::Application {
        tag: AppTag::CharacterString,
        len,
    }
    .encode(w);
    w.write_u8(charset::UTF8);
    w.write_all(value.as_bytes());
    Ok(())
}

/// Context-tagged unsigned; also used for enumerated context fields.
pub fn encode_ctx_unsigned(w: &mut Writer, tag_num: u8, value: u32) {
    Tag::Context {
        tag_num,
        len: unsigned_len(value),
    }
    .encode(w);
    encode_unsigned(w, value);
}

pub fn encode_ctx_object_id(w: &mut Writer, tag_num: u8, id: ObjectId) {
    Tag::Context { tag_num, len: 4 }.encode(w);
    w.write_be_u32(id.raw());
}

pub fn decode_ctx_unsigned(r: &mut Reader<'_>, tag_num: u8) -> Result<u32, DecodeError> {
    match r.read_tag()? {
        Tag::Context { tag_num: n, len } if n == tag_num => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

/// Reads a context-tagged unsigned only if the next tag carries `tag_num`.
pub fn decode_optional_ctx_unsigned(
    r: &mut Reader<'_>,
    tag_num: u8,
) -> Result<Option<u32>, DecodeError> {
    match r.peek_tag() {
        Ok(Tag::Context { tag_num: n, .. }) if n == tag_num => {
            decode_ctx_unsigned(r, tag_num).map(Some)
        }
        _ => Ok(None),
    }
}

pub fn decode_ctx_object_id(r: &mut Reader<'_>, tag_num: u8) -> Result<ObjectId, DecodeError> {
    match r.read_tag()? {
        Tag::Context { tag_num: n, len: 4 } if n == tag_num => {
            Ok(ObjectId::from_raw(r.read_be_u32()?))
        }
        Tag::Context { tag_num: n, .. } if n == tag_num => Err(DecodeError::InvalidLength),
        _ => Err(DecodeError::InvalidTag),
    }
}

pub fn decode_app_unsigned(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    match r.read_tag()? {
        Tag::Application {
            tag: AppTag::UnsignedInt,
            len,
        } => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

pub fn decode_app_enumerated(r: &mut Reader<'_>) -> Result<u32, DecodeError> {
    match r.read_tag()? {
        Tag::Application {
            tag: AppTag::Enumerated,
            len,
        } => decode_unsigned(r, len as usize),
        _ => Err(DecodeError::InvalidTag),
    }
}

pub fn decode_app_object_id(r: &mut Reader<'_>) -> Result<ObjectId, DecodeError> {
    match r.read_tag()? {
        Tag::Application {
            tag: AppTag::ObjectId,
            len: 4,
        } => Ok(ObjectId::from_raw(r.read_be_u32()?)),
        Tag::Application {
            tag: AppTag::ObjectId,
            ..
        } => Err(DecodeError::InvalidLength),
        _ => Err(DecodeError::InvalidTag),
    }
}

/// Decodes character string content (charset octet followed by the text).
pub fn decode_character_string(raw: &[u8]) -> Result<String, DecodeError> {
    let (&set, text) = raw.split_first().ok_or(DecodeError::InvalidLength)?;
    match set {
        charset::UTF8 => String::from_utf8(text.to_vec()).map_err(|_| DecodeError::InvalidValue),
        charset::UCS2 => {
            if text.len() % 2 != 0 {
                return Err(DecodeError::InvalidLength);
            }
            let units = text
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
            char::decode_utf16(units)
                .collect::<Result<String, _>>()
                .map_err(|_| DecodeError::InvalidValue)
        }
        charset::ISO_8859_1 => Ok(text.iter().map(|b| *b as char).collect()),
        _ => Err(DecodeError::Unsupported),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectType;
    use proptest::prelude::*;

    #[test]
    fn minimal_unsigned_lengths() {
        assert_eq!(unsigned_len(0), 1);
        assert_eq!(unsigned_len(0xFF), 1);
        assert_eq!(unsigned_len(0x100), 2);
        assert_eq!(unsigned_len(0x3F_FFFF), 3);
        assert_eq!(unsigned_len(u32::MAX), 4);
    }

    #[test]
    fn context_object_id() {
        let id = ObjectId::new(ObjectType::Device, 4_194_303);
        let mut w = Writer::new();
        encode_ctx_object_id(&mut w, 0, id);
        assert_eq!(w.as_written(), &[0x0C, 0x02, 0x3F, 0xFF, 0xFF]);
        let mut r = Reader::new(w.as_written());
        assert_eq!(decode_ctx_object_id(&mut r, 0).unwrap(), id);
    }

    #[test]
    fn optional_context_field_is_left_in_place_when_absent() {
        let mut w = Writer::new();
        encode_ctx_unsigned(&mut w, 2, 77);
        let mut r = Reader::new(w.as_written());
        assert_eq!(decode_optional_ctx_unsigned(&mut r, 3).unwrap(), None);
        assert_eq!(r.position(), 0);
        assert_eq!(decode_optional_ctx_unsigned(&mut r, 2).unwrap(), Some(77));
    }

    #[test]
    fn character_sets() {
        assert_eq!(decode_character_string(b"\x00AHU-1").unwrap(), "AHU-1");
        assert_eq!(
            decode_character_string(&[4, 0x00, 0x41, 0x00, 0xE9]).unwrap(),
            "A\u{e9}"
        );
        assert_eq!(
            decode_character_string(&[5, 0x52, 0xE4, 0x75, 0x6D]).unwrap(),
            "R\u{e4}um"
        );
        assert_eq!(
            decode_character_string(&[1, 0x41]),
            Err(DecodeError::Unsupported)
        );
        assert_eq!(decode_character_string(&[]), Err(DecodeError::InvalidLength));
    }

    proptest! {
        #[test]
        fn signed_values_survive_minimal_encoding(v in any::<i32>()) {
            let mut w = Writer::new();
            let len = encode_signed(&mut w, v);
            prop_assert_eq!(len as usize, w.len());
            let mut r = Reader::new(w.as_written());
            prop_assert_eq!(decode_signed(&mut r, len as usize).unwrap(), v);
        }
    }
}
