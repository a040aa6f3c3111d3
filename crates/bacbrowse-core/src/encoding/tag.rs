use crate::encoding::{reader::Reader, writer::Writer};
use crate::DecodeError;

const CONTEXT_CLASS: u8 = 0x08;
const LVT_EXTENDED: u8 = 5;
const LVT_OPENING: u8 = 6;
const LVT_CLOSING: u8 = 7;

/// Application tag numbers (clause 20.2.1.4).
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTag {
    Null = 0,
    Boolean = 1,
    UnsignedInt = 2,
    SignedInt = 3,
    Real = 4,
    Double = 5,
    OctetString = 6,
    CharacterString = 7,
    BitString = 8,
    Enumerated = 9,
    Date = 10,
    Time = 11,
    ObjectId = 12,
}

impl AppTag {
    const ALL: [AppTag; 13] = [
        Self::Null,
        Self::Boolean,
        Self::UnsignedInt,
        Self::SignedInt,
        Self::Real,
        Self::Double,
        Self::OctetString,
        Self::CharacterString,
        Self::BitString,
        Self::Enumerated,
        Self::Date,
        Self::Time,
        Self::ObjectId,
    ];

    pub fn from_u8(value: u8) -> Result<Self, DecodeError> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(DecodeError::InvalidTag)
    }
}

/// A decoded tag header. For `Application` and `Context` tags, `len` is the
/// length of the content that follows (or, for application booleans, the
/// value itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Application { tag: AppTag, len: u32 },
    Context { tag_num: u8, len: u32 },
    Opening { tag_num: u8 },
    Closing { tag_num: u8 },
}

impl Tag {
    pub fn encode(self, w: &mut Writer) {
        match self {
            Tag::Application { tag, len } => {
                write_initial(w, tag as u8, false, lvt_for(len));
                write_extended_len(w, len);
            }
            Tag::Context { tag_num, len } => {
                write_initial(w, tag_num, true, lvt_for(len));
                write_extended_len(w, len);
            }
            Tag::Opening { tag_num } => write_initial(w, tag_num, true, LVT_OPENING),
            Tag::Closing { tag_num } => write_initial(w, tag_num, true, LVT_CLOSING),
        }
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let first = r.read_u8()?;
        let context = first & CONTEXT_CLASS != 0;
        let lvt = first & 0x07;
        let tag_num = match first >> 4 {
            0x0F => r.read_u8()?,
            n => n,
        };

        if context {
            match lvt {
                LVT_OPENING => return Ok(Tag::Opening { tag_num }),
                LVT_CLOSING => return Ok(Tag::Closing { tag_num }),
                _ => {}
            }
        }

        let len = read_len(r, lvt)?;
        if context {
            Ok(Tag::Context { tag_num, len })
        } else {
            Ok(Tag::Application {
                tag: AppTag::from_u8(tag_num)?,
                len,
            })
        }
    }
}

fn lvt_for(len: u32) -> u8 {
    if len < LVT_EXTENDED as u32 {
        len as u8
    } else {
        LVT_EXTENDED
    }
}

fn write_initial(w: &mut Writer, tag_num: u8, context: bool, lvt: u8) {
    let class = if context { CONTEXT_CLASS } else { 0 };
    if tag_num < 15 {
        w.write_u8((tag_num << 4) | class | lvt);
    } else {
        w.write_u8(0xF0 | class | lvt);
        w.write_u8(tag_num);
    }
}

fn write_extended_len(w: &mut Writer, len: u32) {
    match len {
        0..=4 => {}
        5..=253 => w.write_u8(len as u8),
        254..=0xFFFF => {
            w.write_u8(254);
            w.write_be_u16(len as u16);
        }
        _ => {
            w.write_u8(255);
            w.write_be_u32(len);
        }
    }
}

fn read_len(r: &mut Reader<'_>, lvt: u8) -> Result<u32, DecodeError> {
    if lvt < LVT_EXTENDED {
        return Ok(lvt as u32);
    }
    if lvt > LVT_EXTENDED {
        return Err(DecodeError::InvalidLength);
    }
    match r.read_u8()? {
        254 => Ok(r.read_be_u16()? as u32),
        255 => r.read_be_u32(),
        n => Ok(n as u32),
    }
}

#[cfg(test)]
mod tests {
    use super::{AppTag, Tag};
    use crate::encoding::{reader::Reader, writer::Writer};
    use crate::DecodeError;

    fn encoded(tag: Tag) -> Vec<u8> {
        let mut w = Writer::new();
        tag.encode(&mut w);
        w.into_bytes()
    }

    #[test]
    fn short_and_extended_lengths() {
        assert_eq!(
            encoded(Tag::Application {
                tag: AppTag::UnsignedInt,
                len: 1
            }),
            [0x21]
        );
        assert_eq!(
            encoded(Tag::Application {
                tag: AppTag::CharacterString,
                len: 12
            }),
            [0x75, 12]
        );
        assert_eq!(
            encoded(Tag::Context {
                tag_num: 0,
                len: 300
            }),
            [0x0D, 254, 0x01, 0x2C]
        );
    }

    #[test]
    fn extended_tag_number_uses_second_octet() {
        let bytes = encoded(Tag::Context {
            tag_num: 20,
            len: 2,
        });
        assert_eq!(bytes, [0xFA, 20]);
        let mut r = Reader::new(&bytes);
        assert_eq!(
            Tag::decode(&mut r).unwrap(),
            Tag::Context {
                tag_num: 20,
                len: 2
            }
        );
    }

    #[test]
    fn opening_and_closing() {
        assert_eq!(encoded(Tag::Opening { tag_num: 4 }), [0x4E]);
        assert_eq!(encoded(Tag::Closing { tag_num: 4 }), [0x4F]);
    }

    #[test]
    fn reserved_application_tag_is_rejected() {
        let mut r = Reader::new(&[0xD1, 0x00]);
        assert_eq!(Tag::decode(&mut r), Err(DecodeError::InvalidTag));
    }
}
