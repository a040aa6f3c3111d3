use core::fmt;

use crate::types::ObjectId;

/// Decoded application-layer value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "value"))]
pub enum DataValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Signed(i32),
    Real(f32),
    Double(f64),
    OctetString(Vec<u8>),
    CharacterString(String),
    BitString(BitString),
    Enumerated(u32),
    Date(Date),
    Time(Time),
    ObjectId(ObjectId),
    /// Values enclosed in an opening/closing context tag pair.
    Constructed { tag_num: u8, values: Vec<DataValue> },
    /// Context-tagged primitive whose meaning depends on the property's
    /// datatype; kept as raw content octets.
    Context { tag_num: u8, data: Vec<u8> },
}

impl DataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::CharacterString(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<ObjectId> {
        match self {
            Self::ObjectId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_unsigned(&self) -> Option<u32> {
        match self {
            Self::Unsigned(v) | Self::Enumerated(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Unsigned(v) | Self::Enumerated(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::OctetString(bytes) | Self::Context { data: bytes, .. } => {
                bytes.iter().try_for_each(|b| write!(f, "{b:02x}"))
            }
            Self::CharacterString(s) => f.write_str(s),
            Self::BitString(bits) => write!(f, "{bits}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Time(t) => write!(f, "{t}"),
            Self::ObjectId(id) => write!(f, "{id}"),
            Self::Constructed { values, .. } => {
                f.write_str("[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BitString {
    pub unused_bits: u8,
    pub data: Vec<u8>,
}

impl BitString {
    pub fn len(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.unused_bits as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bit `index`, counting from the most significant bit of the first octet.
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.len() {
            return None;
        }
        let octet = self.data[index / 8];
        Some(octet & (0x80 >> (index % 8)) != 0)
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (0..self.len()).try_for_each(|i| {
            f.write_str(if self.bit(i) == Some(true) { "1" } else { "0" })
        })
    }
}

/// Calendar date; `0xFF` in any field means "unspecified".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Date {
    pub year_since_1900: u8,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.year_since_1900 == 0xFF {
            f.write_str("*")?;
        } else {
            write!(f, "{}", 1900 + self.year_since_1900 as u16)?;
        }
        write_field(f, "-", self.month)?;
        write_field(f, "-", self.day)
    }
}

/// Time of day; `0xFF` in any field means "unspecified".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Time {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub hundredths: u8,
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_field(f, "", self.hour)?;
        write_field(f, ":", self.minute)?;
        write_field(f, ":", self.second)?;
        write_field(f, ".", self.hundredths)
    }
}

fn write_field(f: &mut fmt::Formatter<'_>, sep: &str, v: u8) -> fmt::Result {
    if v == 0xFF {
        write!(f, "{sep}*")
    } else {
        write!(f, "{sep}{v:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ObjectType;

    #[test]
    fn bit_string_respects_unused_bits() {
        let bits = BitString {
            unused_bits: 4,
            data: vec![0b1010_0000],
        };
        assert_eq!(bits.len(), 4);
        assert_eq!(bits.bit(0), Some(true));
        assert_eq!(bits.bit(1), Some(false));
        assert_eq!(bits.bit(4), None);
        assert_eq!(bits.to_string(), "1010");
    }

    #[test]
    fn display_forms() {
        let date = Date {
            year_since_1900: 124,
            month: 3,
            day: 0xFF,
            weekday: 0xFF,
        };
        assert_eq!(date.to_string(), "2024-03-*");
        let time = Time {
            hour: 7,
            minute: 5,
            second: 0,
            hundredths: 0,
        };
        assert_eq!(time.to_string(), "07:05:00.00");
        let list = DataValue::Constructed {
            tag_num: 3,
            values: vec![
                DataValue::ObjectId(ObjectId::new(ObjectType::AnalogValue, 2)),
                DataValue::Null,
            ],
        };
        assert_eq!(list.to_string(), "[2:2, null]");
    }

    #[test]
    fn accessors() {
        assert_eq!(
            DataValue::CharacterString("x".into()).as_str(),
            Some("x")
        );
        assert_eq!(DataValue::Enumerated(3).as_unsigned(), Some(3));
        assert_eq!(DataValue::Real(1.0).as_object_id(), None);
    }
}
