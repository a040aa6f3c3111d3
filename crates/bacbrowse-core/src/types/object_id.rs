use core::fmt;

use crate::types::ObjectType;

/// Object identifier: 10-bit type in the upper bits, 22-bit instance below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u32);

impl ObjectId {
    /// Largest instance number; also the "any device" wildcard when used as
    /// the instance of a Device object.
    pub const MAX_INSTANCE: u32 = 0x3F_FFFF;

    pub const fn new(object_type: ObjectType, instance: u32) -> Self {
        Self::from_parts(object_type.number(), instance)
    }

    pub const fn from_parts(type_number: u16, instance: u32) -> Self {
        Self((((type_number as u32) & 0x03FF) << 22) | (instance & Self::MAX_INSTANCE))
    }

    /// The Device object of whichever device receives the request.
    pub const fn device_wildcard() -> Self {
        Self::new(ObjectType::Device, Self::MAX_INSTANCE)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn type_number(self) -> u16 {
        ((self.0 >> 22) & 0x03FF) as u16
    }

    pub const fn object_type(self) -> ObjectType {
        ObjectType::from_number(self.type_number())
    }

    pub const fn instance(self) -> u32 {
        self.0 & Self::MAX_INSTANCE
    }
}

/// Formats as `"<type number>:<instance>"`.
impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_number(), self.instance())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ObjectId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ObjectId", 2)?;
        s.serialize_field("type", &self.type_number())?;
        s.serialize_field("instance", &self.instance())?;
        s.end()
    }
}
