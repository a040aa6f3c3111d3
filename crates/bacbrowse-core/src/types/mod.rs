/// Generates a numbered enum with a catch-all variant plus lossless
/// conversions to and from the wire number.
macro_rules! numbered_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident($repr:ty) {
            $($variant:ident = $value:literal,)*
        }
        other = $other:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)*
            $other($repr),
        }

        impl $name {
            pub const fn number(self) -> $repr {
                match self {
                    $(Self::$variant => $value,)*
                    Self::$other(v) => v,
                }
            }

            pub const fn from_number(value: $repr) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    v => Self::$other(v),
                }
            }
        }
    };
}

pub mod data_value;
pub mod object_id;
pub mod object_type;
pub mod property_id;

pub use data_value::{BitString, DataValue, Date, Time};
pub use object_id::ObjectId;
pub use object_type::ObjectType;
pub use property_id::PropertyId;
