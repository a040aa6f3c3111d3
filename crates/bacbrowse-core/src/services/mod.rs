pub mod i_am;
pub mod read_property_multiple;
pub mod value_codec;
pub mod who_is;
