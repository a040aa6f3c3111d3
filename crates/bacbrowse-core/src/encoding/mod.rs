/// Primitive and context/application-tagged value codecs.
pub mod primitives;
/// Bounds-checked cursor over a received frame.
pub mod reader;
/// BACnet tag system (application, context, opening/closing).
pub mod tag;
/// Growable byte sink used to build outgoing frames.
pub mod writer;
