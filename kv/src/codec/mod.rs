pub mod json_codec;
pub mod bytes_codec;

/// Marker for a wire framing scheme used by the secondary-store bridge
/// (spec §4.5) to serialize [`crate::value::Value`] payloads.
pub trait Codec {
    fn codec_name<T>(&self) -> String;
}
