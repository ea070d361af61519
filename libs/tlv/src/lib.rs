//! Decoding of the tag-length-value encoding used by voting machine result
//! files: definite-length BER with minimal (DER) length octets.
//!
//! Records are described with `#[derive(Decode)]` and `#[derive(Choice)]`
//! from the `tlv-derive` crate, which generate calls into [`Decoder`].

pub mod coder;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod length;
pub mod tag;
pub mod value;

pub use coder::{Choice, Decode};
pub use decoder::{Decoder, Tagging};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use length::Length;
pub use tag::{Class, Tag};
pub use value::{
    decode_integer_contents, decode_sequence_of_contents, encode_integer_contents, RawValue,
};

/// Decodes a single value that must occupy the whole buffer.
pub fn from_slice<T: Decode>(buffer: &[u8]) -> Result<T> {
    let mut decoder = Decoder::new(buffer);
    let value = decoder.decode()?;
    decoder.finish(std::any::type_name::<T>())?;
    Ok(value)
}

/// Decodes a value from the start of the buffer, returning it with the
/// number of bytes consumed.
pub fn decode_prefix<T: Decode>(buffer: &[u8]) -> Result<(T, usize)> {
    let mut decoder = Decoder::new(buffer);
    let value = decoder.decode()?;
    Ok((value, decoder.position()))
}
