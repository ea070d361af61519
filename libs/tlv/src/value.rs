use crate::{Choice, Decode, Decoder, Error, Result, Tag};

/// An element captured as its identifier and undecoded contents, to be
/// resolved later with [`RawValue::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue {
    pub tag: Tag,
    pub contents: Vec<u8>,
}

impl RawValue {
    pub fn new(tag: Tag, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            tag,
            contents: contents.into(),
        }
    }

    /// Resolves this capture as the CHOICE `C`.
    pub fn resolve<C: Choice>(&self) -> Result<C> {
        C::resolve(self)
    }
}

impl Decode for RawValue {
    fn accepts(_tag: &Tag) -> bool {
        true
    }

    fn decode_contents(tag: &Tag, contents: &[u8]) -> Result<Self> {
        Ok(Self::new(*tag, contents))
    }
}

/// Decodes two's complement INTEGER or ENUMERATED contents.
pub fn decode_integer_contents(contents: &[u8]) -> Result<i64> {
    match contents {
        [] => Err(Error::InvalidInteger("empty contents")),
        [first, second, ..]
            if (*first == 0x00 && second & 0x80 == 0) || (*first == 0xff && second & 0x80 != 0) =>
        {
            Err(Error::InvalidInteger("not minimally encoded"))
        }
        _ if contents.len() > 8 => Err(Error::InvalidInteger("too large")),
        _ => {
            let sign = if contents[0] & 0x80 != 0 { -1i64 } else { 0 };
            Ok(contents
                .iter()
                .fold(sign, |acc, byte| (acc << 8) | i64::from(*byte)))
        }
    }
}

/// Encodes `value` as minimal two's complement INTEGER contents.
pub fn encode_integer_contents(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

/// Decodes the contents of a SEQUENCE OF (or an implicitly tagged one) as
/// consecutive elements until the contents are exhausted.
pub fn decode_sequence_of_contents<T: Decode>(contents: &[u8]) -> Result<Vec<T>> {
    let mut decoder = Decoder::new(contents);
    let mut elements = Vec::new();
    while !decoder.is_empty() {
        elements.push(decoder.decode()?);
    }
    Ok(elements)
}
