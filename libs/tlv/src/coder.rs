use crate::{value::decode_integer_contents, Error, RawValue, Result, Tag};

/// Decodes a value from the contents octets of a single element.
///
/// The identifier and length have already been consumed by the
/// [`Decoder`](crate::Decoder) by the time `decode_contents` is called, which
/// lets the same implementation serve both the natural tag and any implicit
/// tag override applied by the enclosing record.
pub trait Decode
where
    Self: Sized,
{
    /// Returns whether an element with this identifier decodes as `Self`
    /// when no tag override is in effect.
    fn accepts(tag: &Tag) -> bool;

    /// Decodes the contents octets of an element carrying `tag`.
    fn decode_contents(tag: &Tag, contents: &[u8]) -> Result<Self>;
}

/// A CHOICE resolved from a captured [`RawValue`] by its tag number.
pub trait Choice
where
    Self: Sized,
{
    /// Name used in [`Error::UnknownVariant`].
    const NAME: &'static str;

    /// Re-decodes `raw` as the alternative its tag designates.
    fn resolve(raw: &RawValue) -> Result<Self>;

    /// The tag number of the resolved alternative.
    fn tag_number(&self) -> u32;
}

macro_rules! impl_integer_decode {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn accepts(tag: &Tag) -> bool {
                    *tag == Tag::INTEGER
                }

                fn decode_contents(_tag: &Tag, contents: &[u8]) -> Result<Self> {
                    let value = decode_integer_contents(contents)?;
                    <$t>::try_from(value).map_err(|_| Error::IntegerOutOfRange {
                        type_name: stringify!($t),
                        value,
                    })
                }
            }
        )*
    };
}

impl_integer_decode!(u8, u16, u32, u64, i32, i64);

impl Decode for Vec<u8> {
    fn accepts(tag: &Tag) -> bool {
        *tag == Tag::OCTET_STRING
    }

    fn decode_contents(_tag: &Tag, contents: &[u8]) -> Result<Self> {
        Ok(contents.to_vec())
    }
}

impl Decode for String {
    fn accepts(tag: &Tag) -> bool {
        [
            Tag::UTF8_STRING,
            Tag::NUMERIC_STRING,
            Tag::PRINTABLE_STRING,
            Tag::T61_STRING,
            Tag::IA5_STRING,
            Tag::VISIBLE_STRING,
            Tag::GENERAL_STRING,
        ]
        .contains(tag)
    }

    fn decode_contents(tag: &Tag, contents: &[u8]) -> Result<Self> {
        match std::str::from_utf8(contents) {
            Ok(text) => Ok(text.to_owned()),
            Err(_) if *tag == Tag::UTF8_STRING => Err(Error::InvalidString { kind: "UTF8String" }),
            // 8-bit string types carry one character per byte
            Err(_) => Ok(contents.iter().copied().map(char::from).collect()),
        }
    }
}
