use crate::{value::decode_sequence_of_contents, Decode, Error, Length, Result, Tag};

/// How a record field is tagged on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tagging {
    /// The field carries its type's own tag.
    Natural,
    /// The field's tag is replaced by a context-specific tag.
    Implicit(u32),
    /// The field is wrapped in a constructed context-specific tag.
    Explicit(u32),
}

impl Tagging {
    fn describe<T: Decode>(&self) -> String {
        match self {
            Self::Natural => std::any::type_name::<T>().to_owned(),
            Self::Implicit(number) => format!("[CONTEXT {number}]"),
            Self::Explicit(number) => format!("[CONTEXT {number}]c"),
        }
    }

    fn matches<T: Decode>(&self, tag: &Tag) -> bool {
        match self {
            Self::Natural => T::accepts(tag),
            Self::Implicit(number) => tag.is_context(*number),
            Self::Explicit(number) => tag.is_context(*number) && tag.constructed,
        }
    }

    fn matches_sequence(&self, tag: &Tag) -> bool {
        match self {
            Self::Natural => *tag == Tag::SEQUENCE,
            Self::Implicit(number) => tag.is_context(*number),
            Self::Explicit(number) => tag.is_context(*number) && tag.constructed,
        }
    }
}

/// Walks consecutive elements of a byte slice.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Decoder<'a> {
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, position: 0 }
    }

    /// Number of bytes consumed so far.
    pub const fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.position..]
    }

    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    /// Returns the identifier of the next element without consuming it.
    pub fn peek_tag(&self) -> Result<Option<Tag>> {
        if self.is_empty() {
            return Ok(None);
        }
        Tag::parse(self.remaining()).map(|(tag, _)| Some(tag))
    }

    /// Reads the next element, returning its identifier and contents.
    pub fn read_element(&mut self) -> Result<(Tag, &'a [u8])> {
        let remaining = self.remaining();
        let (tag, tag_size) = Tag::parse(remaining)?;
        let (length, length_size) = Length::parse(&remaining[tag_size..])?;
        let header_size = tag_size + length_size;
        let available = remaining.len() - header_size;

        if length.value() > available {
            return Err(Error::Truncated {
                needed: length.value(),
                available,
            });
        }

        let contents = &remaining[header_size..header_size + length.value()];
        self.position += header_size + length.value();
        Ok((tag, contents))
    }

    /// Decodes the next element as `T` using its natural tag.
    pub fn decode<T: Decode>(&mut self) -> Result<T> {
        self.decode_field(Tagging::Natural)
    }

    /// Decodes the next element as `T` under the given tagging.
    pub fn decode_field<T: Decode>(&mut self, tagging: Tagging) -> Result<T> {
        let checkpoint = self.position;
        let (tag, contents) = self.read_element()?;

        if !tagging.matches::<T>(&tag) {
            self.position = checkpoint;
            return Err(Error::UnexpectedTag {
                expected: tagging.describe::<T>(),
                actual: tag,
            });
        }

        match tagging {
            Tagging::Explicit(_) => {
                let mut inner = Decoder::new(contents);
                let value = inner.decode()?;
                inner.finish("explicit tag")?;
                Ok(value)
            }
            _ => T::decode_contents(&tag, contents),
        }
    }

    /// Decodes the next element as `T` if its identifier matches, leaving
    /// the input untouched otherwise.
    pub fn decode_optional_field<T: Decode>(&mut self, tagging: Tagging) -> Result<Option<T>> {
        match self.peek_tag()? {
            Some(tag) if tagging.matches::<T>(&tag) => self.decode_field(tagging).map(Some),
            _ => Ok(None),
        }
    }

    /// Decodes a SEQUENCE OF `T`. A missing optional list decodes as empty;
    /// a present list must hold at least one element unless it is optional.
    pub fn decode_sequence_of_field<T: Decode>(
        &mut self,
        tagging: Tagging,
        optional: bool,
    ) -> Result<Vec<T>> {
        let next = self.peek_tag()?;
        if optional && !next.is_some_and(|tag| tagging.matches_sequence(&tag)) {
            return Ok(Vec::new());
        }

        let (tag, contents) = self.read_element()?;
        if !tagging.matches_sequence(&tag) {
            return Err(Error::UnexpectedTag {
                expected: match tagging {
                    Tagging::Natural => "SEQUENCE OF".to_owned(),
                    other => other.describe::<T>(),
                },
                actual: tag,
            });
        }

        let contents = match tagging {
            Tagging::Explicit(_) => {
                let mut inner = Decoder::new(contents);
                let (sequence_tag, sequence_contents) = inner.read_element()?;
                if sequence_tag != Tag::SEQUENCE {
                    return Err(Error::UnexpectedTag {
                        expected: "SEQUENCE OF".to_owned(),
                        actual: sequence_tag,
                    });
                }
                inner.finish("explicit tag")?;
                sequence_contents
            }
            _ => contents,
        };

        let elements = decode_sequence_of_contents(contents)?;
        if elements.is_empty() && !optional {
            return Err(Error::EmptySequenceOf);
        }
        Ok(elements)
    }

    /// Ensures all input has been consumed.
    pub fn finish(&self, container: &'static str) -> Result<()> {
        match self.remaining().len() {
            0 => Ok(()),
            remaining => Err(Error::TrailingData {
                container,
                remaining,
            }),
        }
    }
}
