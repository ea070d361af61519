use crate::{value::encode_integer_contents, Length, Tag};

/// Builds DER-encoded elements into a buffer.
///
/// This is a writer for hand-assembled structures (test fixtures and the
/// like); records are not encoded through a trait.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a single element with the given contents.
    pub fn element(&mut self, tag: Tag, contents: &[u8]) -> &mut Self {
        tag.write_to(&mut self.buffer);
        Length::new(contents.len()).write_to(&mut self.buffer);
        self.buffer.extend_from_slice(contents);
        self
    }

    pub fn integer(&mut self, tag: Tag, value: i64) -> &mut Self {
        self.element(tag, &encode_integer_contents(value))
    }

    pub fn octets(&mut self, tag: Tag, value: &[u8]) -> &mut Self {
        self.element(tag, value)
    }

    pub fn string(&mut self, tag: Tag, value: &str) -> &mut Self {
        self.element(tag, value.as_bytes())
    }

    /// Writes a constructed element whose contents are produced by `build`.
    pub fn constructed(&mut self, tag: Tag, build: impl FnOnce(&mut Encoder)) -> &mut Self {
        let mut inner = Encoder::new();
        build(&mut inner);
        self.element(tag, &inner.buffer)
    }

    /// Appends bytes verbatim.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}
