use crate::Tag;

/// Error type for TLV operations. Every variant describes how the encoded
/// bytes diverged from the schema being decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("unexpected tag: expected {expected}, actual {actual}")]
    UnexpectedTag { expected: String, actual: Tag },

    #[error("truncated input: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("indefinite length encoding is not supported")]
    IndefiniteLength,

    #[error("non-minimal length encoding")]
    NonMinimalLength,

    #[error("length field of {0} bytes is too long")]
    LengthOverflow(usize),

    #[error("non-minimal tag number encoding")]
    NonMinimalTag,

    #[error("tag number too large")]
    TagNumberOverflow,

    #[error("invalid integer encoding: {0}")]
    InvalidInteger(&'static str),

    #[error("integer {value} out of range for {type_name}")]
    IntegerOutOfRange { type_name: &'static str, value: i64 },

    #[error("invalid value {value} for enumerated {type_name}")]
    InvalidEnumerated { type_name: &'static str, value: i64 },

    #[error("invalid {kind} contents")]
    InvalidString { kind: &'static str },

    #[error("{remaining} trailing bytes after {container}")]
    TrailingData {
        container: &'static str,
        remaining: usize,
    },

    #[error("empty SEQUENCE OF")]
    EmptySequenceOf,

    #[error("unknown {choice} variant {tag}")]
    UnknownVariant { choice: &'static str, tag: Tag },

    #[error("{container}.{field}: {source}")]
    InField {
        container: &'static str,
        field: &'static str,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wraps this error with the record and field being decoded when it
    /// occurred.
    pub fn in_field(self, container: &'static str, field: &'static str) -> Self {
        Self::InField {
            container,
            field,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping any field context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::InField { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns the `container.field` path leading to the innermost error.
    pub fn path(&self) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::InField {
            container,
            field,
            source,
        } = current
        {
            path.push(format!("{container}.{field}"));
            current = source;
        }
        path
    }
}

/// Result type for TLV operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
