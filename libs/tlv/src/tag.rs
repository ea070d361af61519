use std::fmt;

use crate::{Error, Result};

/// The class bits of an identifier octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl Class {
    const fn from_bits(bits: u8) -> Self {
        match bits >> 6 {
            0 => Self::Universal,
            1 => Self::Application,
            2 => Self::ContextSpecific,
            _ => Self::Private,
        }
    }

    const fn bits(self) -> u8 {
        match self {
            Self::Universal => 0x00,
            Self::Application => 0x40,
            Self::ContextSpecific => 0x80,
            Self::Private => 0xc0,
        }
    }
}

/// An identifier: class, primitive/constructed flag, and tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    pub class: Class,
    pub constructed: bool,
    pub number: u32,
}

const CONSTRUCTED_BIT: u8 = 0x20;
const HIGH_TAG_NUMBER: u8 = 0x1f;

impl Tag {
    pub const INTEGER: Self = Self::universal(2, false);
    pub const OCTET_STRING: Self = Self::universal(4, false);
    pub const ENUMERATED: Self = Self::universal(10, false);
    pub const UTF8_STRING: Self = Self::universal(12, false);
    pub const SEQUENCE: Self = Self::universal(16, true);
    pub const NUMERIC_STRING: Self = Self::universal(18, false);
    pub const PRINTABLE_STRING: Self = Self::universal(19, false);
    pub const T61_STRING: Self = Self::universal(20, false);
    pub const IA5_STRING: Self = Self::universal(22, false);
    pub const VISIBLE_STRING: Self = Self::universal(26, false);
    pub const GENERAL_STRING: Self = Self::universal(27, false);

    pub const fn universal(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::Universal,
            constructed,
            number,
        }
    }

    pub const fn context(number: u32, constructed: bool) -> Self {
        Self {
            class: Class::ContextSpecific,
            constructed,
            number,
        }
    }

    /// Returns whether this is a context-specific tag with the given number,
    /// regardless of the constructed flag.
    pub fn is_context(&self, number: u32) -> bool {
        self.class == Class::ContextSpecific && self.number == number
    }

    /// Parses identifier octets from the start of `input`, returning the tag
    /// and the number of bytes it occupied.
    pub fn parse(input: &[u8]) -> Result<(Self, usize)> {
        let first = *input.first().ok_or(Error::Truncated {
            needed: 1,
            available: 0,
        })?;
        let class = Class::from_bits(first);
        let constructed = first & CONSTRUCTED_BIT != 0;

        if first & HIGH_TAG_NUMBER != HIGH_TAG_NUMBER {
            let number = u32::from(first & HIGH_TAG_NUMBER);
            return Ok((
                Self {
                    class,
                    constructed,
                    number,
                },
                1,
            ));
        }

        let mut number: u32 = 0;
        for (index, byte) in input.iter().enumerate().skip(1) {
            if index == 1 && *byte == 0x80 {
                return Err(Error::NonMinimalTag);
            }
            number = number
                .checked_mul(128)
                .and_then(|n| n.checked_add(u32::from(byte & 0x7f)))
                .ok_or(Error::TagNumberOverflow)?;
            if byte & 0x80 == 0 {
                return Ok((
                    Self {
                        class,
                        constructed,
                        number,
                    },
                    index + 1,
                ));
            }
        }

        Err(Error::Truncated {
            needed: input.len() + 1,
            available: input.len(),
        })
    }

    /// Appends the identifier octets for this tag to `buffer`.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        let mut leading = self.class.bits();
        if self.constructed {
            leading |= CONSTRUCTED_BIT;
        }

        if self.number < u32::from(HIGH_TAG_NUMBER) {
            buffer.push(leading | self.number as u8);
            return;
        }

        buffer.push(leading | HIGH_TAG_NUMBER);
        let mut groups = Vec::new();
        let mut number = self.number;
        loop {
            groups.push((number & 0x7f) as u8);
            number >>= 7;
            if number == 0 {
                break;
            }
        }
        let last = groups.len() - 1;
        buffer.extend(
            groups
                .iter()
                .rev()
                .enumerate()
                .map(|(i, group)| if i == last { *group } else { group | 0x80 }),
        );
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer);
        buffer
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = match self.class {
            Class::Universal => "UNIVERSAL",
            Class::Application => "APPLICATION",
            Class::ContextSpecific => "CONTEXT",
            Class::Private => "PRIVATE",
        };
        let form = if self.constructed { "c" } else { "p" };
        write!(f, "[{class} {}]{form}", self.number)
    }
}

#[cfg(test)]
mod tests {
    use proptest::proptest;

    use super::*;

    #[test]
    fn test_parse_low_tag_numbers() {
        assert_eq!(Tag::parse(&[0x30]).unwrap(), (Tag::SEQUENCE, 1));
        assert_eq!(Tag::parse(&[0x02, 0x01]).unwrap(), (Tag::INTEGER, 1));
        assert_eq!(Tag::parse(&[0xa3]).unwrap(), (Tag::context(3, true), 1));
        assert_eq!(Tag::parse(&[0x81]).unwrap(), (Tag::context(1, false), 1));
    }

    #[test]
    fn test_parse_high_tag_number() {
        let (tag, read) = Tag::parse(&[0x9f, 0x81, 0x00]).unwrap();
        assert_eq!(tag, Tag::context(128, false));
        assert_eq!(read, 3);
    }

    #[test]
    fn test_parse_rejects_non_minimal_high_tag_number() {
        assert_eq!(Tag::parse(&[0x9f, 0x80, 0x01]), Err(Error::NonMinimalTag));
    }

    #[test]
    fn test_parse_truncated() {
        assert!(matches!(Tag::parse(&[]), Err(Error::Truncated { .. })));
        assert!(matches!(Tag::parse(&[0x1f, 0x81]), Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_display() {
        assert_eq!(Tag::SEQUENCE.to_string(), "[UNIVERSAL 16]c");
        assert_eq!(Tag::context(2, false).to_string(), "[CONTEXT 2]p");
    }

    proptest! {
        #[test]
        fn test_write_then_parse(number: u32, constructed: bool) {
            let tag = Tag::context(number, constructed);
            let bytes = tag.to_vec();
            assert_eq!(Tag::parse(&bytes).unwrap(), (tag, bytes.len()));
        }
    }
}
