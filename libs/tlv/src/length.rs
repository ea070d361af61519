use crate::{Error, Result};

/// A definite length in short or long form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Length {
    length: usize,
}

impl Length {
    const LONG_FORM_BIT: u8 = 0x80;
    const INDEFINITE: u8 = 0x80;
    const MAXIMUM_LENGTH_OCTETS: usize = 4;

    pub const fn new(length: usize) -> Self {
        Self { length }
    }

    /// Parses length octets from the start of `input`, returning the length
    /// and the number of bytes it occupied. Only minimal definite encodings
    /// are accepted.
    pub fn parse(input: &[u8]) -> Result<(Self, usize)> {
        let first = *input.first().ok_or(Error::Truncated {
            needed: 1,
            available: 0,
        })?;

        if first & Self::LONG_FORM_BIT == 0 {
            return Ok((Self::new(usize::from(first)), 1));
        }

        if first == Self::INDEFINITE {
            return Err(Error::IndefiniteLength);
        }

        let octets = usize::from(first & !Self::LONG_FORM_BIT);
        if octets > Self::MAXIMUM_LENGTH_OCTETS {
            return Err(Error::LengthOverflow(octets));
        }

        let bytes = input.get(1..=octets).ok_or(Error::Truncated {
            needed: octets + 1,
            available: input.len(),
        })?;

        if bytes[0] == 0 {
            return Err(Error::NonMinimalLength);
        }

        let length = bytes
            .iter()
            .fold(0usize, |acc, byte| (acc << 8) | usize::from(*byte));

        if length < usize::from(Self::LONG_FORM_BIT) {
            return Err(Error::NonMinimalLength);
        }

        Ok((Self::new(length), octets + 1))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer);
        buffer
    }

    /// Appends the minimal length octets to `buffer`.
    pub fn write_to(&self, buffer: &mut Vec<u8>) {
        if self.length < usize::from(Self::LONG_FORM_BIT) {
            buffer.push(self.length as u8);
            return;
        }

        let bytes = self.length.to_be_bytes();
        let first_non_zero = bytes
            .iter()
            .position(|byte| *byte != 0)
            .unwrap_or(bytes.len() - 1);
        let significant = &bytes[first_non_zero..];
        buffer.push(Self::LONG_FORM_BIT | significant.len() as u8);
        buffer.extend_from_slice(significant);
    }

    pub const fn value(&self) -> usize {
        self.length
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }
}

#[cfg(test)]
mod tests {
    use proptest::proptest;

    use super::*;

    #[test]
    fn test_short_form() {
        assert_eq!(Length::parse(&[0x05]).unwrap(), (Length::new(5), 1));
        assert_eq!(Length::new(0x7f).to_vec(), vec![0x7f]);
    }

    #[test]
    fn test_medium_length() {
        assert_eq!(Length::new(0x81).to_vec(), vec![0x81, 0x81]);
        assert_eq!(Length::parse(&[0x81, 0x81]).unwrap(), (Length::new(0x81), 2));
    }

    #[test]
    fn test_long_length() {
        assert_eq!(Length::new(0x100).to_vec(), vec![0x82, 0x01, 0x00]);
        assert_eq!(
            Length::parse(&[0x82, 0x01, 0x00]).unwrap(),
            (Length::new(0x100), 3)
        );
    }

    #[test]
    fn test_rejects_non_minimal_lengths() {
        assert_eq!(Length::parse(&[0x81, 0x05]), Err(Error::NonMinimalLength));
        assert_eq!(
            Length::parse(&[0x82, 0x00, 0x90]),
            Err(Error::NonMinimalLength)
        );
    }

    #[test]
    fn test_rejects_indefinite_and_oversized_lengths() {
        assert_eq!(Length::parse(&[0x80]), Err(Error::IndefiniteLength));
        assert_eq!(
            Length::parse(&[0x85, 1, 2, 3, 4, 5]),
            Err(Error::LengthOverflow(5))
        );
    }

    #[test]
    fn test_truncated_long_form() {
        assert_eq!(
            Length::parse(&[0x82, 0x01]),
            Err(Error::Truncated {
                needed: 3,
                available: 2
            })
        );
    }

    proptest! {
        #[test]
        fn test_write_then_parse(length in 0usize..=0xffff_ffff) {
            let bytes = Length::new(length).to_vec();
            assert_eq!(Length::parse(&bytes).unwrap(), (Length::new(length), bytes.len()));
        }
    }
}
