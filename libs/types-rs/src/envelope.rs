use std::fmt::Display;

use tlv::{Decode, RawValue};
use tlv_derive::Decode;

use crate::common::{EntityHeader, Machine, MachineIdentity, Phase};

/// The kind of payload a [`GenericEnvelope`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum EnvelopeKind {
    Bulletin = 1,
    DigitalVoteRecord = 2,
    PrintedBulletin = 4,
    BiometricImage = 5,
}

impl Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bulletin => "bulletin",
            Self::DigitalVoteRecord => "digital vote record",
            Self::PrintedBulletin => "printed bulletin",
            Self::BiometricImage => "biometric image",
        })
    }
}

/// Encryption parameters for envelopes whose content is protected.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct Security {
    pub file_kind_id: i64,
    pub encryption_id: i64,
    pub cd_file_id: i64,
    pub key_file_id: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct GenericEnvelope {
    pub header: EntityHeader,
    pub phase: Phase,
    #[tlv(optional)]
    pub machine: Option<Machine>,
    pub identity: RawValue,
    pub kind: EnvelopeKind,
    #[tlv(optional)]
    pub security: Option<Security>,
    pub content: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed encoding: {0}")]
    MalformedEncoding(#[from] tlv::Error),

    #[error("wrong envelope kind: expected {expected}, found {actual}")]
    WrongEnvelopeKind {
        expected: EnvelopeKind,
        actual: EnvelopeKind,
    },
}

/// A record that travels as the content of a [`GenericEnvelope`].
pub trait EnvelopePayload: Decode {
    const KIND: EnvelopeKind;
}

impl GenericEnvelope {
    pub fn identity(&self) -> tlv::Result<MachineIdentity> {
        self.identity.resolve()
    }

    /// Decodes the content as `T` after checking the envelope kind.
    pub fn open<T: EnvelopePayload>(&self) -> Result<T, DecodeError> {
        if self.kind != T::KIND {
            return Err(DecodeError::WrongEnvelopeKind {
                expected: T::KIND,
                actual: self.kind,
            });
        }

        if self.security.is_some() {
            tracing::debug!(kind = %self.kind, "envelope declares security parameters");
        }

        decode_as(&self.content)
    }
}

/// Decodes a buffer holding exactly one record of type `T`.
pub fn decode_as<T: Decode>(bytes: &[u8]) -> Result<T, DecodeError> {
    Ok(tlv::from_slice(bytes)?)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<GenericEnvelope, DecodeError> {
    decode_as(bytes)
}

/// Decodes an envelope and then its content as `T`.
#[tracing::instrument(level = "trace", skip(bytes), fields(len = bytes.len()))]
pub fn decode_enveloped<T: EnvelopePayload>(bytes: &[u8]) -> Result<T, DecodeError> {
    decode_envelope(bytes)?.open()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bulletin::Bulletin,
        fixtures::{envelope, BulletinFixture, RdvFixture, SectionFixture},
        rdv::DigitalVoteRecord,
    };

    #[test]
    fn test_decode_envelope() {
        let envelope = decode_envelope(&BulletinFixture::default().envelope()).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::Bulletin);
        assert_eq!(envelope.phase, Phase::Official);
        assert!(envelope.machine.is_some());
        assert!(envelope.security.is_none());
        assert!(matches!(
            envelope.identity().unwrap(),
            MachineIdentity::Section(section) if section.section == 55
        ));
    }

    #[test]
    fn test_envelope_without_machine() {
        let bytes = envelope(4, &SectionFixture::default(), None, b"printed");
        let envelope = decode_envelope(&bytes).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::PrintedBulletin);
        assert!(envelope.machine.is_none());
        assert_eq!(envelope.content, b"printed");
    }

    #[test]
    fn test_wrong_envelope_kind() {
        let record = RdvFixture::default().encode_record();
        let bytes = envelope(2, &SectionFixture::default(), None, &record);

        assert!(matches!(
            decode_enveloped::<Bulletin>(&bytes),
            Err(DecodeError::WrongEnvelopeKind {
                expected: EnvelopeKind::Bulletin,
                actual: EnvelopeKind::DigitalVoteRecord,
            })
        ));

        let record: DigitalVoteRecord = decode_enveloped(&bytes).unwrap();
        assert_eq!(record.contest_id, 406);
    }

    #[test]
    fn test_unknown_envelope_kind_is_malformed() {
        let bytes = envelope(3, &SectionFixture::default(), None, &[]);
        let Err(DecodeError::MalformedEncoding(error)) = decode_envelope(&bytes) else {
            panic!("expected a malformed encoding error");
        };
        assert_eq!(
            error.root_cause(),
            &tlv::Error::InvalidEnumerated {
                type_name: "EnvelopeKind",
                value: 3
            }
        );
    }

    #[test]
    fn test_garbage_content_is_malformed() {
        let bytes = envelope(1, &SectionFixture::default(), None, &[0x30, 0x05, 0x02]);
        assert!(matches!(
            decode_enveloped::<Bulletin>(&bytes),
            Err(DecodeError::MalformedEncoding(_))
        ));
    }
}
