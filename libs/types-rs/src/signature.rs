//! Signature envelopes (`.vscmr`) produced alongside a machine's result files.

use tlv_derive::Decode;

use crate::common::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum MachineModel {
    Ue2009 = 9,
    Ue2010 = 10,
    Ue2011 = 11,
    Ue2013 = 13,
    Ue2015 = 15,
    Ue2020 = 20,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum HashAlgorithm {
    Sha1 = 1,
    Sha256 = 2,
    Sha384 = 3,
    Sha512 = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum SignatureAlgorithm {
    Rsa = 1,
    Ecdsa = 2,
    Cepesc = 3,
}

/// The contents of a `.vscmr` file: a software and a hardware signature
/// over the same set of files.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct SignatureEnvelope {
    pub model: MachineModel,
    pub software: SignatureBlock,
    pub hardware: SignatureBlock,
}

impl SignatureEnvelope {
    pub fn blocks(&self) -> [(SignatureOrigin, &SignatureBlock); 2] {
        [
            (SignatureOrigin::Software, &self.software),
            (SignatureOrigin::Hardware, &self.hardware),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureOrigin {
    Software,
    Hardware,
}

impl std::fmt::Display for SignatureOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Software => "software",
            Self::Hardware => "hardware",
        })
    }
}

/// Later protocol versions append fields after the key set, so trailing
/// elements are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
#[tlv(allow_trailing)]
pub struct SignatureBlock {
    pub created_at: Timestamp,
    pub version: u32,
    pub self_signature: SelfSignature,
    pub self_signed_content: Vec<u8>,
    #[tlv(optional)]
    pub certificate: Option<Vec<u8>>,
    #[tlv(optional)]
    pub key_set: Option<String>,
}

impl SignatureBlock {
    /// Decodes the list of files this block vouches for.
    pub fn manifest(&self) -> tlv::Result<SignedManifest> {
        tlv::from_slice(&self.self_signed_content)
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.self_signature.hash_algorithm.algorithm
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct SelfSignature {
    pub signer: KeyDescriptor,
    pub hash_algorithm: HashAlgorithmInfo,
    pub signature_algorithm: SignatureAlgorithmInfo,
    pub signature: DigitalSignature,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct KeyDescriptor {
    pub user_name: String,
    pub serial: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct HashAlgorithmInfo {
    pub algorithm: HashAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct SignatureAlgorithmInfo {
    pub algorithm: SignatureAlgorithm,
    pub bits: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct DigitalSignature {
    pub length: u32,
    pub hash: Vec<u8>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct SignedManifest {
    #[tlv(sequence_of)]
    pub files: Vec<SignedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct SignedFile {
    pub name: String,
    pub signature: DigitalSignature,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fixtures::{
        manifest, SignatureBlockFixture, SignatureEnvelopeFixture, SignedFileFixture,
    };

    fn block(certificate: Option<Vec<u8>>, extension: bool) -> SignatureBlockFixture {
        SignatureBlockFixture {
            hash_algorithm: 4,
            signature_algorithm: 2,
            self_signed_content: manifest(&[SignedFileFixture {
                name: "o00407-8898600070055.bu".to_owned(),
                hash: vec![0xaa; 64],
                signature: vec![0xbb; 8],
            }]),
            self_hash: vec![0xcc; 64],
            self_signature: vec![0xdd; 8],
            certificate,
            extension,
        }
    }

    #[test]
    fn test_decode_signature_envelope() {
        let fixture = SignatureEnvelopeFixture {
            model: 20,
            software: block(Some(vec![0x30, 0x00]), false),
            hardware: block(None, true),
        };
        let envelope: SignatureEnvelope = crate::decode_as(&fixture.encode()).unwrap();

        assert_eq!(envelope.model, MachineModel::Ue2020);
        assert_eq!(envelope.software.certificate, Some(vec![0x30, 0x00]));
        assert_eq!(envelope.hardware.certificate, None);
        assert_eq!(envelope.hardware.key_set.as_deref(), Some("keyset-01"));
        assert_eq!(envelope.software.hash_algorithm(), HashAlgorithm::Sha512);
        assert_eq!(
            envelope.software.self_signature.signature_algorithm,
            SignatureAlgorithmInfo {
                algorithm: SignatureAlgorithm::Ecdsa,
                bits: 256
            }
        );
        assert_eq!(envelope.blocks()[1].0, SignatureOrigin::Hardware);

        let manifest = envelope.software.manifest().unwrap();
        assert_eq!(
            manifest.files,
            vec![SignedFile {
                name: "o00407-8898600070055.bu".to_owned(),
                signature: DigitalSignature {
                    length: 8,
                    hash: vec![0xaa; 64],
                    signature: vec![0xbb; 8],
                },
            }]
        );
    }

    #[test]
    fn test_unknown_hash_algorithm_is_malformed() {
        let fixture = SignatureEnvelopeFixture {
            model: 20,
            software: SignatureBlockFixture {
                hash_algorithm: 9,
                ..block(None, false)
            },
            hardware: block(None, false),
        };
        let error = crate::decode_as::<SignatureEnvelope>(&fixture.encode()).unwrap_err();
        assert!(error.to_string().contains("HashAlgorithm"));
    }
}
