//! Verification of signature envelopes (`.vscmr`) and the files they cover.

use openssl::pkey::{PKey, Public};
use types_rs::{
    signature::{DigitalSignature, HashAlgorithm, SignatureOrigin},
    SignatureBlock, SignatureEnvelope,
};

use crate::{
    certs::{parse_certificate, CertificateError, ParsedCertificate},
    crypto::{check_digest, verify_digest_signature},
    outcome::{CheckKind, Location, SkipReason, VerificationError, VerificationOutcome},
};

type BlockKey = Option<Result<PKey<Public>, String>>;

fn block_key(block: &SignatureBlock) -> BlockKey {
    let certificate = block.certificate.as_deref()?;
    Some(
        parse_certificate(certificate)
            .and_then(|parsed| {
                parsed
                    .certificate
                    .public_key()
                    .map_err(CertificateError::from)
            })
            .map_err(|error| {
                tracing::warn!(%error, "embedded certificate could not be parsed");
                error.to_string()
            }),
    )
}

struct Checks<'a> {
    origin: SignatureOrigin,
    algorithm: HashAlgorithm,
    key: &'a BlockKey,
    outcomes: Vec<VerificationOutcome>,
}

impl Checks<'_> {
    /// Hash check of `data` followed by the signature check over the
    /// computed digest.
    fn check(
        &mut self,
        (hash_check, signature_check): (CheckKind, CheckKind),
        location: &Location,
        subject: &str,
        data: &[u8],
        signature: &DigitalSignature,
    ) {
        let digest = match check_digest(self.algorithm, data, &signature.hash) {
            Ok(digest) => {
                self.outcomes.push(VerificationOutcome::passed(
                    hash_check,
                    location.clone(),
                    subject.to_owned(),
                ));
                digest
            }
            Err((digest, error)) => {
                self.outcomes.push(VerificationOutcome::failed(
                    hash_check,
                    location.clone(),
                    subject.to_owned(),
                    error,
                ));
                digest
            }
        };

        // Nothing to verify against when hashing itself failed.
        if digest.is_empty() {
            return;
        }

        let outcome = match self.key {
            None => VerificationOutcome::skipped(
                signature_check,
                location.clone(),
                subject.to_owned(),
                SkipReason::NoCertificate,
            ),
            Some(Err(error)) => VerificationOutcome::failed(
                signature_check,
                location.clone(),
                subject.to_owned(),
                VerificationError::CertificateParse(error.clone()),
            ),
            Some(Ok(key)) => {
                match verify_digest_signature(key, self.algorithm, &digest, &signature.signature) {
                    Ok(true) => VerificationOutcome::passed(
                        signature_check,
                        location.clone(),
                        subject.to_owned(),
                    ),
                    Ok(false) => VerificationOutcome::failed(
                        signature_check,
                        location.clone(),
                        subject.to_owned(),
                        VerificationError::SignatureInvalid,
                    ),
                    Err(error) => VerificationOutcome::failed(
                        signature_check,
                        location.clone(),
                        subject.to_owned(),
                        error,
                    ),
                }
            }
        };
        self.outcomes.push(outcome);
    }
}

#[tracing::instrument(level = "debug", skip(block, sibling))]
fn verify_block(
    origin: SignatureOrigin,
    block: &SignatureBlock,
    sibling: &dyn Fn(&str) -> Option<Vec<u8>>,
) -> Vec<VerificationOutcome> {
    let key = block_key(block);
    let mut checks = Checks {
        origin,
        algorithm: block.hash_algorithm(),
        key: &key,
        outcomes: Vec::new(),
    };

    checks.check(
        (CheckKind::SelfContentHash, CheckKind::SelfContentSignature),
        &Location::default(),
        &format!("{origin} self-signed content"),
        &block.self_signed_content,
        &block.self_signature.signature,
    );

    let manifest = match block.manifest() {
        Ok(manifest) => manifest,
        Err(error) => {
            tracing::warn!(%error, %origin, "signed manifest is malformed");
            checks.outcomes.push(VerificationOutcome::failed(
                CheckKind::Manifest,
                Location::default(),
                format!("{origin} manifest"),
                VerificationError::MalformedManifest(error),
            ));
            return checks.outcomes;
        }
    };

    for file in &manifest.files {
        let location = Location::from_filename(&file.name);
        let subject = format!("{} {}", checks.origin, file.name);

        let Some(contents) = sibling(&file.name) else {
            tracing::debug!(file = %file.name, "signed file is not available");
            checks.outcomes.push(VerificationOutcome::skipped(
                CheckKind::FileHash,
                location,
                subject,
                SkipReason::FileUnavailable,
            ));
            continue;
        };

        checks.check(
            (CheckKind::FileHash, CheckKind::FileSignature),
            &location,
            &subject,
            &contents,
            &file.signature,
        );
    }

    checks.outcomes
}

/// Verifies both signature blocks of `envelope`: each block's self
/// signature, then the hash and signature of every file its manifest
/// names. `sibling` supplies the contents of a named file, or `None` when
/// the file cannot be found.
pub fn verify_signature_envelope(
    envelope: &SignatureEnvelope,
    sibling: impl Fn(&str) -> Option<Vec<u8>>,
) -> Vec<VerificationOutcome> {
    envelope
        .blocks()
        .into_iter()
        .flat_map(|(origin, block)| verify_block(origin, block, &sibling))
        .collect()
}

/// What became of one signature block's embedded certificate.
#[derive(Debug)]
pub struct CertificateInspection {
    pub origin: SignatureOrigin,
    /// `None` when the block carries no certificate.
    pub result: Option<Result<ParsedCertificate, CertificateError>>,
}

impl CertificateInspection {
    pub fn certificate(&self) -> Option<&ParsedCertificate> {
        self.result.as_ref()?.as_ref().ok()
    }

    pub fn outcome(&self) -> VerificationOutcome {
        let subject = format!("{} certificate", self.origin);
        match &self.result {
            None => VerificationOutcome::skipped(
                CheckKind::Certificate,
                Location::default(),
                subject,
                SkipReason::NoCertificate,
            ),
            Some(Ok(parsed)) => VerificationOutcome::passed(
                CheckKind::Certificate,
                Location::default(),
                format!(
                    "{subject} {} ({})",
                    parsed.common_name().unwrap_or_default(),
                    parsed.strategy
                ),
            ),
            Some(Err(error)) => VerificationOutcome::failed(
                CheckKind::Certificate,
                Location::default(),
                subject,
                VerificationError::CertificateParse(error.to_string()),
            ),
        }
    }
}

pub fn inspect_certificates(envelope: &SignatureEnvelope) -> Vec<CertificateInspection> {
    envelope
        .blocks()
        .into_iter()
        .map(|(origin, block)| CertificateInspection {
            origin,
            result: block.certificate.as_deref().map(parse_certificate),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use openssl::pkey::Private;
    use pretty_assertions::assert_eq;
    use types_rs::{
        decode_as,
        fixtures::{manifest, SignatureBlockFixture, SignatureEnvelopeFixture, SignedFileFixture},
    };

    use super::*;
    use crate::{
        certs::ParseStrategy,
        crypto::{digest, test_keys},
        outcome::Status,
    };

    const BU_NAME: &str = "o00407-8898600070055.bu";
    const RDV_NAME: &str = "o00407-8898600070055.rdv";

    struct Signer {
        key: PKey<Private>,
        hash_algorithm: HashAlgorithm,
        hash_code: u8,
    }

    impl Signer {
        fn sign(&self, data: &[u8]) -> (Vec<u8>, Vec<u8>) {
            let digest = digest(self.hash_algorithm, data).unwrap();
            let signature = test_keys::sign_digest(&self.key, self.hash_algorithm, &digest);
            (digest, signature)
        }

        fn block(&self, files: &HashMap<&str, Vec<u8>>, certificate: Option<Vec<u8>>) -> SignatureBlockFixture {
            let mut names = files.keys().copied().collect::<Vec<_>>();
            names.sort_unstable();
            let signed_files = names
                .into_iter()
                .map(|name| {
                    let (hash, signature) = self.sign(&files[name]);
                    SignedFileFixture {
                        name: name.to_owned(),
                        hash,
                        signature,
                    }
                })
                .collect::<Vec<_>>();
            let content = manifest(&signed_files);
            let (self_hash, self_signature) = self.sign(&content);

            SignatureBlockFixture {
                hash_algorithm: self.hash_code,
                signature_algorithm: 2,
                self_signed_content: content,
                self_hash,
                self_signature,
                certificate,
                extension: false,
            }
        }
    }

    fn files() -> HashMap<&'static str, Vec<u8>> {
        HashMap::from([
            (BU_NAME, b"bulletin bytes".to_vec()),
            (RDV_NAME, b"record bytes".to_vec()),
        ])
    }

    fn envelope(software: SignatureBlockFixture, hardware: SignatureBlockFixture) -> SignatureEnvelope {
        decode_as(
            &SignatureEnvelopeFixture {
                model: 20,
                software,
                hardware,
            }
            .encode(),
        )
        .unwrap()
    }

    fn ecdsa_signer() -> Signer {
        Signer {
            key: test_keys::ecdsa(),
            hash_algorithm: HashAlgorithm::Sha512,
            hash_code: 4,
        }
    }

    fn rsa_signer() -> Signer {
        Signer {
            key: test_keys::rsa(),
            hash_algorithm: HashAlgorithm::Sha256,
            hash_code: 2,
        }
    }

    fn labels(outcomes: &[VerificationOutcome]) -> Vec<(CheckKind, &'static str)> {
        outcomes
            .iter()
            .map(|outcome| (outcome.check, outcome.status.label()))
            .collect()
    }

    #[test]
    fn test_all_checks_pass() {
        let files = files();
        let software = ecdsa_signer();
        let hardware = rsa_signer();
        let software_cert = test_keys::certificate(&software.key, "software").to_der().unwrap();
        let hardware_cert = test_keys::certificate(&hardware.key, "hardware").to_pem().unwrap();

        let envelope = envelope(
            software.block(&files, Some(software_cert)),
            hardware.block(&files, Some(hardware_cert)),
        );
        let outcomes = verify_signature_envelope(&envelope, |name| files.get(name).cloned());

        assert_eq!(outcomes.len(), 12);
        assert!(outcomes.iter().all(|o| o.status.is_passed()), "{outcomes:#?}");
        assert_eq!(outcomes[2].subject, format!("software {BU_NAME}"));
        assert_eq!(outcomes[2].location.municipality, Some(88_986));
        assert_eq!(outcomes[2].location.zone, Some(7));
        assert_eq!(outcomes[2].location.section, Some(55));
    }

    #[test]
    fn test_tampered_file_fails_hash() {
        let files = files();
        let signer = ecdsa_signer();
        let certificate = test_keys::certificate(&signer.key, "software").to_der().unwrap();
        let block = signer.block(&files, Some(certificate));
        let envelope = envelope(block.clone(), block);

        let outcomes = verify_signature_envelope(&envelope, |name| {
            let mut contents = files.get(name).cloned()?;
            if name == RDV_NAME {
                contents.push(b'!');
            }
            Some(contents)
        });

        assert_eq!(
            labels(&outcomes[..6]),
            vec![
                (CheckKind::SelfContentHash, "ok"),
                (CheckKind::SelfContentSignature, "ok"),
                (CheckKind::FileHash, "ok"),
                (CheckKind::FileSignature, "ok"),
                (CheckKind::FileHash, "failed"),
                (CheckKind::FileSignature, "failed"),
            ]
        );
        assert!(matches!(
            outcomes[4].status,
            Status::Failed(VerificationError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_certificate_is_skipped() {
        let files = files();
        let signer = ecdsa_signer();
        let envelope = envelope(signer.block(&files, None), signer.block(&files, None));

        let outcomes = verify_signature_envelope(&envelope, |name| files.get(name).cloned());
        let signature_outcomes = outcomes
            .iter()
            .filter(|o| {
                matches!(
                    o.check,
                    CheckKind::SelfContentSignature | CheckKind::FileSignature
                )
            })
            .collect::<Vec<_>>();

        assert_eq!(signature_outcomes.len(), 6);
        assert!(signature_outcomes.iter().all(|o| matches!(
            o.status,
            Status::Skipped(SkipReason::NoCertificate)
        )));
        assert!(!outcomes.iter().any(|o| o.status.is_failed()));
    }

    #[test]
    fn test_unavailable_sibling_is_skipped() {
        let files = files();
        let signer = ecdsa_signer();
        let envelope = envelope(signer.block(&files, None), signer.block(&files, None));

        let outcomes = verify_signature_envelope(&envelope, |name| {
            (name == BU_NAME).then(|| files[name].clone())
        });
        let unavailable = outcomes
            .iter()
            .filter(|o| matches!(o.status, Status::Skipped(SkipReason::FileUnavailable)))
            .collect::<Vec<_>>();

        assert_eq!(unavailable.len(), 2);
        assert_eq!(unavailable[0].location.filename.as_deref(), Some(RDV_NAME));
    }

    #[test]
    fn test_wrong_certificate_fails_signatures() {
        let files = files();
        let signer = ecdsa_signer();
        let stranger = test_keys::certificate(&test_keys::ecdsa(), "stranger").to_der().unwrap();
        let block = signer.block(&files, Some(stranger));
        let envelope = envelope(block.clone(), block);

        let outcomes = verify_signature_envelope(&envelope, |name| files.get(name).cloned());
        assert!(outcomes
            .iter()
            .filter(|o| o.check == CheckKind::FileSignature)
            .all(|o| matches!(o.status, Status::Failed(VerificationError::SignatureInvalid))));
        assert!(outcomes
            .iter()
            .filter(|o| o.check == CheckKind::FileHash)
            .all(|o| o.status.is_passed()));
    }

    #[test]
    fn test_unparseable_certificate_fails_signatures_only() {
        let files = files();
        let signer = ecdsa_signer();
        let block = signer.block(&files, Some(b"garbage".to_vec()));
        let envelope = envelope(block.clone(), block);

        let outcomes = verify_signature_envelope(&envelope, |name| files.get(name).cloned());
        for outcome in &outcomes {
            match outcome.check {
                CheckKind::SelfContentHash | CheckKind::FileHash => {
                    assert!(outcome.status.is_passed());
                }
                _ => assert!(matches!(
                    outcome.status,
                    Status::Failed(VerificationError::CertificateParse(_))
                )),
            }
        }
    }

    #[test]
    fn test_malformed_manifest() {
        let signer = ecdsa_signer();
        let content = b"\x30\x02\x30".to_vec();
        let (self_hash, self_signature) = signer.sign(&content);
        let block = SignatureBlockFixture {
            hash_algorithm: 4,
            signature_algorithm: 2,
            self_signed_content: content,
            self_hash,
            self_signature,
            certificate: None,
            extension: false,
        };
        let envelope = envelope(block.clone(), block);

        let outcomes = verify_signature_envelope(&envelope, |_| None);
        assert_eq!(
            labels(&outcomes),
            vec![
                (CheckKind::SelfContentHash, "ok"),
                (CheckKind::SelfContentSignature, "skipped"),
                (CheckKind::Manifest, "failed"),
                (CheckKind::SelfContentHash, "ok"),
                (CheckKind::SelfContentSignature, "skipped"),
                (CheckKind::Manifest, "failed"),
            ]
        );
    }

    #[test]
    fn test_inspect_certificates() {
        let files = files();
        let signer = ecdsa_signer();
        let mut padded = test_keys::certificate(&signer.key, "UE software").to_der().unwrap();
        padded.push(0);

        let envelope = envelope(
            signer.block(&files, Some(padded)),
            signer.block(&files, None),
        );
        let inspections = inspect_certificates(&envelope);

        assert_eq!(inspections.len(), 2);
        assert_eq!(inspections[0].origin, SignatureOrigin::Software);
        assert_eq!(
            inspections[0].certificate().unwrap().strategy,
            ParseStrategy::TrimmedDer(1)
        );
        assert_eq!(
            inspections[0].outcome().subject,
            "software certificate UE software (DER with 1 padding bytes removed)"
        );
        assert!(inspections[1].result.is_none());
        assert!(matches!(
            inspections[1].outcome().status,
            Status::Skipped(SkipReason::NoCertificate)
        ));
    }
}
