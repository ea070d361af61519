//! Verification of the per-candidate signatures inside a bulletin.

use openssl::pkey::{Id, PKey, Public};
use types_rs::{signature::HashAlgorithm, Bulletin, CandidateVoteTotal, VoteKind};

use crate::{
    crypto::{digest, verify_digest_signature},
    outcome::{CheckKind, Location, VerificationError, VerificationOutcome},
    payload::canonical_payload,
};

fn describe(office: &str, total: &CandidateVoteTotal) -> String {
    match (total.kind, total.candidate) {
        (VoteKind::Nominal | VoteKind::Slate, Some(candidate)) => {
            format!("{office} {:?} {}", total.kind, candidate.number)
        }
        (kind, _) => format!("{office} {kind:?}"),
    }
}

fn verify_total(
    key: &PKey<Public>,
    payload: &[u8],
    signature: &[u8],
) -> Result<bool, VerificationError> {
    let digest = digest(HashAlgorithm::Sha512, payload)?;
    verify_digest_signature(key, HashAlgorithm::Sha512, &digest, signature)
}

/// Checks the signature of every candidate vote total in `bulletin` against
/// its vote signing key. Every total yields exactly one outcome; nothing
/// here stops at the first failure.
#[tracing::instrument(level = "debug", skip(bulletin), fields(section = %bulletin.section_key()))]
pub fn verify_bulletin(bulletin: &Bulletin) -> Vec<VerificationOutcome> {
    let location = Location::from_section(bulletin.section_key());
    let key = PKey::public_key_from_raw_bytes(&bulletin.vote_signing_key, Id::ED25519)
        .map_err(|error| {
            tracing::warn!(%error, "bulletin vote signing key is unusable");
            VerificationError::UnsupportedKey(error.to_string())
        });

    let outcomes = bulletin
        .vote_totals()
        .map(|(office_total, total)| {
            let office = match office_total.office_code() {
                Ok(office) => office,
                Err(error) => {
                    return VerificationOutcome::failed(
                        CheckKind::CandidateTally,
                        location.clone(),
                        describe("unknown office", total),
                        VerificationError::UnknownOfficeCode(error),
                    );
                }
            };

            let subject = describe(&office.to_string(), total);
            let payload = canonical_payload(&office, total, bulletin.charge_code());
            let result = key
                .as_ref()
                .map_err(Clone::clone)
                .and_then(|key| verify_total(key, &payload, &total.signature));

            let outcome = match result {
                Ok(true) => {
                    VerificationOutcome::passed(CheckKind::CandidateTally, location.clone(), subject)
                }
                Ok(false) => VerificationOutcome::failed(
                    CheckKind::CandidateTally,
                    location.clone(),
                    subject,
                    VerificationError::SignatureInvalid,
                ),
                Err(error) => VerificationOutcome::failed(
                    CheckKind::CandidateTally,
                    location.clone(),
                    subject,
                    error,
                ),
            };
            outcome.with_payload(payload)
        })
        .collect::<Vec<_>>();

    let failures = outcomes.iter().filter(|o| o.status.is_failed()).count();
    if failures > 0 {
        tracing::warn!(failures, total = outcomes.len(), "bulletin signatures did not verify");
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use openssl::pkey::Private;
    use pretty_assertions::assert_eq;
    use types_rs::{
        decode_enveloped,
        fixtures::{BulletinFixture, OfficeCodeFixture, OfficeFixture, TotalFixture},
        OfficeCode,
    };

    use super::*;
    use crate::{crypto::test_keys, outcome::Status};

    /// Signs every total of `fixture` with `key`, the way the machine would.
    fn signed(mut fixture: BulletinFixture, key: &PKey<Private>) -> Bulletin {
        let unsigned: Bulletin = decode_enveloped(&fixture.envelope()).unwrap();
        let charge_code = unsigned.charge_code().to_owned();

        let mut totals = unsigned.vote_totals();
        for office in &mut fixture.offices {
            for total in &mut office.totals {
                let (office_total, decoded) = totals.next().unwrap();
                let Ok(code) = office_total.office_code() else {
                    continue;
                };
                let payload = canonical_payload(&code, decoded, &charge_code);
                let digest = digest(HashAlgorithm::Sha512, &payload).unwrap();
                total.signature = test_keys::sign_digest(key, HashAlgorithm::Sha512, &digest);
            }
        }

        fixture.vote_signing_key = key.raw_public_key().unwrap();
        decode_enveloped(&fixture.envelope()).unwrap()
    }

    #[test]
    fn test_valid_signatures_pass() {
        let key = test_keys::ed25519();
        let bulletin = signed(BulletinFixture::default(), &key);
        let outcomes = verify_bulletin(&bulletin);

        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.status.is_passed()), "{outcomes:#?}");
        assert_eq!(outcomes[0].subject, "President Nominal 13");
        assert_eq!(outcomes[3].subject, "President Null");
        assert_eq!(outcomes[0].location.municipality, Some(88_986));
        assert_eq!(outcomes[0].location.section, Some(55));
        assert_eq!(
            outcomes[3].payload_text().unwrap(),
            "136489.551.271.893.117.614"
        );
    }

    #[test]
    fn test_tampered_count_fails_alone() {
        let key = test_keys::ed25519();
        let mut bulletin = signed(BulletinFixture::default(), &key);
        bulletin.results[0].offices[0].totals[0].candidates[1].count += 1;

        let outcomes = verify_bulletin(&bulletin);
        let statuses = outcomes
            .iter()
            .map(|o| o.status.label())
            .collect::<Vec<_>>();
        assert_eq!(statuses, vec!["ok", "failed", "ok", "ok"]);
        assert!(matches!(
            outcomes[1].status,
            Status::Failed(VerificationError::SignatureInvalid)
        ));
        assert!(outcomes[1].payload.is_some());
    }

    #[test]
    fn test_verification_is_deterministic() {
        let key = test_keys::ed25519();
        let mut bulletin = signed(BulletinFixture::default(), &key);
        bulletin.results[0].offices[0].totals[0].candidates[2].signature[0] ^= 0xff;

        let labels = |outcomes: Vec<VerificationOutcome>| {
            outcomes
                .into_iter()
                .map(|o| (o.status.label(), o.payload))
                .collect::<Vec<_>>()
        };
        assert_eq!(
            labels(verify_bulletin(&bulletin)),
            labels(verify_bulletin(&bulletin))
        );
    }

    #[test]
    fn test_unknown_office_code_is_reported() {
        let key = test_keys::ed25519();
        let fixture = BulletinFixture {
            offices: vec![
                OfficeFixture {
                    code: OfficeCodeFixture::Raw(tlv::Tag::context(9, false), vec![0x01]),
                    totals: vec![TotalFixture::blank(1)],
                },
                OfficeFixture {
                    code: OfficeCodeFixture::Consultation(3),
                    totals: vec![TotalFixture::null(2)],
                },
            ],
            ..BulletinFixture::default()
        };
        let bulletin = signed(fixture, &key);
        assert_eq!(
            bulletin.results[0].offices[1].totals[0].office_code().unwrap(),
            OfficeCode::Consultation(3)
        );

        let outcomes = verify_bulletin(&bulletin);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0].status,
            Status::Failed(VerificationError::UnknownOfficeCode(_))
        ));
        assert!(outcomes[1].status.is_passed());
    }

    #[test]
    fn test_unusable_key_fails_every_total() {
        let bulletin: Bulletin = decode_enveloped(
            &BulletinFixture {
                vote_signing_key: vec![0; 5],
                ..BulletinFixture::default()
            }
            .envelope(),
        )
        .unwrap();

        let outcomes = verify_bulletin(&bulletin);
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| matches!(
            o.status,
            Status::Failed(VerificationError::UnsupportedKey(_))
        )));
    }
}
