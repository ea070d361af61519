use tlv::RawValue;
use tlv_derive::{Choice, Decode};

use crate::{
    common::{
        Correspondence, EntityHeader, Machine, OfficeCode, OfficeKind, Phase, PollingSection,
        SectionKey, Timestamp, VoteKind,
    },
    envelope::{EnvelopeKind, EnvelopePayload},
};

/// A voting machine's official vote count report.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct Bulletin {
    pub header: EntityHeader,
    pub phase: Phase,
    pub machine: Machine,
    pub section: PollingSection,
    pub issued_at: Timestamp,
    pub section_data: RawValue,
    #[tlv(tag = 1, optional)]
    pub voters_released_by_code: Option<u64>,
    #[tlv(tag = 2, optional)]
    pub voters_biometric_mismatch: Option<u64>,
    #[tlv(tag = 3, sequence_of)]
    pub results: Vec<ElectionResult>,
    #[tlv(tag = 4, optional, sequence_of)]
    pub correspondence_history: Vec<Correspondence>,
    #[tlv(tag = 5, optional, sequence_of)]
    pub printed_vote_history: Vec<PrintedVoteHistory>,
    pub vote_signing_key: Vec<u8>,
}

impl EnvelopePayload for Bulletin {
    const KIND: EnvelopeKind = EnvelopeKind::Bulletin;
}

impl Bulletin {
    pub const fn section_key(&self) -> SectionKey {
        self.section.key()
    }

    /// The charge code of the memory card load this bulletin was produced
    /// under.
    pub fn charge_code(&self) -> &str {
        &self.machine.correspondence.charge.charge_code
    }

    pub fn section_data(&self) -> tlv::Result<SectionData> {
        self.section_data.resolve()
    }

    /// Every per-candidate vote total paired with the office total it
    /// belongs to.
    pub fn vote_totals(&self) -> impl Iterator<Item = (&OfficeVoteTotal, &CandidateVoteTotal)> {
        self.results
            .iter()
            .flat_map(|result| &result.offices)
            .flat_map(|office| &office.totals)
            .flat_map(|total| total.candidates.iter().map(move |candidate| (total, candidate)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct SectionTimes {
    pub opened_at: Timestamp,
    pub closed_at: Timestamp,
    #[tlv(optional)]
    pub printed_vote_shutdown_at: Option<Timestamp>,
}

/// Tally system data, present when the bulletin was not produced by the
/// section's own machine.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct TallySystemData {
    pub board: u32,
    pub panel: u32,
    pub origin_machine_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Choice)]
pub enum SectionData {
    #[tlv(tag = 0)]
    Section(SectionTimes),
    #[tlv(tag = 1)]
    TallySystem(TallySystemData),
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct PrintedVoteHistory {
    pub printer_id: u32,
    pub repository_id: u32,
    pub powered_on_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct ElectionResult {
    pub election_id: u32,
    pub eligible_voters: u64,
    #[tlv(sequence_of)]
    pub offices: Vec<OfficeResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct OfficeResult {
    pub kind: OfficeKind,
    pub turnout: u64,
    #[tlv(sequence_of)]
    pub totals: Vec<OfficeVoteTotal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct OfficeVoteTotal {
    pub office_code: RawValue,
    pub print_order: u32,
    #[tlv(sequence_of)]
    pub candidates: Vec<CandidateVoteTotal>,
}

impl OfficeVoteTotal {
    pub fn office_code(&self) -> tlv::Result<OfficeCode> {
        self.office_code.resolve()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub struct CandidateId {
    pub party: u32,
    pub number: u32,
}

/// Votes of one kind for one candidate (or blank/null), with the detached
/// signature the machine produced over them.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct CandidateVoteTotal {
    #[tlv(tag = 1)]
    pub kind: VoteKind,
    #[tlv(tag = 2)]
    pub count: u64,
    #[tlv(tag = 3, optional)]
    pub candidate: Option<CandidateId>,
    pub signature: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        common::{CorrespondenceIdentity, ElectoralId, Office},
        decode_as, decode_enveloped,
        fixtures::{BulletinFixture, OfficeCodeFixture, OfficeFixture, TotalFixture},
        DecodeError,
    };

    #[test]
    fn test_reference_bulletin_section_key() {
        let bulletin: Bulletin = decode_enveloped(&BulletinFixture::default().envelope()).unwrap();

        assert_eq!(
            bulletin.section_key(),
            SectionKey {
                municipality: 88_986,
                zone: 7,
                local: 1,
                section: 55
            }
        );
        assert_eq!(bulletin.charge_code(), "489.551.271.893.117.614");
        assert_eq!(bulletin.header.electoral_id().unwrap(), ElectoralId::Election(544));
        assert_eq!(bulletin.voters_released_by_code, Some(3));
        assert_eq!(bulletin.voters_biometric_mismatch, None);
    }

    #[test]
    fn test_optional_histories_absent() {
        let bulletin: Bulletin = decode_as(&BulletinFixture::default().encode()).unwrap();
        assert!(bulletin.correspondence_history.is_empty());
        assert!(bulletin.printed_vote_history.is_empty());
        assert_eq!(bulletin.vote_signing_key, vec![0; 32]);
    }

    #[test]
    fn test_optional_histories_present() {
        let fixture = BulletinFixture {
            correspondence_history: true,
            printed_vote_history: true,
            ..BulletinFixture::default()
        };
        let bulletin: Bulletin = decode_as(&fixture.encode()).unwrap();

        assert_eq!(bulletin.correspondence_history.len(), 1);
        assert!(matches!(
            bulletin.correspondence_history[0].identity().unwrap(),
            CorrespondenceIdentity::Section(section) if section.key() == bulletin.section_key()
        ));
        assert_eq!(
            bulletin.printed_vote_history,
            vec![PrintedVoteHistory {
                printer_id: 11,
                repository_id: 12,
                powered_on_at: "20221002T075500".into(),
            }]
        );
    }

    #[test]
    fn test_section_data() {
        let bulletin: Bulletin = decode_as(&BulletinFixture::default().encode()).unwrap();
        assert_eq!(
            bulletin.section_data().unwrap(),
            SectionData::Section(SectionTimes {
                opened_at: "20221002T080000".into(),
                closed_at: "20221002T170000".into(),
                printed_vote_shutdown_at: None,
            })
        );
    }

    #[test]
    fn test_vote_totals() {
        let bulletin: Bulletin = decode_as(&BulletinFixture::default().encode()).unwrap();
        let totals = bulletin.vote_totals().collect::<Vec<_>>();

        assert_eq!(totals.len(), 4);
        let (office_total, null) = totals[3];
        assert_eq!(
            office_total.office_code().unwrap(),
            OfficeCode::Constitutional(Office::President)
        );
        assert_eq!(null.kind, VoteKind::Null);
        assert_eq!(null.count, 6);
        assert_eq!(null.candidate, None);
        assert_eq!(
            totals[0].1.candidate,
            Some(CandidateId {
                party: 13,
                number: 13
            })
        );
    }

    #[test]
    fn test_unresolvable_office_code_still_decodes() {
        let fixture = BulletinFixture {
            offices: vec![OfficeFixture {
                code: OfficeCodeFixture::Raw(tlv::Tag::context(9, false), vec![0x01]),
                totals: vec![TotalFixture::blank(1)],
            }],
            ..BulletinFixture::default()
        };
        let bulletin: Bulletin = decode_as(&fixture.encode()).unwrap();
        let (office_total, _) = bulletin.vote_totals().next().unwrap();
        assert!(matches!(
            office_total.office_code(),
            Err(tlv::Error::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_empty_results_is_malformed() {
        let fixture = BulletinFixture {
            offices: Vec::new(),
            ..BulletinFixture::default()
        };
        let error = decode_as::<Bulletin>(&fixture.encode()).unwrap_err();
        let DecodeError::MalformedEncoding(error) = error else {
            panic!("expected a malformed encoding error");
        };
        assert_eq!(error.root_cause(), &tlv::Error::EmptySequenceOf);
        assert_eq!(
            error.path(),
            vec!["Bulletin.results", "ElectionResult.offices"]
        );
    }

    #[test]
    fn test_truncated_bulletin_is_malformed() {
        let bytes = BulletinFixture::default().encode();
        for cut in [1, 10, bytes.len() / 2] {
            assert!(matches!(
                decode_as::<Bulletin>(&bytes[..bytes.len() - cut]),
                Err(DecodeError::MalformedEncoding(_))
            ));
        }
    }
}
