//! Digital vote records: every vote cast on a machine, in shuffled order.

use std::fmt::Display;

use tlv::{Decode, Error, RawValue, Tag};
use tlv_derive::{Choice, Decode};

use crate::{
    common::{EntityHeader, Machine, OfficeCode, Phase, PollingSection, VoteKind},
    envelope::{EnvelopeKind, EnvelopePayload},
};

/// The contents of a `.rdv` file.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct RdvFile {
    pub header: EntityHeader,
    pub machine: Machine,
    pub record: DigitalVoteRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct DigitalVoteRecord {
    pub contest_id: u32,
    pub phase: Phase,
    pub section: PollingSection,
    pub elections: RawValue,
}

impl EnvelopePayload for DigitalVoteRecord {
    const KIND: EnvelopeKind = EnvelopeKind::DigitalVoteRecord;
}

impl DigitalVoteRecord {
    pub fn elections(&self) -> tlv::Result<Elections> {
        self.elections.resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Choice)]
pub enum Elections {
    /// Votes cast by voters on the machine.
    #[tlv(tag = 0, sequence_of)]
    VoterCast(Vec<ElectionVotes>),
    /// Votes keyed in by the tally system.
    #[tlv(tag = 1, sequence_of)]
    TallySystem(Vec<TallySystemElectionVotes>),
}

impl Elections {
    /// Election id and office votes of every election, regardless of origin.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (u32, &[OfficeVotes])> + '_> {
        match self {
            Self::VoterCast(elections) => Box::new(
                elections
                    .iter()
                    .map(|election| (election.election_id, election.offices.as_slice())),
            ),
            Self::TallySystem(elections) => Box::new(
                elections
                    .iter()
                    .map(|election| (election.election_id, election.offices.as_slice())),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct ElectionVotes {
    pub election_id: u32,
    #[tlv(sequence_of)]
    pub offices: Vec<OfficeVotes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum BallotKind {
    Official = 1,
    Paper = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum VoteOrigin {
    Ballot = 1,
    DigitalVoteRecord = 2,
    Bulletin = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct TallySystemElectionVotes {
    pub election_id: u32,
    pub ballot_kind: BallotKind,
    pub origin: VoteOrigin,
    #[tlv(sequence_of)]
    pub offices: Vec<OfficeVotes>,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct OfficeVotes {
    pub office_code: RawValue,
    pub max_choices: u32,
    #[tlv(sequence_of)]
    pub votes: Vec<Vote>,
}

impl OfficeVotes {
    pub fn office_code(&self) -> tlv::Result<OfficeCode> {
        self.office_code.resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct Vote {
    pub kind: RdvVoteKind,
    #[tlv(optional)]
    pub typed: Option<String>,
}

/// Vote kind in a digital vote record. Records use the bulletin kinds plus
/// four unnamed kinds numbered 6 to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdvVoteKind {
    Named(VoteKind),
    Unnamed(u8),
}

impl RdvVoteKind {
    const LAST_UNNAMED: i64 = 9;

    pub const fn code(&self) -> u8 {
        match self {
            Self::Named(kind) => kind.code(),
            Self::Unnamed(code) => *code,
        }
    }
}

impl Display for RdvVoteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Named(kind) => write!(f, "{kind:?}"),
            Self::Unnamed(code) => write!(f, "Kind{code}"),
        }
    }
}

impl Decode for RdvVoteKind {
    fn accepts(tag: &Tag) -> bool {
        *tag == Tag::ENUMERATED
    }

    fn decode_contents(tag: &Tag, contents: &[u8]) -> tlv::Result<Self> {
        match VoteKind::decode_contents(tag, contents) {
            Ok(kind) => Ok(Self::Named(kind)),
            Err(Error::InvalidEnumerated { value, .. })
                if (i64::from(VoteKind::NoCandidate.code()) + 1..=Self::LAST_UNNAMED)
                    .contains(&value) =>
            {
                Ok(Self::Unnamed(value as u8))
            }
            Err(Error::InvalidEnumerated { value, .. }) => Err(Error::InvalidEnumerated {
                type_name: "RdvVoteKind",
                value,
            }),
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        common::Office,
        fixtures::{OfficeCodeFixture, RdvFixture, RdvOfficeFixture},
    };

    #[test]
    fn test_rdv_vote_kind() {
        assert_eq!(
            RdvVoteKind::decode_contents(&Tag::ENUMERATED, &[0x03]),
            Ok(RdvVoteKind::Named(VoteKind::Null))
        );
        assert_eq!(
            RdvVoteKind::decode_contents(&Tag::ENUMERATED, &[0x08]),
            Ok(RdvVoteKind::Unnamed(8))
        );
        assert_eq!(
            RdvVoteKind::decode_contents(&Tag::ENUMERATED, &[0x0a]),
            Err(Error::InvalidEnumerated {
                type_name: "RdvVoteKind",
                value: 10
            })
        );
        assert_eq!(RdvVoteKind::Unnamed(8).to_string(), "Kind8");
        assert_eq!(RdvVoteKind::Named(VoteKind::Blank).to_string(), "Blank");
    }

    #[test]
    fn test_decode_voter_cast_record() {
        let file: RdvFile = crate::decode_as(&RdvFixture::default().encode()).unwrap();
        assert_eq!(file.record.section.key().municipality, 88_986);
        assert_eq!(file.machine.correspondence.charge.charge_code, "489.551.271.893.117.614");

        let Elections::VoterCast(elections) = file.record.elections().unwrap() else {
            panic!("expected voter-cast elections");
        };
        assert_eq!(elections.len(), 1);
        let office = &elections[0].offices[0];
        assert_eq!(
            office.office_code().unwrap(),
            OfficeCode::Constitutional(Office::President)
        );
        assert_eq!(office.max_choices, 1);
        assert_eq!(
            office.votes,
            vec![
                Vote {
                    kind: RdvVoteKind::Named(VoteKind::Nominal),
                    typed: Some("13".to_owned()),
                },
                Vote {
                    kind: RdvVoteKind::Named(VoteKind::Blank),
                    typed: None,
                },
                Vote {
                    kind: RdvVoteKind::Named(VoteKind::Null),
                    typed: Some("99".to_owned()),
                },
            ]
        );
    }

    #[test]
    fn test_decode_tally_system_record() {
        let fixture = RdvFixture {
            tally_system: true,
            offices: vec![RdvOfficeFixture {
                code: OfficeCodeFixture::Consultation(7),
                max_choices: 2,
                votes: vec![(6, None)],
            }],
            ..RdvFixture::default()
        };
        let file: RdvFile = crate::decode_as(&fixture.encode()).unwrap();
        let elections = file.record.elections().unwrap();

        let Elections::TallySystem(ref tally_system) = elections else {
            panic!("expected tally-system elections");
        };
        assert_eq!(tally_system[0].ballot_kind, BallotKind::Official);
        assert_eq!(tally_system[0].origin, VoteOrigin::DigitalVoteRecord);

        let (election_id, offices) = elections.iter().next().unwrap();
        assert_eq!(election_id, 544);
        assert_eq!(offices[0].office_code().unwrap(), OfficeCode::Consultation(7));
        assert_eq!(offices[0].votes[0].kind, RdvVoteKind::Unnamed(6));
    }
}
