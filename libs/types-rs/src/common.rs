//! Types shared by bulletins, digital vote records, and envelopes.

use std::{fmt::Display, str::FromStr};

use serde::Serialize;
use time::{macros::format_description, PrimitiveDateTime};
use tlv::{Class, Decode, RawValue};
use tlv_derive::{Choice, Decode};

/// A `YYYYMMDDThhmmss` timestamp as written by the voting machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[repr(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parses the timestamp, returning `None` if it is not well formed.
    pub fn parse(&self) -> Option<PrimitiveDateTime> {
        PrimitiveDateTime::parse(
            &self.0,
            format_description!("[year][month][day]T[hour][minute][second]"),
        )
        .ok()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Timestamp {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Decode for Timestamp {
    fn accepts(tag: &tlv::Tag) -> bool {
        String::accepts(tag)
    }

    fn decode_contents(tag: &tlv::Tag, contents: &[u8]) -> tlv::Result<Self> {
        String::decode_contents(tag, contents).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Decode)]
pub enum Phase {
    Simulation = 1,
    Official = 2,
    Training = 3,
}

#[derive(Debug, Clone, PartialEq, Eq, Choice)]
pub enum ElectoralId {
    #[tlv(tag = 0)]
    Process(u32),
    #[tlv(tag = 1)]
    Contest(u32),
    #[tlv(tag = 2)]
    Election(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct EntityHeader {
    pub generated_at: Timestamp,
    pub electoral_id: RawValue,
}

impl EntityHeader {
    pub fn electoral_id(&self) -> tlv::Result<ElectoralId> {
        self.electoral_id.resolve()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum MachineKind {
    Section = 1,
    Contingency = 3,
    ReserveSection = 4,
    ReserveClosingSection = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum FileKind {
    VotingMachine = 1,
    DataRecovery = 2,
    MixedPartialBallots = 3,
    MixedPrintedBulletin = 4,
    ManualEntry = 5,
    Electronic = 6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum TallyKind {
    FullyManual = 1,
    FullyElectronic = 2,
    MixedBulletin = 3,
    MixedResultMedia = 4,
}

/// Why a mixed tally used the result media of the machine. Unlisted codes
/// decode as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum MixedResultMediaReason {
    ContingencyUnsuccessful = 1,
    ContingencyMachineUnavailable = 2,
    ContingencyFlashUnavailable = 3,
    PowerFailure = 4,
    MachineReplacementImpossible = 5,
    MachineReplacementNotRequested = 6,
    #[tlv(other)]
    Other = 99,
}

/// Why a mixed tally used the printed bulletin. Unlisted codes decode as
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum MixedPrintedBulletinReason {
    WrongDateTime = 1,
    MachineFailure = 2,
    MachineFromAnotherSection = 3,
    MachinePreparedIncorrectly = 4,
    MachineArrivedAfterVotingStarted = 5,
    #[tlv(other)]
    Other = 99,
}

/// Why votes were keyed in manually. Unlisted codes decode as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum ManualEntryReason {
    MachineFailure = 1,
    MachineUnavailableAtStart = 2,
    MachineFromAnotherSection = 3,
    #[tlv(other)]
    Other = 99,
}

/// Reason code of a fully electronic tally. No value set is published for
/// it, so the code is kept as read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectronicTallyReason(pub i64);

impl Decode for ElectronicTallyReason {
    fn accepts(tag: &tlv::Tag) -> bool {
        *tag == tlv::Tag::ENUMERATED
    }

    fn decode_contents(_tag: &tlv::Tag, contents: &[u8]) -> tlv::Result<Self> {
        tlv::decode_integer_contents(contents).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct MixedResultMediaTally {
    pub kind: TallyKind,
    pub reason: MixedResultMediaReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct MixedPrintedBulletinTally {
    pub kind: TallyKind,
    pub reason: MixedPrintedBulletinReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct ManualEntryTally {
    pub kind: TallyKind,
    pub reason: ManualEntryReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct ElectronicTally {
    pub kind: TallyKind,
    pub reason: ElectronicTallyReason,
}

/// Why the tally system, rather than a voting machine, produced a file.
#[derive(Debug, Clone, PartialEq, Eq, Choice)]
pub enum TallySystemReason {
    #[tlv(tag = 0)]
    MixedResultMedia(MixedResultMediaTally),
    #[tlv(tag = 1)]
    MixedPrintedBulletin(MixedPrintedBulletinTally),
    #[tlv(tag = 2)]
    ManualEntry(ManualEntryTally),
    #[tlv(tag = 3)]
    Electronic(ElectronicTally),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub struct MunicipalityZone {
    pub municipality: u32,
    pub zone: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub struct PollingSection {
    pub municipality_zone: MunicipalityZone,
    pub local: u32,
    pub section: u32,
}

/// The composite key identifying a polling section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SectionKey {
    pub municipality: u32,
    pub zone: u32,
    pub local: u32,
    pub section: u32,
}

impl PollingSection {
    pub const fn key(&self) -> SectionKey {
        SectionKey {
            municipality: self.municipality_zone.municipality,
            zone: self.municipality_zone.zone,
            local: self.local,
            section: self.section,
        }
    }
}

impl Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "municipality={} zone={} local={} section={}",
            self.municipality, self.zone, self.local, self.section
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub struct JustificationBooth {
    pub municipality_zone: MunicipalityZone,
    pub booth: u32,
    pub machine: u32,
}

/// Identity of the machine an envelope came from.
#[derive(Debug, Clone, PartialEq, Eq, Choice)]
pub enum MachineIdentity {
    #[tlv(tag = 0)]
    Section(PollingSection),
    #[tlv(tag = 1)]
    JustificationBooth(JustificationBooth),
}

/// Identity a result was produced for: a section or a contingency machine.
#[derive(Debug, Clone, PartialEq, Eq, Choice)]
pub enum CorrespondenceIdentity {
    #[tlv(tag = 0)]
    Section(PollingSection),
    #[tlv(tag = 1)]
    Contingency(MunicipalityZone),
}

/// The memory card load a machine was provisioned with.
#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct Charge {
    pub machine_number: u32,
    pub flash_card_serial: Vec<u8>,
    pub charged_at: Timestamp,
    pub charge_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct Correspondence {
    pub identity: RawValue,
    pub charge: Charge,
}

impl Correspondence {
    pub fn identity(&self) -> tlv::Result<CorrespondenceIdentity> {
        self.identity.resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Decode)]
pub struct Machine {
    pub kind: MachineKind,
    pub software_version: String,
    pub correspondence: Correspondence,
    pub file_kind: FileKind,
    pub flash_serial: Vec<u8>,
    #[tlv(optional)]
    pub tally_system_reason: Option<RawValue>,
}

impl Machine {
    pub fn tally_system_reason(&self) -> Option<tlv::Result<TallySystemReason>> {
        self.tally_system_reason.as_ref().map(RawValue::resolve)
    }

    /// The flash serial number as an integer, when it is four bytes long.
    pub fn flash_serial_number(&self) -> Option<u32> {
        <[u8; 4]>::try_from(self.flash_serial.as_slice())
            .ok()
            .map(u32::from_be_bytes)
    }
}

/// A constitutional office, numbered as on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Decode,
)]
#[repr(u8)]
pub enum Office {
    President = 1,
    VicePresident = 2,
    Governor = 3,
    ViceGovernor = 4,
    Senator = 5,
    FederalDeputy = 6,
    StateDeputy = 7,
    DistrictDeputy = 8,
    FirstSenateAlternate = 9,
    SecondSenateAlternate = 10,
    Mayor = 11,
    ViceMayor = 12,
    Councillor = 13,
}

impl Office {
    pub const ALL: [Office; 13] = [
        Self::President,
        Self::VicePresident,
        Self::Governor,
        Self::ViceGovernor,
        Self::Senator,
        Self::FederalDeputy,
        Self::StateDeputy,
        Self::DistrictDeputy,
        Self::FirstSenateAlternate,
        Self::SecondSenateAlternate,
        Self::Mayor,
        Self::ViceMayor,
        Self::Councillor,
    ];

    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::President => "President",
            Self::VicePresident => "Vice President",
            Self::Governor => "Governor",
            Self::ViceGovernor => "Vice Governor",
            Self::Senator => "Senator",
            Self::FederalDeputy => "Federal Deputy",
            Self::StateDeputy => "State Deputy",
            Self::DistrictDeputy => "District Deputy",
            Self::FirstSenateAlternate => "First Senate Alternate",
            Self::SecondSenateAlternate => "Second Senate Alternate",
            Self::Mayor => "Mayor",
            Self::ViceMayor => "Vice Mayor",
            Self::Councillor => "Councillor",
        }
    }

    const fn portuguese_name(self) -> &'static str {
        match self {
            Self::President => "Presidente",
            Self::VicePresident => "Vice-presidente",
            Self::Governor => "Governador",
            Self::ViceGovernor => "Vice-governador",
            Self::Senator => "Senador",
            Self::FederalDeputy => "Deputado Federal",
            Self::StateDeputy => "Deputado Estadual",
            Self::DistrictDeputy => "Deputado Distrital",
            Self::FirstSenateAlternate => "Primeiro Suplente Senador",
            Self::SecondSenateAlternate => "Segundo Suplente Senador",
            Self::Mayor => "Prefeito",
            Self::ViceMayor => "Vice-prefeito",
            Self::Councillor => "Vereador",
        }
    }
}

impl Display for Office {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Office {
    type Err = String;

    /// Accepts the English or Portuguese name, ignoring case, spaces, and
    /// hyphens, or the numeric code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalize = |name: &str| {
            name.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        };
        let wanted = normalize(s);

        Self::ALL
            .into_iter()
            .find(|office| {
                normalize(office.name()) == wanted
                    || normalize(office.portuguese_name()) == wanted
                    || office.code().to_string() == wanted
            })
            .ok_or_else(|| format!("unknown office: {s}"))
    }
}

/// The office a vote total refers to: `[1]` a constitutional office, `[2]`
/// a consultation number.
///
/// The consultation number is read from the contents of a primitive `[2]`,
/// or from the INTEGER wrapped inside a constructed `[2]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeCode {
    Constitutional(Office),
    Consultation(u32),
}

impl tlv::Choice for OfficeCode {
    const NAME: &'static str = "OfficeCode";

    fn resolve(raw: &RawValue) -> tlv::Result<Self> {
        let unknown = || tlv::Error::UnknownVariant {
            choice: Self::NAME,
            tag: raw.tag,
        };
        if raw.tag.class != Class::ContextSpecific {
            return Err(unknown());
        }

        match raw.tag.number {
            1 => Office::decode_contents(&raw.tag, &raw.contents)
                .map(Self::Constitutional)
                .map_err(|e| e.in_field(Self::NAME, "Constitutional")),
            2 if raw.tag.constructed => tlv::from_slice::<u32>(&raw.contents)
                .map(Self::Consultation)
                .map_err(|e| e.in_field(Self::NAME, "Consultation")),
            2 => u32::decode_contents(&raw.tag, &raw.contents)
                .map(Self::Consultation)
                .map_err(|e| e.in_field(Self::NAME, "Consultation")),
            _ => Err(unknown()),
        }
    }

    fn tag_number(&self) -> u32 {
        match self {
            Self::Constitutional(_) => 1,
            Self::Consultation(_) => 2,
        }
    }
}

impl OfficeCode {
    /// The numeric code: the office number or the consultation number.
    pub fn number(&self) -> u32 {
        match self {
            Self::Constitutional(office) => u32::from(office.code()),
            Self::Consultation(number) => *number,
        }
    }

    pub const fn office(&self) -> Option<Office> {
        match self {
            Self::Constitutional(office) => Some(*office),
            Self::Consultation(_) => None,
        }
    }
}

impl Display for OfficeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constitutional(office) => Display::fmt(office, f),
            Self::Consultation(number) => write!(f, "Consultation {number}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Decode)]
pub enum OfficeKind {
    Majoritarian = 1,
    Proportional = 2,
    Consultation = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Decode)]
#[repr(u8)]
pub enum VoteKind {
    Nominal = 1,
    Blank = 2,
    Null = 3,
    Slate = 4,
    NoCandidate = 5,
}

impl VoteKind {
    pub const fn code(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tlv::{Choice, Encoder, Error, Tag};

    use super::*;
    use crate::fixtures::{polling_section, SectionFixture};

    #[test]
    fn test_office_from_str() {
        assert_eq!("President".parse(), Ok(Office::President));
        assert_eq!("presidente".parse(), Ok(Office::President));
        assert_eq!("Vice-Prefeito".parse(), Ok(Office::ViceMayor));
        assert_eq!("federal deputy".parse(), Ok(Office::FederalDeputy));
        assert_eq!("13".parse(), Ok(Office::Councillor));
        assert!("Emperor".parse::<Office>().is_err());
    }

    #[test]
    fn test_office_code_resolution() {
        let constitutional = RawValue::new(Tag::context(1, false), vec![0x01]);
        let code: OfficeCode = constitutional.resolve().unwrap();
        assert_eq!(code, OfficeCode::Constitutional(Office::President));
        assert_eq!(code.number(), 1);
        assert_eq!(code.tag_number(), 1);

        let consultation = RawValue::new(Tag::context(2, false), vec![0x00, 0x90]);
        let code: OfficeCode = consultation.resolve().unwrap();
        assert_eq!(code, OfficeCode::Consultation(144));
        assert_eq!(code.office(), None);
    }

    #[test]
    fn test_office_code_wrapped_consultation() {
        let wrapped = RawValue::new(Tag::context(2, true), vec![0x02, 0x01, 0x05]);
        assert_eq!(wrapped.resolve(), Ok(OfficeCode::Consultation(5)));

        let trailing = RawValue::new(Tag::context(2, true), vec![0x02, 0x01, 0x05, 0x00]);
        assert!(trailing.resolve::<OfficeCode>().is_err());

        let unknown = RawValue::new(Tag::context(3, false), vec![0x01]);
        assert!(matches!(
            unknown.resolve::<OfficeCode>(),
            Err(Error::UnknownVariant { choice: "OfficeCode", .. })
        ));
    }

    fn machine(reason: Option<(u32, i64, i64)>) -> Machine {
        let mut encoder = Encoder::new();
        encoder.constructed(Tag::SEQUENCE, |e| {
            e.integer(Tag::ENUMERATED, 1)
                .string(Tag::PRINTABLE_STRING, "8.26.0.0-7");
            e.constructed(Tag::SEQUENCE, |e| {
                polling_section(e, Tag::context(0, true), &SectionFixture::default());
                e.constructed(Tag::SEQUENCE, |e| {
                    e.integer(Tag::INTEGER, 1_234_567)
                        .octets(Tag::OCTET_STRING, &[0x00, 0x01])
                        .string(Tag::PRINTABLE_STRING, "20220915T101010")
                        .string(Tag::PRINTABLE_STRING, "489.551");
                });
            });
            e.integer(Tag::ENUMERATED, 4)
                .octets(Tag::OCTET_STRING, &[0xde, 0xad, 0xbe, 0xef]);
            if let Some((choice, kind, reason)) = reason {
                e.constructed(Tag::context(choice, true), |e| {
                    e.integer(Tag::ENUMERATED, kind)
                        .integer(Tag::ENUMERATED, reason);
                });
            }
        });
        tlv::from_slice(&encoder.into_bytes()).unwrap()
    }

    #[test]
    fn test_tally_system_reason() {
        assert_eq!(machine(None).tally_system_reason(), None);
        assert_eq!(machine(None).flash_serial_number(), Some(0xdead_beef));

        assert_eq!(
            machine(Some((0, 4, 5))).tally_system_reason(),
            Some(Ok(TallySystemReason::MixedResultMedia(MixedResultMediaTally {
                kind: TallyKind::MixedResultMedia,
                reason: MixedResultMediaReason::MachineReplacementImpossible,
            })))
        );
        assert_eq!(
            machine(Some((1, 3, 4))).tally_system_reason(),
            Some(Ok(TallySystemReason::MixedPrintedBulletin(
                MixedPrintedBulletinTally {
                    kind: TallyKind::MixedBulletin,
                    reason: MixedPrintedBulletinReason::MachinePreparedIncorrectly,
                }
            )))
        );
        assert_eq!(
            machine(Some((3, 2, 7))).tally_system_reason(),
            Some(Ok(TallySystemReason::Electronic(ElectronicTally {
                kind: TallyKind::FullyElectronic,
                reason: ElectronicTallyReason(7),
            })))
        );
    }

    #[test]
    fn test_unlisted_reason_codes_are_other() {
        assert_eq!(
            machine(Some((2, 1, 42))).tally_system_reason(),
            Some(Ok(TallySystemReason::ManualEntry(ManualEntryTally {
                kind: TallyKind::FullyManual,
                reason: ManualEntryReason::Other,
            })))
        );
        assert_eq!(
            machine(Some((0, 4, 7))).tally_system_reason(),
            Some(Ok(TallySystemReason::MixedResultMedia(MixedResultMediaTally {
                kind: TallyKind::MixedResultMedia,
                reason: MixedResultMediaReason::Other,
            })))
        );
        assert_eq!(
            tlv::from_slice::<MixedPrintedBulletinReason>(&[0x0a, 0x01, 0x63]),
            Ok(MixedPrintedBulletinReason::Other)
        );
    }

    #[test]
    fn test_office_code_out_of_range() {
        let raw = RawValue::new(Tag::context(1, false), vec![0x0e]);
        assert_eq!(
            raw.resolve::<OfficeCode>().unwrap_err().root_cause(),
            &Error::InvalidEnumerated {
                type_name: "Office",
                value: 14
            }
        );
    }

    #[test]
    fn test_timestamp_parse() {
        let timestamp = Timestamp::from("20221002T170112");
        let parsed = timestamp.parse().unwrap();
        assert_eq!(parsed.year(), 2022);
        assert_eq!(parsed.hour(), 17);
        assert_eq!(Timestamp::from("2022-10-02").parse(), None);
    }

    #[test]
    fn test_polling_section_key() {
        let mut encoder = Encoder::new();
        encoder.constructed(Tag::SEQUENCE, |e| {
            e.constructed(Tag::SEQUENCE, |e| {
                e.integer(Tag::INTEGER, 88_986).integer(Tag::INTEGER, 7);
            })
            .integer(Tag::INTEGER, 1)
            .integer(Tag::INTEGER, 55);
        });

        let section: PollingSection = tlv::from_slice(&encoder.into_bytes()).unwrap();
        assert_eq!(
            section.key(),
            SectionKey {
                municipality: 88_986,
                zone: 7,
                local: 1,
                section: 55
            }
        );
    }
}
