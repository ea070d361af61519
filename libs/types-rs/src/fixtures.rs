//! Encoders for synthetic result files, for tests in this workspace.
//!
//! The defaults describe the reference section: municipality 88986, zone 7,
//! local 1, section 55.

use tlv::{Encoder, Tag};

pub const GENERATED_AT: &str = "20221002T170112";
pub const CHARGED_AT: &str = "20220915T101010";
pub const SOFTWARE_VERSION: &str = "8.26.0.0-7";

const PHASE_OFFICIAL: i64 = 2;
const MACHINE_KIND_SECTION: i64 = 1;
const FILE_KIND_VOTING_MACHINE: i64 = 1;

#[derive(Debug, Clone, Copy)]
pub struct SectionFixture {
    pub municipality: u32,
    pub zone: u32,
    pub local: u32,
    pub section: u32,
}

impl Default for SectionFixture {
    fn default() -> Self {
        Self {
            municipality: 88_986,
            zone: 7,
            local: 1,
            section: 55,
        }
    }
}

fn entity_header(e: &mut Encoder, election_id: u32) {
    e.constructed(Tag::SEQUENCE, |e| {
        e.string(Tag::PRINTABLE_STRING, GENERATED_AT)
            .integer(Tag::context(2, false), i64::from(election_id));
    });
}

/// Writes a polling section under `tag`: `Tag::SEQUENCE` for the natural
/// form, a constructed context tag when it is a CHOICE alternative.
pub fn polling_section(e: &mut Encoder, tag: Tag, section: &SectionFixture) {
    e.constructed(tag, |e| {
        e.constructed(Tag::SEQUENCE, |e| {
            e.integer(Tag::INTEGER, i64::from(section.municipality))
                .integer(Tag::INTEGER, i64::from(section.zone));
        })
        .integer(Tag::INTEGER, i64::from(section.local))
        .integer(Tag::INTEGER, i64::from(section.section));
    });
}

fn correspondence(e: &mut Encoder, section: &SectionFixture, charge_code: &str) {
    e.constructed(Tag::SEQUENCE, |e| {
        polling_section(e, Tag::context(0, true), section);
        e.constructed(Tag::SEQUENCE, |e| {
            e.integer(Tag::INTEGER, 1_234_567)
                .octets(Tag::OCTET_STRING, &[0x00, 0x01, 0x02, 0x03])
                .string(Tag::PRINTABLE_STRING, CHARGED_AT)
                .string(Tag::PRINTABLE_STRING, charge_code);
        });
    });
}

fn machine(e: &mut Encoder, section: &SectionFixture, charge_code: &str) {
    e.constructed(Tag::SEQUENCE, |e| {
        e.integer(Tag::ENUMERATED, MACHINE_KIND_SECTION)
            .string(Tag::PRINTABLE_STRING, SOFTWARE_VERSION);
        correspondence(e, section, charge_code);
        e.integer(Tag::ENUMERATED, FILE_KIND_VOTING_MACHINE)
            .octets(Tag::OCTET_STRING, &[0xde, 0xad, 0xbe, 0xef]);
    });
}

/// Wraps `content` in a generic envelope of the given kind. A machine block
/// is included when `charge_code` is given.
pub fn envelope(
    kind: u8,
    section: &SectionFixture,
    charge_code: Option<&str>,
    content: &[u8],
) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.constructed(Tag::SEQUENCE, |e| {
        entity_header(e, 545);
        e.integer(Tag::ENUMERATED, PHASE_OFFICIAL);
        if let Some(charge_code) = charge_code {
            machine(e, section, charge_code);
        }
        polling_section(e, Tag::context(0, true), section);
        e.integer(Tag::ENUMERATED, i64::from(kind))
            .octets(Tag::OCTET_STRING, content);
    });
    encoder.into_bytes()
}

#[derive(Debug, Clone)]
pub enum OfficeCodeFixture {
    Constitutional(u8),
    Consultation(u32),
    Raw(Tag, Vec<u8>),
}

impl OfficeCodeFixture {
    fn write(&self, e: &mut Encoder) {
        match self {
            Self::Constitutional(office) => {
                e.integer(Tag::context(1, false), i64::from(*office));
            }
            Self::Consultation(number) => {
                e.integer(Tag::context(2, false), i64::from(*number));
            }
            Self::Raw(tag, contents) => {
                e.element(*tag, contents);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TotalFixture {
    pub kind: u8,
    pub count: u64,
    /// Party and candidate number.
    pub candidate: Option<(u32, u32)>,
    pub signature: Vec<u8>,
}

impl TotalFixture {
    pub fn nominal(count: u64, party: u32, number: u32) -> Self {
        Self {
            kind: 1,
            count,
            candidate: Some((party, number)),
            signature: Vec::new(),
        }
    }

    pub fn blank(count: u64) -> Self {
        Self {
            kind: 2,
            count,
            candidate: None,
            signature: Vec::new(),
        }
    }

    pub fn null(count: u64) -> Self {
        Self {
            kind: 3,
            count,
            candidate: None,
            signature: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OfficeFixture {
    pub code: OfficeCodeFixture,
    pub totals: Vec<TotalFixture>,
}

#[derive(Debug, Clone)]
pub struct BulletinFixture {
    pub section: SectionFixture,
    pub charge_code: String,
    pub election_id: u32,
    pub offices: Vec<OfficeFixture>,
    pub vote_signing_key: Vec<u8>,
    pub correspondence_history: bool,
    pub printed_vote_history: bool,
}

impl Default for BulletinFixture {
    /// The reference bulletin: President with 6 null votes among others.
    fn default() -> Self {
        Self {
            section: SectionFixture::default(),
            charge_code: "489.551.271.893.117.614".to_owned(),
            election_id: 544,
            offices: vec![OfficeFixture {
                code: OfficeCodeFixture::Constitutional(1),
                totals: vec![
                    TotalFixture::nominal(120, 13, 13),
                    TotalFixture::nominal(95, 22, 22),
                    TotalFixture::blank(3),
                    TotalFixture::null(6),
                ],
            }],
            vote_signing_key: vec![0; 32],
            correspondence_history: false,
            printed_vote_history: false,
        }
    }
}

impl BulletinFixture {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.constructed(Tag::SEQUENCE, |e| {
            entity_header(e, self.election_id);
            e.integer(Tag::ENUMERATED, PHASE_OFFICIAL);
            machine(e, &self.section, &self.charge_code);
            polling_section(e, Tag::SEQUENCE, &self.section);
            e.string(Tag::PRINTABLE_STRING, "20221002T170500");
            e.constructed(Tag::context(0, true), |e| {
                e.string(Tag::PRINTABLE_STRING, "20221002T080000")
                    .string(Tag::PRINTABLE_STRING, "20221002T170000");
            });
            e.integer(Tag::context(1, false), 3);
            e.constructed(Tag::context(3, true), |e| {
                e.constructed(Tag::SEQUENCE, |e| self.write_election_result(e));
            });
            if self.correspondence_history {
                e.constructed(Tag::context(4, true), |e| {
                    correspondence(e, &self.section, &self.charge_code);
                });
            }
            if self.printed_vote_history {
                e.constructed(Tag::context(5, true), |e| {
                    e.constructed(Tag::SEQUENCE, |e| {
                        e.integer(Tag::INTEGER, 11)
                            .integer(Tag::INTEGER, 12)
                            .string(Tag::PRINTABLE_STRING, "20221002T075500");
                    });
                });
            }
            e.octets(Tag::OCTET_STRING, &self.vote_signing_key);
        });
        encoder.into_bytes()
    }

    fn write_election_result(&self, e: &mut Encoder) {
        e.integer(Tag::INTEGER, i64::from(self.election_id))
            .integer(Tag::INTEGER, 300);
        e.constructed(Tag::SEQUENCE, |e| {
            for office in &self.offices {
                let turnout: u64 = office.totals.iter().map(|total| total.count).sum();
                e.constructed(Tag::SEQUENCE, |e| {
                    e.integer(Tag::ENUMERATED, 1)
                        .integer(Tag::INTEGER, turnout as i64);
                    e.constructed(Tag::SEQUENCE, |e| {
                        e.constructed(Tag::SEQUENCE, |e| {
                            office.code.write(e);
                            e.integer(Tag::INTEGER, 1);
                            e.constructed(Tag::SEQUENCE, |e| {
                                for total in &office.totals {
                                    write_total(e, total);
                                }
                            });
                        });
                    });
                });
            }
        });
    }

    /// The bulletin wrapped in a bulletin envelope.
    pub fn envelope(&self) -> Vec<u8> {
        envelope(
            1,
            &self.section,
            Some(&self.charge_code),
            &self.encode(),
        )
    }
}

fn write_total(e: &mut Encoder, total: &TotalFixture) {
    e.constructed(Tag::SEQUENCE, |e| {
        e.integer(Tag::context(1, false), i64::from(total.kind))
            .integer(Tag::context(2, false), total.count as i64);
        if let Some((party, number)) = total.candidate {
            e.constructed(Tag::context(3, true), |e| {
                e.integer(Tag::INTEGER, i64::from(party))
                    .integer(Tag::INTEGER, i64::from(number));
            });
        }
        e.octets(Tag::OCTET_STRING, &total.signature);
    });
}

#[derive(Debug, Clone)]
pub struct RdvOfficeFixture {
    pub code: OfficeCodeFixture,
    pub max_choices: u32,
    /// Vote kind and typed digits.
    pub votes: Vec<(u8, Option<String>)>,
}

#[derive(Debug, Clone)]
pub struct RdvFixture {
    pub section: SectionFixture,
    pub charge_code: String,
    pub election_id: u32,
    pub tally_system: bool,
    pub offices: Vec<RdvOfficeFixture>,
}

impl Default for RdvFixture {
    fn default() -> Self {
        Self {
            section: SectionFixture::default(),
            charge_code: "489.551.271.893.117.614".to_owned(),
            election_id: 544,
            tally_system: false,
            offices: vec![RdvOfficeFixture {
                code: OfficeCodeFixture::Constitutional(1),
                max_choices: 1,
                votes: vec![
                    (1, Some("13".to_owned())),
                    (2, None),
                    (3, Some("99".to_owned())),
                ],
            }],
        }
    }
}

impl RdvFixture {
    /// The whole `.rdv` file.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.constructed(Tag::SEQUENCE, |e| {
            entity_header(e, self.election_id);
            machine(e, &self.section, &self.charge_code);
            e.raw(&self.encode_record());
        });
        encoder.into_bytes()
    }

    /// Only the digital vote record, as carried inside an envelope.
    pub fn encode_record(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.constructed(Tag::SEQUENCE, |e| {
            e.integer(Tag::INTEGER, 406)
                .integer(Tag::ENUMERATED, PHASE_OFFICIAL);
            polling_section(e, Tag::SEQUENCE, &self.section);
            let choice = u32::from(self.tally_system);
            e.constructed(Tag::context(choice, true), |e| {
                e.constructed(Tag::SEQUENCE, |e| {
                    e.integer(Tag::INTEGER, i64::from(self.election_id));
                    if self.tally_system {
                        e.integer(Tag::ENUMERATED, 1).integer(Tag::ENUMERATED, 2);
                    }
                    e.constructed(Tag::SEQUENCE, |e| {
                        for office in &self.offices {
                            write_rdv_office(e, office);
                        }
                    });
                });
            });
        });
        encoder.into_bytes()
    }
}

fn write_rdv_office(e: &mut Encoder, office: &RdvOfficeFixture) {
    e.constructed(Tag::SEQUENCE, |e| {
        office.code.write(e);
        e.integer(Tag::INTEGER, i64::from(office.max_choices));
        e.constructed(Tag::SEQUENCE, |e| {
            for (kind, typed) in &office.votes {
                e.constructed(Tag::SEQUENCE, |e| {
                    e.integer(Tag::ENUMERATED, i64::from(*kind));
                    if let Some(typed) = typed {
                        e.string(Tag::PRINTABLE_STRING, typed);
                    }
                });
            }
        });
    });
}

fn digital_signature(e: &mut Encoder, hash: &[u8], signature: &[u8]) {
    e.constructed(Tag::SEQUENCE, |e| {
        e.integer(Tag::INTEGER, signature.len() as i64)
            .octets(Tag::OCTET_STRING, hash)
            .octets(Tag::OCTET_STRING, signature);
    });
}

#[derive(Debug, Clone)]
pub struct SignedFileFixture {
    pub name: String,
    pub hash: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Encodes the self-signed content listing `files`.
pub fn manifest(files: &[SignedFileFixture]) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.constructed(Tag::SEQUENCE, |e| {
        e.constructed(Tag::SEQUENCE, |e| {
            for file in files {
                e.constructed(Tag::SEQUENCE, |e| {
                    e.string(Tag::PRINTABLE_STRING, &file.name);
                    digital_signature(e, &file.hash, &file.signature);
                });
            }
        });
    });
    encoder.into_bytes()
}

#[derive(Debug, Clone)]
pub struct SignatureBlockFixture {
    pub hash_algorithm: u8,
    pub signature_algorithm: u8,
    pub self_signed_content: Vec<u8>,
    pub self_hash: Vec<u8>,
    pub self_signature: Vec<u8>,
    pub certificate: Option<Vec<u8>>,
    /// Appends an undeclared trailing element.
    pub extension: bool,
}

impl SignatureBlockFixture {
    fn write(&self, e: &mut Encoder) {
        e.constructed(Tag::SEQUENCE, |e| {
            e.string(Tag::PRINTABLE_STRING, GENERATED_AT)
                .integer(Tag::INTEGER, 1);
            e.constructed(Tag::SEQUENCE, |e| {
                e.constructed(Tag::SEQUENCE, |e| {
                    e.string(Tag::PRINTABLE_STRING, "urna")
                        .integer(Tag::INTEGER, 1);
                });
                e.constructed(Tag::SEQUENCE, |e| {
                    e.integer(Tag::ENUMERATED, i64::from(self.hash_algorithm));
                });
                e.constructed(Tag::SEQUENCE, |e| {
                    e.integer(Tag::ENUMERATED, i64::from(self.signature_algorithm))
                        .integer(Tag::INTEGER, 256);
                });
                digital_signature(e, &self.self_hash, &self.self_signature);
            });
            e.octets(Tag::OCTET_STRING, &self.self_signed_content);
            if let Some(certificate) = &self.certificate {
                e.octets(Tag::OCTET_STRING, certificate);
            }
            e.string(Tag::PRINTABLE_STRING, "keyset-01");
            if self.extension {
                e.integer(Tag::INTEGER, 2);
            }
        });
    }
}

#[derive(Debug, Clone)]
pub struct SignatureEnvelopeFixture {
    pub model: u8,
    pub software: SignatureBlockFixture,
    pub hardware: SignatureBlockFixture,
}

impl SignatureEnvelopeFixture {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.constructed(Tag::SEQUENCE, |e| {
            e.integer(Tag::ENUMERATED, i64::from(self.model));
            self.software.write(e);
            self.hardware.write(e);
        });
        encoder.into_bytes()
    }
}
