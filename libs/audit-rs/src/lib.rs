//! Verification and tabulation of voting machine result files.

pub mod batch;
pub mod bulletin;
pub mod certs;
pub mod container;
pub mod crypto;
mod error;
mod hex_debug;
pub mod municipality;
pub mod outcome;
pub mod payload;
pub mod tally;
pub mod vscmr;

pub use batch::{Auditor, BatchReport, Entry, EntryFailure, EntryKind};
pub use bulletin::verify_bulletin;
pub use certs::{parse_certificate, CertificateError, ParseStrategy, ParsedCertificate};
pub use error::AuditError;
pub use municipality::{CsvMunicipalities, Municipality, MunicipalityLookup, NoMunicipalities};
pub use outcome::{CheckKind, Location, SkipReason, Status, VerificationError, VerificationOutcome};
pub use payload::canonical_payload;
pub use tally::{tally, Tally};
pub use vscmr::{inspect_certificates, verify_signature_envelope, CertificateInspection};
