//! Results of individual verification checks.

use std::{fmt::Display, path::Path};

use openssl::error::ErrorStack;
use types_rs::SectionKey;

use crate::payload::decode_latin1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    CandidateTally,
    SelfContentHash,
    SelfContentSignature,
    FileHash,
    FileSignature,
    Manifest,
    Certificate,
}

impl CheckKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CandidateTally => "candidate-tally",
            Self::SelfContentHash => "self-content-hash",
            Self::SelfContentSignature => "self-content-signature",
            Self::FileHash => "file-hash",
            Self::FileSignature => "file-signature",
            Self::Manifest => "manifest",
            Self::Certificate => "certificate",
        }
    }
}

impl Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VerificationError {
    #[error("hash mismatch: expected {expected}, computed {computed}")]
    HashMismatch { expected: String, computed: String },

    #[error("signature is invalid")]
    SignatureInvalid,

    #[error("certificate could not be parsed: {0}")]
    CertificateParse(String),

    #[error("unknown office code: {0}")]
    UnknownOfficeCode(tlv::Error),

    #[error("malformed manifest: {0}")]
    MalformedManifest(tlv::Error),

    #[error("unsupported public key: {0}")]
    UnsupportedKey(String),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
}

impl VerificationError {
    pub fn hash_mismatch(expected: &[u8], computed: &[u8]) -> Self {
        Self::HashMismatch {
            expected: hex::encode(expected),
            computed: hex::encode(computed),
        }
    }
}

/// Why a check was not performed. Skips are not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    NoCertificate,
    FileUnavailable,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NoCertificate => "no certificate",
            Self::FileUnavailable => "file unavailable",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Status {
    Passed,
    Failed(VerificationError),
    Skipped(SkipReason),
}

impl Status {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Passed => "ok",
            Self::Failed(_) => "failed",
            Self::Skipped(_) => "skipped",
        }
    }

    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn error(&self) -> Option<&VerificationError> {
        match self {
            Self::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Error or skip reason text, empty for passed checks.
    pub fn detail(&self) -> String {
        match self {
            Self::Passed => String::new(),
            Self::Failed(error) => error.to_string(),
            Self::Skipped(reason) => reason.to_string(),
        }
    }
}

/// Where a checked item comes from. Fields that cannot be determined are
/// left empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub municipality: Option<u32>,
    pub zone: Option<u32>,
    pub local: Option<u32>,
    pub section: Option<u32>,
    pub filename: Option<String>,
}

impl Location {
    pub const fn from_section(key: SectionKey) -> Self {
        Self {
            municipality: Some(key.municipality),
            zone: Some(key.zone),
            local: Some(key.local),
            section: Some(key.section),
            filename: None,
        }
    }

    /// Reads the section out of a result file name such as
    /// `o00407-8898600070055.vscmr`: municipality at 7..12, zone at 12..16
    /// and section at 16..20.
    pub fn from_filename(filename: &str) -> Self {
        let base = Path::new(filename)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(filename);
        let digits = |range: std::ops::Range<usize>| {
            base.get(range)
                .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse().ok())
        };

        Self {
            municipality: digits(7..12),
            zone: digits(12..16),
            local: None,
            section: digits(16..20),
            filename: Some(filename.to_owned()),
        }
    }

    /// Attaches a file name, filling in whatever the name reveals about the
    /// section without overriding what is already known.
    #[must_use]
    pub fn in_file(self, filename: &str) -> Self {
        let parsed = Self::from_filename(filename);
        Self {
            municipality: self.municipality.or(parsed.municipality),
            zone: self.zone.or(parsed.zone),
            local: self.local,
            section: self.section.or(parsed.section),
            filename: Some(filename.to_owned()),
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        let fields = [
            ("municipality", self.municipality),
            ("zone", self.zone),
            ("local", self.local),
            ("section", self.section),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                parts.push(format!("{name}={value}"));
            }
        }
        if let Some(filename) = &self.filename {
            parts.push(format!("file={filename}"));
        }
        f.write_str(&parts.join(" "))
    }
}

/// The result of one check, with enough context to be reported without
/// reopening the source file.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub check: CheckKind,
    pub status: Status,
    pub location: Location,
    pub subject: String,
    /// The reconstructed bytes that were verified, for candidate tallies.
    pub payload: Option<Vec<u8>>,
}

impl VerificationOutcome {
    pub fn new(check: CheckKind, status: Status, location: Location, subject: String) -> Self {
        Self {
            check,
            status,
            location,
            subject,
            payload: None,
        }
    }

    pub fn passed(check: CheckKind, location: Location, subject: String) -> Self {
        Self::new(check, Status::Passed, location, subject)
    }

    pub fn failed(
        check: CheckKind,
        location: Location,
        subject: String,
        error: VerificationError,
    ) -> Self {
        Self::new(check, Status::Failed(error), location, subject)
    }

    pub fn skipped(
        check: CheckKind,
        location: Location,
        subject: String,
        reason: SkipReason,
    ) -> Self {
        Self::new(check, Status::Skipped(reason), location, subject)
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn in_file(mut self, filename: &str) -> Self {
        self.location = self.location.in_file(filename);
        self
    }

    pub fn payload_text(&self) -> Option<String> {
        self.payload.as_deref().map(decode_latin1)
    }
}

impl Display for VerificationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {} ({})",
            self.status.label(),
            self.check,
            self.subject,
            self.location
        )?;

        match &self.status {
            Status::Passed => {}
            Status::Failed(error) => write!(f, ": {error}")?,
            Status::Skipped(reason) => write!(f, ": {reason}")?,
        }

        if let (true, Some(payload)) = (self.status.is_failed(), self.payload_text()) {
            write!(f, " payload={payload:?}")?;
        }

        Ok(())
    }
}
