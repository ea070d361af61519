//! Record types of voting machine result files and the envelope resolver.
//!
//! Records decode with [`decode_as`]; bulletins travel inside a
//! [`GenericEnvelope`] and are reached through [`decode_enveloped`].

pub mod bulletin;
pub mod common;
pub mod envelope;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod rdv;
pub mod signature;

pub use bulletin::{Bulletin, CandidateVoteTotal, OfficeVoteTotal};
pub use common::{Office, OfficeCode, PollingSection, SectionKey, VoteKind};
pub use envelope::{
    decode_as, decode_enveloped, decode_envelope, DecodeError, EnvelopeKind, EnvelopePayload,
    GenericEnvelope,
};
pub use rdv::{DigitalVoteRecord, RdvFile};
pub use signature::{SignatureBlock, SignatureEnvelope};
