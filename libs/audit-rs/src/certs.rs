//! Parsing of the X.509 certificates embedded in signature blocks.
//!
//! Some signing hardware pads the DER certificate with trailing zero bytes
//! and some blocks carry PEM or bare base64 text instead of DER, so parsing
//! falls back through several strategies before giving up.

use std::fmt::Display;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use openssl::{error::ErrorStack, nid::Nid, x509::X509};
use tlv::{Decoder, Tag};

const PEM_MARKER: &str = "-----BEGIN";

#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate is empty")]
    Empty,

    #[error("expected a SEQUENCE, found {0}")]
    TagMismatch(Tag),

    #[error("{0} bytes of trailing data after the certificate")]
    TrailingData(usize),

    #[error("malformed certificate structure: {0}")]
    Structure(tlv::Error),

    #[error("certificate text is not valid UTF-8")]
    NotText,

    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] ErrorStack),
}

/// How a certificate was eventually read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Der,
    /// DER after dropping this many trailing zero bytes.
    TrimmedDer(usize),
    Pem,
    Base64,
}

impl Display for ParseStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Der => f.write_str("DER"),
            Self::TrimmedDer(trimmed) => write!(f, "DER with {trimmed} padding bytes removed"),
            Self::Pem => f.write_str("PEM"),
            Self::Base64 => f.write_str("base64 DER"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    pub certificate: X509,
    pub strategy: ParseStrategy,
}

impl ParsedCertificate {
    pub fn common_name(&self) -> Option<String> {
        common_name(&self.certificate)
    }
}

pub fn common_name(certificate: &X509) -> Option<String> {
    certificate
        .subject_name()
        .entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|name| name.to_string())
}

/// Parses `bytes` as exactly one DER certificate.
fn parse_der(bytes: &[u8]) -> Result<X509, CertificateError> {
    let mut decoder = Decoder::new(bytes);
    match decoder.peek_tag().map_err(CertificateError::Structure)? {
        None => return Err(CertificateError::Empty),
        Some(tag) if tag != Tag::SEQUENCE => return Err(CertificateError::TagMismatch(tag)),
        Some(_) => {}
    }

    decoder.read_element().map_err(CertificateError::Structure)?;
    if !decoder.is_empty() {
        return Err(CertificateError::TrailingData(decoder.remaining().len()));
    }

    Ok(X509::from_der(bytes)?)
}

/// Removes trailing zero bytes one at a time until the DER parses.
fn parse_trimmed(bytes: &[u8]) -> Option<ParsedCertificate> {
    let mut end = bytes.len();

    while end > 0 && bytes[end - 1] == 0 {
        end -= 1;
        match parse_der(&bytes[..end]) {
            Ok(certificate) => {
                return Some(ParsedCertificate {
                    certificate,
                    strategy: ParseStrategy::TrimmedDer(bytes.len() - end),
                })
            }
            Err(CertificateError::TrailingData(_)) => {}
            Err(error) => {
                tracing::debug!(%error, trimmed = bytes.len() - end, "trimmed certificate did not parse");
                return None;
            }
        }
    }

    tracing::debug!("certificate has trailing data that is not zero padding");
    None
}

/// Reads a certificate stored as PEM or bare base64 text.
fn parse_text(bytes: &[u8]) -> Result<ParsedCertificate, CertificateError> {
    let text = std::str::from_utf8(bytes).map_err(|_| CertificateError::NotText)?;
    let text = text.trim_end_matches('\0');

    if text.contains(PEM_MARKER) {
        return Ok(ParsedCertificate {
            certificate: X509::from_pem(text.as_bytes())?,
            strategy: ParseStrategy::Pem,
        });
    }

    let compact = text.split_whitespace().collect::<String>();
    let der = STANDARD.decode(compact)?;
    Ok(ParsedCertificate {
        certificate: parse_der(&der)?,
        strategy: ParseStrategy::Base64,
    })
}

/// Parses an embedded certificate: plain DER first, then DER with trailing
/// zero padding removed, then PEM or base64 text. Each failed attempt is
/// logged; the error returned is the one from the plain DER attempt.
#[tracing::instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn parse_certificate(bytes: &[u8]) -> Result<ParsedCertificate, CertificateError> {
    let error = match parse_der(bytes) {
        Ok(certificate) => {
            return Ok(ParsedCertificate {
                certificate,
                strategy: ParseStrategy::Der,
            })
        }
        Err(error) => error,
    };
    tracing::debug!(%error, "certificate is not plain DER");

    match error {
        CertificateError::TrailingData(_) => parse_trimmed(bytes).ok_or(error),
        CertificateError::TagMismatch(_) => parse_text(bytes).map_err(|text_error| {
            tracing::debug!(error = %text_error, "certificate is not PEM or base64 either");
            error
        }),
        error => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::crypto::test_keys;

    fn der() -> Vec<u8> {
        test_keys::certificate(&test_keys::ecdsa(), "UE 2020 software")
            .to_der()
            .unwrap()
    }

    #[test]
    fn test_plain_der() {
        let parsed = parse_certificate(&der()).unwrap();
        assert_eq!(parsed.strategy, ParseStrategy::Der);
        assert_eq!(parsed.common_name().as_deref(), Some("UE 2020 software"));
    }

    #[test]
    fn test_zero_padding_is_removed() {
        let mut bytes = der();
        bytes.extend([0, 0, 0]);
        let parsed = parse_certificate(&bytes).unwrap();
        assert_eq!(parsed.strategy, ParseStrategy::TrimmedDer(3));
    }

    #[test]
    fn test_non_zero_trailing_data_fails() {
        let mut bytes = der();
        bytes.extend([0, 7, 0]);
        assert!(matches!(
            parse_certificate(&bytes),
            Err(CertificateError::TrailingData(3))
        ));
    }

    #[test]
    fn test_pem() {
        let pem = test_keys::certificate(&test_keys::rsa(), "hardware")
            .to_pem()
            .unwrap();
        let parsed = parse_certificate(&pem).unwrap();
        assert_eq!(parsed.strategy, ParseStrategy::Pem);
        assert_eq!(parsed.common_name().as_deref(), Some("hardware"));
    }

    #[test]
    fn test_base64() {
        let encoded = STANDARD.encode(der());
        let wrapped = encoded
            .as_bytes()
            .chunks(64)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let parsed = parse_certificate(wrapped.as_bytes()).unwrap();
        assert_eq!(parsed.strategy, ParseStrategy::Base64);
    }

    #[test]
    fn test_empty() {
        assert!(matches!(parse_certificate(&[]), Err(CertificateError::Empty)));
    }

    #[test]
    fn test_garbage_text_reports_tag_mismatch() {
        assert!(matches!(
            parse_certificate(b"not a certificate"),
            Err(CertificateError::TagMismatch(_))
        ));
    }

    #[test]
    fn test_sequence_that_is_not_a_certificate() {
        assert!(matches!(
            parse_certificate(&[0x30, 0x03, 0x02, 0x01, 0x01]),
            Err(CertificateError::OpenSsl(_))
        ));
    }

    proptest! {
        #[test]
        fn test_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = parse_certificate(&bytes);
        }
    }
}
