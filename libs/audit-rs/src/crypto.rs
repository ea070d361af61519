use openssl::{
    bn::BigNum,
    ecdsa::EcdsaSig,
    error::ErrorStack,
    hash::{hash, MessageDigest},
    md::{Md, MdRef},
    pkey::{Id, PKeyRef, Public},
    pkey_ctx::PkeyCtx,
    rsa::Padding,
    sign::Verifier,
};
use types_rs::signature::HashAlgorithm;

use crate::{hex_debug::hex_debug, outcome::VerificationError};

pub fn message_digest(algorithm: HashAlgorithm) -> MessageDigest {
    match algorithm {
        HashAlgorithm::Sha1 => MessageDigest::sha1(),
        HashAlgorithm::Sha256 => MessageDigest::sha256(),
        HashAlgorithm::Sha384 => MessageDigest::sha384(),
        HashAlgorithm::Sha512 => MessageDigest::sha512(),
    }
}

fn md(algorithm: HashAlgorithm) -> &'static MdRef {
    match algorithm {
        HashAlgorithm::Sha1 => Md::sha1(),
        HashAlgorithm::Sha256 => Md::sha256(),
        HashAlgorithm::Sha384 => Md::sha384(),
        HashAlgorithm::Sha512 => Md::sha512(),
    }
}

pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    Ok(hash(message_digest(algorithm), data)?.to_vec())
}

/// Checks `expected` against the digest of `data`, returning the computed
/// digest either way.
pub fn check_digest(
    algorithm: HashAlgorithm,
    data: &[u8],
    expected: &[u8],
) -> Result<Vec<u8>, (Vec<u8>, VerificationError)> {
    let computed = match digest(algorithm, data) {
        Ok(computed) => computed,
        Err(error) => return Err((Vec::new(), error.into())),
    };

    if computed == expected {
        Ok(computed)
    } else {
        tracing::debug!(
            expected = hex_debug(expected),
            computed = hex_debug(&computed),
            "digest mismatch"
        );
        let error = VerificationError::hash_mismatch(expected, &computed);
        Err((computed, error))
    }
}

/// Verifies `signature` over an already computed `digest` with whatever
/// scheme the key implies. Ed25519 keys sign the digest bytes themselves;
/// RSA keys use PKCS#1 v1.5 and ECDSA keys accept DER or raw `r || s`
/// signatures.
///
/// Returns `Ok(false)` when the signature does not verify, including when
/// it is too malformed to be checked.
#[tracing::instrument(level = "trace", skip(key, digest, signature), fields(key_id = key.id().as_raw()))]
pub fn verify_digest_signature(
    key: &PKeyRef<Public>,
    algorithm: HashAlgorithm,
    digest: &[u8],
    signature: &[u8],
) -> Result<bool, VerificationError> {
    let result = match key.id() {
        Id::ED25519 => Verifier::new_without_digest(key)?.verify_oneshot(signature, digest),
        Id::RSA => {
            let mut ctx = PkeyCtx::new(key)?;
            ctx.verify_init()?;
            ctx.set_rsa_padding(Padding::PKCS1)?;
            ctx.set_signature_md(md(algorithm))?;
            ctx.verify(digest, signature)
        }
        Id::EC => {
            let signature = ecdsa_der_signature(signature)?;
            let mut ctx = PkeyCtx::new(key)?;
            ctx.verify_init()?;
            ctx.verify(digest, &signature)
        }
        other => {
            return Err(VerificationError::UnsupportedKey(format!(
                "key type {}",
                other.as_raw()
            )))
        }
    };

    match result {
        Ok(verified) => Ok(verified),
        Err(error) => {
            tracing::debug!(%error, "signature could not be checked");
            Ok(false)
        }
    }
}

/// Converts a raw `r || s` ECDSA signature to DER. Signatures that already
/// look like a DER SEQUENCE are passed through.
fn ecdsa_der_signature(signature: &[u8]) -> Result<Vec<u8>, ErrorStack> {
    if EcdsaSig::from_der(signature).is_ok() {
        return Ok(signature.to_vec());
    }

    if signature.is_empty() || signature.len() % 2 != 0 {
        return Ok(signature.to_vec());
    }

    let (r, s) = signature.split_at(signature.len() / 2);
    EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?.to_der()
}
