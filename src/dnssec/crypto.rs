use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};
use tracing::trace;

use super::errors::{DnsSecError, Result};

/// Verify `signature` over `message` with a DNSKEY public key in its RDATA encoding
pub fn verify(algorithm: u8, public_key: &[u8], message: &[u8], sig: &[u8]) -> Result<()> {
    let outcome = match algorithm {
        5 | 7 => verify_rsa(
            &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
            public_key,
            message,
            sig,
        ),
        8 => verify_rsa(
            &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY,
            public_key,
            message,
            sig,
        ),
        10 => verify_rsa(
            &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY,
            public_key,
            message,
            sig,
        ),
        13 => verify_ecdsa(&signature::ECDSA_P256_SHA256_FIXED, 64, public_key, message, sig),
        14 => verify_ecdsa(&signature::ECDSA_P384_SHA384_FIXED, 96, public_key, message, sig),
        15 => {
            if public_key.len() != 32 {
                return Err(DnsSecError::InvalidPublicKey);
            }
            UnparsedPublicKey::new(&signature::ED25519, public_key)
                .verify(message, sig)
                .map_err(|_| DnsSecError::SignatureVerificationFailed)
        }
        other => Err(DnsSecError::UnsupportedAlgorithm(other)),
    };

    trace!(algorithm, ok = outcome.is_ok(), "signature check");
    outcome
}

fn verify_rsa(
    params: &'static signature::RsaParameters,
    public_key: &[u8],
    message: &[u8],
    sig: &[u8],
) -> Result<()> {
    let (e, n) = split_rsa_key(public_key)?;
    RsaPublicKeyComponents { n, e }
        .verify(params, message, sig)
        .map_err(|_| DnsSecError::SignatureVerificationFailed)
}

/// RFC 3110 section 2: exponent length (one byte, or zero then two bytes), exponent, modulus
fn split_rsa_key(public_key: &[u8]) -> Result<(&[u8], &[u8])> {
    let (exp_len, rest) = match public_key {
        [0, hi, lo, rest @ ..] => (u16::from_be_bytes([*hi, *lo]) as usize, rest),
        [len, rest @ ..] => (*len as usize, rest),
        [] => return Err(DnsSecError::InvalidPublicKey),
    };
    if exp_len == 0 || rest.len() <= exp_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    Ok(rest.split_at(exp_len))
}

/// RFC 6605 keys are the bare X || Y point; ring wants the uncompressed SEC1 form
fn verify_ecdsa(
    params: &'static signature::EcdsaVerificationAlgorithm,
    point_len: usize,
    public_key: &[u8],
    message: &[u8],
    sig: &[u8],
) -> Result<()> {
    if public_key.len() != point_len {
        return Err(DnsSecError::InvalidPublicKey);
    }
    let mut sec1 = Vec::with_capacity(point_len + 1);
    sec1.push(0x04);
    sec1.extend_from_slice(public_key);
    UnparsedPublicKey::new(params, &sec1)
        .verify(message, sig)
        .map_err(|_| DnsSecError::SignatureVerificationFailed)
}
