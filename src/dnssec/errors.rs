use std::fmt;

/// Failures at the crypto boundary. These never escape validation: the
/// validator turns each of them into an outcome plus a finding.
#[derive(Debug, Clone, PartialEq)]
pub enum DnsSecError {
    /// Algorithm not supported
    UnsupportedAlgorithm(u8),
    /// Digest type not supported
    UnsupportedDigestType(u8),
    /// NSEC3 hash algorithm not supported
    UnsupportedNsec3Algorithm(u8),
    /// Signature verification failed
    SignatureVerificationFailed,
    /// Invalid public key format
    InvalidPublicKey,
    /// Name could not be built while hashing or canonicalising
    InvalidName(String),
}

impl fmt::Display for DnsSecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedAlgorithm(alg) => write!(f, "Unsupported DNSSEC algorithm: {}", alg),
            Self::UnsupportedDigestType(digest) => write!(f, "Unsupported digest type: {}", digest),
            Self::UnsupportedNsec3Algorithm(alg) => {
                write!(f, "Unsupported NSEC3 hash algorithm: {}", alg)
            }
            Self::SignatureVerificationFailed => write!(f, "DNSSEC signature verification failed"),
            Self::InvalidPublicKey => write!(f, "Invalid DNSKEY public key format"),
            Self::InvalidName(name) => write!(f, "Invalid name: {}", name),
        }
    }
}

impl std::error::Error for DnsSecError {}

pub type Result<T> = std::result::Result<T, DnsSecError>;
