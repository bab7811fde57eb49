use std::fmt;

use super::algorithm::Requirement;

/// DS digest type algorithms (RFC 4034, 4509, 5933, 6605)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DigestType {
    /// SHA-1 (RFC 3658)
    Sha1 = 1,
    /// SHA-256 (RFC 4509)
    Sha256 = 2,
    /// GOST R 34.11-94 (RFC 5933)
    Gost94 = 3,
    /// SHA-384 (RFC 6605)
    Sha384 = 4,
}

impl DigestType {
    /// Every digest type this crate can compute
    pub const COMPUTABLE: [u8; 3] = [1, 2, 4];

    /// Create from digest type number
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Sha1),
            2 => Some(Self::Sha256),
            3 => Some(Self::Gost94),
            4 => Some(Self::Sha384),
            _ => None,
        }
    }

    /// Convert to digest type number
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Check if digest type is supported
    pub fn is_supported(&self) -> bool {
        Self::COMPUTABLE.contains(&self.to_u8())
    }

    /// RFC 8624 section 3.3, DS creation column
    pub fn requirement(&self) -> Requirement {
        match self {
            Self::Sha1 | Self::Gost94 => Requirement::MustNot,
            Self::Sha256 => Requirement::Must,
            Self::Sha384 => Requirement::May,
        }
    }

    /// Get the expected digest length in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Gost94 => 32,
            Self::Sha384 => 48,
        }
    }

    /// Calculate digest of data using this algorithm
    pub fn digest(&self, data: &[u8]) -> Option<Vec<u8>> {
        use ring::digest;
        let algorithm = match self {
            Self::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            Self::Sha256 => &digest::SHA256,
            Self::Sha384 => &digest::SHA384,
            Self::Gost94 => return None,
        };
        Some(digest::digest(algorithm, data).as_ref().to_vec())
    }

    /// Mnemonic for an arbitrary digest type number
    pub fn name_of(value: u8) -> String {
        match Self::from_u8(value) {
            Some(digest) => digest.to_string(),
            None => format!("DIGEST{}", value),
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha1 => write!(f, "SHA1"),
            Self::Sha256 => write!(f, "SHA256"),
            Self::Gost94 => write!(f, "GOST94"),
            Self::Sha384 => write!(f, "SHA384"),
        }
    }
}
