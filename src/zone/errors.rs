use std::fmt;

/// Zone file errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// Zone file parsing error
    ParseError(String),
    /// Invalid record format
    InvalidRecord(String),
    /// Invalid domain name
    InvalidDomainName(String),
    /// IO error
    IoError(String),
    /// Zone file too large
    FileTooLarge,
    /// Invalid TTL value
    InvalidTTL(String),
    /// Record type the parser has no presentation format for
    InvalidRRType(String),
}

impl fmt::Display for ZoneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseError(msg) => write!(f, "Zone parse error: {}", msg),
            Self::InvalidRecord(msg) => write!(f, "Invalid record: {}", msg),
            Self::InvalidDomainName(name) => write!(f, "Invalid domain name: {}", name),
            Self::IoError(msg) => write!(f, "IO error: {}", msg),
            Self::FileTooLarge => write!(f, "Zone file exceeds maximum size"),
            Self::InvalidTTL(ttl) => write!(f, "Invalid TTL value: {}", ttl),
            Self::InvalidRRType(rtype) => write!(f, "Invalid resource record type: {}", rtype),
        }
    }
}

impl std::error::Error for ZoneError {}

pub type Result<T> = std::result::Result<T, ZoneError>;
