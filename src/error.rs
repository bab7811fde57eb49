use thiserror::Error;

/// Errors raised while building names and typed records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid label length: {0}")]
    InvalidLabelLength(usize),

    #[error("Empty label in DNS name: {0}")]
    EmptyLabel(String),

    #[error("DNS name too long: {0}")]
    NameTooLong(String),

    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("Unknown response code: {0}")]
    UnknownRcode(String),
}

pub type Result<T> = std::result::Result<T, DnsError>;

/// Fatal configuration problems, reported before any validation starts
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid trust anchor file {path}: {reason}")]
    TrustAnchor { path: String, reason: String },

    #[error("Unsupported DNSSEC algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Unsupported DS digest algorithm: {0}")]
    UnsupportedDigest(String),

    #[error("Invalid name filter: {0}")]
    InvalidName(String),

    #[error("Invalid type filter: {0}")]
    InvalidType(String),

    #[error("Invalid config file: {0}")]
    InvalidFile(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// The captured transaction set could not be turned into typed records
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedInputError {
    #[error("Failed to read input: {0}")]
    Io(String),

    #[error("Malformed transaction set: {0}")]
    Framing(String),

    #[error("Malformed query name {qname}: {reason}")]
    QueryName { qname: String, reason: String },

    #[error("Malformed record in response for {qname} from {server}: {reason}")]
    Record {
        qname: String,
        server: String,
        reason: String,
    },
}

/// Unexpected failure while analysing one name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    MalformedInput(#[from] MalformedInputError),

    #[error("Internal error analysing {name}: {reason}")]
    Internal { name: String, reason: String },
}
