use serde::Serialize;
use std::fmt;

/// How bad a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Error,
}

/// Every condition the analyser reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FindingCode {
    // RRSIG
    SignatureInvalid,
    ExpirationInPast,
    InceptionInFuture,
    SignerNotZone,
    DnskeyRevokedRrsig,
    RrsetTtlMismatch,
    OriginalTtlExceeded,
    TtlBeyondExpiration,
    MissingRrsig,
    NoValidRrsig,

    // RFC 8624
    AlgorithmProhibited,
    AlgorithmNotRecommended,
    DigestAlgorithmProhibited,
    DigestAlgorithmNotSupported,

    // DS and DNSKEY
    DigestInvalid,
    DnskeyRevokedDs,
    DsNoDnskey,
    DnskeyNotInSigningSet,
    NoTrustedSignature,
    NoTrustAnchorMatch,
    NoDsProof,

    // Negative proofs
    NoProof,
    MixedDenialTypes,
    InconsistentNsec3Parameters,
    SnameNotCovered,
    WildcardNotCovered,
    LastNsecNextNotZone,
    NoNsecMatchingSname,
    StypeInBitmap,
    CnameInBitmap,
    ReferralWithoutNsBit,
    ReferralWithDsBit,
    ReferralWithSoaBit,
    SnameNotCoveredWildcardAnswer,
    NextCloserNotCoveredWildcardAnswer,
    NoClosestEncloser,
    NextCloserNotCovered,
    WildcardNotCoveredNsec3,
    UnsupportedNsec3Algorithm,
    Nsec3Iterations,
    Nsec3Salt,

    // Delegation and servers
    LameDelegation,
    ServerUnresponsive,
    PrivateAddress,
    NsMismatch,
    CookieNoBadcookie,

    // RFC 7344
    CdnskeyNotSignedByDsKey,
    CdsNoMatchingDnskey,

    // Aliases
    DnameNoCname,
    DnameTargetMismatch,
    DnameTtlMismatch,
    DnameTtlZero,
}

impl FindingCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::ExpirationInPast => "EXPIRATION_IN_PAST",
            Self::InceptionInFuture => "INCEPTION_IN_FUTURE",
            Self::SignerNotZone => "SIGNER_NOT_ZONE",
            Self::DnskeyRevokedRrsig => "DNSKEY_REVOKED_RRSIG",
            Self::RrsetTtlMismatch => "RRSET_TTL_MISMATCH",
            Self::OriginalTtlExceeded => "ORIGINAL_TTL_EXCEEDED",
            Self::TtlBeyondExpiration => "TTL_BEYOND_EXPIRATION",
            Self::MissingRrsig => "MISSING_RRSIG",
            Self::NoValidRrsig => "NO_VALID_RRSIG",
            Self::AlgorithmProhibited => "ALGORITHM_PROHIBITED",
            Self::AlgorithmNotRecommended => "ALGORITHM_NOT_RECOMMENDED",
            Self::DigestAlgorithmProhibited => "DIGEST_ALGORITHM_PROHIBITED",
            Self::DigestAlgorithmNotSupported => "DIGEST_ALGORITHM_NOT_SUPPORTED",
            Self::DigestInvalid => "DIGEST_INVALID",
            Self::DnskeyRevokedDs => "DNSKEY_REVOKED_DS",
            Self::DsNoDnskey => "DS_NO_DNSKEY",
            Self::DnskeyNotInSigningSet => "DNSKEY_NOT_IN_SIGNING_SET",
            Self::NoTrustedSignature => "NO_TRUSTED_SIGNATURE",
            Self::NoTrustAnchorMatch => "NO_TRUST_ANCHOR_MATCH",
            Self::NoDsProof => "NO_DS_PROOF",
            Self::NoProof => "NO_PROOF",
            Self::MixedDenialTypes => "MIXED_DENIAL_TYPES",
            Self::InconsistentNsec3Parameters => "INCONSISTENT_NSEC3_PARAMETERS",
            Self::SnameNotCovered => "SNAME_NOT_COVERED",
            Self::WildcardNotCovered => "WILDCARD_NOT_COVERED",
            Self::LastNsecNextNotZone => "LAST_NSEC_NEXT_NOT_ZONE",
            Self::NoNsecMatchingSname => "NO_NSEC_MATCHING_SNAME",
            Self::StypeInBitmap => "STYPE_IN_BITMAP",
            Self::CnameInBitmap => "CNAME_IN_BITMAP",
            Self::ReferralWithoutNsBit => "REFERRAL_WITHOUT_NS_BIT",
            Self::ReferralWithDsBit => "REFERRAL_WITH_DS_BIT",
            Self::ReferralWithSoaBit => "REFERRAL_WITH_SOA_BIT",
            Self::SnameNotCoveredWildcardAnswer => "SNAME_NOT_COVERED_WILDCARD_ANSWER",
            Self::NextCloserNotCoveredWildcardAnswer => "NEXT_CLOSER_NOT_COVERED_WILDCARD_ANSWER",
            Self::NoClosestEncloser => "NO_CLOSEST_ENCLOSER",
            Self::NextCloserNotCovered => "NEXT_CLOSER_NOT_COVERED",
            Self::WildcardNotCoveredNsec3 => "WILDCARD_NOT_COVERED_NSEC3",
            Self::UnsupportedNsec3Algorithm => "UNSUPPORTED_NSEC3_ALGORITHM",
            Self::Nsec3Iterations => "NSEC3_ITERATIONS",
            Self::Nsec3Salt => "NSEC3_SALT",
            Self::LameDelegation => "LAME_DELEGATION",
            Self::ServerUnresponsive => "SERVER_UNRESPONSIVE",
            Self::PrivateAddress => "PRIVATE_ADDRESS",
            Self::NsMismatch => "NS_MISMATCH",
            Self::CookieNoBadcookie => "COOKIE_NO_BADCOOKIE",
            Self::CdnskeyNotSignedByDsKey => "CDNSKEY_NOT_SIGNED_BY_DS_KEY",
            Self::CdsNoMatchingDnskey => "CDS_NO_MATCHING_DNSKEY",
            Self::DnameNoCname => "DNAME_NO_CNAME",
            Self::DnameTargetMismatch => "DNAME_TARGET_MISMATCH",
            Self::DnameTtlMismatch => "DNAME_TTL_MISMATCH",
            Self::DnameTtlZero => "DNAME_TTL_ZERO",
        }
    }
}

impl fmt::Display for FindingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation attached to exactly one entity. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: Severity,
    pub code: FindingCode,
    pub message: String,
}

impl Finding {
    pub fn error(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: FindingCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "E",
            Severity::Warning => "W",
        };
        write!(f, "{}: {} {}", prefix, self.code, self.message)
    }
}

/// Highest severity in a list, if any
pub fn max_severity<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Option<Severity> {
    findings.into_iter().map(|f| f.severity).max()
}
