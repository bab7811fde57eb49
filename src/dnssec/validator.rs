use serde::Serialize;
use tracing::trace;

use super::{DigestType, DnsSecAlgorithm, Policy, Requirement, canonical, compute_ds_digest, crypto};
use crate::analysis::{Authentication, Finding, FindingCode};
use crate::dns::{Dnskey, Ds, Name, RRset, RecordType, SignatureRecord};

/// Outcome of one RRSIG or one DS check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationOutcome {
    Valid,
    /// No candidate key carries the referenced key tag and algorithm
    Indeterminate,
    Invalid,
    IndeterminateUnknownAlgorithm,
}

impl ValidationOutcome {
    pub fn authentication(self) -> Authentication {
        match self {
            Self::Valid => Authentication::Secure,
            Self::Indeterminate | Self::IndeterminateUnknownAlgorithm => Authentication::Insecure,
            Self::Invalid => Authentication::Bogus,
        }
    }
}

/// One RRSIG checked against the candidate keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RrsigAnalysis {
    pub signer: Name,
    pub algorithm: u8,
    pub key_tag: u16,
    pub inception: u32,
    pub expiration: u32,
    pub outcome: ValidationOutcome,
    pub findings: Vec<Finding>,
    /// The key that verified the signature
    #[serde(skip)]
    pub verified_by: Option<Dnskey>,
}

impl RrsigAnalysis {
    /// Valid, from the expected zone, and not made with a revoked key
    pub fn authenticates(&self, zone: &Name) -> bool {
        self.outcome == ValidationOutcome::Valid && &self.signer == zone
            && !self.findings.iter().any(|f| f.code == FindingCode::DnskeyRevokedRrsig)
    }
}

/// One DS checked against the child's DNSKEY RRset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DsAnalysis {
    pub algorithm: u8,
    pub key_tag: u16,
    pub digest_type: u8,
    pub outcome: ValidationOutcome,
    /// Key tag of the DNSKEY the DS was matched against
    pub dnskey: Option<u16>,
    pub findings: Vec<Finding>,
    #[serde(skip)]
    pub matched_key: Option<Dnskey>,
}

/// RFC 1982 serial comparison, `a < b`
fn serial_lt(a: u32, b: u32) -> bool {
    a != b && (b.wrapping_sub(a) as i32) > 0
}

/// Signature and digest checks at a fixed validation time
pub struct DnsSecValidator<'a> {
    policy: &'a Policy,
    now: u32,
}

impl<'a> DnsSecValidator<'a> {
    pub fn new(policy: &'a Policy, now: u32) -> Self {
        Self { policy, now }
    }

    pub fn policy(&self) -> &Policy {
        self.policy
    }

    pub fn now(&self) -> u32 {
        self.now
    }

    /// RFC 8624 section 3.1 findings for a signing algorithm
    pub fn algorithm_findings(&self, algorithm: u8) -> Vec<Finding> {
        if !self.policy.flags().enforce_rfc8624 {
            return Vec::new();
        }
        let Some(alg) = DnsSecAlgorithm::from_u8(algorithm) else {
            return Vec::new();
        };
        match alg.signing_requirement() {
            Requirement::MustNot => vec![Finding::error(
                FindingCode::AlgorithmProhibited,
                format!("RFC 8624 prohibits DNSSEC algorithm {} ({})", algorithm, alg),
            )],
            Requirement::NotRecommended => vec![Finding::warning(
                FindingCode::AlgorithmNotRecommended,
                format!("RFC 8624 does not recommend DNSSEC algorithm {} ({})", algorithm, alg),
            )],
            _ => Vec::new(),
        }
    }

    /// RFC 8624 section 3.3 findings for a DS digest type
    pub fn digest_findings(&self, digest_type: u8) -> Vec<Finding> {
        if !self.policy.flags().enforce_rfc8624 {
            return Vec::new();
        }
        match DigestType::from_u8(digest_type) {
            Some(DigestType::Sha1) => vec![Finding::warning(
                FindingCode::DigestAlgorithmProhibited,
                "RFC 8624 prohibits creating DS records with SHA-1",
            )],
            Some(DigestType::Gost94) => vec![Finding::error(
                FindingCode::DigestAlgorithmProhibited,
                "RFC 8624 prohibits DS digest GOST R 34.11-94",
            )],
            _ => Vec::new(),
        }
    }

    /// Check one RRSIG over `rrset` made by `zone`, trying every key with a matching tag
    pub fn verify_rrsig(
        &self,
        rrset: &RRset,
        sig: &SignatureRecord,
        candidate_keys: &[Dnskey],
        zone: &Name,
    ) -> RrsigAnalysis {
        let rrsig = &sig.rrsig;
        let mut findings = self.algorithm_findings(rrsig.algorithm);

        if rrset.ttl != sig.ttl {
            findings.push(Finding::warning(
                FindingCode::RrsetTtlMismatch,
                format!("RRset TTL {} differs from RRSIG TTL {}", rrset.ttl, sig.ttl),
            ));
        }
        if sig.ttl > rrsig.original_ttl {
            findings.push(Finding::error(
                FindingCode::OriginalTtlExceeded,
                format!(
                    "RRSIG TTL {} exceeds its original TTL {}",
                    sig.ttl, rrsig.original_ttl
                ),
            ));
        }
        if &rrsig.signer != zone {
            findings.push(Finding::error(
                FindingCode::SignerNotZone,
                format!("signer {} is not the zone {}", rrsig.signer, zone),
            ));
        }

        let mut verified_by = None;
        let outcome = if !self.policy.supports_algorithm(rrsig.algorithm) {
            ValidationOutcome::IndeterminateUnknownAlgorithm
        } else if serial_lt(self.now, rrsig.inception) {
            findings.push(Finding::error(
                FindingCode::InceptionInFuture,
                format!(
                    "signature inception {} is after the reference time {}",
                    rrsig.inception, self.now
                ),
            ));
            ValidationOutcome::Invalid
        } else if !serial_lt(self.now, rrsig.expiration) {
            findings.push(Finding::error(
                FindingCode::ExpirationInPast,
                format!(
                    "signature expired at {}, reference time {}",
                    rrsig.expiration, self.now
                ),
            ));
            ValidationOutcome::Invalid
        } else {
            let candidates: Vec<&Dnskey> = candidate_keys
                .iter()
                .filter(|k| k.algorithm == rrsig.algorithm && k.key_tag() == rrsig.key_tag)
                .collect();

            if candidates.is_empty() {
                ValidationOutcome::Indeterminate
            } else {
                match canonical::rrset_signed_data(rrsig, &rrset.name, rrset.rtype, &rrset.rdatas) {
                    Ok(message) => {
                        verified_by = candidates
                            .into_iter()
                            .find(|key| {
                                crypto::verify(rrsig.algorithm, &key.public_key, &message, &rrsig.signature)
                                    .is_ok()
                            })
                            .cloned();
                    }
                    Err(e) => trace!("could not canonicalise {} {}: {}", rrset.name, rrset.rtype, e),
                }
                if verified_by.is_some() {
                    ValidationOutcome::Valid
                } else {
                    findings.push(Finding::error(
                        FindingCode::SignatureInvalid,
                        format!(
                            "signature by key {}/{} does not validate",
                            rrsig.key_tag,
                            DnsSecAlgorithm::name_of(rrsig.algorithm)
                        ),
                    ));
                    ValidationOutcome::Invalid
                }
            }
        };

        if outcome != ValidationOutcome::IndeterminateUnknownAlgorithm
            && serial_lt(self.now, rrsig.expiration)
        {
            let min_ttl = rrset.ttl.min(sig.ttl).min(rrsig.original_ttl);
            if !serial_lt(self.now.wrapping_add(min_ttl), rrsig.expiration) {
                findings.push(Finding::error(
                    FindingCode::TtlBeyondExpiration,
                    format!(
                        "TTL {} reaches past the signature expiration {}",
                        min_ttl, rrsig.expiration
                    ),
                ));
            }
        }

        if let Some(key) = &verified_by {
            if key.is_revoked() && rrset.rtype != RecordType::DNSKEY {
                findings.push(Finding::error(
                    FindingCode::DnskeyRevokedRrsig,
                    format!("revoked key {} signs a {} RRset", rrsig.key_tag, rrset.rtype),
                ));
            }
        }

        trace!(
            "RRSIG {} {} by {}/{}: {:?}",
            rrset.name, rrset.rtype, rrsig.signer, rrsig.key_tag, outcome
        );

        RrsigAnalysis {
            signer: rrsig.signer.clone(),
            algorithm: rrsig.algorithm,
            key_tag: rrsig.key_tag,
            inception: rrsig.inception,
            expiration: rrsig.expiration,
            outcome,
            findings,
            verified_by,
        }
    }

    /// Every RRSIG covering `rrset`, in display order
    pub fn verify_rrset(&self, rrset: &RRset, candidate_keys: &[Dnskey], zone: &Name) -> Vec<RrsigAnalysis> {
        rrset
            .rrsigs
            .iter()
            .map(|sig| self.verify_rrsig(rrset, sig, candidate_keys, zone))
            .collect()
    }

    /// Check one DS owned by `owner` against the child's DNSKEYs
    pub fn verify_ds(&self, owner: &Name, ds: &Ds, candidate_keys: &[Dnskey]) -> DsAnalysis {
        let mut findings = self.digest_findings(ds.digest_type);
        let candidates: Vec<&Dnskey> = candidate_keys
            .iter()
            .filter(|k| k.algorithm == ds.algorithm && k.key_tag() == ds.key_tag)
            .collect();

        let mut matched_key = None;
        let digest_type = DigestType::from_u8(ds.digest_type)
            .filter(|d| d.is_supported() && self.policy.supports_digest(d.to_u8()));

        let outcome = match digest_type {
            None => {
                if self.policy.flags().enforce_rfc8624 {
                    findings.push(Finding::warning(
                        FindingCode::DigestAlgorithmNotSupported,
                        format!(
                            "DS digest algorithm {} is not supported",
                            DigestType::name_of(ds.digest_type)
                        ),
                    ));
                }
                matched_key = candidates.first().map(|k| (*k).clone());
                ValidationOutcome::IndeterminateUnknownAlgorithm
            }
            Some(_) if !self.policy.supports_algorithm(ds.algorithm) => {
                matched_key = candidates.first().map(|k| (*k).clone());
                ValidationOutcome::IndeterminateUnknownAlgorithm
            }
            Some(_) if candidates.is_empty() => {
                if !self.policy.flags().multi_signer {
                    findings.push(Finding::error(
                        FindingCode::DsNoDnskey,
                        format!(
                            "no DNSKEY {}/{} found for this DS",
                            ds.key_tag,
                            DnsSecAlgorithm::name_of(ds.algorithm)
                        ),
                    ));
                }
                ValidationOutcome::Indeterminate
            }
            Some(digest_type) => {
                matched_key = candidates
                    .iter()
                    .find(|key| {
                        compute_ds_digest(owner, key, digest_type).is_some_and(|d| d == ds.digest)
                    })
                    .map(|k| (*k).clone());
                match &matched_key {
                    Some(key) => {
                        if key.is_revoked() {
                            findings.push(Finding::error(
                                FindingCode::DnskeyRevokedDs,
                                format!("DS references revoked key {}", ds.key_tag),
                            ));
                        }
                        ValidationOutcome::Valid
                    }
                    None => {
                        matched_key = candidates.first().map(|k| (*k).clone());
                        findings.push(Finding::error(
                            FindingCode::DigestInvalid,
                            format!("{} digest does not match DNSKEY {}", digest_type, ds.key_tag),
                        ));
                        ValidationOutcome::Invalid
                    }
                }
            }
        };

        trace!("DS {} {}/{}: {:?}", owner, ds.key_tag, ds.digest_type, outcome);

        DsAnalysis {
            algorithm: ds.algorithm,
            key_tag: ds.key_tag,
            digest_type: ds.digest_type,
            outcome,
            dnskey: matched_key.as_ref().map(Dnskey::key_tag),
            findings,
            matched_key,
        }
    }
}
