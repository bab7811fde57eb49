use ring::digest;
use serde::Serialize;
use tracing::{debug, trace};

use super::errors::{DnsSecError, Result};
use super::validator::{DnsSecValidator, RrsigAnalysis, ValidationOutcome};
use crate::analysis::{Authentication, Finding, FindingCode};
use crate::dns::rdata::{decode_base32hex, encode_base32hex};
use crate::dns::{Dnskey, Name, Nsec, Nsec3, RData, RRset, RecordType};

/// The only NSEC3 hash algorithm defined (RFC 5155)
const NSEC3_SHA1: u8 = 1;

/// Terminal result of a negative proof
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofOutcome {
    Proven,
    NotProven,
    Indeterminate,
}

impl ProofOutcome {
    pub fn authentication(self) -> Authentication {
        match self {
            Self::Proven => Authentication::Secure,
            Self::Indeterminate => Authentication::Insecure,
            Self::NotProven => Authentication::Bogus,
        }
    }

    fn strength(self) -> u8 {
        match self {
            Self::Proven => 2,
            Self::Indeterminate => 1,
            Self::NotProven => 0,
        }
    }

    pub fn weakest(self, other: Self) -> Self {
        if other.strength() < self.strength() { other } else { self }
    }
}

/// Which denial records a proof is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProofKind {
    Nsec,
    Nsec3,
}

/// What a proof has to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    NxDomain,
    /// `referral` marks an insecure delegation: the proof is about the DS at the cut
    NoData { referral: bool },
    /// Positive answer expanded from a wildcard; `labels` is the RRSIG label count
    WildcardAnswer { labels: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialTarget {
    pub qname: Name,
    pub qtype: RecordType,
    pub kind: DenialKind,
}

/// One NSEC or NSEC3 RRset of a proof with its signature checks
#[derive(Debug, Clone)]
pub struct ProofRecord {
    pub rrset: RRset,
    pub rrsigs: Vec<RrsigAnalysis>,
    pub outcome: ProofOutcome,
}

#[derive(Debug, Clone)]
pub struct NegativeProof {
    pub kind: Option<ProofKind>,
    pub records: Vec<ProofRecord>,
    pub outcome: ProofOutcome,
    /// DS absence shown by an opt-out NSEC3 span
    pub opt_out: bool,
    /// Indeterminate only because a signature or hash algorithm is not supported
    pub unsupported: bool,
    pub findings: Vec<Finding>,
}

impl NegativeProof {
    /// Authentication of the denial inside a secure zone. An indeterminate
    /// proof leaves the answer insecure only when an algorithm is unsupported.
    pub fn authentication(&self) -> Authentication {
        match self.outcome {
            ProofOutcome::Proven => Authentication::Secure,
            ProofOutcome::Indeterminate if self.unsupported => Authentication::Insecure,
            ProofOutcome::Indeterminate | ProofOutcome::NotProven => Authentication::Bogus,
        }
    }
}

impl ProofRecord {
    fn unsupported_only(&self) -> bool {
        !self.rrsigs.is_empty()
            && self
                .rrsigs
                .iter()
                .all(|a| a.outcome == ValidationOutcome::IndeterminateUnknownAlgorithm)
    }
}

/// Records seen so far. A proof starts with nothing, collects records of one
/// kind, and ends in a `ProofOutcome` once every record has been observed.
enum ProofState<'r> {
    NoProofSeen,
    CollectingNsec(Vec<(&'r Name, &'r Nsec)>),
    CollectingNsec3(Vec<(&'r Name, &'r Nsec3)>),
    Mixed,
}

impl<'r> ProofState<'r> {
    fn observe(self, rrset: &'r RRset) -> Self {
        rrset.rdatas.iter().fold(self, |state, rdata| match (state, rdata) {
            (Self::Mixed, _) => Self::Mixed,
            (Self::NoProofSeen, RData::Nsec(nsec)) => Self::CollectingNsec(vec![(&rrset.name, nsec)]),
            (Self::NoProofSeen, RData::Nsec3(nsec3)) => {
                Self::CollectingNsec3(vec![(&rrset.name, nsec3)])
            }
            (Self::CollectingNsec(mut seen), RData::Nsec(nsec)) => {
                seen.push((&rrset.name, nsec));
                Self::CollectingNsec(seen)
            }
            (Self::CollectingNsec3(mut seen), RData::Nsec3(nsec3)) => {
                seen.push((&rrset.name, nsec3));
                Self::CollectingNsec3(seen)
            }
            (Self::CollectingNsec(_), RData::Nsec3(_)) | (Self::CollectingNsec3(_), RData::Nsec(_)) => {
                Self::Mixed
            }
            (state, _) => state,
        })
    }
}

/// RFC 5155 section 5: iterated, salted SHA-1 over the canonical owner name
pub fn nsec3_hash(name: &Name, algorithm: u8, salt: &[u8], iterations: u16) -> Result<Vec<u8>> {
    if algorithm != NSEC3_SHA1 {
        return Err(DnsSecError::UnsupportedNsec3Algorithm(algorithm));
    }
    let mut input = name.to_canonical_wire();
    input.extend_from_slice(salt);
    let mut hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &input);
    for _ in 0..iterations {
        let mut next = hash.as_ref().to_vec();
        next.extend_from_slice(salt);
        hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, &next);
    }
    Ok(hash.as_ref().to_vec())
}

/// `<base32hex(hash)>.<zone>`
pub fn hashed_owner(hash: &[u8], zone: &Name) -> Result<Name> {
    zone.prepend(&encode_base32hex(hash))
        .map_err(|e| DnsSecError::InvalidName(e.to_string()))
}

/// Canonical-order span test; `next <= owner` is the wrap-around at the end of the chain
fn nsec_covers(owner: &Name, next: &Name, name: &Name) -> bool {
    if owner < next {
        owner < name && name < next
    } else {
        owner < name || name < next
    }
}

fn hash_covers(owner: &[u8], next: &[u8], hash: &[u8]) -> bool {
    if owner < next {
        owner < hash && hash < next
    } else {
        owner < hash || hash < next
    }
}

/// Ancestors of `name` strictly below it, closest first, down to and including `zone`
fn enclosers<'n>(name: &'n Name, zone: &'n Name) -> impl Iterator<Item = Name> + 'n {
    let top = zone.label_count();
    (top..name.label_count()).rev().map(move |count| name.ancestor(count))
}

/// Hash algorithm, iterations and salt, when every record agrees on them
fn shared_parameters<'r>(nsec3s: &[(&Name, &'r Nsec3)]) -> Option<(u8, u16, &'r [u8])> {
    let (_, first) = nsec3s.first()?;
    nsec3s
        .iter()
        .all(|(_, n)| {
            n.hash_algorithm == first.hash_algorithm && n.iterations == first.iterations && n.salt == first.salt
        })
        .then_some((first.hash_algorithm, first.iterations, first.salt.as_slice()))
}

/// NSEC/NSEC3 proofs for one zone, checked with that zone's keys
pub struct DenialValidator<'a> {
    validator: &'a DnsSecValidator<'a>,
    zone: &'a Name,
    keys: &'a [Dnskey],
}

impl<'a> DenialValidator<'a> {
    pub fn new(validator: &'a DnsSecValidator<'a>, zone: &'a Name, keys: &'a [Dnskey]) -> Self {
        Self {
            validator,
            zone,
            keys,
        }
    }

    /// Validate the NSEC or NSEC3 records in `authority` against `target`
    pub fn prove(&self, target: &DenialTarget, authority: &[RRset]) -> NegativeProof {
        let mut state = ProofState::NoProofSeen;
        let mut records = Vec::new();
        for rrset in authority
            .iter()
            .filter(|r| matches!(r.rtype, RecordType::NSEC | RecordType::NSEC3))
        {
            state = state.observe(rrset);
            records.push(self.check_record(rrset));
        }

        let mut findings = Vec::new();
        let mut opt_out = false;
        let mut unsupported_hash = false;
        let (kind, logical) = match state {
            ProofState::NoProofSeen => {
                findings.push(Finding::error(
                    FindingCode::NoProof,
                    format!("no NSEC or NSEC3 records prove the absence of {}/{}", target.qname, target.qtype),
                ));
                (None, ProofOutcome::NotProven)
            }
            ProofState::Mixed => {
                findings.push(Finding::error(
                    FindingCode::MixedDenialTypes,
                    "NSEC and NSEC3 records are mixed in one proof",
                ));
                (None, ProofOutcome::Indeterminate)
            }
            ProofState::CollectingNsec(nsecs) => {
                (Some(ProofKind::Nsec), self.prove_nsec(target, &nsecs, &mut findings))
            }
            ProofState::CollectingNsec3(nsec3s) => {
                unsupported_hash =
                    shared_parameters(&nsec3s).is_some_and(|(algorithm, _, _)| algorithm != NSEC3_SHA1);
                let (outcome, via_opt_out) = self.prove_nsec3(target, &nsec3s, &mut findings);
                opt_out = via_opt_out;
                (Some(ProofKind::Nsec3), outcome)
            }
        };

        if !self.keys.is_empty() {
            for record in records.iter().filter(|r| r.outcome != ProofOutcome::Proven) {
                if record.rrsigs.is_empty() {
                    findings.push(Finding::error(
                        FindingCode::MissingRrsig,
                        format!("{} {} has no RRSIG", record.rrset.name, record.rrset.rtype),
                    ));
                } else if record.outcome == ProofOutcome::Indeterminate && !record.unsupported_only() {
                    findings.push(Finding::error(
                        FindingCode::NoValidRrsig,
                        format!(
                            "no RRSIG over {} {} was made by a key in the {} DNSKEY RRset",
                            record.rrset.name, record.rrset.rtype, self.zone
                        ),
                    ));
                }
            }
        }

        let outcome = records.iter().map(|r| r.outcome).fold(logical, ProofOutcome::weakest);
        let unsupported = outcome == ProofOutcome::Indeterminate
            && (logical != ProofOutcome::Indeterminate || unsupported_hash)
            && records
                .iter()
                .filter(|r| r.outcome == ProofOutcome::Indeterminate)
                .all(ProofRecord::unsupported_only);
        debug!(
            "Denial proof for {}/{} in {}: {:?}",
            target.qname, target.qtype, self.zone, outcome
        );

        NegativeProof {
            kind,
            records,
            outcome,
            opt_out,
            unsupported,
            findings,
        }
    }

    fn check_record(&self, rrset: &RRset) -> ProofRecord {
        let rrsigs = self.validator.verify_rrset(rrset, self.keys, self.zone);
        let outcome = if rrsigs.iter().any(|a| a.authenticates(self.zone)) {
            ProofOutcome::Proven
        } else if rrsigs.iter().any(|a| a.outcome == ValidationOutcome::Invalid)
            || (rrsigs.is_empty() && !self.keys.is_empty())
        {
            ProofOutcome::NotProven
        } else {
            ProofOutcome::Indeterminate
        };
        ProofRecord {
            rrset: rrset.clone(),
            rrsigs,
            outcome,
        }
    }

    /// RFC 4035 section 5.4
    fn prove_nsec(
        &self,
        target: &DenialTarget,
        nsecs: &[(&Name, &Nsec)],
        findings: &mut Vec<Finding>,
    ) -> ProofOutcome {
        let qname = &target.qname;
        let covering = |name: &Name| nsecs.iter().find(|(owner, nsec)| nsec_covers(owner, &nsec.next, name));
        let matching = |name: &Name| nsecs.iter().find(|(owner, _)| *owner == name);
        let before = findings.len();

        let check_last = |findings: &mut Vec<Finding>| {
            if let Some((owner, nsec)) = covering(self.zone) {
                findings.push(Finding::error(
                    FindingCode::LastNsecNextNotZone,
                    format!(
                        "last NSEC {} points to {} instead of the zone apex {}",
                        owner, nsec.next, self.zone
                    ),
                ));
            }
        };

        match target.kind {
            DenialKind::NxDomain => {
                if covering(qname).is_none() {
                    findings.push(Finding::error(
                        FindingCode::SnameNotCovered,
                        format!("no NSEC covers {}", qname),
                    ));
                }
                let wildcard_covered = enclosers(qname, self.zone)
                    .filter_map(|encloser| encloser.wildcard().ok())
                    .any(|wildcard| covering(&wildcard).is_some());
                if !wildcard_covered {
                    findings.push(Finding::error(
                        FindingCode::WildcardNotCovered,
                        format!("no NSEC covers a wildcard that could expand to {}", qname),
                    ));
                }
                check_last(findings);
            }
            DenialKind::NoData { referral } => {
                let wildcard_match = enclosers(qname, self.zone)
                    .filter_map(|encloser| encloser.wildcard().ok())
                    .find_map(|wildcard| matching(&wildcard).map(|(_, nsec)| (wildcard, *nsec)));

                if let Some((_, nsec)) = matching(qname) {
                    let at_cut = target.qtype == RecordType::DS || referral;
                    check_bitmap(qname, target.qtype, at_cut, |t| nsec.has_type(t), findings);
                } else if nsecs.iter().any(|(owner, nsec)| {
                    nsec.next.is_subdomain_of(qname) && &nsec.next != qname && nsec_covers(owner, &nsec.next, qname)
                }) {
                    trace!("{} is an empty non-terminal", qname);
                } else if let Some((wildcard, nsec)) = wildcard_match {
                    if covering(qname).is_none() {
                        findings.push(Finding::error(
                            FindingCode::SnameNotCovered,
                            format!("no NSEC covers {} for the wildcard NODATA", qname),
                        ));
                    }
                    if nsec.has_type(target.qtype) {
                        findings.push(Finding::error(
                            FindingCode::StypeInBitmap,
                            format!("{} is in the NSEC bitmap of {}", target.qtype, wildcard),
                        ));
                    }
                    check_last(findings);
                } else {
                    findings.push(Finding::error(
                        FindingCode::NoNsecMatchingSname,
                        format!("no NSEC matches {}", qname),
                    ));
                }
            }
            DenialKind::WildcardAnswer { labels } => {
                if covering(qname).is_none() {
                    findings.push(Finding::error(
                        FindingCode::SnameNotCoveredWildcardAnswer,
                        format!("no NSEC covers {} for its wildcard answer", qname),
                    ));
                } else {
                    let next_closer = qname.ancestor(labels as usize + 1);
                    if covering(&next_closer).is_none() {
                        findings.push(Finding::error(
                            FindingCode::NextCloserNotCoveredWildcardAnswer,
                            format!("no NSEC covers the next closer name {}", next_closer),
                        ));
                    }
                }
                check_last(findings);
            }
        }

        if findings.len() > before {
            ProofOutcome::NotProven
        } else {
            ProofOutcome::Proven
        }
    }

    /// RFC 5155 sections 8.4 to 8.8; the flag is true when an opt-out span did the proving
    fn prove_nsec3(
        &self,
        target: &DenialTarget,
        nsec3s: &[(&Name, &Nsec3)],
        findings: &mut Vec<Finding>,
    ) -> (ProofOutcome, bool) {
        if nsec3s.is_empty() {
            return (ProofOutcome::NotProven, false);
        }
        let Some((algorithm, iterations, salt)) = shared_parameters(nsec3s) else {
            findings.push(Finding::error(
                FindingCode::InconsistentNsec3Parameters,
                "NSEC3 records in one proof use different hash parameters",
            ));
            return (ProofOutcome::Indeterminate, false);
        };

        if self.validator.policy().flags().enforce_rfc9276 {
            if iterations > 0 {
                findings.push(Finding::warning(
                    FindingCode::Nsec3Iterations,
                    format!("RFC 9276 violation: NSEC3 iterations {} should be 0", iterations),
                ));
            }
            if !salt.is_empty() {
                findings.push(Finding::warning(
                    FindingCode::Nsec3Salt,
                    format!("RFC 9276 violation: NSEC3 salt {} should be empty", hex::encode_upper(salt)),
                ));
            }
        }

        if algorithm != NSEC3_SHA1 {
            findings.push(Finding::error(
                FindingCode::UnsupportedNsec3Algorithm,
                format!("NSEC3 hash algorithm {} is not supported", algorithm),
            ));
            return (ProofOutcome::Indeterminate, false);
        }

        let hashed: Vec<(Vec<u8>, &Nsec3)> = nsec3s
            .iter()
            .filter_map(|(owner, nsec3)| {
                owner
                    .first_label()
                    .and_then(decode_base32hex)
                    .map(|hash| (hash, *nsec3))
            })
            .collect();
        let hash = |name: &Name| nsec3_hash(name, algorithm, salt, iterations).unwrap_or_default();
        let matching = |name: &Name| {
            let h = hash(name);
            hashed.iter().find(|(owner, _)| *owner == h).map(|(_, n)| *n)
        };
        let covering = |name: &Name| {
            let h = hash(name);
            hashed
                .iter()
                .find(|(owner, n)| hash_covers(owner, &n.next_hashed, &h))
                .map(|(_, n)| *n)
        };

        let qname = &target.qname;
        let closest_encloser = enclosers(qname, self.zone).find(|encloser| matching(encloser).is_some());
        let next_closer = |encloser: &Name| qname.ancestor(encloser.label_count() + 1);
        let before = findings.len();
        let mut via_opt_out = false;

        match target.kind {
            DenialKind::NxDomain => match &closest_encloser {
                None => findings.push(Finding::error(
                    FindingCode::NoClosestEncloser,
                    format!("no NSEC3 proves a closest encloser for {}", qname),
                )),
                Some(encloser) => {
                    let next = next_closer(encloser);
                    if covering(&next).is_none() {
                        findings.push(Finding::error(
                            FindingCode::NextCloserNotCovered,
                            format!("no NSEC3 covers the next closer name {}", next),
                        ));
                    }
                    if let Ok(wildcard) = encloser.wildcard() {
                        if covering(&wildcard).is_none() {
                            findings.push(Finding::error(
                                FindingCode::WildcardNotCoveredNsec3,
                                format!("no NSEC3 covers the wildcard {}", wildcard),
                            ));
                        }
                    }
                }
            },
            DenialKind::NoData { referral } => {
                let at_cut = target.qtype == RecordType::DS || referral;
                let wildcard_match = closest_encloser
                    .as_ref()
                    .and_then(|encloser| encloser.wildcard().ok())
                    .and_then(|wildcard| matching(&wildcard).map(|n| (wildcard, n)));

                if let Some(nsec3) = matching(qname) {
                    check_bitmap(qname, target.qtype, at_cut, |t| nsec3.has_type(t), findings);
                } else if let (Some(encloser), Some((wildcard, nsec3))) = (&closest_encloser, wildcard_match) {
                    let next = next_closer(encloser);
                    if covering(&next).is_none() {
                        findings.push(Finding::error(
                            FindingCode::NextCloserNotCovered,
                            format!("no NSEC3 covers the next closer name {}", next),
                        ));
                    }
                    if nsec3.has_type(target.qtype) {
                        findings.push(Finding::error(
                            FindingCode::StypeInBitmap,
                            format!("{} is in the NSEC3 bitmap of {}", target.qtype, wildcard),
                        ));
                    }
                } else if at_cut
                    && closest_encloser
                        .as_ref()
                        .and_then(|encloser| covering(&next_closer(encloser)))
                        .is_some_and(Nsec3::opt_out)
                {
                    via_opt_out = true;
                } else {
                    findings.push(Finding::error(
                        FindingCode::NoNsecMatchingSname,
                        format!("no NSEC3 matches {}", qname),
                    ));
                }
            }
            DenialKind::WildcardAnswer { labels } => {
                let next = qname.ancestor(labels as usize + 1);
                if covering(&next).is_none() {
                    findings.push(Finding::error(
                        FindingCode::NextCloserNotCoveredWildcardAnswer,
                        format!("no NSEC3 covers the next closer name {}", next),
                    ));
                }
            }
        }

        let outcome = if findings[before..].iter().any(Finding::is_error) {
            ProofOutcome::NotProven
        } else {
            ProofOutcome::Proven
        };
        (outcome, via_opt_out && outcome == ProofOutcome::Proven)
    }
}

/// NODATA bitmap rules; at a delegation cut NS must be present and DS and SOA absent
fn check_bitmap(
    qname: &Name,
    qtype: RecordType,
    at_cut: bool,
    has_type: impl Fn(RecordType) -> bool,
    findings: &mut Vec<Finding>,
) {
    if at_cut {
        if !has_type(RecordType::NS) {
            findings.push(Finding::error(
                FindingCode::ReferralWithoutNsBit,
                format!("denial record for delegation {} lacks the NS bit", qname),
            ));
        }
        if has_type(RecordType::DS) {
            findings.push(Finding::error(
                FindingCode::ReferralWithDsBit,
                format!("denial record for delegation {} has the DS bit", qname),
            ));
        }
        if has_type(RecordType::SOA) {
            findings.push(Finding::error(
                FindingCode::ReferralWithSoaBit,
                format!("denial record for delegation {} has the SOA bit", qname),
            ));
        }
    } else {
        if has_type(qtype) {
            findings.push(Finding::error(
                FindingCode::StypeInBitmap,
                format!("{} is in the bitmap for {}", qtype, qname),
            ));
        }
        if qtype != RecordType::CNAME && has_type(RecordType::CNAME) {
            findings.push(Finding::error(
                FindingCode::CnameInBitmap,
                format!("CNAME is in the bitmap for {}", qname),
            ));
        }
    }
}
