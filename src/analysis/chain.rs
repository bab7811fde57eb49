//! Chain-of-trust validation.
//!
//! Zones are analysed top-down: a zone's analysis first obtains its parent's,
//! then judges its own DNSKEY RRset against the parent's DS RRset (or a trust
//! anchor). Each zone is computed at most once per run and shared between
//! every name beneath it.

use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

use super::delegation::{DelegationCheck, check_cookie};
use super::finding::{Finding, FindingCode};
use super::graph::{NameGraph, NameNode};
use super::status::Authentication;
use crate::dns::{Dnskey, Name, QueryResponse, RData, RRset, Rcode, RecordType, Response, Transport};
use crate::dnssec::{
    DenialKind, DenialTarget, DenialValidator, DigestType, DnsSecValidator, DsAnalysis, NegativeProof,
    Policy, RrsigAnalysis, ValidationOutcome, compute_ds_digest,
};
use crate::error::AnalysisError;

/// One RRset with its signature checks, judged within its zone
#[derive(Debug, Clone)]
pub struct RRsetAnalysis {
    pub rrset: RRset,
    pub zone: Name,
    pub rrsigs: Vec<RrsigAnalysis>,
    pub authentication: Authentication,
    pub findings: Vec<Finding>,
    /// Proof that the query name does not exist, for wildcard expansions
    pub wildcard_proof: Option<NegativeProof>,
}

/// Everything known about one zone apex
#[derive(Debug, Clone)]
pub struct ZoneAnalysis {
    pub apex: Name,
    pub parent: Option<Name>,
    pub status: Authentication,
    pub dnskey: Option<RRset>,
    pub dnskey_rrsigs: Vec<RrsigAnalysis>,
    pub ds: Option<RRset>,
    pub ds_rrsigs: Vec<RrsigAnalysis>,
    pub ds_analyses: Vec<DsAnalysis>,
    /// Proof from the parent that no DS exists
    pub ds_proof: Option<NegativeAnalysis>,
    pub delegation: DelegationCheck,
    pub cdnskey: Option<RRsetAnalysis>,
    pub cds: Option<RRsetAnalysis>,
    pub findings: Vec<Finding>,
    keys: Vec<Dnskey>,
}

impl ZoneAnalysis {
    /// DNSKEYs used to check data in this zone
    pub fn keys(&self) -> &[Dnskey] {
        &self.keys
    }

    pub fn is_secure(&self) -> bool {
        self.status == Authentication::Secure
    }
}

/// A negative answer or referral and the proof backing it
#[derive(Debug, Clone)]
pub struct NegativeAnalysis {
    pub zone: Name,
    pub target: DenialTarget,
    pub proof: Option<NegativeProof>,
    pub authentication: Authentication,
}

#[derive(Debug, Clone)]
pub struct ResponseAnalysis {
    pub qname: Name,
    pub qtype: RecordType,
    pub server: IpAddr,
    pub transport: Transport,
    pub rcode: Option<Rcode>,
    pub answer: Vec<RRsetAnalysis>,
    /// SOA of a negative answer, DS of a referral
    pub authority: Vec<RRsetAnalysis>,
    pub negative: Option<NegativeAnalysis>,
    pub authentication: Authentication,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone)]
pub struct NameAnalysis {
    pub name: Name,
    /// The zone the name belongs to; its own zone when it is an apex
    pub zone: Arc<ZoneAnalysis>,
    pub is_apex: bool,
    pub authentication: Authentication,
    pub responses: Vec<ResponseAnalysis>,
}

/// Walks delegations from the trust anchors down to each queried name
pub struct ChainValidator<'a> {
    graph: &'a NameGraph,
    validator: DnsSecValidator<'a>,
    zones: DashMap<Name, Arc<OnceLock<Arc<ZoneAnalysis>>>>,
}

impl<'a> ChainValidator<'a> {
    pub fn new(graph: &'a NameGraph, policy: &'a Policy, now: u32) -> Self {
        Self {
            graph,
            validator: DnsSecValidator::new(policy, now),
            zones: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &Policy {
        self.validator.policy()
    }

    pub fn is_apex(&self, name: &Name) -> bool {
        name.is_root()
            || self.graph.is_apex(name)
            || self.policy().trust_anchors().is_anchor_zone(name)
    }

    /// Closest apex at or above `name`
    pub fn enclosing_zone(&self, name: &Name) -> Name {
        let mut current = name.clone();
        loop {
            if self.is_apex(&current) {
                return current;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return Name::root(),
            }
        }
    }

    /// Zone holding the delegation to `apex`
    pub fn parent_zone(&self, apex: &Name) -> Option<Name> {
        apex.parent().map(|parent| self.enclosing_zone(&parent))
    }

    /// Memoised zone analysis. The first caller computes; concurrent callers
    /// for the same apex block on the cell until it is set.
    pub fn zone(&self, apex: &Name) -> Arc<ZoneAnalysis> {
        let cell = self.zones.entry(apex.clone()).or_default().clone();
        cell.get_or_init(|| Arc::new(self.compute_zone(apex))).clone()
    }

    pub fn analyze_name(&self, node: &NameNode) -> Result<NameAnalysis, AnalysisError> {
        let responses = node
            .responses
            .as_ref()
            .map_err(|e| AnalysisError::MalformedInput(e.clone()))?;

        let zone = self.zone(&self.enclosing_zone(&node.name));
        let responses = responses.iter().map(|qr| self.analyze_response(qr)).collect();

        Ok(NameAnalysis {
            name: node.name.clone(),
            is_apex: zone.apex == node.name,
            authentication: zone.status,
            zone,
            responses,
        })
    }

    fn compute_zone(&self, apex: &Name) -> ZoneAnalysis {
        let flags = *self.policy().flags();
        let anchors = self.policy().trust_anchors().anchors_for(apex);
        let parent = if anchors.is_empty() {
            self.parent_zone(apex).map(|p| self.zone(&p))
        } else {
            None
        };
        let mut findings = Vec::new();

        let delegation = DelegationCheck::run(apex, self.graph.all_responses(apex), &flags);

        let dnskey = self.graph.first_answer(apex, RecordType::DNSKEY).cloned();
        let dnskey_answered = self
            .graph
            .responses(apex, RecordType::DNSKEY)
            .any(|qr| qr.response.as_ref().is_some_and(|r| r.rcode == Rcode::NoError && r.authoritative));
        let keys: Vec<Dnskey> = dnskey
            .as_ref()
            .map(|set| set.dnskeys().cloned().collect())
            .unwrap_or_default();
        let dnskey_rrsigs = dnskey
            .as_ref()
            .map(|set| self.validator.verify_rrset(set, &keys, apex))
            .unwrap_or_default();

        // Self-signature, preferring keys with the SEP flag
        let has_sep = keys.iter().any(|k| k.is_sep() && k.is_zone_key());
        let self_signed = dnskey_rrsigs.iter().any(|a| {
            a.authenticates(apex) && a.verified_by.as_ref().is_some_and(|k| !has_sep || k.is_sep())
        });
        if dnskey.is_some() && !self_signed {
            findings.push(Finding::error(
                FindingCode::NoValidRrsig,
                format!(
                    "no {}key of {} validly signs its DNSKEY RRset",
                    if has_sep { "SEP " } else { "" },
                    apex
                ),
            ));
        }

        let mut ds = None;
        let mut ds_rrsigs = Vec::new();
        let mut ds_analyses = Vec::new();
        let mut ds_proof = None;

        let status = if !anchors.is_empty() {
            let anchored: Vec<&Dnskey> = keys
                .iter()
                .filter(|k| anchors.iter().any(|a| a.matches(k)))
                .collect();
            if dnskey.is_none() {
                if dnskey_answered && !delegation.lame {
                    Authentication::Bogus
                } else {
                    Authentication::LameOrIncomplete
                }
            } else if anchored.is_empty() {
                findings.push(Finding::error(
                    FindingCode::NoTrustAnchorMatch,
                    format!("no DNSKEY of {} matches a configured trust anchor", apex),
                ));
                Authentication::Bogus
            } else if signed_by(&dnskey_rrsigs, apex, &anchored) {
                Authentication::Secure
            } else if anchored.iter().all(|k| !self.policy().supports_algorithm(k.algorithm)) {
                Authentication::Insecure
            } else {
                findings.push(Finding::error(
                    FindingCode::NoTrustedSignature,
                    format!("no trust-anchored key signs the DNSKEY RRset of {}", apex),
                ));
                Authentication::Bogus
            }
        } else {
            match &parent {
                None => Authentication::Insecure,
                Some(parent) if !parent.is_secure() => parent.status,
                Some(parent) => {
                    let ds_set = self.graph.first_answer(apex, RecordType::DS).cloned().or_else(|| {
                        self.graph
                            .referrals_to(apex)
                            .find_map(|r| r.authority.iter().find(|s| s.rtype == RecordType::DS && &s.name == apex))
                            .cloned()
                    });

                    match ds_set {
                        Some(ds_set) => {
                            ds_rrsigs = self.validator.verify_rrset(&ds_set, parent.keys(), &parent.apex);
                            if dnskey.is_some() {
                                ds_analyses = ds_set
                                    .ds_records()
                                    .map(|record| self.validator.verify_ds(apex, record, &keys))
                                    .collect();
                            }
                            let status = self.ds_status(
                                apex,
                                &parent.apex,
                                dnskey.is_some(),
                                dnskey_answered && !delegation.lame,
                                &ds_rrsigs,
                                &ds_analyses,
                                &dnskey_rrsigs,
                                &mut findings,
                            );
                            ds = Some(ds_set);
                            status
                        }
                        None => match self.ds_denial(apex, parent) {
                            Some(denial) => {
                                let status = denial.authentication;
                                ds_proof = Some(denial);
                                status
                            }
                            None => {
                                findings.push(Finding::error(
                                    FindingCode::NoDsProof,
                                    format!(
                                        "{} is delegated from secure {} but neither a DS RRset nor proof of its absence was captured",
                                        apex, parent.apex
                                    ),
                                ));
                                Authentication::LameOrIncomplete
                            }
                        },
                    }
                }
            }
        };

        if !flags.multi_signer {
            for analysis in ds_analyses.iter().filter(|d| d.outcome == ValidationOutcome::Valid) {
                let Some(key) = &analysis.matched_key else {
                    continue;
                };
                let signs = dnskey_rrsigs
                    .iter()
                    .any(|a| a.authenticates(apex) && a.verified_by.as_ref() == Some(key));
                if !signs {
                    findings.push(Finding::warning(
                        FindingCode::DnskeyNotInSigningSet,
                        format!(
                            "DNSKEY {} referenced by a DS does not sign the DNSKEY RRset",
                            analysis.key_tag
                        ),
                    ));
                }
            }
        }

        let status = if delegation.lame {
            Authentication::LameOrIncomplete
        } else {
            status
        };

        let ds_keys: Vec<&Dnskey> = ds_analyses
            .iter()
            .filter(|d| d.outcome == ValidationOutcome::Valid)
            .filter_map(|d| d.matched_key.as_ref())
            .collect();
        let cdnskey = self.graph.first_answer(apex, RecordType::CDNSKEY).map(|set| {
            self.check_cdnskey_cds(set, apex, status, &keys, &ds_keys, !ds_analyses.is_empty())
        });
        let cds = self.graph.first_answer(apex, RecordType::CDS).map(|set| {
            self.check_cdnskey_cds(set, apex, status, &keys, &ds_keys, !ds_analyses.is_empty())
        });

        debug!("Zone {} is {:?} ({} findings)", apex, status, findings.len());

        ZoneAnalysis {
            apex: apex.clone(),
            parent: parent.map(|p| p.apex.clone()),
            status,
            dnskey,
            dnskey_rrsigs,
            ds,
            ds_rrsigs,
            ds_analyses,
            ds_proof,
            delegation,
            cdnskey,
            cds,
            findings,
            keys,
        }
    }

    /// Status of a zone whose secure parent serves a DS RRset for it
    #[allow(clippy::too_many_arguments)]
    fn ds_status(
        &self,
        apex: &Name,
        parent_apex: &Name,
        has_dnskey: bool,
        dnskey_reachable: bool,
        ds_rrsigs: &[RrsigAnalysis],
        ds_analyses: &[DsAnalysis],
        dnskey_rrsigs: &[RrsigAnalysis],
        findings: &mut Vec<Finding>,
    ) -> Authentication {
        if !ds_rrsigs.iter().any(|a| a.authenticates(parent_apex)) {
            if !ds_rrsigs.is_empty()
                && ds_rrsigs
                    .iter()
                    .all(|a| a.outcome == ValidationOutcome::IndeterminateUnknownAlgorithm)
            {
                return Authentication::Insecure;
            }
            let (code, what) = if ds_rrsigs.is_empty() {
                (FindingCode::MissingRrsig, "is unsigned")
            } else {
                (FindingCode::NoValidRrsig, "has no valid RRSIG")
            };
            findings.push(Finding::error(
                code,
                format!("the DS RRset for {} in {} {}", apex, parent_apex, what),
            ));
            return Authentication::Bogus;
        }

        if !has_dnskey {
            return if dnskey_reachable {
                findings.push(Finding::error(
                    FindingCode::NoTrustedSignature,
                    format!("{} has DS records but serves no DNSKEY RRset", apex),
                ));
                Authentication::Bogus
            } else {
                Authentication::LameOrIncomplete
            };
        }

        let ds_keys: Vec<&Dnskey> = ds_analyses
            .iter()
            .filter(|d| {
                d.outcome == ValidationOutcome::Valid
                    && !d.findings.iter().any(|f| f.code == FindingCode::DnskeyRevokedDs)
            })
            .filter_map(|d| d.matched_key.as_ref())
            .collect();

        if signed_by(dnskey_rrsigs, apex, &ds_keys) {
            Authentication::Secure
        } else if !ds_analyses.is_empty()
            && ds_analyses
                .iter()
                .all(|d| d.outcome == ValidationOutcome::IndeterminateUnknownAlgorithm)
        {
            trace!("every DS for {} uses an unsupported algorithm", apex);
            Authentication::Insecure
        } else {
            findings.push(Finding::error(
                FindingCode::NoTrustedSignature,
                format!("no key referenced by a valid DS signs the DNSKEY RRset of {}", apex),
            ));
            Authentication::Bogus
        }
    }

    /// The parent's proof that `apex` has no DS, from a DS query or a referral
    fn ds_denial(&self, apex: &Name, parent: &ZoneAnalysis) -> Option<NegativeAnalysis> {
        let direct = self
            .graph
            .responses(apex, RecordType::DS)
            .filter_map(|qr| qr.response.as_ref())
            .find(|r| r.is_nxdomain() || r.is_nodata(apex, RecordType::DS));

        let (kind, authority) = match direct {
            Some(response) if response.is_nxdomain() => (DenialKind::NxDomain, &response.authority),
            Some(response) => (DenialKind::NoData { referral: false }, &response.authority),
            None => {
                let referral = self.graph.referrals_to(apex).next()?;
                (DenialKind::NoData { referral: true }, &referral.authority)
            }
        };
        let target = DenialTarget {
            qname: apex.clone(),
            qtype: RecordType::DS,
            kind,
        };
        let proof = DenialValidator::new(&self.validator, &parent.apex, parent.keys()).prove(&target, authority);

        // A proven absence, or one hidden by an unsupported algorithm, leaves the child insecure
        let authentication = match proof.authentication() {
            Authentication::Secure => Authentication::Insecure,
            other => other,
        };
        Some(NegativeAnalysis {
            zone: parent.apex.clone(),
            target,
            proof: Some(proof),
            authentication,
        })
    }

    /// RFC 7344 consistency of a CDNSKEY or CDS RRset with the current chain
    fn check_cdnskey_cds(
        &self,
        set: &RRset,
        apex: &Name,
        zone_status: Authentication,
        keys: &[Dnskey],
        ds_keys: &[&Dnskey],
        has_ds: bool,
    ) -> RRsetAnalysis {
        let mut analysis = self.rrset_in_zone(set, apex, zone_status, keys);
        if self.policy().flags().trust_all_cdnskey_cds {
            return analysis;
        }

        let signed_by_ds_key = analysis.rrsigs.iter().any(|a| {
            a.authenticates(apex) && a.verified_by.as_ref().is_some_and(|k| ds_keys.contains(&k))
        });
        if has_ds && !signed_by_ds_key {
            analysis.findings.push(Finding::warning(
                FindingCode::CdnskeyNotSignedByDsKey,
                format!(
                    "{} RRset is not signed by a key that is in the DNSKEY RRset and referenced by a valid DS",
                    set.rtype
                ),
            ));
        }

        if set.rtype == RecordType::CDS {
            for cds in set.ds_records().filter(|cds| cds.algorithm != 0) {
                let matches = keys.iter().any(|key| {
                    key.algorithm == cds.algorithm
                        && key.key_tag() == cds.key_tag
                        && match DigestType::from_u8(cds.digest_type) {
                            Some(digest_type) => compute_ds_digest(apex, key, digest_type)
                                .is_none_or(|digest| digest == cds.digest),
                            None => true,
                        }
                });
                if !matches {
                    analysis.findings.push(Finding::warning(
                        FindingCode::CdsNoMatchingDnskey,
                        format!("CDS {} matches no DNSKEY in the RRset", cds.key_tag),
                    ));
                }
            }
        }
        analysis
    }

    /// Judge `rrset` against the status and keys of the zone `apex`
    fn rrset_in_zone(
        &self,
        rrset: &RRset,
        apex: &Name,
        zone_status: Authentication,
        keys: &[Dnskey],
    ) -> RRsetAnalysis {
        let rrsigs = self.validator.verify_rrset(rrset, keys, apex);
        let mut findings = Vec::new();

        let authentication = if zone_status == Authentication::Secure {
            if rrsigs.iter().any(|a| a.authenticates(apex)) {
                Authentication::Secure
            } else if rrsigs.is_empty() {
                findings.push(Finding::error(
                    FindingCode::MissingRrsig,
                    format!("{} {} in secure zone {} has no RRSIG", rrset.name, rrset.rtype, apex),
                ));
                Authentication::Bogus
            } else if rrsigs
                .iter()
                .all(|a| a.outcome == ValidationOutcome::IndeterminateUnknownAlgorithm)
            {
                Authentication::Insecure
            } else {
                findings.push(Finding::error(
                    FindingCode::NoValidRrsig,
                    format!("no RRSIG over {} {} validates", rrset.name, rrset.rtype),
                ));
                Authentication::Bogus
            }
        } else {
            zone_status
        };

        RRsetAnalysis {
            rrset: rrset.clone(),
            zone: apex.clone(),
            rrsigs,
            authentication,
            findings,
            wildcard_proof: None,
        }
    }

    /// Zone an RRset is authoritative data of; DS belongs to the parent side
    fn zone_for(&self, owner: &Name, rtype: RecordType) -> Name {
        if rtype == RecordType::DS && self.is_apex(owner) {
            if let Some(parent) = self.parent_zone(owner) {
                return parent;
            }
        }
        self.enclosing_zone(owner)
    }

    fn analyze_rrset(&self, rrset: &RRset) -> RRsetAnalysis {
        let zone = self.zone(&self.zone_for(&rrset.name, rrset.rtype));
        self.rrset_in_zone(rrset, &zone.apex, zone.status, zone.keys())
    }

    pub fn analyze_response(&self, qr: &QueryResponse) -> ResponseAnalysis {
        let mut findings: Vec<Finding> = check_cookie(qr, self.policy().flags()).into_iter().collect();

        let Some(response) = &qr.response else {
            findings.push(Finding::error(
                FindingCode::ServerUnresponsive,
                format!(
                    "no response from {}: {}",
                    qr.server,
                    qr.error.as_deref().unwrap_or("unknown error")
                ),
            ));
            return ResponseAnalysis {
                qname: qr.qname.clone(),
                qtype: qr.qtype,
                server: qr.server,
                transport: qr.transport,
                rcode: None,
                answer: Vec::new(),
                authority: Vec::new(),
                negative: None,
                authentication: Authentication::LameOrIncomplete,
                findings,
            };
        };

        let mut answer: Vec<RRsetAnalysis> = Vec::new();
        for rrset in &response.answer {
            let mut analysis = self.analyze_rrset(rrset);
            if let Some(labels) = rrset.wildcard_signer_labels() {
                if analysis.authentication == Authentication::Secure {
                    let zone = self.zone(&analysis.zone);
                    let proof = DenialValidator::new(&self.validator, &zone.apex, zone.keys()).prove(
                        &DenialTarget {
                            qname: rrset.name.clone(),
                            qtype: rrset.rtype,
                            kind: DenialKind::WildcardAnswer { labels },
                        },
                        &response.authority,
                    );
                    analysis.authentication = analysis
                        .authentication
                        .weakest(proof.authentication());
                    analysis.wildcard_proof = Some(proof);
                }
            }
            answer.push(analysis);
        }
        check_dname(&response.answer, &mut answer);

        let mut authority = Vec::new();
        let negative = self.analyze_negative(qr, response, &mut authority);

        let fallback = self.zone(&self.enclosing_zone(&qr.qname)).status;
        let authentication = answer
            .iter()
            .map(|a| a.authentication)
            .chain(authority.iter().map(|a| a.authentication))
            .chain(negative.iter().map(|n| n.authentication))
            .reduce(Authentication::weakest)
            .unwrap_or(fallback);

        trace!(
            "Response {}/{} from {}: {:?}",
            qr.qname, qr.qtype, qr.server, authentication
        );

        ResponseAnalysis {
            qname: qr.qname.clone(),
            qtype: qr.qtype,
            server: qr.server,
            transport: qr.transport,
            rcode: Some(response.rcode),
            answer,
            authority,
            negative,
            authentication,
            findings,
        }
    }

    /// Classify NXDOMAIN, NODATA and referrals and check their proofs
    fn analyze_negative(
        &self,
        qr: &QueryResponse,
        response: &Response,
        authority: &mut Vec<RRsetAnalysis>,
    ) -> Option<NegativeAnalysis> {
        let qname = &qr.qname;

        let target = if response.is_nxdomain() {
            DenialTarget {
                qname: qname.clone(),
                qtype: qr.qtype,
                kind: DenialKind::NxDomain,
            }
        } else if response.is_referral(qname) {
            let cut = response.referral_cut()?.clone();
            if let Some(ds) = response
                .authority
                .iter()
                .find(|s| s.rtype == RecordType::DS && s.name == cut)
            {
                authority.push(self.analyze_rrset(ds));
                return None;
            }
            DenialTarget {
                qname: cut,
                qtype: RecordType::DS,
                kind: DenialKind::NoData { referral: true },
            }
        } else if response.is_nodata(qname, qr.qtype) {
            DenialTarget {
                qname: qname.clone(),
                qtype: qr.qtype,
                kind: DenialKind::NoData { referral: false },
            }
        } else {
            return None;
        };

        let zone_name = match response.authority_soa_owner() {
            Some(owner) if target.qname.is_subdomain_of(owner) => owner.clone(),
            _ => self.zone_for(&target.qname, target.qtype),
        };
        let zone = self.zone(&zone_name);

        if let Some(soa) = response.authority_rrset(RecordType::SOA) {
            authority.push(self.rrset_in_zone(soa, &zone.apex, zone.status, zone.keys()));
        }

        let has_records = response
            .authority
            .iter()
            .any(|s| matches!(s.rtype, RecordType::NSEC | RecordType::NSEC3));
        let proof = (zone.is_secure() || has_records).then(|| {
            DenialValidator::new(&self.validator, &zone.apex, zone.keys()).prove(&target, &response.authority)
        });
        let authentication = match (&proof, zone.status) {
            (Some(proof), Authentication::Secure) => {
                if proof.opt_out && matches!(target.kind, DenialKind::NoData { .. }) {
                    Authentication::Insecure.weakest(proof.authentication())
                } else {
                    proof.authentication()
                }
            }
            (_, status) => status,
        };

        Some(NegativeAnalysis {
            zone: zone.apex.clone(),
            target,
            proof,
            authentication,
        })
    }
}

/// Any authenticating RRSIG made by one of `keys`
fn signed_by(rrsigs: &[RrsigAnalysis], apex: &Name, keys: &[&Dnskey]) -> bool {
    rrsigs.iter().any(|a| {
        a.authenticates(apex) && a.verified_by.as_ref().is_some_and(|k| keys.contains(&k))
    })
}

/// RFC 6672: every name rewritten through a DNAME needs a matching CNAME
fn check_dname(rrsets: &[RRset], analyses: &mut [RRsetAnalysis]) {
    for (idx, dname) in rrsets.iter().enumerate() {
        if dname.rtype != RecordType::DNAME {
            continue;
        }
        let Some(RData::Dname { target }) = dname.rdatas.first() else {
            continue;
        };

        let cnames: Vec<&RRset> = rrsets
            .iter()
            .filter(|s| {
                s.rtype == RecordType::CNAME && s.name.is_subdomain_of(&dname.name) && s.name != dname.name
            })
            .collect();

        if cnames.is_empty() {
            analyses[idx].findings.push(Finding::error(
                FindingCode::DnameNoCname,
                format!("DNAME {} has no synthesised CNAME", dname.name),
            ));
            continue;
        }

        for cname in cnames {
            let expected = rewrite(&cname.name, &dname.name, target);
            let actual = cname.rdatas.first().and_then(RData::target);
            if expected.as_ref() != actual {
                analyses[idx].findings.push(Finding::error(
                    FindingCode::DnameTargetMismatch,
                    format!(
                        "CNAME {} points to {} instead of {}",
                        cname.name,
                        actual.map(Name::to_string).unwrap_or_default(),
                        expected.map(|n| n.to_string()).unwrap_or_else(|| "an overlong name".to_string())
                    ),
                ));
            }
            // A synthesised CNAME carries the DNAME's TTL
            if cname.ttl != dname.ttl {
                let (code, detail) = if cname.ttl == 0 {
                    (FindingCode::DnameTtlZero, "is zero")
                } else {
                    (FindingCode::DnameTtlMismatch, "differs")
                };
                analyses[idx].findings.push(Finding::warning(
                    code,
                    format!(
                        "CNAME {} TTL {} {} from DNAME TTL {}",
                        cname.name, cname.ttl, detail, dname.ttl
                    ),
                ));
            }
        }
    }
}

/// Replace the `from` suffix of `name` with `to`
fn rewrite(name: &Name, from: &Name, to: &Name) -> Option<Name> {
    let keep = name.label_count().checked_sub(from.label_count())?;
    name.labels()[..keep]
        .iter()
        .rev()
        .try_fold(to.clone(), |acc, label| acc.prepend(label).ok())
}
