//! Run driver and bottom-up status fold.
//!
//! Names are analysed in parallel; each analysis is then folded into the
//! report tree, taking at every level the worst issue flag of the entity's
//! own findings and of everything beneath it.

use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

use super::chain::{ChainValidator, NameAnalysis, NegativeAnalysis, RRsetAnalysis, ResponseAnalysis, ZoneAnalysis};
use super::finding::Finding;
use super::graph::{GraphFilter, NameGraph, NameNode};
use super::status::{Authentication, IssueFlag, StatusCode};
use crate::dns::TransactionSet;
use crate::dnssec::{DenialKind, DenialTarget, NegativeProof, Policy, RrsigAnalysis};
use crate::error::AnalysisError;
use crate::report::{
    DelegationReport, DnskeyReport, DsReport, FailureReport, NameReport, ProofRecordReport, ProofReport,
    RRsetReport, Report, ResponseReport, RrsigReport, ServerReport, ZoneReport,
};

/// Per-run knobs that are not part of the validation policy
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub filter: GraphFilter,
    /// Overrides the transaction set's own reference time
    pub reference_time: Option<u32>,
    /// Worker threads, 0 for the rayon default
    pub threads: usize,
}

/// Analyse every selected name in `set` and build the report
pub fn analyze(set: &TransactionSet, policy: &Policy, options: &RunOptions) -> Report {
    let now = options
        .reference_time
        .or(set.reference_time)
        .unwrap_or_else(|| u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX));

    let graph = NameGraph::build(set, &options.filter);
    let chain = ChainValidator::new(&graph, policy, now);
    let targets: Vec<&NameNode> = graph.targets(&options.filter).collect();

    let run = || -> Vec<Result<NameReport, AnalysisError>> {
        targets
            .par_iter()
            .map(|node| analyze_isolated(&chain, node).map(|analysis| fold_name(&analysis)))
            .collect()
    };

    let results = if options.threads > 0 {
        match rayon::ThreadPoolBuilder::new().num_threads(options.threads).build() {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!("Failed to build a {}-thread pool, using the default: {}", options.threads, e);
                run()
            }
        }
    } else {
        run()
    };

    let mut names = Vec::with_capacity(results.len());
    let mut failures: Vec<FailureReport> = graph
        .unattributed()
        .iter()
        .map(|e| FailureReport {
            name: None,
            error: e.to_string(),
        })
        .collect();

    for (node, result) in targets.iter().zip(results) {
        match result {
            Ok(report) => names.push(report),
            Err(e) => {
                warn!("Analysis of {} failed: {}", node.name, e);
                failures.push(FailureReport {
                    name: Some(node.name.to_string()),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        "Analysed {} names at reference time {} ({} failures)",
        names.len(),
        now,
        failures.len()
    );

    Report {
        reference_time: now,
        names,
        failures,
    }
}

/// A panic while analysing one name must not take down the others
fn analyze_isolated(chain: &ChainValidator<'_>, node: &NameNode) -> Result<NameAnalysis, AnalysisError> {
    panic::catch_unwind(AssertUnwindSafe(|| chain.analyze_name(node))).unwrap_or_else(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(AnalysisError::Internal {
            name: node.name.to_string(),
            reason,
        })
    })
}

/// Issue flag of an entity from its own findings and its children's codes
fn rollup<'a>(own: impl IntoIterator<Item = &'a Finding>, children: impl IntoIterator<Item = StatusCode>) -> IssueFlag {
    children
        .into_iter()
        .map(|code| code.issues)
        .fold(IssueFlag::from_findings(own), IssueFlag::max)
}

pub fn fold_name(analysis: &NameAnalysis) -> NameReport {
    let zone = fold_zone(&analysis.zone);
    let responses: Vec<ResponseReport> = analysis.responses.iter().map(fold_response).collect();

    let issues = rollup(
        [],
        std::iter::once(zone.status).chain(responses.iter().map(|r| r.status)),
    );
    NameReport {
        name: analysis.name.to_string(),
        status: StatusCode::new(analysis.authentication, issues),
        is_apex: analysis.is_apex,
        zone,
        responses,
    }
}

pub fn fold_zone(zone: &ZoneAnalysis) -> ZoneReport {
    let key_status = StatusCode::new(zone.status, IssueFlag::None);
    let dnskeys = zone
        .keys()
        .iter()
        .map(|key| DnskeyReport {
            key_tag: key.key_tag(),
            algorithm: key.algorithm,
            flags: key.flags,
            status: key_status,
        })
        .collect();
    let dnskey_rrsigs = fold_rrsigs(&zone.dnskey_rrsigs);
    let ds_rrsigs = fold_rrsigs(&zone.ds_rrsigs);

    let ds: Vec<DsReport> = if zone.ds_analyses.is_empty() {
        zone.ds
            .iter()
            .flat_map(|set| set.ds_records())
            .map(|record| DsReport {
                key_tag: record.key_tag,
                algorithm: record.algorithm,
                digest_type: record.digest_type,
                outcome: None,
                dnskey: None,
                status: StatusCode::new(zone.status, IssueFlag::None),
                findings: Vec::new(),
            })
            .collect()
    } else {
        zone.ds_analyses
            .iter()
            .map(|analysis| DsReport {
                key_tag: analysis.key_tag,
                algorithm: analysis.algorithm,
                digest_type: analysis.digest_type,
                outcome: Some(analysis.outcome),
                dnskey: analysis.dnskey,
                status: StatusCode::new(
                    analysis.outcome.authentication(),
                    IssueFlag::from_findings(&analysis.findings),
                ),
                findings: analysis.findings.clone(),
            })
            .collect()
    };

    let ds_proof = zone.ds_proof.as_ref().map(fold_negative);

    let delegation = fold_delegation(zone);
    let cdnskey = zone.cdnskey.as_ref().map(fold_rrset);
    let cds = zone.cds.as_ref().map(fold_rrset);

    let children = dnskey_rrsigs
        .iter()
        .chain(ds_rrsigs.iter())
        .map(|r| r.status)
        .chain(ds.iter().map(|d| d.status))
        .chain(ds_proof.iter().map(|p| p.status))
        .chain(std::iter::once(delegation.status))
        .chain(cdnskey.iter().chain(cds.iter()).map(|r| r.status))
        .collect::<Vec<_>>();

    ZoneReport {
        apex: zone.apex.to_string(),
        parent: zone.parent.as_ref().map(|p| p.to_string()),
        status: StatusCode::new(zone.status, rollup(&zone.findings, children)),
        dnskeys,
        dnskey_rrsigs,
        ds,
        ds_rrsigs,
        ds_proof,
        delegation,
        cdnskey,
        cds,
        findings: zone.findings.clone(),
    }
}

fn fold_delegation(zone: &ZoneAnalysis) -> DelegationReport {
    let check = &zone.delegation;
    let authentication = if check.lame {
        Authentication::LameOrIncomplete
    } else {
        zone.status
    };
    let servers: Vec<ServerReport> = check
        .servers
        .iter()
        .map(|server| ServerReport {
            server: server.server.to_string(),
            lame: server.lame,
            status: StatusCode::new(
                if server.lame {
                    Authentication::LameOrIncomplete
                } else {
                    authentication
                },
                IssueFlag::from_findings(&server.findings),
            ),
            findings: server.findings.clone(),
        })
        .collect();
    DelegationReport {
        status: StatusCode::new(
            authentication,
            rollup(&check.findings, servers.iter().map(|s| s.status)),
        ),
        servers,
        findings: check.findings.clone(),
    }
}

fn fold_rrsigs(rrsigs: &[RrsigAnalysis]) -> Vec<RrsigReport> {
    rrsigs
        .iter()
        .map(|rrsig| RrsigReport {
            signer: rrsig.signer.to_string(),
            algorithm: rrsig.algorithm,
            key_tag: rrsig.key_tag,
            inception: rrsig.inception,
            expiration: rrsig.expiration,
            outcome: rrsig.outcome,
            status: StatusCode::new(
                rrsig.outcome.authentication(),
                IssueFlag::from_findings(&rrsig.findings),
            ),
            findings: rrsig.findings.clone(),
        })
        .collect()
}

fn fold_rrset(analysis: &RRsetAnalysis) -> RRsetReport {
    let rrsigs = fold_rrsigs(&analysis.rrsigs);
    let wildcard_proof = analysis.wildcard_proof.as_ref().map(|proof| {
        let target = DenialTarget {
            qname: analysis.rrset.name.clone(),
            qtype: analysis.rrset.rtype,
            kind: DenialKind::WildcardAnswer {
                labels: analysis.rrset.wildcard_signer_labels().unwrap_or_default(),
            },
        };
        fold_proof(&target, &analysis.zone.to_string(), Some(proof), proof.authentication())
    });
    let children: Vec<StatusCode> = rrsigs
        .iter()
        .map(|r| r.status)
        .chain(wildcard_proof.iter().map(|p| p.status))
        .collect();

    RRsetReport {
        owner: analysis.rrset.name.to_string(),
        rtype: analysis.rrset.rtype.to_string(),
        ttl: analysis.rrset.ttl,
        records: analysis.rrset.rdatas.iter().map(|r| r.to_string()).collect(),
        status: StatusCode::new(analysis.authentication, rollup(&analysis.findings, children)),
        rrsigs,
        wildcard_proof,
        findings: analysis.findings.clone(),
    }
}

fn describe(target: &DenialTarget) -> String {
    let what = match target.kind {
        DenialKind::NxDomain => "NXDOMAIN",
        DenialKind::NoData { referral: true } => "insecure referral",
        DenialKind::NoData { referral: false } => "NODATA",
        DenialKind::WildcardAnswer { .. } => "wildcard expansion",
    };
    format!("{} {}/{}", what, target.qname, target.qtype)
}

fn fold_proof(
    target: &DenialTarget,
    zone: &str,
    proof: Option<&NegativeProof>,
    authentication: Authentication,
) -> ProofReport {
    let records: Vec<ProofRecordReport> = proof
        .map(|proof| {
            proof
                .records
                .iter()
                .map(|record| {
                    let rrsigs = fold_rrsigs(&record.rrsigs);
                    ProofRecordReport {
                        owner: record.rrset.name.to_string(),
                        rtype: record.rrset.rtype.to_string(),
                        outcome: record.outcome,
                        status: StatusCode::new(
                            record.outcome.authentication(),
                            rollup([], rrsigs.iter().map(|r| r.status)),
                        ),
                        rrsigs,
                    }
                })
                .collect()
        })
        .unwrap_or_default();
    let findings: Vec<Finding> = proof.map(|p| p.findings.clone()).unwrap_or_default();

    ProofReport {
        target: describe(target),
        zone: zone.to_string(),
        kind: proof.and_then(|p| p.kind),
        outcome: proof.map(|p| p.outcome),
        opt_out: proof.is_some_and(|p| p.opt_out),
        status: StatusCode::new(authentication, rollup(&findings, records.iter().map(|r| r.status))),
        records,
        findings,
    }
}

fn fold_negative(negative: &NegativeAnalysis) -> ProofReport {
    fold_proof(
        &negative.target,
        &negative.zone.to_string(),
        negative.proof.as_ref(),
        negative.authentication,
    )
}

pub fn fold_response(analysis: &ResponseAnalysis) -> ResponseReport {
    let answer: Vec<RRsetReport> = analysis.answer.iter().map(fold_rrset).collect();
    let authority: Vec<RRsetReport> = analysis.authority.iter().map(fold_rrset).collect();
    let negative = analysis.negative.as_ref().map(fold_negative);

    let children: Vec<StatusCode> = answer
        .iter()
        .chain(authority.iter())
        .map(|r| r.status)
        .chain(negative.iter().map(|n| n.status))
        .collect();

    ResponseReport {
        qname: analysis.qname.to_string(),
        qtype: analysis.qtype.to_string(),
        server: analysis.server.to_string(),
        transport: match analysis.transport {
            crate::dns::Transport::Udp => "udp".to_string(),
            crate::dns::Transport::Tcp => "tcp".to_string(),
        },
        rcode: analysis.rcode.map(|r| r.to_string()),
        status: StatusCode::new(analysis.authentication, rollup(&analysis.findings, children)),
        answer,
        authority,
        negative,
        findings: analysis.findings.clone(),
    }
}
