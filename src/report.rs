//! Output tree and its renderers.
//!
//! Every entity carries its own [`StatusCode`] and the findings attached to
//! it. Issue flags are already folded bottom-up when the tree is built, so
//! rendering never recomputes anything.

use serde::Serialize;
use std::fmt::Write;

use crate::analysis::{Finding, StatusCode};
use crate::dnssec::{ProofKind, ProofOutcome, ValidationOutcome};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub reference_time: u32,
    pub names: Vec<NameReport>,
    /// Names or transactions that could not be analysed
    pub failures: Vec<FailureReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub name: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NameReport {
    pub name: String,
    pub status: StatusCode,
    pub is_apex: bool,
    /// The zone the name belongs to
    pub zone: ZoneReport,
    pub responses: Vec<ResponseReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ZoneReport {
    pub apex: String,
    pub parent: Option<String>,
    pub status: StatusCode,
    pub dnskeys: Vec<DnskeyReport>,
    pub dnskey_rrsigs: Vec<RrsigReport>,
    pub ds: Vec<DsReport>,
    pub ds_rrsigs: Vec<RrsigReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ds_proof: Option<ProofReport>,
    pub delegation: DelegationReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cdnskey: Option<RRsetReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cds: Option<RRsetReport>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DnskeyReport {
    pub key_tag: u16,
    pub algorithm: u8,
    pub flags: u16,
    pub status: StatusCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct RrsigReport {
    pub signer: String,
    pub algorithm: u8,
    pub key_tag: u16,
    pub inception: u32,
    pub expiration: u32,
    pub outcome: ValidationOutcome,
    pub status: StatusCode,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DsReport {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    /// Absent when the child served no DNSKEY RRset to check against
    pub outcome: Option<ValidationOutcome>,
    pub dnskey: Option<u16>,
    pub status: StatusCode,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelegationReport {
    pub status: StatusCode,
    pub servers: Vec<ServerReport>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerReport {
    pub server: String,
    pub lame: bool,
    pub status: StatusCode,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseReport {
    pub qname: String,
    pub qtype: String,
    pub server: String,
    pub transport: String,
    pub rcode: Option<String>,
    pub status: StatusCode,
    pub answer: Vec<RRsetReport>,
    pub authority: Vec<RRsetReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative: Option<ProofReport>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RRsetReport {
    pub owner: String,
    pub rtype: String,
    pub ttl: u32,
    pub records: Vec<String>,
    pub status: StatusCode,
    pub rrsigs: Vec<RrsigReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wildcard_proof: Option<ProofReport>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProofReport {
    /// What is being denied, e.g. "NXDOMAIN foo.example./A"
    pub target: String,
    pub zone: String,
    pub kind: Option<ProofKind>,
    /// Absent when the zone is not secure and no denial records were sent
    pub outcome: Option<ProofOutcome>,
    pub opt_out: bool,
    pub status: StatusCode,
    pub records: Vec<ProofRecordReport>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProofRecordReport {
    pub owner: String,
    pub rtype: String,
    pub outcome: ProofOutcome,
    pub status: StatusCode,
    pub rrsigs: Vec<RrsigReport>,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One `[code] description` line per entity, indented by depth
    pub fn render_text(&self) -> String {
        let mut out = Text::default();
        for name in &self.names {
            out.name(name);
        }
        for failure in &self.failures {
            out.line(
                0,
                format!(
                    "[!] {}: {}",
                    failure.name.as_deref().unwrap_or("<input>"),
                    failure.error
                ),
            );
        }
        out.buf
    }
}

#[derive(Default)]
struct Text {
    buf: String,
}

impl Text {
    fn line(&mut self, depth: usize, text: impl AsRef<str>) {
        let _ = writeln!(self.buf, "{:width$}{}", "", text.as_ref(), width = depth * 2);
    }

    fn entity(&mut self, depth: usize, status: StatusCode, description: impl AsRef<str>, findings: &[Finding]) {
        self.line(depth, format!("[{}] {}", status, description.as_ref()));
        for finding in findings {
            self.line(depth + 1, finding.to_string());
        }
    }

    fn name(&mut self, name: &NameReport) {
        self.entity(0, name.status, &name.name, &[]);
        self.zone(1, &name.zone);
        for response in &name.responses {
            self.response(1, response);
        }
    }

    fn zone(&mut self, depth: usize, zone: &ZoneReport) {
        self.entity(depth, zone.status, format!("zone {}", zone.apex), &zone.findings);
        for key in &zone.dnskeys {
            self.entity(
                depth + 1,
                key.status,
                format!("DNSKEY alg={} id={} flags={}", key.algorithm, key.key_tag, key.flags),
                &[],
            );
        }
        self.rrsigs(depth + 1, &zone.dnskey_rrsigs);
        for ds in &zone.ds {
            self.entity(
                depth + 1,
                ds.status,
                format!("DS alg={} id={} digest={}", ds.algorithm, ds.key_tag, ds.digest_type),
                &ds.findings,
            );
        }
        self.rrsigs(depth + 1, &zone.ds_rrsigs);
        if let Some(proof) = &zone.ds_proof {
            self.proof(depth + 1, proof);
        }

        let delegation = &zone.delegation;
        self.entity(depth + 1, delegation.status, "delegation", &delegation.findings);
        for server in &delegation.servers {
            self.entity(depth + 2, server.status, format!("server {}", server.server), &server.findings);
        }

        for rrset in zone.cdnskey.iter().chain(zone.cds.iter()) {
            self.rrset(depth + 1, rrset);
        }
    }

    fn rrsigs(&mut self, depth: usize, rrsigs: &[RrsigReport]) {
        for rrsig in rrsigs {
            self.entity(
                depth,
                rrsig.status,
                format!("RRSIG {} alg={} id={}", rrsig.signer, rrsig.algorithm, rrsig.key_tag),
                &rrsig.findings,
            );
        }
    }

    fn response(&mut self, depth: usize, response: &ResponseReport) {
        self.entity(
            depth,
            response.status,
            format!(
                "{}/{} @{} ({}) {}",
                response.qname,
                response.qtype,
                response.server,
                response.transport,
                response.rcode.as_deref().unwrap_or("no response")
            ),
            &response.findings,
        );
        for rrset in response.answer.iter().chain(response.authority.iter()) {
            self.rrset(depth + 1, rrset);
        }
        if let Some(proof) = &response.negative {
            self.proof(depth + 1, proof);
        }
    }

    fn rrset(&mut self, depth: usize, rrset: &RRsetReport) {
        self.entity(
            depth,
            rrset.status,
            format!("{} {} {}", rrset.owner, rrset.ttl, rrset.rtype),
            &rrset.findings,
        );
        for record in &rrset.records {
            self.line(depth + 2, record);
        }
        self.rrsigs(depth + 1, &rrset.rrsigs);
        if let Some(proof) = &rrset.wildcard_proof {
            self.proof(depth + 1, proof);
        }
    }

    fn proof(&mut self, depth: usize, proof: &ProofReport) {
        let kind = match proof.kind {
            Some(ProofKind::Nsec) => "NSEC",
            Some(ProofKind::Nsec3) => "NSEC3",
            None => "no",
        };
        self.entity(
            depth,
            proof.status,
            format!(
                "{} proof of {} in {}{}",
                kind,
                proof.target,
                proof.zone,
                if proof.opt_out { " (opt-out)" } else { "" }
            ),
            &proof.findings,
        );
        for record in &proof.records {
            self.entity(depth + 1, record.status, format!("{} {}", record.owner, record.rtype), &[]);
            self.rrsigs(depth + 2, &record.rrsigs);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Authentication, FindingCode, IssueFlag};

    fn status(authentication: Authentication, issues: IssueFlag) -> StatusCode {
        StatusCode::new(authentication, issues)
    }

    fn sample() -> Report {
        let zone = ZoneReport {
            apex: "example.".to_string(),
            parent: Some(".".to_string()),
            status: status(Authentication::Secure, IssueFlag::Warning),
            dnskeys: vec![DnskeyReport {
                key_tag: 12345,
                algorithm: 13,
                flags: 257,
                status: status(Authentication::Secure, IssueFlag::None),
            }],
            dnskey_rrsigs: Vec::new(),
            ds: Vec::new(),
            ds_rrsigs: Vec::new(),
            ds_proof: None,
            delegation: DelegationReport {
                status: status(Authentication::Secure, IssueFlag::Warning),
                servers: Vec::new(),
                findings: vec![Finding::warning(FindingCode::NsMismatch, "differs")],
            },
            cdnskey: None,
            cds: None,
            findings: Vec::new(),
        };
        Report {
            reference_time: 1_700_000_000,
            names: vec![NameReport {
                name: "example.".to_string(),
                status: status(Authentication::Secure, IssueFlag::Warning),
                is_apex: true,
                zone,
                responses: Vec::new(),
            }],
            failures: vec![FailureReport {
                name: Some("bad.example.".to_string()),
                error: "boom".to_string(),
            }],
        }
    }

    #[test]
    fn test_text_layout() {
        let text = sample().render_text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[.?] example.");
        assert_eq!(lines[1], "  [.?] zone example.");
        assert_eq!(lines[2], "    [.] DNSKEY alg=13 id=12345 flags=257");
        assert_eq!(lines[3], "    [.?] delegation");
        assert_eq!(lines[4], "      W: NS_MISMATCH differs");
        assert_eq!(lines[5], "[!] bad.example.: boom");
    }

    #[test]
    fn test_json_status_text() {
        let json = sample().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["names"][0]["status"], ".?");
        assert_eq!(value["names"][0]["zone"]["delegation"]["findings"][0]["code"], "NS_MISMATCH");
        assert!(value["names"][0]["zone"].get("ds_proof").is_none());
    }
}
