//! Server-level checks for a delegation: reachability, authority, address
//! policy and NS agreement between parent and child.

use serde::Serialize;
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::debug;

use super::finding::{Finding, FindingCode};
use crate::dns::{CookieState, Name, QueryResponse, Rcode, RecordType};
use crate::dnssec::PolicyFlags;

/// Findings for one server of the zone
#[derive(Debug, Clone, Serialize)]
pub struct ServerCheck {
    pub server: IpAddr,
    /// The server gave no usable authoritative answer for the apex
    pub lame: bool,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DelegationCheck {
    pub servers: Vec<ServerCheck>,
    pub findings: Vec<Finding>,
    /// Every server queried for the apex is lame or unreachable
    pub lame: bool,
}

impl DelegationCheck {
    /// Examine the responses to queries for `apex` itself
    pub fn run<'r>(
        apex: &Name,
        responses: impl IntoIterator<Item = &'r QueryResponse>,
        flags: &PolicyFlags,
    ) -> Self {
        let mut servers: Vec<ServerCheck> = Vec::new();
        let mut parent_ns: BTreeSet<Name> = BTreeSet::new();
        let mut child_ns: BTreeSet<Name> = BTreeSet::new();

        for qr in responses {
            // DS is served by the parent, not by the zone's own servers
            if qr.qtype == RecordType::DS || &qr.qname != apex {
                continue;
            }

            let idx = match servers.iter().position(|s| s.server == qr.server) {
                Some(idx) => idx,
                None => {
                    let mut check = ServerCheck {
                        server: qr.server,
                        lame: false,
                        findings: Vec::new(),
                    };
                    if !flags.allow_private_addresses && is_private(qr.server) {
                        check.lame = true;
                        check.findings.push(Finding::error(
                            FindingCode::PrivateAddress,
                            format!("server {} has a private or local address", qr.server),
                        ));
                    }
                    servers.push(check);
                    servers.len() - 1
                }
            };
            let check = &mut servers[idx];

            let Some(response) = &qr.response else {
                check.lame = true;
                push_once(
                    &mut check.findings,
                    Finding::error(
                        FindingCode::ServerUnresponsive,
                        format!(
                            "server {} did not answer {}/{}: {}",
                            qr.server,
                            qr.qname,
                            qr.qtype,
                            qr.error.as_deref().unwrap_or("no response")
                        ),
                    ),
                );
                continue;
            };

            for set in &response.authority {
                if set.rtype == RecordType::NS && &set.name == apex && !response.authoritative {
                    parent_ns.extend(set.rdatas.iter().filter_map(|r| r.target().map(Name::to_lowercase)));
                }
            }
            if let Some(ns) = response.answer_rrset(apex, RecordType::NS) {
                if response.authoritative {
                    child_ns.extend(ns.rdatas.iter().filter_map(|r| r.target().map(Name::to_lowercase)));
                }
            }

            let refused = matches!(response.rcode, Rcode::Refused | Rcode::NotAuth | Rcode::ServFail);
            let not_authoritative = !response.authoritative
                && !response.is_referral(apex)
                && response.rcode != Rcode::BadCookie;
            if refused || not_authoritative {
                check.lame = true;
                push_once(
                    &mut check.findings,
                    Finding::error(
                        FindingCode::LameDelegation,
                        format!(
                            "server {} is not authoritative for {} ({})",
                            qr.server, apex, response.rcode
                        ),
                    ),
                );
            }
        }

        let mut findings = Vec::new();
        if !parent_ns.is_empty() && !child_ns.is_empty() && parent_ns != child_ns {
            let list = |set: &BTreeSet<Name>| {
                set.iter().map(Name::to_string).collect::<Vec<_>>().join(", ")
            };
            findings.push(Finding::warning(
                FindingCode::NsMismatch,
                format!(
                    "parent NS set ({}) differs from the child NS set ({})",
                    list(&parent_ns),
                    list(&child_ns)
                ),
            ));
        }

        let lame = !servers.is_empty() && servers.iter().all(|s| s.lame);
        debug!(
            "Delegation {}: {} servers, lame={}",
            apex,
            servers.len(),
            lame
        );

        Self {
            servers,
            findings,
            lame,
        }
    }

    /// Zone-level and per-server findings, in display order
    pub fn all_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .chain(self.servers.iter().flat_map(|s| s.findings.iter()))
    }
}

fn push_once(findings: &mut Vec<Finding>, finding: Finding) {
    if !findings.iter().any(|f| f.code == finding.code) {
        findings.push(finding);
    }
}

/// RFC 1918, loopback, link-local and unique-local space
pub fn is_private(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private(IpAddr::V4(v4)))
        }
    }
}

/// RFC 7873 section 5.2.3: an invalid or missing server cookie must draw BADCOOKIE
pub fn check_cookie(qr: &QueryResponse, flags: &PolicyFlags) -> Option<Finding> {
    if !flags.enforce_cookies {
        return None;
    }
    let sent = qr.sent_server_cookie?;
    let response = qr.response.as_ref()?;
    if matches!(sent, CookieState::Absent | CookieState::Invalid) && response.rcode != Rcode::BadCookie {
        return Some(Finding::error(
            FindingCode::CookieNoBadcookie,
            format!(
                "server {} answered {} instead of BADCOOKIE to a query with {} server cookie",
                qr.server,
                response.rcode,
                match sent {
                    CookieState::Absent => "no",
                    _ => "an invalid",
                }
            ),
        ));
    }
    None
}
