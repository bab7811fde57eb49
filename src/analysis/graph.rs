//! Arena of queried names built once from the transaction set.
//!
//! Nodes live in a `Vec` in input-encounter order and are found through a
//! name-keyed index; parent/child relationships are never stored as
//! references, only recomputed from names.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::dns::{Name, QueryResponse, RRset, RecordType, Response, TransactionSet};
use crate::error::MalformedInputError;

/// Types that carry the chain of trust and are kept whatever the type filter says
const STRUCTURAL_TYPES: [RecordType; 4] = [
    RecordType::DNSKEY,
    RecordType::DS,
    RecordType::NS,
    RecordType::SOA,
];

/// Names and types to report on; empty means everything
#[derive(Debug, Clone, Default)]
pub struct GraphFilter {
    pub names: BTreeSet<Name>,
    pub types: BTreeSet<RecordType>,
}

impl GraphFilter {
    fn keeps_type(&self, qtype: &str) -> bool {
        if self.types.is_empty() {
            return true;
        }
        match qtype.parse::<RecordType>() {
            Ok(rtype) => self.types.contains(&rtype) || STRUCTURAL_TYPES.contains(&rtype),
            // Let the conversion error surface on the name
            Err(_) => true,
        }
    }

    pub fn reports_name(&self, name: &Name) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }
}

/// One distinct queried name and everything asked about it
#[derive(Debug, Clone)]
pub struct NameNode {
    pub name: Name,
    /// Responses in transaction order, or the first record that failed to convert
    pub responses: Result<Vec<QueryResponse>, MalformedInputError>,
}

#[derive(Debug, Default)]
pub struct NameGraph {
    nodes: Vec<NameNode>,
    index: HashMap<Name, usize>,
    apexes: BTreeSet<Name>,
    /// Transactions whose query name could not be parsed at all
    unattributed: Vec<MalformedInputError>,
}

impl NameGraph {
    pub fn build(set: &TransactionSet, filter: &GraphFilter) -> Self {
        let mut graph = Self::default();
        graph.apexes.insert(Name::root());

        for transaction in &set.transactions {
            if !filter.keeps_type(&transaction.qtype) {
                continue;
            }
            let name = match transaction.parsed_qname() {
                Ok(name) => name,
                Err(e) => {
                    warn!("Skipping transaction: {}", e);
                    graph.unattributed.push(e);
                    continue;
                }
            };

            let idx = match graph.index.get(&name) {
                Some(&idx) => idx,
                None => {
                    graph.nodes.push(NameNode {
                        name: name.clone(),
                        responses: Ok(Vec::new()),
                    });
                    graph.index.insert(name, graph.nodes.len() - 1);
                    graph.nodes.len() - 1
                }
            };

            let node = &mut graph.nodes[idx];
            if node.responses.is_err() {
                continue;
            }
            match transaction.to_query_response() {
                Ok(qr) => {
                    if let Ok(responses) = &mut node.responses {
                        responses.push(qr);
                    }
                }
                Err(e) => {
                    warn!("Name {} failed to convert: {}", node.name, e);
                    node.responses = Err(e);
                }
            }
        }

        let apexes: Vec<Name> = graph
            .nodes
            .iter()
            .filter_map(|node| node.responses.as_ref().ok())
            .flatten()
            .flat_map(observed_apexes)
            .collect();
        graph.apexes.extend(apexes);

        debug!(
            "Built name graph: {} names, {} zone apexes",
            graph.nodes.len(),
            graph.apexes.len()
        );
        graph
    }

    pub fn nodes(&self) -> &[NameNode] {
        &self.nodes
    }

    pub fn get(&self, name: &Name) -> Option<&NameNode> {
        self.index.get(name).map(|&idx| &self.nodes[idx])
    }

    /// Names to analyse, in input-encounter order
    pub fn targets<'g>(&'g self, filter: &'g GraphFilter) -> impl Iterator<Item = &'g NameNode> + 'g {
        self.nodes.iter().filter(move |node| filter.reports_name(&node.name))
    }

    pub fn unattributed(&self) -> &[MalformedInputError] {
        &self.unattributed
    }

    /// True if the captured data shows a zone cut at `name`
    pub fn is_apex(&self, name: &Name) -> bool {
        self.apexes.contains(name)
    }

    /// Every converted response to a query for `name`
    pub fn all_responses<'g>(&'g self, name: &Name) -> impl Iterator<Item = &'g QueryResponse> + 'g {
        self.get(name)
            .and_then(|node| node.responses.as_ref().ok())
            .into_iter()
            .flatten()
    }

    /// Converted responses to queries for (`name`, `rtype`)
    pub fn responses<'g>(
        &'g self,
        name: &Name,
        rtype: RecordType,
    ) -> impl Iterator<Item = &'g QueryResponse> + 'g {
        self.all_responses(name).filter(move |qr| qr.qtype == rtype)
    }

    /// First answer RRset for (`name`, `rtype`) across servers
    pub fn first_answer(&self, name: &Name, rtype: RecordType) -> Option<&RRset> {
        self.responses(name, rtype)
            .filter_map(|qr| qr.response.as_ref())
            .find_map(|response| response.answer_rrset(name, rtype))
    }

    /// Referrals, from any query, that delegate to `cut`
    pub fn referrals_to<'g>(&'g self, cut: &'g Name) -> impl Iterator<Item = &'g Response> + 'g {
        self.nodes
            .iter()
            .filter_map(|node| node.responses.as_ref().ok())
            .flatten()
            .filter_map(move |qr| {
                let response = qr.response.as_ref()?;
                (response.is_referral(&qr.qname) && response.referral_cut() == Some(cut))
                    .then_some(response)
            })
    }
}

/// Zone cuts a single response reveals
fn observed_apexes(qr: &QueryResponse) -> Vec<Name> {
    let Some(response) = &qr.response else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for set in &response.answer {
        match set.rtype {
            RecordType::SOA | RecordType::DNSKEY | RecordType::DS => found.push(set.name.clone()),
            RecordType::NS if response.authoritative && set.name == qr.qname => {
                found.push(set.name.clone())
            }
            _ => {}
        }
    }
    if let Some(owner) = response.authority_soa_owner() {
        found.push(owner.clone());
    }
    if response.is_referral(&qr.qname) {
        if let Some(cut) = response.referral_cut() {
            found.push(cut.clone());
        }
    }
    found
}
