use serde::{Deserialize, Serialize};
use tracing::trace;

use super::rdata::{RData, Rrsig};
use super::{Name, RecordType};

/// One resource record as captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: Name,
    pub ttl: u32,
    #[serde(flatten)]
    pub rdata: RData,
}

/// An RRSIG together with the TTL it was served with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    pub ttl: u32,
    pub rrsig: Rrsig,
}

/// All records sharing owner and type within one response section,
/// plus the RRSIGs covering them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRset {
    pub name: Name,
    pub rtype: RecordType,
    pub ttl: u32,
    pub rdatas: Vec<RData>,
    pub rrsigs: Vec<SignatureRecord>,
}

impl RRset {
    pub fn new(name: Name, rtype: RecordType, ttl: u32) -> Self {
        Self {
            name,
            rtype,
            ttl,
            rdatas: Vec::new(),
            rrsigs: Vec::new(),
        }
    }

    /// RRSIG label count smaller than the owner's means the RRset was
    /// synthesised from a wildcard
    pub fn wildcard_signer_labels(&self) -> Option<u8> {
        let owner_labels = self.name.rrsig_label_count();
        self.rrsigs
            .iter()
            .map(|s| s.rrsig.labels)
            .filter(|labels| (*labels as usize) < owner_labels)
            .min()
    }

    pub fn dnskeys(&self) -> impl Iterator<Item = &super::Dnskey> {
        self.rdatas.iter().filter_map(RData::as_dnskey)
    }

    pub fn ds_records(&self) -> impl Iterator<Item = &super::Ds> {
        self.rdatas.iter().filter_map(RData::as_ds)
    }
}

/// Group records into RRsets in first-seen order and attach RRSIGs to the
/// RRset they cover. RRSIGs without a covered RRset are dropped.
pub fn group_records(records: Vec<Record>) -> Vec<RRset> {
    let mut rrsets: Vec<RRset> = Vec::new();
    let mut signatures = Vec::new();

    for record in records {
        let rtype = record.rdata.rtype();
        if let RData::Rrsig(rrsig) = record.rdata {
            signatures.push((record.name, record.ttl, rrsig));
            continue;
        }

        match rrsets
            .iter_mut()
            .find(|set| set.rtype == rtype && set.name == record.name)
        {
            Some(set) => {
                set.ttl = set.ttl.min(record.ttl);
                if !set.rdatas.contains(&record.rdata) {
                    set.rdatas.push(record.rdata);
                }
            }
            None => {
                let mut set = RRset::new(record.name, rtype, record.ttl);
                set.rdatas.push(record.rdata);
                rrsets.push(set);
            }
        }
    }

    for (owner, ttl, rrsig) in signatures {
        match rrsets
            .iter_mut()
            .find(|set| set.rtype == rrsig.type_covered && set.name == owner)
        {
            Some(set) => set.rrsigs.push(SignatureRecord { ttl, rrsig }),
            None => trace!(
                "Dropping RRSIG {} {} without covered RRset",
                owner, rrsig.type_covered
            ),
        }
    }

    for set in &mut rrsets {
        set.rrsigs.sort_by(|a, b| {
            a.rrsig
                .signer
                .cmp(&b.rrsig.signer)
                .then(a.rrsig.key_tag.cmp(&b.rrsig.key_tag))
                .then(a.rrsig.algorithm.cmp(&b.rrsig.algorithm))
        });
    }

    rrsets
}
