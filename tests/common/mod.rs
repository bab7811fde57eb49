//! Shared fixtures: freshly generated keys, signed zones and captured
//! transaction sets built from them.

#![allow(dead_code)]

use dnssec_health::dns::transaction::RawResponse;
use dnssec_health::dns::{CookieState, Dnskey, Ds, Name, Nsec, Nsec3, RData, Record, RecordType, Rrsig, Soa, Transaction, TransactionSet, Transport};
use dnssec_health::dnssec::{DigestType, Policy, PolicyFlags, TrustAnchor, TrustAnchorSet, compute_ds_digest, nsec3_hash, rrset_signed_data};
use dnssec_health::dnssec::denial::hashed_owner;
use dnssec_health::report::{NameReport, Report, ResponseReport};
use dnssec_health::{RunOptions, analyze};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_FIXED_SIGNING, EcdsaKeyPair, Ed25519KeyPair, KeyPair};

pub const NOW: u32 = 1_700_000_000;
pub const INCEPTION: u32 = NOW - 86_400;
pub const EXPIRATION: u32 = NOW + 30 * 86_400;

pub const ROOT_SERVER: &str = "198.41.0.4";
pub const CHILD_SERVER: &str = "192.0.2.53";

pub fn name(s: &str) -> Name {
    Name::from_ascii(s).unwrap()
}

pub fn rr(owner: &str, ttl: u32, rdata: RData) -> Record {
    Record {
        name: name(owner),
        ttl,
        rdata,
    }
}

pub fn a(owner: &str, address: &str) -> Record {
    rr(
        owner,
        300,
        RData::A {
            address: address.parse().unwrap(),
        },
    )
}

pub fn nsec(owner: &str, next: &str, types: &[RecordType]) -> Record {
    rr(
        owner,
        300,
        RData::Nsec(Nsec {
            next: name(next),
            types: types.to_vec(),
        }),
    )
}

enum Pair {
    Ed25519(Ed25519KeyPair),
    EcdsaP256(EcdsaKeyPair),
}

/// A signing key and its DNSKEY
pub struct Key {
    pub dnskey: Dnskey,
    pair: Pair,
}

impl Key {
    pub fn ed25519(flags: u16) -> Self {
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&SystemRandom::new()).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let dnskey = Dnskey {
            flags,
            protocol: 3,
            algorithm: 15,
            public_key: pair.public_key().as_ref().to_vec(),
        };
        Self {
            dnskey,
            pair: Pair::Ed25519(pair),
        }
    }

    pub fn ecdsa_p256(flags: u16) -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng).unwrap();
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, pkcs8.as_ref(), &rng).unwrap();
        // DNSKEY carries the point without the uncompressed-form prefix
        let dnskey = Dnskey {
            flags,
            protocol: 3,
            algorithm: 13,
            public_key: pair.public_key().as_ref()[1..].to_vec(),
        };
        Self {
            dnskey,
            pair: Pair::EcdsaP256(pair),
        }
    }

    pub fn tag(&self) -> u16 {
        self.dnskey.key_tag()
    }

    fn sign_bytes(&self, message: &[u8]) -> Vec<u8> {
        match &self.pair {
            Pair::Ed25519(pair) => pair.sign(message).as_ref().to_vec(),
            Pair::EcdsaP256(pair) => pair.sign(&SystemRandom::new(), message).unwrap().as_ref().to_vec(),
        }
    }

    /// RRSIG record over `records`, which must share owner and type
    pub fn sign(&self, records: &[Record], signer: &Name) -> Record {
        let labels = records[0].name.rrsig_label_count() as u8;
        self.sign_with(records, signer, labels, INCEPTION, EXPIRATION)
    }

    pub fn sign_with(&self, records: &[Record], signer: &Name, labels: u8, inception: u32, expiration: u32) -> Record {
        let owner = records[0].name.clone();
        let rtype = records[0].rdata.rtype();
        let ttl = records[0].ttl;
        let rdatas: Vec<RData> = records.iter().map(|r| r.rdata.clone()).collect();

        let mut rrsig = Rrsig {
            type_covered: rtype,
            algorithm: self.dnskey.algorithm,
            labels,
            original_ttl: ttl,
            expiration,
            inception,
            key_tag: self.tag(),
            signer: signer.clone(),
            signature: Vec::new(),
        };
        let message = rrset_signed_data(&rrsig, &owner, rtype, &rdatas).unwrap();
        rrsig.signature = self.sign_bytes(&message);
        Record {
            name: owner,
            ttl,
            rdata: RData::Rrsig(rrsig),
        }
    }
}

/// A signed zone with one KSK and one ZSK, served from one address
pub struct Zone {
    pub apex: Name,
    pub server: String,
    pub ksk: Key,
    pub zsk: Key,
}

impl Zone {
    pub fn new(apex: &str, server: &str) -> Self {
        Self {
            apex: name(apex),
            server: server.to_string(),
            ksk: Key::ed25519(257),
            zsk: Key::ed25519(256),
        }
    }

    pub fn dnskeys(&self) -> Vec<Record> {
        [&self.ksk, &self.zsk]
            .into_iter()
            .map(|key| Record {
                name: self.apex.clone(),
                ttl: 3600,
                rdata: RData::Dnskey(key.dnskey.clone()),
            })
            .collect()
    }

    /// DNSKEY RRset signed by the KSK
    pub fn dnskey_answer(&self) -> Vec<Record> {
        let mut records = self.dnskeys();
        records.push(self.ksk.sign(&records, &self.apex));
        records
    }

    /// SHA-256 DS for the KSK
    pub fn ds(&self) -> Ds {
        ds_for(&self.apex, &self.ksk.dnskey)
    }

    /// `records` plus a ZSK signature over them
    pub fn signed(&self, mut records: Vec<Record>) -> Vec<Record> {
        let rrsig = self.zsk.sign(&records, &self.apex);
        records.push(rrsig);
        records
    }

    pub fn soa(&self) -> Record {
        Record {
            name: self.apex.clone(),
            ttl: 300,
            rdata: RData::Soa(Soa {
                mname: self.apex.prepend("ns").unwrap(),
                rname: self.apex.prepend("hostmaster").unwrap(),
                serial: 2024010101,
                refresh: 7200,
                retry: 3600,
                expire: 1_209_600,
                minimum: 300,
            }),
        }
    }

    /// DS RRset for `child`, signed by this zone
    pub fn signed_ds(&self, child: &Zone) -> Vec<Record> {
        self.signed(vec![Record {
            name: child.apex.clone(),
            ttl: 3600,
            rdata: RData::Ds(child.ds()),
        }])
    }
}

pub fn ds_for(owner: &Name, key: &Dnskey) -> Ds {
    Ds {
        key_tag: key.key_tag(),
        algorithm: key.algorithm,
        digest_type: 2,
        digest: compute_ds_digest(owner, key, DigestType::Sha256).unwrap(),
    }
}

/// Owner and RDATA of an NSEC3 record hashed with SHA-1
pub fn nsec3(
    zone: &Name,
    owner: &Name,
    next: &Name,
    iterations: u16,
    salt: &[u8],
    types: &[RecordType],
) -> Record {
    let owner_hash = nsec3_hash(owner, 1, salt, iterations).unwrap();
    let next_hash = nsec3_hash(next, 1, salt, iterations).unwrap();
    Record {
        name: hashed_owner(&owner_hash, zone).unwrap(),
        ttl: 300,
        rdata: RData::Nsec3(Nsec3 {
            hash_algorithm: 1,
            flags: 0,
            iterations,
            salt: salt.to_vec(),
            next_hashed: next_hash,
            types: types.to_vec(),
        }),
    }
}

/// Transactions built one query at a time
#[derive(Default)]
pub struct Capture {
    pub transactions: Vec<Transaction>,
}

fn values(records: &[Record]) -> Vec<serde_json::Value> {
    records.iter().map(|r| serde_json::to_value(r).unwrap()).collect()
}

impl Capture {
    #[allow(clippy::too_many_arguments)]
    pub fn respond(
        &mut self,
        qname: &str,
        qtype: &str,
        server: &str,
        rcode: &str,
        aa: bool,
        answer: Vec<Record>,
        authority: Vec<Record>,
    ) -> &mut Transaction {
        self.transactions.push(Transaction {
            qname: qname.to_string(),
            qtype: qtype.to_string(),
            server: server.to_string(),
            transport: Transport::Udp,
            sent_server_cookie: None,
            error: None,
            response: Some(RawResponse {
                rcode: rcode.to_string(),
                aa,
                answer: values(&answer),
                authority: values(&authority),
                additional: Vec::new(),
            }),
        });
        self.transactions.last_mut().unwrap()
    }

    /// Authoritative NOERROR answer from the zone's server
    pub fn answer(&mut self, zone: &Zone, qname: &str, qtype: &str, answer: Vec<Record>) -> &mut Transaction {
        let server = zone.server.clone();
        self.respond(qname, qtype, &server, "NOERROR", true, answer, Vec::new())
    }

    pub fn no_response(&mut self, qname: &str, qtype: &str, server: &str, error: &str) {
        self.transactions.push(Transaction {
            qname: qname.to_string(),
            qtype: qtype.to_string(),
            server: server.to_string(),
            transport: Transport::Udp,
            sent_server_cookie: None,
            error: Some(error.to_string()),
            response: None,
        });
    }

    pub fn build(&self) -> TransactionSet {
        TransactionSet {
            reference_time: Some(NOW),
            transactions: self.transactions.clone(),
        }
    }
}

/// A signed root anchoring a signed `example.` with one A record
pub struct Hierarchy {
    pub root: Zone,
    pub child: Zone,
}

impl Hierarchy {
    pub fn new() -> Self {
        Self {
            root: Zone::new(".", ROOT_SERVER),
            child: Zone::new("example.", CHILD_SERVER),
        }
    }

    /// Root and child DNSKEYs, the child's DS and SOA; no data queries
    pub fn skeleton(&self, ds: Vec<Record>) -> Capture {
        let mut capture = Capture::default();
        capture.answer(&self.root, ".", "DNSKEY", self.root.dnskey_answer());
        capture.answer(&self.root, "example.", "DS", ds);
        capture.answer(&self.child, "example.", "DNSKEY", self.child.dnskey_answer());
        capture.answer(&self.child, "example.", "SOA", self.child.signed(vec![self.child.soa()]));
        capture
    }

    /// The skeleton plus a signed www.example. A answer
    pub fn capture(&self) -> Capture {
        let mut capture = self.skeleton(self.root.signed_ds(&self.child));
        capture.answer(
            &self.child,
            "www.example.",
            "A",
            self.child.signed(vec![a("www.example.", "192.0.2.80")]),
        );
        capture
    }

    pub fn policy(&self) -> Policy {
        self.policy_with(PolicyFlags::default())
    }

    pub fn policy_with(&self, flags: PolicyFlags) -> Policy {
        let mut anchors = TrustAnchorSet::empty();
        anchors.insert(TrustAnchor::from_dnskey(Name::root(), self.root.ksk.dnskey.clone()));
        Policy::new(anchors).with_flags(flags)
    }
}

pub fn run(set: &TransactionSet, policy: &Policy) -> Report {
    analyze(set, policy, &RunOptions::default())
}

pub fn find<'r>(report: &'r Report, qname: &str) -> &'r NameReport {
    report
        .names
        .iter()
        .find(|n| n.name == qname)
        .unwrap_or_else(|| panic!("{} missing from report", qname))
}

pub fn response<'r>(report: &'r NameReport, qtype: &str) -> &'r ResponseReport {
    report
        .responses
        .iter()
        .find(|r| r.qtype == qtype)
        .unwrap_or_else(|| panic!("no {} response for {}", qtype, report.name))
}

/// Every finding code anywhere in the JSON rendering of a name
pub fn codes(report: &NameReport) -> Vec<String> {
    fn walk(value: &serde_json::Value, out: &mut Vec<String>) {
        match value {
            serde_json::Value::Object(map) => {
                if let (Some(serde_json::Value::String(code)), Some(_)) = (map.get("code"), map.get("severity")) {
                    out.push(code.clone());
                }
                map.values().for_each(|v| walk(v, out));
            }
            serde_json::Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(&serde_json::to_value(report).unwrap(), &mut out);
    out
}

pub fn with_cookie(transaction: &mut Transaction, state: CookieState) {
    transaction.sent_server_cookie = Some(state);
}
