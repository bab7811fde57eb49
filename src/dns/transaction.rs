//! The captured transaction set consumed by the analyser.
//!
//! Names, types and records stay loosely typed at the framing level so that
//! one badly captured response only fails the name it belongs to.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;

use super::record::{RRset, Record, group_records};
use super::{Name, Rcode, RecordType};
use crate::error::MalformedInputError;

/// Transport a query was sent over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Udp,
    Tcp,
}

/// Server cookie the collector put in the query (RFC 7873)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CookieState {
    /// Client cookie only
    Absent,
    /// A server cookie the server could not have issued
    Invalid,
    /// A server cookie previously returned by the server
    Valid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionSet {
    #[serde(default)]
    pub reference_time: Option<u32>,
    pub transactions: Vec<Transaction>,
}

impl TransactionSet {
    pub fn from_json(contents: &str) -> Result<Self, MalformedInputError> {
        serde_json::from_str(contents).map_err(|e| MalformedInputError::Framing(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MalformedInputError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MalformedInputError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub qname: String,
    pub qtype: String,
    pub server: String,
    #[serde(default)]
    pub transport: Transport,
    #[serde(default)]
    pub sent_server_cookie: Option<CookieState>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub response: Option<RawResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawResponse {
    pub rcode: String,
    #[serde(default)]
    pub aa: bool,
    #[serde(default)]
    pub answer: Vec<serde_json::Value>,
    #[serde(default)]
    pub authority: Vec<serde_json::Value>,
    #[serde(default)]
    pub additional: Vec<serde_json::Value>,
}

/// One query and what came back, fully typed
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub qname: Name,
    pub qtype: RecordType,
    pub server: IpAddr,
    pub transport: Transport,
    pub sent_server_cookie: Option<CookieState>,
    pub error: Option<String>,
    pub response: Option<Response>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub rcode: Rcode,
    pub authoritative: bool,
    pub answer: Vec<RRset>,
    pub authority: Vec<RRset>,
    pub additional: Vec<RRset>,
}

impl Transaction {
    /// Parse the query name; grouping happens on this before any record is typed
    pub fn parsed_qname(&self) -> Result<Name, MalformedInputError> {
        Name::from_ascii(&self.qname).map_err(|e| MalformedInputError::QueryName {
            qname: self.qname.clone(),
            reason: e.to_string(),
        })
    }

    pub fn to_query_response(&self) -> Result<QueryResponse, MalformedInputError> {
        let qname = self.parsed_qname()?;
        let malformed = |reason: String| MalformedInputError::Record {
            qname: self.qname.clone(),
            server: self.server.clone(),
            reason,
        };

        let qtype = self
            .qtype
            .parse::<RecordType>()
            .map_err(|e| malformed(e.to_string()))?;
        let server = self
            .server
            .parse::<IpAddr>()
            .map_err(|e| malformed(format!("invalid server address: {}", e)))?;

        let response = match &self.response {
            Some(raw) => Some(raw.to_response().map_err(malformed)?),
            None => None,
        };

        Ok(QueryResponse {
            qname,
            qtype,
            server,
            transport: self.transport,
            sent_server_cookie: self.sent_server_cookie,
            error: self.error.clone(),
            response,
        })
    }
}

impl RawResponse {
    fn to_response(&self) -> Result<Response, String> {
        let rcode = self.rcode.parse::<Rcode>().map_err(|e| e.to_string())?;
        Ok(Response {
            rcode,
            authoritative: self.aa,
            answer: group_records(parse_section(&self.answer)?),
            authority: group_records(parse_section(&self.authority)?),
            additional: group_records(parse_section(&self.additional)?),
        })
    }
}

fn parse_section(values: &[serde_json::Value]) -> Result<Vec<Record>, String> {
    values
        .iter()
        .map(|v| serde_json::from_value::<Record>(v.clone()).map_err(|e| e.to_string()))
        .collect()
}

impl Response {
    /// The answer RRset for (name, type), if present
    pub fn answer_rrset(&self, name: &Name, rtype: RecordType) -> Option<&RRset> {
        self.answer
            .iter()
            .find(|set| set.rtype == rtype && &set.name == name)
    }

    pub fn authority_rrset(&self, rtype: RecordType) -> Option<&RRset> {
        self.authority.iter().find(|set| set.rtype == rtype)
    }

    /// SOA owner in the authority section names the zone of a negative answer
    pub fn authority_soa_owner(&self) -> Option<&Name> {
        self.authority_rrset(RecordType::SOA).map(|set| &set.name)
    }

    /// A downward referral: no answer, NS in authority, no SOA, not authoritative
    pub fn is_referral(&self, qname: &Name) -> bool {
        self.rcode == Rcode::NoError
            && !self.authoritative
            && self.answer.is_empty()
            && self.authority_soa_owner().is_none()
            && self
                .authority
                .iter()
                .any(|set| set.rtype == RecordType::NS && qname.is_subdomain_of(&set.name))
    }

    /// Owner of the NS RRset of a referral
    pub fn referral_cut(&self) -> Option<&Name> {
        self.authority
            .iter()
            .find(|set| set.rtype == RecordType::NS)
            .map(|set| &set.name)
    }

    pub fn is_nxdomain(&self) -> bool {
        self.rcode == Rcode::NXDomain
    }

    /// NOERROR without data for the query, counting CNAME/DNAME chains as data
    pub fn is_nodata(&self, qname: &Name, qtype: RecordType) -> bool {
        self.rcode == Rcode::NoError
            && !self.is_referral(qname)
            && self.answer_rrset(qname, qtype).is_none()
            && !self.answer.iter().any(|set| {
                set.rtype == qtype
                    || set.rtype == RecordType::CNAME
                    || set.rtype == RecordType::DNAME
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "reference_time": 1708000000,
        "transactions": [
            {"qname": "example.com.", "qtype": "A", "server": "192.0.2.53",
             "response": {"rcode": "NOERROR", "aa": true,
                "answer": [{"name": "example.com.", "ttl": 300, "type": "A", "address": "192.0.2.1"}]}},
            {"qname": "nope.example.com.", "qtype": "A", "server": "192.0.2.53",
             "response": {"rcode": "NXDOMAIN", "aa": true,
                "authority": [{"name": "example.com.", "ttl": 300, "type": "SOA",
                    "mname": "ns1.example.com.", "rname": "hostmaster.example.com.",
                    "serial": 1, "refresh": 2, "retry": 3, "expire": 4, "minimum": 5}]}},
            {"qname": "www.example.com.", "qtype": "A", "server": "192.0.2.1",
             "response": {"rcode": "NOERROR", "aa": false,
                "authority": [{"name": "www.example.com.", "ttl": 300, "type": "NS", "target": "ns.www.example.com."}]}},
            {"qname": "timeout.example.com.", "qtype": "A", "server": "192.0.2.53", "error": "timeout"}
        ]
    }"#;

    #[test]
    fn test_parse_transaction_set() {
        let set = TransactionSet::from_json(SAMPLE).unwrap();
        assert_eq!(set.reference_time, Some(1708000000));
        assert_eq!(set.transactions.len(), 4);

        let answer = set.transactions[0].to_query_response().unwrap();
        let response = answer.response.unwrap();
        assert_eq!(response.rcode, Rcode::NoError);
        assert!(!response.is_nodata(&answer.qname, RecordType::A));

        let nx = set.transactions[1].to_query_response().unwrap();
        let response = nx.response.unwrap();
        assert!(response.is_nxdomain());
        assert_eq!(response.authority_soa_owner().unwrap().to_string(), "example.com.");

        let referral = set.transactions[2].to_query_response().unwrap();
        let response = referral.response.unwrap();
        assert!(response.is_referral(&referral.qname));
        assert!(!response.is_nodata(&referral.qname, RecordType::A));

        let timeout = set.transactions[3].to_query_response().unwrap();
        assert!(timeout.response.is_none());
        assert_eq!(timeout.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_malformed_record_is_per_transaction() {
        let json = r#"{"transactions": [
            {"qname": "example.com.", "qtype": "A", "server": "192.0.2.53",
             "response": {"rcode": "NOERROR", "answer": [{"name": "example.com.", "ttl": 1, "type": "A", "address": "not-an-ip"}]}}
        ]}"#;
        let set = TransactionSet::from_json(json).unwrap();
        let err = set.transactions[0].to_query_response().unwrap_err();
        assert!(matches!(err, MalformedInputError::Record { .. }));
    }

    #[test]
    fn test_framing_error() {
        assert!(matches!(
            TransactionSet::from_json("{\"transactions\": 5}"),
            Err(MalformedInputError::Framing(_))
        ));
    }
}
