use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use super::constants::{DNSKEY_FLAG_REVOKE, DNSKEY_FLAG_SEP, DNSKEY_FLAG_ZONE, NSEC3_FLAG_OPT_OUT};
use super::{Name, RecordType};
use crate::dnssec::calculate_key_tag;

/// DNSKEY / CDNSKEY RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dnskey {
    pub flags: u16,
    #[serde(default = "default_protocol")]
    pub protocol: u8,
    pub algorithm: u8,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
}

fn default_protocol() -> u8 {
    3
}

impl Dnskey {
    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    /// Key tag the key had before its REVOKE bit was set
    pub fn key_tag_without_revoke(&self) -> u16 {
        calculate_key_tag(
            self.flags & !DNSKEY_FLAG_REVOKE,
            self.protocol,
            self.algorithm,
            &self.public_key,
        )
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & DNSKEY_FLAG_ZONE != 0
    }

    pub fn is_sep(&self) -> bool {
        self.flags & DNSKEY_FLAG_SEP != 0
    }

    pub fn is_revoked(&self) -> bool {
        self.flags & DNSKEY_FLAG_REVOKE != 0
    }

    /// RDATA in wire form (flags, protocol, algorithm, key)
    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.public_key.len());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.push(self.protocol);
        out.push(self.algorithm);
        out.extend_from_slice(&self.public_key);
        out
    }
}

/// DS / CDS RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    #[serde(with = "hex_bytes")]
    pub digest: Vec<u8>,
}

/// RRSIG RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rrsig {
    pub type_covered: RecordType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer: Name,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl Rrsig {
    /// RDATA without the signature field, signer in canonical form
    pub fn write_unsigned_rdata(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.type_covered.to_u16().to_be_bytes());
        out.push(self.algorithm);
        out.push(self.labels);
        out.extend_from_slice(&self.original_ttl.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        out.extend_from_slice(&self.inception.to_be_bytes());
        out.extend_from_slice(&self.key_tag.to_be_bytes());
        self.signer.write_canonical(out);
    }
}

/// NSEC RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nsec {
    pub next: Name,
    #[serde(default)]
    pub types: Vec<RecordType>,
}

impl Nsec {
    pub fn has_type(&self, rtype: RecordType) -> bool {
        self.types.contains(&rtype)
    }
}

/// NSEC3 RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nsec3 {
    pub hash_algorithm: u8,
    #[serde(default)]
    pub flags: u8,
    pub iterations: u16,
    #[serde(with = "hex_bytes", default)]
    pub salt: Vec<u8>,
    #[serde(with = "base32hex_bytes")]
    pub next_hashed: Vec<u8>,
    #[serde(default)]
    pub types: Vec<RecordType>,
}

impl Nsec3 {
    pub fn has_type(&self, rtype: RecordType) -> bool {
        self.types.contains(&rtype)
    }

    pub fn opt_out(&self) -> bool {
        self.flags & NSEC3_FLAG_OPT_OUT != 0
    }
}

/// NSEC3PARAM RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nsec3Param {
    pub hash_algorithm: u8,
    #[serde(default)]
    pub flags: u8,
    pub iterations: u16,
    #[serde(with = "hex_bytes", default)]
    pub salt: Vec<u8>,
}

/// SOA RDATA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Soa {
    pub mname: Name,
    pub rname: Name,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    pub minimum: u32,
}

/// Typed RDATA, one variant per record kind, tagged by `type` in the input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RData {
    A { address: Ipv4Addr },
    Aaaa { address: Ipv6Addr },
    Ns { target: Name },
    Cname { target: Name },
    Dname { target: Name },
    Ptr { target: Name },
    Mx { preference: u16, exchange: Name },
    Txt { strings: Vec<String> },
    Soa(Soa),
    Dnskey(Dnskey),
    Cdnskey(Dnskey),
    Ds(Ds),
    Cds(Ds),
    Rrsig(Rrsig),
    Nsec(Nsec),
    Nsec3(Nsec3),
    Nsec3Param(Nsec3Param),
    Unknown {
        rtype: u16,
        #[serde(with = "hex_bytes")]
        data: Vec<u8>,
    },
}

impl RData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RData::A { .. } => RecordType::A,
            RData::Aaaa { .. } => RecordType::AAAA,
            RData::Ns { .. } => RecordType::NS,
            RData::Cname { .. } => RecordType::CNAME,
            RData::Dname { .. } => RecordType::DNAME,
            RData::Ptr { .. } => RecordType::PTR,
            RData::Mx { .. } => RecordType::MX,
            RData::Txt { .. } => RecordType::TXT,
            RData::Soa(_) => RecordType::SOA,
            RData::Dnskey(_) => RecordType::DNSKEY,
            RData::Cdnskey(_) => RecordType::CDNSKEY,
            RData::Ds(_) => RecordType::DS,
            RData::Cds(_) => RecordType::CDS,
            RData::Rrsig(_) => RecordType::RRSIG,
            RData::Nsec(_) => RecordType::NSEC,
            RData::Nsec3(_) => RecordType::NSEC3,
            RData::Nsec3Param(_) => RecordType::NSEC3PARAM,
            RData::Unknown { rtype, .. } => RecordType::from(*rtype),
        }
    }

    /// Canonical RDATA (RFC 4034 section 6.2, as amended by RFC 6840 section 5.1):
    /// embedded names are lowercased for the RFC 3597 well-known types only
    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            RData::A { address } => out.extend_from_slice(&address.octets()),
            RData::Aaaa { address } => out.extend_from_slice(&address.octets()),
            RData::Ns { target }
            | RData::Cname { target }
            | RData::Dname { target }
            | RData::Ptr { target } => target.write_canonical(&mut out),
            RData::Mx {
                preference,
                exchange,
            } => {
                out.extend_from_slice(&preference.to_be_bytes());
                exchange.write_canonical(&mut out);
            }
            RData::Txt { strings } => {
                for s in strings {
                    for chunk in s.as_bytes().chunks(255) {
                        out.push(chunk.len() as u8);
                        out.extend_from_slice(chunk);
                    }
                    if s.is_empty() {
                        out.push(0);
                    }
                }
            }
            RData::Soa(soa) => {
                soa.mname.write_canonical(&mut out);
                soa.rname.write_canonical(&mut out);
                for field in [soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum] {
                    out.extend_from_slice(&field.to_be_bytes());
                }
            }
            RData::Dnskey(key) | RData::Cdnskey(key) => out.extend_from_slice(&key.to_wire()),
            RData::Ds(ds) | RData::Cds(ds) => {
                out.extend_from_slice(&ds.key_tag.to_be_bytes());
                out.push(ds.algorithm);
                out.push(ds.digest_type);
                out.extend_from_slice(&ds.digest);
            }
            RData::Rrsig(sig) => {
                sig.write_unsigned_rdata(&mut out);
                out.extend_from_slice(&sig.signature);
            }
            RData::Nsec(nsec) => {
                nsec.next.write_wire(&mut out);
                write_type_bitmap(&nsec.types, &mut out);
            }
            RData::Nsec3(nsec3) => {
                out.push(nsec3.hash_algorithm);
                out.push(nsec3.flags);
                out.extend_from_slice(&nsec3.iterations.to_be_bytes());
                out.push(nsec3.salt.len() as u8);
                out.extend_from_slice(&nsec3.salt);
                out.push(nsec3.next_hashed.len() as u8);
                out.extend_from_slice(&nsec3.next_hashed);
                write_type_bitmap(&nsec3.types, &mut out);
            }
            RData::Nsec3Param(param) => {
                out.push(param.hash_algorithm);
                out.push(param.flags);
                out.extend_from_slice(&param.iterations.to_be_bytes());
                out.push(param.salt.len() as u8);
                out.extend_from_slice(&param.salt);
            }
            RData::Unknown { data, .. } => out.extend_from_slice(data),
        }
        out
    }

    pub fn as_dnskey(&self) -> Option<&Dnskey> {
        match self {
            RData::Dnskey(key) | RData::Cdnskey(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_ds(&self) -> Option<&Ds> {
        match self {
            RData::Ds(ds) | RData::Cds(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn as_rrsig(&self) -> Option<&Rrsig> {
        match self {
            RData::Rrsig(sig) => Some(sig),
            _ => None,
        }
    }

    /// Target of NS, CNAME, DNAME and PTR records
    pub fn target(&self) -> Option<&Name> {
        match self {
            RData::Ns { target }
            | RData::Cname { target }
            | RData::Dname { target }
            | RData::Ptr { target } => Some(target),
            _ => None,
        }
    }
}

/// NSEC/NSEC3 type bitmap (RFC 4034 section 4.1.2)
pub fn write_type_bitmap(types: &[RecordType], out: &mut Vec<u8>) {
    let mut values: Vec<u16> = types.iter().map(|t| t.to_u16()).collect();
    values.sort_unstable();
    values.dedup();

    let mut index = 0;
    while index < values.len() {
        let window = (values[index] >> 8) as u8;
        let mut bitmap = [0u8; 32];
        let mut used = 0;
        while index < values.len() && (values[index] >> 8) as u8 == window {
            let low = (values[index] & 0xff) as usize;
            bitmap[low / 8] |= 0x80 >> (low % 8);
            used = used.max(low / 8 + 1);
            index += 1;
        }
        out.push(window);
        out.push(used as u8);
        out.extend_from_slice(&bitmap[..used]);
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use base64::Engine;
        let b64 = base64::engine::general_purpose::STANDARD;
        match self {
            RData::A { address } => write!(f, "{}", address),
            RData::Aaaa { address } => write!(f, "{}", address),
            RData::Ns { target }
            | RData::Cname { target }
            | RData::Dname { target }
            | RData::Ptr { target } => write!(f, "{}", target),
            RData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RData::Txt { strings } => {
                let quoted: Vec<String> = strings.iter().map(|s| format!("\"{}\"", s)).collect();
                write!(f, "{}", quoted.join(" "))
            }
            RData::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            RData::Dnskey(key) | RData::Cdnskey(key) => write!(
                f,
                "{} {} {} {}",
                key.flags,
                key.protocol,
                key.algorithm,
                b64.encode(&key.public_key)
            ),
            RData::Ds(ds) | RData::Cds(ds) => write!(
                f,
                "{} {} {} {}",
                ds.key_tag,
                ds.algorithm,
                ds.digest_type,
                hex::encode_upper(&ds.digest)
            ),
            RData::Rrsig(sig) => write!(
                f,
                "{} {} {} {} {} {} {} {} {}",
                sig.type_covered,
                sig.algorithm,
                sig.labels,
                sig.original_ttl,
                sig.expiration,
                sig.inception,
                sig.key_tag,
                sig.signer,
                b64.encode(&sig.signature)
            ),
            RData::Nsec(nsec) => write!(f, "{}{}", nsec.next, format_types(&nsec.types)),
            RData::Nsec3(nsec3) => write!(
                f,
                "{} {} {} {} {}{}",
                nsec3.hash_algorithm,
                nsec3.flags,
                nsec3.iterations,
                format_salt(&nsec3.salt),
                encode_base32hex(&nsec3.next_hashed),
                format_types(&nsec3.types)
            ),
            RData::Nsec3Param(param) => write!(
                f,
                "{} {} {} {}",
                param.hash_algorithm,
                param.flags,
                param.iterations,
                format_salt(&param.salt)
            ),
            RData::Unknown { data, .. } => write!(f, "\\# {} {}", data.len(), hex::encode(data)),
        }
    }
}

fn format_types(types: &[RecordType]) -> String {
    types.iter().map(|t| format!(" {}", t)).collect()
}

fn format_salt(salt: &[u8]) -> String {
    if salt.is_empty() {
        "-".to_string()
    } else {
        hex::encode_upper(salt)
    }
}

/// Base32 with the extended hex alphabet, lowercase, no padding (RFC 5155 section 3.3)
pub fn encode_base32hex(data: &[u8]) -> String {
    base32::encode(base32::Alphabet::Rfc4648Hex { padding: false }, data).to_ascii_lowercase()
}

pub fn decode_base32hex(s: &str) -> Option<Vec<u8>> {
    base32::decode(
        base32::Alphabet::Rfc4648Hex { padding: false },
        &s.trim().to_ascii_uppercase(),
    )
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(serde::de::Error::custom)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode_upper(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() || compact == "-" {
            return Ok(Vec::new());
        }
        hex::decode(compact).map_err(serde::de::Error::custom)
    }
}

mod base32hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode_base32hex(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::decode_base32hex(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid base32hex: {}", s)))
    }
}
