use base64::Engine;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use super::{DigestType, compute_ds_digest};
use crate::dns::{Dnskey, Ds, Name, RData};
use crate::error::ConfigError;
use crate::zone::ZoneParser;

/// Root KSK-2017, key tag 20326
const ROOT_KSK_2017: &str = "AwEAAaz/tAm8yTn4Mfeh5eyI96WSVexTBAvkMgJzkKTOiW1vkIbzxeF3\
    +/4RgWOq7HrxRixHlFlExOLAJr5emLvN7SWXgnLh4+B5xQlNVz8Og8kv\
    ArMtNROxVQuCaSnIDdD5LKyWbRd2n9WGe2R8PzgCmr3EgVLrjyBxWezF\
    0jLHwVN8efS3rCj/EWgvIWgb9tarpVUDK/b58Da+sqqls3eNbuv7pr+e\
    oZG+SrDK6nWeL3c6H5Apxz7LjVc1uTIdsIXxuOLYA4/ilBmSVIzuDWfd\
    RUfhHdY6+cn8HFRm+2hM8AnXGXws9555KrUB5qihylGa8subX2Nn6UwN\
    R1AkUTV74bU=";

/// Root KSK-2024, key tag 38696, as the SHA-256 DS IANA publishes for it
const ROOT_KSK_2024_DS: &str = "683D2D0ACB8C9B712A1948B27F741219298D0A450D612C483AF444A4C0FB2B16";

/// What an anchor pins: a full key, or a digest of one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnchorKey {
    Dnskey(Dnskey),
    Ds(Ds),
}

/// A DNSSEC trust anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    /// Zone apex this anchor is for
    pub zone: Name,
    pub key: AnchorKey,
}

impl TrustAnchor {
    pub fn from_dnskey(zone: Name, dnskey: Dnskey) -> Self {
        Self {
            zone,
            key: AnchorKey::Dnskey(dnskey),
        }
    }

    pub fn from_ds(zone: Name, ds: Ds) -> Self {
        Self {
            zone,
            key: AnchorKey::Ds(ds),
        }
    }

    pub fn key_tag(&self) -> u16 {
        match &self.key {
            AnchorKey::Dnskey(key) => key.key_tag(),
            AnchorKey::Ds(ds) => ds.key_tag,
        }
    }

    pub fn algorithm(&self) -> u8 {
        match &self.key {
            AnchorKey::Dnskey(key) => key.algorithm,
            AnchorKey::Ds(ds) => ds.algorithm,
        }
    }

    /// True if `dnskey` (owned by the anchor's zone) is the key this anchor pins
    pub fn matches(&self, dnskey: &Dnskey) -> bool {
        match &self.key {
            AnchorKey::Dnskey(anchor) => {
                anchor.algorithm == dnskey.algorithm && anchor.public_key == dnskey.public_key
            }
            AnchorKey::Ds(ds) => {
                if ds.key_tag != dnskey.key_tag() || ds.algorithm != dnskey.algorithm {
                    return false;
                }
                DigestType::from_u8(ds.digest_type)
                    .and_then(|digest_type| compute_ds_digest(&self.zone, dnskey, digest_type))
                    .is_some_and(|digest| digest == ds.digest)
            }
        }
    }
}

/// Immutable set of trust anchors, keyed by zone apex.
///
/// Nothing here is process-wide: callers build the set they want
/// (usually [`TrustAnchorSet::default_root`]) and hand it to the policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustAnchorSet {
    anchors: BTreeMap<Name, Vec<TrustAnchor>>,
}

impl TrustAnchorSet {
    /// No anchors at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// The IANA root KSKs
    pub fn default_root() -> Self {
        let mut set = Self::empty();
        let compact: String = ROOT_KSK_2017.chars().filter(|c| !c.is_whitespace()).collect();
        if let Ok(public_key) = base64::engine::general_purpose::STANDARD.decode(compact) {
            set.insert(TrustAnchor::from_dnskey(
                Name::root(),
                Dnskey {
                    flags: 257,
                    protocol: 3,
                    algorithm: 8,
                    public_key,
                },
            ));
        }
        if let Ok(digest) = hex::decode(ROOT_KSK_2024_DS) {
            set.insert(TrustAnchor::from_ds(
                Name::root(),
                Ds {
                    key_tag: 38696,
                    algorithm: 8,
                    digest_type: 2,
                    digest,
                },
            ));
        }
        set
    }

    /// Add an anchor; an existing anchor with the same apex and key tag is replaced
    pub fn insert(&mut self, anchor: TrustAnchor) {
        let entry = self.anchors.entry(anchor.zone.clone()).or_default();
        let key_tag = anchor.key_tag();
        match entry.iter_mut().find(|existing| existing.key_tag() == key_tag) {
            Some(existing) => *existing = anchor,
            None => entry.push(anchor),
        }
    }

    /// Load anchors from zone files, merged in order (last wins per apex and key tag)
    pub fn from_zone_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ConfigError> {
        let mut set = Self::empty();
        for path in paths {
            let path = path.as_ref();
            let invalid = |reason: String| ConfigError::TrustAnchor {
                path: path.display().to_string(),
                reason,
            };

            let records = ZoneParser::new()
                .parse_file(path)
                .map_err(|e| invalid(e.to_string()))?;

            let mut found = 0;
            for record in records {
                match record.rdata {
                    RData::Dnskey(key) => {
                        set.insert(TrustAnchor::from_dnskey(record.name, key));
                        found += 1;
                    }
                    RData::Ds(ds) => {
                        set.insert(TrustAnchor::from_ds(record.name, ds));
                        found += 1;
                    }
                    _ => {}
                }
            }

            if found == 0 {
                return Err(invalid("no DNSKEY or DS records found".to_string()));
            }
            debug!("Loaded {} trust anchors from {}", found, path.display());
        }
        Ok(set)
    }

    pub fn anchors_for(&self, zone: &Name) -> &[TrustAnchor] {
        self.anchors.get(zone).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_anchor_zone(&self, zone: &Name) -> bool {
        self.anchors.contains_key(zone)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Name> {
        self.anchors.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrustAnchor> {
        self.anchors.values().flatten()
    }

    /// Number of anchors across all zones
    pub fn len(&self) -> usize {
        self.anchors.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root_anchors() {
        let set = TrustAnchorSet::default_root();
        assert_eq!(set.len(), 2);
        let mut tags: Vec<u16> = set.anchors_for(&Name::root()).iter().map(|a| a.key_tag()).collect();
        tags.sort();
        assert_eq!(tags, vec![20326, 38696]);
        assert!(set.is_anchor_zone(&Name::root()));
    }

    #[test]
    fn test_insert_last_wins() {
        let zone = Name::from_ascii("example.").unwrap();
        let key = Dnskey {
            flags: 257,
            protocol: 3,
            algorithm: 13,
            public_key: vec![7; 64],
        };
        let mut set = TrustAnchorSet::empty();
        set.insert(TrustAnchor::from_dnskey(zone.clone(), key.clone()));
        let ds = Ds {
            key_tag: key.key_tag(),
            algorithm: 13,
            digest_type: 2,
            digest: vec![1; 32],
        };
        set.insert(TrustAnchor::from_ds(zone.clone(), ds.clone()));
        assert_eq!(set.len(), 1);
        assert_eq!(set.anchors_for(&zone)[0].key, AnchorKey::Ds(ds));
    }

    #[test]
    fn test_ds_anchor_matches_by_digest() {
        let zone = Name::from_ascii("example.").unwrap();
        let key = Dnskey {
            flags: 257,
            protocol: 3,
            algorithm: 13,
            public_key: vec![9; 64],
        };
        let digest = compute_ds_digest(&zone, &key, DigestType::Sha256).unwrap();
        let anchor = TrustAnchor::from_ds(
            zone,
            Ds {
                key_tag: key.key_tag(),
                algorithm: 13,
                digest_type: 2,
                digest,
            },
        );
        assert!(anchor.matches(&key));

        let mut other = key.clone();
        other.public_key[0] = 0;
        assert!(!anchor.matches(&other));
    }
}
