use crate::error::{DnsError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::constants::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};

/// An absolute domain name.
///
/// Labels keep the case they were received in, because NSEC next-name
/// fields are signed as transmitted. Equality, hashing and ordering are
/// ASCII case-insensitive, and ordering is the canonical DNSSEC order
/// (RFC 4034 section 6.1).
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Name {
    /// Labels, most specific first; empty for the root
    labels: Vec<String>,
}

impl Name {
    /// The root name
    pub fn root() -> Self {
        Self { labels: Vec::new() }
    }

    /// Parse a name in presentation form; a trailing dot is optional
    pub fn from_ascii(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "." {
            return Ok(Self::root());
        }

        let body = trimmed.strip_suffix('.').unwrap_or(trimmed);
        let mut labels = Vec::new();
        for label in body.split('.') {
            if label.is_empty() {
                return Err(DnsError::EmptyLabel(s.to_string()));
            }
            if label.len() > MAX_LABEL_LENGTH {
                return Err(DnsError::InvalidLabelLength(label.len()));
            }
            labels.push(label.to_string());
        }

        let name = Self { labels };
        if name.wire_len() > MAX_NAME_LENGTH {
            return Err(DnsError::NameTooLong(s.to_string()));
        }
        Ok(name)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels, not counting the root
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Label count as used in the RRSIG labels field (a leading `*` is not counted)
    pub fn rrsig_label_count(&self) -> usize {
        if self.is_wildcard() {
            self.labels.len() - 1
        } else {
            self.labels.len()
        }
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn is_wildcard(&self) -> bool {
        self.labels.first().is_some_and(|l| l == "*")
    }

    pub fn first_label(&self) -> Option<&str> {
        self.labels.first().map(String::as_str)
    }

    /// The immediate parent, or `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            labels: self.labels[1..].to_vec(),
        })
    }

    /// The ancestor made of the rightmost `count` labels
    pub fn ancestor(&self, count: usize) -> Self {
        let count = count.min(self.labels.len());
        Self {
            labels: self.labels[self.labels.len() - count..].to_vec(),
        }
    }

    /// True if `self` equals `other` or lies below it
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        if other.labels.len() > self.labels.len() {
            return false;
        }
        let offset = self.labels.len() - other.labels.len();
        self.labels[offset..]
            .iter()
            .zip(other.labels.iter())
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }

    /// Prepend one label
    pub fn prepend(&self, label: &str) -> Result<Self> {
        if label.is_empty() {
            return Err(DnsError::EmptyLabel(label.to_string()));
        }
        if label.len() > MAX_LABEL_LENGTH {
            return Err(DnsError::InvalidLabelLength(label.len()));
        }
        let mut labels = Vec::with_capacity(self.labels.len() + 1);
        labels.push(label.to_string());
        labels.extend(self.labels.iter().cloned());
        let name = Self { labels };
        if name.wire_len() > MAX_NAME_LENGTH {
            return Err(DnsError::NameTooLong(name.to_string()));
        }
        Ok(name)
    }

    /// `*.<self>`
    pub fn wildcard(&self) -> Result<Self> {
        self.prepend("*")
    }

    /// Length in uncompressed wire format
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1
    }

    /// Append the uncompressed wire form, preserving case
    pub fn write_wire(&self, out: &mut Vec<u8>) {
        for label in &self.labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
    }

    /// Append the canonical (lowercased) wire form
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        for label in &self.labels {
            out.push(label.len() as u8);
            out.extend(label.bytes().map(|b| b.to_ascii_lowercase()));
        }
        out.push(0);
    }

    pub fn to_canonical_wire(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        self.write_canonical(&mut out);
        out
    }

    /// Lowercased copy
    pub fn to_lowercase(&self) -> Self {
        Self {
            labels: self.labels.iter().map(|l| l.to_ascii_lowercase()).collect(),
        }
    }
}

fn cmp_label(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.labels.iter().rev().zip(other.labels.iter().rev()) {
            match cmp_label(a, b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.labels.len().cmp(&other.labels.len())
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.labels.len() == other.labels.len()
            && self
                .labels
                .iter()
                .zip(other.labels.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.labels.len().hash(state);
        for label in &self.labels {
            for b in label.bytes() {
                state.write_u8(b.to_ascii_lowercase());
            }
            state.write_u8(b'.');
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return write!(f, ".");
        }
        for label in &self.labels {
            write!(f, "{}.", label)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self)
    }
}

impl FromStr for Name {
    type Err = DnsError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_ascii(s)
    }
}

impl TryFrom<String> for Name {
    type Error = DnsError;

    fn try_from(s: String) -> Result<Self> {
        Self::from_ascii(&s)
    }
}

impl From<Name> for String {
    fn from(name: Name) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(name("Example.COM").to_string(), "Example.COM.");
        assert_eq!(name("example.com.").label_count(), 2);
        assert!(name(".").is_root());
        assert_eq!(name("").to_string(), ".");
        assert!(Name::from_ascii("a..b").is_err());
        assert!(Name::from_ascii(&"a".repeat(64)).is_err());
    }

    #[test]
    fn test_case_insensitive_equality() {
        assert_eq!(name("WWW.example.com"), name("www.EXAMPLE.com."));
        let mut set = std::collections::HashSet::new();
        set.insert(name("Example.com"));
        assert!(set.contains(&name("example.COM")));
    }

    #[test]
    fn test_canonical_order() {
        // RFC 4034 section 6.1 example ordering
        let ordered = [
            "example",
            "a.example",
            "yljkjljk.a.example",
            "Z.a.example",
            "zABC.a.EXAMPLE",
            "z.example",
            "*.z.example",
        ];
        let mut names: Vec<Name> = ordered.iter().rev().map(|s| name(s)).collect();
        names.sort();
        let sorted: Vec<String> = names.iter().map(|n| n.to_lowercase().to_string()).collect();
        let expected: Vec<String> = ordered
            .iter()
            .map(|s| format!("{}.", s.to_lowercase()))
            .collect();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_hierarchy() {
        let www = name("www.example.com");
        assert_eq!(www.parent(), Some(name("example.com")));
        assert!(www.is_subdomain_of(&name("EXAMPLE.com")));
        assert!(www.is_subdomain_of(&Name::root()));
        assert!(!name("example.com").is_subdomain_of(&www));
        assert_eq!(www.ancestor(1), name("com"));
        assert_eq!(name("*.example.com").rrsig_label_count(), 2);
        assert_eq!(name("example.com").wildcard().unwrap(), name("*.example.com"));
    }

    #[test]
    fn test_wire_forms() {
        let n = name("Ab.c");
        let mut wire = Vec::new();
        n.write_wire(&mut wire);
        assert_eq!(wire, b"\x02Ab\x01c\x00");
        assert_eq!(n.to_canonical_wire(), b"\x02ab\x01c\x00");
        assert_eq!(Name::root().to_canonical_wire(), vec![0]);
        assert_eq!(n.wire_len(), 6);
    }
}
