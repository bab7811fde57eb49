use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use super::{DigestType, DnsSecAlgorithm, TrustAnchorSet};
use crate::error::ConfigError;

/// Rule toggles, fixed for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyFlags {
    pub enforce_rfc8624: bool,
    pub enforce_rfc9276: bool,
    pub enforce_cookies: bool,
    pub allow_private_addresses: bool,
    pub trust_all_cdnskey_cds: bool,
    pub multi_signer: bool,
}

impl Default for PolicyFlags {
    fn default() -> Self {
        Self {
            enforce_rfc8624: true,
            enforce_rfc9276: true,
            enforce_cookies: true,
            allow_private_addresses: false,
            trust_all_cdnskey_cds: false,
            multi_signer: false,
        }
    }
}

/// Trust anchors, supported algorithm and digest sets, and rule toggles.
///
/// Immutable once built. Shared by reference across every analysis thread.
#[derive(Debug, Clone)]
pub struct Policy {
    trust_anchors: TrustAnchorSet,
    supported_algorithms: BTreeSet<u8>,
    supported_digests: BTreeSet<u8>,
    flags: PolicyFlags,
}

impl Policy {
    /// Everything verifiable is supported, default flags
    pub fn new(trust_anchors: TrustAnchorSet) -> Self {
        Self {
            trust_anchors,
            supported_algorithms: DnsSecAlgorithm::VERIFIABLE.into_iter().collect(),
            supported_digests: DigestType::COMPUTABLE.into_iter().collect(),
            flags: PolicyFlags::default(),
        }
    }

    /// Build the run policy.
    ///
    /// No anchor files means the built-in root anchors; any file replaces them.
    /// Empty filters mean every algorithm or digest this crate implements.
    pub fn load<P: AsRef<Path>>(
        trusted_keys_files: &[P],
        algorithm_filter: &[u8],
        digest_filter: &[u8],
        flags: PolicyFlags,
    ) -> Result<Self, ConfigError> {
        let trust_anchors = if trusted_keys_files.is_empty() {
            TrustAnchorSet::default_root()
        } else {
            TrustAnchorSet::from_zone_files(trusted_keys_files)?
        };

        let policy = Self::new(trust_anchors)
            .with_algorithms(algorithm_filter)?
            .with_digests(digest_filter)?
            .with_flags(flags);

        debug!(
            "Policy loaded: {} anchors, algorithms {:?}, digests {:?}",
            policy.trust_anchors.len(),
            policy.supported_algorithms,
            policy.supported_digests
        );
        Ok(policy)
    }

    /// Restrict supported algorithms; empty keeps all of them
    pub fn with_algorithms(mut self, filter: &[u8]) -> Result<Self, ConfigError> {
        if filter.is_empty() {
            return Ok(self);
        }
        for &alg in filter {
            if !DnsSecAlgorithm::VERIFIABLE.contains(&alg) {
                return Err(ConfigError::UnsupportedAlgorithm(DnsSecAlgorithm::name_of(alg)));
            }
        }
        self.supported_algorithms = filter.iter().copied().collect();
        Ok(self)
    }

    /// Restrict supported digests; empty keeps all of them
    pub fn with_digests(mut self, filter: &[u8]) -> Result<Self, ConfigError> {
        if filter.is_empty() {
            return Ok(self);
        }
        for &digest in filter {
            if !DigestType::COMPUTABLE.contains(&digest) {
                return Err(ConfigError::UnsupportedDigest(DigestType::name_of(digest)));
            }
        }
        self.supported_digests = filter.iter().copied().collect();
        Ok(self)
    }

    pub fn with_flags(mut self, flags: PolicyFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn trust_anchors(&self) -> &TrustAnchorSet {
        &self.trust_anchors
    }

    pub fn flags(&self) -> &PolicyFlags {
        &self.flags
    }

    pub fn supports_algorithm(&self, algorithm: u8) -> bool {
        self.supported_algorithms.contains(&algorithm)
    }

    pub fn supports_digest(&self, digest_type: u8) -> bool {
        self.supported_digests.contains(&digest_type)
    }

    pub fn supported_algorithms(&self) -> impl Iterator<Item = u8> + '_ {
        self.supported_algorithms.iter().copied()
    }

    pub fn supported_digests(&self) -> impl Iterator<Item = u8> + '_ {
        self.supported_digests.iter().copied()
    }
}
