use crate::analysis::{GraphFilter, RunOptions};
use crate::dns::{Name, RecordType};
use crate::dnssec::{DigestType, DnsSecAlgorithm, Policy, PolicyFlags};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything a run is configured with.
///
/// Layers, later wins: defaults, an optional TOML file, `DNSSEC_HEALTH_*`
/// environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Zone files holding DNSKEY or DS trust anchors (empty = built-in root anchors)
    pub trusted_keys_files: Vec<PathBuf>,

    /// DNSSEC algorithms to validate, by number or mnemonic (empty = all)
    pub supported_algorithms: Vec<String>,

    /// DS digest types to validate, by number or mnemonic (empty = all)
    pub supported_digests: Vec<String>,

    pub enforce_rfc8624: bool,
    pub enforce_rfc9276: bool,
    pub enforce_cookies: bool,
    pub allow_private_addresses: bool,
    pub trust_all_cdnskey_cds: bool,
    pub multi_signer: bool,

    /// Only report these names (empty = every queried name)
    pub name_filter: Vec<String>,

    /// Only analyse queries of these types (empty = all)
    pub type_filter: Vec<String>,

    /// Validation time in Unix seconds, overriding the input's own
    pub reference_time: Option<u32>,

    /// Analysis threads (0 = use default)
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let flags = PolicyFlags::default();
        Self {
            trusted_keys_files: Vec::new(),
            supported_algorithms: Vec::new(),
            supported_digests: Vec::new(),
            enforce_rfc8624: flags.enforce_rfc8624,
            enforce_rfc9276: flags.enforce_rfc9276,
            enforce_cookies: flags.enforce_cookies,
            allow_private_addresses: flags.allow_private_addresses,
            trust_all_cdnskey_cds: flags.trust_all_cdnskey_cds,
            multi_signer: flags.multi_signer,
            name_filter: Vec::new(),
            type_filter: Vec::new(),
            reference_time: None,
            threads: 0,
        }
    }
}

impl EngineConfig {
    /// Load a TOML config file; missing keys keep their defaults
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env()
    }

    /// Apply `DNSSEC_HEALTH_*` variables from the process environment
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Apply `DNSSEC_HEALTH_*` variables from an arbitrary lookup
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(files) = var("DNSSEC_HEALTH_TRUSTED_KEYS") {
            self.trusted_keys_files = split_list(&files).map(PathBuf::from).collect();
        }
        if let Some(algorithms) = var("DNSSEC_HEALTH_ALGORITHMS") {
            self.supported_algorithms = split_list(&algorithms).map(String::from).collect();
        }
        if let Some(digests) = var("DNSSEC_HEALTH_DIGESTS") {
            self.supported_digests = split_list(&digests).map(String::from).collect();
        }

        if let Some(value) = var("DNSSEC_HEALTH_ENFORCE_RFC8624") {
            self.enforce_rfc8624 = parse_bool(&value, self.enforce_rfc8624);
        }
        if let Some(value) = var("DNSSEC_HEALTH_ENFORCE_RFC9276") {
            self.enforce_rfc9276 = parse_bool(&value, self.enforce_rfc9276);
        }
        if let Some(value) = var("DNSSEC_HEALTH_ENFORCE_COOKIES") {
            self.enforce_cookies = parse_bool(&value, self.enforce_cookies);
        }
        if let Some(value) = var("DNSSEC_HEALTH_ALLOW_PRIVATE_ADDRESSES") {
            self.allow_private_addresses = parse_bool(&value, self.allow_private_addresses);
        }
        if let Some(value) = var("DNSSEC_HEALTH_TRUST_ALL_CDNSKEY_CDS") {
            self.trust_all_cdnskey_cds = parse_bool(&value, self.trust_all_cdnskey_cds);
        }
        if let Some(value) = var("DNSSEC_HEALTH_MULTI_SIGNER") {
            self.multi_signer = parse_bool(&value, self.multi_signer);
        }

        if let Some(names) = var("DNSSEC_HEALTH_NAMES") {
            self.name_filter = split_list(&names).map(String::from).collect();
        }
        if let Some(types) = var("DNSSEC_HEALTH_TYPES") {
            self.type_filter = split_list(&types).map(String::from).collect();
        }
        if let Some(time) = var("DNSSEC_HEALTH_REFERENCE_TIME") {
            self.reference_time = Some(
                time.trim()
                    .parse()
                    .map_err(|_| ConfigError::ParseError(format!("invalid reference time: {}", time)))?,
            );
        }
        if let Some(threads) = var("DNSSEC_HEALTH_THREADS") {
            self.threads = threads
                .trim()
                .parse()
                .map_err(|_| ConfigError::ParseError(format!("invalid thread count: {}", threads)))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the filters parse; file contents are only checked by `policy`
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm_filter()?;
        self.digest_filter()?;
        self.graph_filter()?;
        Ok(())
    }

    pub fn flags(&self) -> PolicyFlags {
        PolicyFlags {
            enforce_rfc8624: self.enforce_rfc8624,
            enforce_rfc9276: self.enforce_rfc9276,
            enforce_cookies: self.enforce_cookies,
            allow_private_addresses: self.allow_private_addresses,
            trust_all_cdnskey_cds: self.trust_all_cdnskey_cds,
            multi_signer: self.multi_signer,
        }
    }

    pub fn algorithm_filter(&self) -> Result<Vec<u8>, ConfigError> {
        self.supported_algorithms
            .iter()
            .map(|raw| {
                parse_code(raw, |name| DnsSecAlgorithm::from_mnemonic(name).map(DnsSecAlgorithm::to_u8))
                    .ok_or_else(|| ConfigError::UnsupportedAlgorithm(raw.clone()))
            })
            .collect()
    }

    pub fn digest_filter(&self) -> Result<Vec<u8>, ConfigError> {
        self.supported_digests
            .iter()
            .map(|raw| {
                parse_code(raw, |name| {
                    (0..=u8::MAX)
                        .filter_map(DigestType::from_u8)
                        .find(|digest| digest.to_string().eq_ignore_ascii_case(name))
                        .map(DigestType::to_u8)
                })
                .ok_or_else(|| ConfigError::UnsupportedDigest(raw.clone()))
            })
            .collect()
    }

    pub fn graph_filter(&self) -> Result<GraphFilter, ConfigError> {
        let names = self
            .name_filter
            .iter()
            .map(|raw| Name::from_ascii(raw).map_err(|e| ConfigError::InvalidName(format!("{}: {}", raw, e))))
            .collect::<Result<_, _>>()?;
        let types = self
            .type_filter
            .iter()
            .map(|raw| {
                raw.parse::<RecordType>()
                    .map_err(|e| ConfigError::InvalidType(format!("{}: {}", raw, e)))
            })
            .collect::<Result<_, _>>()?;
        Ok(GraphFilter { names, types })
    }

    /// Build the immutable policy, reading any trust anchor files
    pub fn policy(&self) -> Result<Policy, ConfigError> {
        Policy::load(
            &self.trusted_keys_files,
            &self.algorithm_filter()?,
            &self.digest_filter()?,
            self.flags(),
        )
    }

    pub fn run_options(&self) -> Result<RunOptions, ConfigError> {
        Ok(RunOptions {
            filter: self.graph_filter()?,
            reference_time: self.reference_time,
            threads: self.threads,
        })
    }
}

/// Comma- or whitespace-separated list
fn split_list(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

/// A number, or a mnemonic resolved through `by_name`
fn parse_code(raw: &str, by_name: impl Fn(&str) -> Option<u8>) -> Option<u8> {
    let raw = raw.trim();
    raw.parse::<u8>().ok().or_else(|| by_name(raw))
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
