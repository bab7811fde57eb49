pub mod algorithm;
pub mod canonical;
pub mod crypto;
pub mod denial;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod policy;
pub mod trust_anchor;
pub mod validator;

pub use algorithm::{DnsSecAlgorithm, Requirement};
pub use canonical::{compute_ds_digest, rrset_signed_data};
pub use denial::{
    DenialKind, DenialTarget, DenialValidator, NegativeProof, ProofKind, ProofOutcome, ProofRecord,
    nsec3_hash,
};
pub use digest::DigestType;
pub use errors::DnsSecError;
pub use key_tag::calculate_key_tag;
pub use policy::{Policy, PolicyFlags};
pub use trust_anchor::{AnchorKey, TrustAnchor, TrustAnchorSet};
pub use validator::{DnsSecValidator, DsAnalysis, RrsigAnalysis, ValidationOutcome};
