//! DNSSEC chain-of-trust analysis over captured DNS transactions.
//!
//! The engine takes a set of query/response transactions gathered by an
//! external collector, rebuilds the delegation chain from the configured
//! trust anchors down to every queried name, and reports an
//! authentication status plus findings for each zone, response and RRset.

pub mod analysis;
pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod report;
pub mod zone;

pub use analysis::{RunOptions, analyze};
pub use config::EngineConfig;
pub use report::Report;
