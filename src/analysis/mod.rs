//! Chain-of-trust validation and status aggregation over the name graph

pub mod aggregate;
pub mod chain;
pub mod delegation;
pub mod finding;
pub mod graph;
pub mod status;

pub use aggregate::{RunOptions, analyze};
pub use chain::{ChainValidator, NameAnalysis, NegativeAnalysis, RRsetAnalysis, ResponseAnalysis, ZoneAnalysis};
pub use delegation::{DelegationCheck, ServerCheck};
pub use finding::{Finding, FindingCode, Severity};
pub use graph::{GraphFilter, NameGraph, NameNode};
pub use status::{Authentication, IssueFlag, StatusCode};
