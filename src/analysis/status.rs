use serde::{Serialize, Serializer};
use std::fmt;

use super::finding::{Finding, Severity, max_severity};

/// Authentication state of an entity in the chain of trust
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authentication {
    Secure,
    Insecure,
    Bogus,
    LameOrIncomplete,
}

impl Authentication {
    pub fn as_char(self) -> char {
        match self {
            Self::Secure => '.',
            Self::Insecure => '-',
            Self::Bogus => '!',
            Self::LameOrIncomplete => '?',
        }
    }

    /// Higher is stronger: secure, insecure, lame, bogus
    fn strength(self) -> u8 {
        match self {
            Self::Secure => 3,
            Self::Insecure => 2,
            Self::LameOrIncomplete => 1,
            Self::Bogus => 0,
        }
    }

    /// The less trustworthy of two states
    pub fn weakest(self, other: Self) -> Self {
        if other.strength() < self.strength() {
            other
        } else {
            self
        }
    }
}

/// Worst finding severity under an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueFlag {
    #[default]
    None,
    Warning,
    Error,
}

impl IssueFlag {
    pub fn from_findings<'a>(findings: impl IntoIterator<Item = &'a Finding>) -> Self {
        max_severity(findings).map(Self::from).unwrap_or_default()
    }

    pub fn as_char(self) -> Option<char> {
        match self {
            Self::None => None,
            Self::Warning => Some('?'),
            Self::Error => Some('!'),
        }
    }
}

impl From<Severity> for IssueFlag {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Warning => Self::Warning,
            Severity::Error => Self::Error,
        }
    }
}

/// (authentication, issue flag) pair, rendered as one or two characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode {
    pub authentication: Authentication,
    pub issues: IssueFlag,
}

impl StatusCode {
    pub fn new(authentication: Authentication, issues: IssueFlag) -> Self {
        Self {
            authentication,
            issues,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.authentication.as_char())?;
        if let Some(c) = self.issues.as_char() {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

impl Serialize for StatusCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
