//! Master file (RFC 1035 section 5) reading, used for trust anchor files.

pub mod errors;
pub mod parser;

pub use errors::{Result, ZoneError};
pub use parser::ZoneParser;

/// Zone constants
pub mod constants {
    /// Default TTL if not specified (1 hour)
    pub const DEFAULT_TTL: u32 = 3600;

    /// Maximum zone file size (10MB)
    pub const MAX_ZONE_FILE_SIZE: usize = 10 * 1024 * 1024;
}
