pub mod enums;
pub mod name;
pub mod rdata;
pub mod record;
pub mod transaction;

pub use enums::{Rcode, RecordType};
pub use name::Name;
pub use rdata::{Dnskey, Ds, Nsec, Nsec3, Nsec3Param, RData, Rrsig, Soa};
pub use record::{RRset, Record, SignatureRecord, group_records};
pub use transaction::{CookieState, QueryResponse, Response, Transaction, TransactionSet, Transport};

/// Record model constants
pub mod constants {
    /// Maximum label length (RFC 1035)
    pub const MAX_LABEL_LENGTH: usize = 63;

    /// Maximum name length in wire format (RFC 1035)
    pub const MAX_NAME_LENGTH: usize = 255;

    /// DNSKEY zone key flag
    pub const DNSKEY_FLAG_ZONE: u16 = 0x0100;

    /// DNSKEY revoke flag (RFC 5011)
    pub const DNSKEY_FLAG_REVOKE: u16 = 0x0080;

    /// DNSKEY secure entry point flag
    pub const DNSKEY_FLAG_SEP: u16 = 0x0001;

    /// NSEC3 opt-out flag (RFC 5155)
    pub const NSEC3_FLAG_OPT_OUT: u8 = 0x01;

    /// Class IN, the only class the analyser handles
    pub const CLASS_IN: u16 = 1;
}
