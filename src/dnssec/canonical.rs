//! Canonical forms fed to signature and digest checks (RFC 4034 sections 3.1.8.1, 5.1.4, 6)

use super::DigestType;
use super::errors::{DnsSecError, Result};
use crate::dns::constants::CLASS_IN;
use crate::dns::{Dnskey, Name, RData, RecordType, Rrsig};

/// Owner name as it was signed: wildcard expansions are signed as `*.<closest encloser>`
pub fn signed_owner(owner: &Name, rrsig: &Rrsig) -> Result<Name> {
    let labels = rrsig.labels as usize;
    if labels < owner.rrsig_label_count() {
        owner
            .ancestor(labels)
            .wildcard()
            .map_err(|e| DnsSecError::InvalidName(e.to_string()))
    } else {
        Ok(owner.clone())
    }
}

/// The byte string an RRSIG signs: RRSIG RDATA minus the signature, then
/// every RR of the set in canonical form and order, with the original TTL
pub fn rrset_signed_data(
    rrsig: &Rrsig,
    owner: &Name,
    rtype: RecordType,
    rdatas: &[RData],
) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    rrsig.write_unsigned_rdata(&mut data);

    let owner_wire = signed_owner(owner, rrsig)?.to_canonical_wire();

    let mut canonical: Vec<Vec<u8>> = rdatas.iter().map(RData::to_canonical_wire).collect();
    canonical.sort();
    canonical.dedup();

    for rdata in canonical {
        data.extend_from_slice(&owner_wire);
        data.extend_from_slice(&rtype.to_u16().to_be_bytes());
        data.extend_from_slice(&CLASS_IN.to_be_bytes());
        data.extend_from_slice(&rrsig.original_ttl.to_be_bytes());
        data.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        data.extend_from_slice(&rdata);
    }

    Ok(data)
}

/// DS digest over owner name and DNSKEY RDATA; `None` for digests we cannot compute
pub fn compute_ds_digest(owner: &Name, dnskey: &Dnskey, digest_type: DigestType) -> Option<Vec<u8>> {
    let mut data = owner.to_canonical_wire();
    data.extend_from_slice(&dnskey.to_wire());
    digest_type.digest(&data)
}
