/// Calculate the key tag for a DNSKEY record (RFC 4034 Appendix B)
pub fn calculate_key_tag(flags: u16, protocol: u8, algorithm: u8, public_key: &[u8]) -> u16 {
    // RSAMD5 takes the most significant 16 of the least significant 24 bits of the modulus
    if algorithm == 1 {
        if public_key.len() >= 3 {
            return u16::from_be_bytes([
                public_key[public_key.len() - 3],
                public_key[public_key.len() - 2],
            ]);
        }
        return 0;
    }

    let rdata = flags
        .to_be_bytes()
        .into_iter()
        .chain([protocol, algorithm])
        .chain(public_key.iter().copied());

    let mut accumulator: u32 = 0;
    for (i, byte) in rdata.enumerate() {
        if i % 2 == 0 {
            accumulator += u32::from(byte) << 8;
        } else {
            accumulator += u32::from(byte);
        }
    }

    accumulator += accumulator >> 16;
    (accumulator & 0xFFFF) as u16
}
