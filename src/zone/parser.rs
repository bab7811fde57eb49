use super::{Result, ZoneError, constants};
use crate::dns::{Dnskey, Ds, Name, RData, Record, RecordType, Soa};
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// RFC 1035 master file parser producing typed records
pub struct ZoneParser {
    /// Current origin for relative names
    current_origin: Name,
    /// Current default TTL
    current_ttl: Option<u32>,
    /// Owner of the previous record, for lines starting with whitespace
    last_owner: Option<Name>,
    /// Directory `$INCLUDE` paths are resolved against
    base_dir: Option<PathBuf>,
    /// Line number for error reporting
    line_number: usize,
}

/// One record's worth of text after comment stripping and parenthesis joining
struct LogicalLine {
    start_line: usize,
    inherits_owner: bool,
    tokens: Vec<String>,
}

impl ZoneParser {
    /// Create a new zone parser rooted at `.`
    pub fn new() -> Self {
        Self {
            current_origin: Name::root(),
            current_ttl: None,
            last_owner: None,
            base_dir: None,
            line_number: 0,
        }
    }

    /// Start with an origin other than the root
    pub fn with_origin(mut self, origin: Name) -> Self {
        self.current_origin = origin;
        self
    }

    /// Parse a zone file from path
    pub fn parse_file<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<Record>> {
        let path = path.as_ref();

        let metadata = fs::metadata(path).map_err(|e| ZoneError::IoError(e.to_string()))?;
        if metadata.len() as usize > constants::MAX_ZONE_FILE_SIZE {
            return Err(ZoneError::FileTooLarge);
        }
        let contents = fs::read_to_string(path).map_err(|e| ZoneError::IoError(e.to_string()))?;

        if self.base_dir.is_none() {
            self.base_dir = path.parent().map(Path::to_path_buf);
        }

        let records = self.parse_str(&contents)?;
        debug!("Parsed {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Parse zone file contents
    pub fn parse_str(&mut self, contents: &str) -> Result<Vec<Record>> {
        self.line_number = 0;
        let mut records = Vec::new();

        for line in self.logical_lines(contents)? {
            let Some(first) = line.tokens.first() else {
                continue;
            };
            trace!("Parsing line {}: {:?}", line.start_line, line.tokens);

            if first.starts_with('$') && !line.inherits_owner {
                self.parse_directive(&line.tokens, &mut records)?;
                continue;
            }

            let record = self.parse_record(&line).map_err(|e| {
                ZoneError::ParseError(format!("Line {}: {}", line.start_line, e))
            })?;
            records.push(record);
        }

        Ok(records)
    }

    /// Split contents into logical lines, joining parenthesised continuations
    fn logical_lines(&mut self, contents: &str) -> Result<Vec<LogicalLine>> {
        let mut lines = Vec::new();
        let mut current: Option<LogicalLine> = None;
        let mut depth = 0usize;

        for raw in contents.lines() {
            self.line_number += 1;

            let mut tokens = Vec::new();
            let mut token = String::new();
            let mut in_quotes = false;

            for ch in raw.chars() {
                match ch {
                    '"' => {
                        in_quotes = !in_quotes;
                        token.push(ch);
                    }
                    ';' if !in_quotes => break,
                    '(' if !in_quotes => depth += 1,
                    ')' if !in_quotes => {
                        depth = depth.checked_sub(1).ok_or_else(|| {
                            ZoneError::ParseError(format!(
                                "Line {}: unbalanced ')'",
                                self.line_number
                            ))
                        })?;
                    }
                    c if c.is_whitespace() && !in_quotes => {
                        if !token.is_empty() {
                            tokens.push(std::mem::take(&mut token));
                        }
                    }
                    _ => token.push(ch),
                }
            }
            if in_quotes {
                return Err(ZoneError::ParseError(format!(
                    "Line {}: unterminated quoted string",
                    self.line_number
                )));
            }
            if !token.is_empty() {
                tokens.push(token);
            }

            match current.as_mut() {
                Some(open) => open.tokens.extend(tokens),
                None if tokens.is_empty() => continue,
                None => {
                    current = Some(LogicalLine {
                        start_line: self.line_number,
                        inherits_owner: raw.starts_with([' ', '\t']),
                        tokens,
                    });
                }
            }

            if depth == 0 {
                if let Some(done) = current.take() {
                    lines.push(done);
                }
            }
        }

        if let Some(open) = current {
            return Err(ZoneError::ParseError(format!(
                "Unclosed parentheses starting at line {}",
                open.start_line
            )));
        }
        Ok(lines)
    }

    /// Parse a directive line
    fn parse_directive(&mut self, parts: &[String], records: &mut Vec<Record>) -> Result<()> {
        match parts[0].to_uppercase().as_str() {
            "$ORIGIN" => {
                let origin = parts.get(1).ok_or_else(|| {
                    ZoneError::ParseError("$ORIGIN requires domain name".to_string())
                })?;
                self.current_origin = self.resolve_name(origin)?;
                debug!("Set origin to: {}", self.current_origin);
            }
            "$TTL" => {
                let ttl = parts
                    .get(1)
                    .ok_or_else(|| ZoneError::ParseError("$TTL requires value".to_string()))?;
                let ttl = parse_ttl(ttl)?;
                self.current_ttl = Some(ttl);
                debug!("Set default TTL to: {}", ttl);
            }
            "$INCLUDE" => {
                let file = parts.get(1).ok_or_else(|| {
                    ZoneError::ParseError("$INCLUDE requires file path".to_string())
                })?;
                let path = match &self.base_dir {
                    Some(dir) if Path::new(file).is_relative() => dir.join(file),
                    _ => PathBuf::from(file),
                };

                let mut nested = ZoneParser {
                    current_origin: self.current_origin.clone(),
                    current_ttl: self.current_ttl,
                    last_owner: self.last_owner.clone(),
                    base_dir: self.base_dir.clone(),
                    line_number: 0,
                };
                if let Some(domain) = parts.get(2) {
                    nested.current_origin = self.resolve_name(domain)?;
                }

                debug!("Processing $INCLUDE {}", path.display());
                let included = nested.parse_file(&path).map_err(|e| {
                    ZoneError::ParseError(format!(
                        "Failed to include {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                records.extend(included);
            }
            other => {
                debug!("Unknown directive: {}", other);
            }
        }

        Ok(())
    }

    /// Parse one resource record
    fn parse_record(&mut self, line: &LogicalLine) -> Result<Record> {
        let parts = &line.tokens;
        let mut idx = 0;

        let owner = if line.inherits_owner {
            self.last_owner
                .clone()
                .ok_or_else(|| ZoneError::ParseError("No previous owner name".to_string()))?
        } else {
            idx += 1;
            self.resolve_name(&parts[0])?
        };

        let mut ttl = self.current_ttl;
        let mut rtype = None;

        // TTL and class may appear in either order before the type
        while idx < parts.len() {
            let field = &parts[idx];
            idx += 1;

            if let Ok(value) = parse_ttl(field) {
                ttl = Some(value);
                continue;
            }
            match field.to_uppercase().as_str() {
                "IN" => continue,
                "CH" | "CS" | "HS" => {
                    return Err(ZoneError::InvalidRecord(format!(
                        "class {} is not supported",
                        field
                    )));
                }
                _ => {}
            }
            match field.parse::<RecordType>() {
                Ok(parsed) => {
                    rtype = Some(parsed);
                    break;
                }
                Err(_) => return Err(ZoneError::ParseError(format!("Invalid field: {}", field))),
            }
        }

        let rtype = rtype.ok_or_else(|| ZoneError::ParseError("Missing record type".to_string()))?;
        let fields = &parts[idx..];
        if fields.is_empty() {
            return Err(ZoneError::ParseError("Missing RDATA".to_string()));
        }

        let rdata = self.parse_rdata(rtype, fields)?;
        self.last_owner = Some(owner.clone());

        Ok(Record {
            name: owner,
            ttl: ttl.unwrap_or(constants::DEFAULT_TTL),
            rdata,
        })
    }

    fn parse_rdata(&self, rtype: RecordType, fields: &[String]) -> Result<RData> {
        let rdata = match rtype {
            RecordType::A => RData::A {
                address: parse_field(fields, 0, "address")?,
            },
            RecordType::AAAA => RData::Aaaa {
                address: parse_field(fields, 0, "address")?,
            },
            RecordType::NS => RData::Ns {
                target: self.name_field(fields, 0)?,
            },
            RecordType::CNAME => RData::Cname {
                target: self.name_field(fields, 0)?,
            },
            RecordType::DNAME => RData::Dname {
                target: self.name_field(fields, 0)?,
            },
            RecordType::PTR => RData::Ptr {
                target: self.name_field(fields, 0)?,
            },
            RecordType::MX => RData::Mx {
                preference: parse_field(fields, 0, "preference")?,
                exchange: self.name_field(fields, 1)?,
            },
            RecordType::TXT => RData::Txt {
                strings: fields.iter().map(|s| s.trim_matches('"').to_string()).collect(),
            },
            RecordType::SOA => RData::Soa(Soa {
                mname: self.name_field(fields, 0)?,
                rname: self.name_field(fields, 1)?,
                serial: parse_field(fields, 2, "serial")?,
                refresh: parse_ttl_field(fields, 3)?,
                retry: parse_ttl_field(fields, 4)?,
                expire: parse_ttl_field(fields, 5)?,
                minimum: parse_ttl_field(fields, 6)?,
            }),
            RecordType::DNSKEY => RData::Dnskey(parse_dnskey(fields)?),
            RecordType::CDNSKEY => RData::Cdnskey(parse_dnskey(fields)?),
            RecordType::DS => RData::Ds(parse_ds(fields)?),
            RecordType::CDS => RData::Cds(parse_ds(fields)?),
            other => return Err(ZoneError::InvalidRRType(other.to_string())),
        };
        Ok(rdata)
    }

    fn name_field(&self, fields: &[String], index: usize) -> Result<Name> {
        let field = fields
            .get(index)
            .ok_or_else(|| ZoneError::InvalidRecord(format!("missing name field {}", index)))?;
        self.resolve_name(field)
    }

    /// Resolve `@`, absolute and origin-relative names
    fn resolve_name(&self, text: &str) -> Result<Name> {
        let invalid = |e: crate::error::DnsError| ZoneError::InvalidDomainName(format!("{}: {}", text, e));
        if text == "@" {
            return Ok(self.current_origin.clone());
        }
        if text.ends_with('.') {
            return Name::from_ascii(text).map_err(invalid);
        }

        let mut name = self.current_origin.clone();
        for label in text.rsplit('.') {
            name = name.prepend(label).map_err(invalid)?;
        }
        Ok(name)
    }
}

impl Default for ZoneParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse TTL value (supports suffixes like 1h, 30m, etc.)
fn parse_ttl(s: &str) -> Result<u32> {
    let lower = s.to_lowercase();
    let invalid = || ZoneError::InvalidTTL(s.to_string());

    if lower.is_empty() || !lower.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid());
    }

    // Plain seconds, or a sum of suffixed units like 1h30m
    if let Ok(seconds) = lower.parse::<u32>() {
        return Ok(seconds);
    }

    let mut total: u32 = 0;
    let mut digits = String::new();
    for ch in lower.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            continue;
        }
        let unit = match ch {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86400,
            'w' => 604800,
            _ => return Err(invalid()),
        };
        let value: u32 = digits.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        digits.clear();
    }
    if !digits.is_empty() {
        return Err(invalid());
    }
    Ok(total)
}

fn parse_field<T: std::str::FromStr>(fields: &[String], index: usize, what: &str) -> Result<T> {
    fields
        .get(index)
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| ZoneError::InvalidRecord(format!("invalid or missing {}", what)))
}

fn parse_ttl_field(fields: &[String], index: usize) -> Result<u32> {
    fields
        .get(index)
        .ok_or_else(|| ZoneError::InvalidRecord("truncated SOA".to_string()))
        .and_then(|f| parse_ttl(f))
}

/// flags protocol algorithm base64-key (the key may be split across tokens)
fn parse_dnskey(fields: &[String]) -> Result<Dnskey> {
    if fields.len() < 4 {
        return Err(ZoneError::InvalidRecord("DNSKEY needs four fields".to_string()));
    }
    let encoded: String = fields[3..].concat();
    let public_key = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| ZoneError::InvalidRecord(format!("bad DNSKEY base64: {}", e)))?;

    Ok(Dnskey {
        flags: parse_field(fields, 0, "DNSKEY flags")?,
        protocol: parse_field(fields, 1, "DNSKEY protocol")?,
        algorithm: parse_algorithm(&fields[2])?,
        public_key,
    })
}

/// key-tag algorithm digest-type hex-digest (the digest may be split)
fn parse_ds(fields: &[String]) -> Result<Ds> {
    if fields.len() < 4 {
        return Err(ZoneError::InvalidRecord("DS needs four fields".to_string()));
    }
    let encoded: String = fields[3..].concat();
    let digest = hex::decode(encoded)
        .map_err(|e| ZoneError::InvalidRecord(format!("bad DS digest: {}", e)))?;

    Ok(Ds {
        key_tag: parse_field(fields, 0, "DS key tag")?,
        algorithm: parse_algorithm(&fields[1])?,
        digest_type: parse_field(fields, 2, "DS digest type")?,
        digest,
    })
}

/// Algorithm by number or RFC mnemonic
fn parse_algorithm(field: &str) -> Result<u8> {
    if let Ok(number) = field.parse::<u8>() {
        return Ok(number);
    }
    crate::dnssec::DnsSecAlgorithm::from_mnemonic(field)
        .map(crate::dnssec::DnsSecAlgorithm::to_u8)
        .ok_or_else(|| ZoneError::InvalidRecord(format!("unknown algorithm {}", field)))
}
