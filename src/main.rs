use clap::{Parser, ValueEnum};
use dnssec_health::dns::TransactionSet;
use dnssec_health::error::{ConfigError, MalformedInputError};
use dnssec_health::{EngineConfig, analyze};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Assess the DNSSEC health of names from captured diagnostic queries
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transaction set (JSON), or "-" for stdin
    input: PathBuf,

    /// TOML config file, applied before environment and flags
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Zone file of trusted DNSKEY or DS records; replaces the built-in root anchors
    #[arg(short = 't', long = "trusted-keys-file")]
    trusted_keys_files: Vec<PathBuf>,

    /// Supported DNSSEC algorithms, by number or mnemonic
    #[arg(short = 'a', long, value_delimiter = ',')]
    algorithms: Vec<String>,

    /// Supported DS digest types, by number or mnemonic
    #[arg(short = 'd', long, value_delimiter = ',')]
    digest_algorithms: Vec<String>,

    /// Do not apply the RFC 8624 algorithm requirements
    #[arg(long)]
    ignore_rfc8624: bool,

    /// Do not apply the RFC 9276 NSEC3 parameter guidance
    #[arg(long)]
    ignore_rfc9276: bool,

    /// Do not check DNS cookie behaviour
    #[arg(short = 'C', long)]
    ignore_cookies: bool,

    /// Allow servers with private or local addresses
    #[arg(short = 'P', long)]
    allow_private: bool,

    /// Accept CDNSKEY/CDS without the RFC 7344 consistency checks
    #[arg(long)]
    trust_cdnskey_cds: bool,

    /// Treat the zone as signed by multiple providers (RFC 8901 model 2)
    #[arg(long)]
    multi_signer: bool,

    /// Report only these names
    #[arg(short = 'n', long = "names", value_delimiter = ',')]
    names: Vec<String>,

    /// Analyse only queries of these types
    #[arg(short = 'R', long = "types", value_delimiter = ',')]
    types: Vec<String>,

    /// Validation time (Unix seconds), overriding the one in the input
    #[arg(long)]
    reference_time: Option<u32>,

    /// Analysis threads (0 = use default)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Input(#[from] MalformedInputError),

    #[error("Failed to write report: {0}")]
    Output(#[from] std::io::Error),

    #[error("Failed to serialise report: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Input(_) => 3,
            Self::Output(_) | Self::Json(_) => 1,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("dnssec-health: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let config = build_config(&args)?;
    let policy = config.policy()?;
    let options = config.run_options()?;

    let set = if args.input.as_os_str() == "-" {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .map_err(|e| MalformedInputError::Io(e.to_string()))?;
        TransactionSet::from_json(&contents)?
    } else {
        TransactionSet::from_file(&args.input)?
    };
    info!("Loaded {} transactions", set.transactions.len());

    let report = analyze(&set, &policy, &options);
    let rendered = match args.format {
        OutputFormat::Text => report.render_text(),
        OutputFormat::Json => report.to_json()? + "\n",
    };

    match &args.output {
        Some(path) => std::fs::write(path, rendered)?,
        None => print!("{}", rendered),
    }
    Ok(())
}

/// Config file, then environment, then flags
fn build_config(args: &Args) -> Result<EngineConfig, ConfigError> {
    let base = match &args.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    let mut config = base.with_env()?;

    if !args.trusted_keys_files.is_empty() {
        config.trusted_keys_files = args.trusted_keys_files.clone();
    }
    if !args.algorithms.is_empty() {
        config.supported_algorithms = args.algorithms.clone();
    }
    if !args.digest_algorithms.is_empty() {
        config.supported_digests = args.digest_algorithms.clone();
    }
    if args.ignore_rfc8624 {
        config.enforce_rfc8624 = false;
    }
    if args.ignore_rfc9276 {
        config.enforce_rfc9276 = false;
    }
    if args.ignore_cookies {
        config.enforce_cookies = false;
    }
    if args.allow_private {
        config.allow_private_addresses = true;
    }
    if args.trust_cdnskey_cds {
        config.trust_all_cdnskey_cds = true;
    }
    if args.multi_signer {
        config.multi_signer = true;
    }
    if !args.names.is_empty() {
        config.name_filter = args.names.clone();
    }
    if !args.types.is_empty() {
        config.type_filter = args.types.clone();
    }
    if args.reference_time.is_some() {
        config.reference_time = args.reference_time;
    }
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    config.validate()?;
    Ok(config)
}
