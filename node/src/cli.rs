//! # CLI Interface
//!
//! Command-line structure for `cyan-node`, built with `clap` derive. Every
//! runtime setting of `run` can also come from a `CYAN_*` environment
//! variable.

use clap::{Parser, Subcommand, ValueEnum};
use cyan_protocol::config::{DEFAULT_API_PORT, DEFAULT_METRICS_PORT};
use std::path::PathBuf;

/// Cyan payment plans operator node.
///
/// Hosts the plan engine behind an HTTP API, persists plans and vaults,
/// sweeps overdue plans into default and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "cyan-node",
    about = "Cyan payment plans operator node",
    version,
    propagate_version = true
)]
pub struct CyanNodeCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Price a set of terms and print the schedule quote.
    Quote(QuoteArgs),
    /// Generate a pricing keypair and write the secret to a key file.
    Keygen(KeygenArgs),
    /// Sign a plan offer with a pricing key.
    Sign(SignArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the ledger database. Created on first run.
    #[arg(long, short = 'd', env = "CYAN_DATA_DIR", default_value = "./cyan-data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "CYAN_API_PORT", default_value_t = DEFAULT_API_PORT)]
    pub api_port: u16,

    #[arg(long, env = "CYAN_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Deployment domain: mainnet, testnet, devnet or a numeric id.
    #[arg(long, env = "CYAN_CHAIN_DOMAIN", default_value = "devnet")]
    pub chain_domain: String,

    /// Hex-encoded Ed25519 public key of the pricing service.
    #[arg(long, env = "CYAN_SIGNER_PUBKEY")]
    pub signer_pubkey: String,

    /// Addresses allowed to fund, activate, reject and liquidate plans.
    #[arg(long, env = "CYAN_FUNDING_AUTHORITIES", value_delimiter = ',')]
    pub funding_authorities: Vec<String>,

    /// Addresses allowed to open vaults, withdraw and collect fees.
    #[arg(long, env = "CYAN_VAULT_MANAGERS", value_delimiter = ',')]
    pub vault_managers: Vec<String>,

    /// Seconds between default sweeps.
    #[arg(long, env = "CYAN_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: Option<u64>,

    #[arg(long, env = "CYAN_LOG_FORMAT", value_enum, default_value_t = LogFormatArg::Pretty)]
    pub log_format: LogFormatArg,
}

#[derive(Parser, Debug)]
pub struct QuoteArgs {
    /// Principal in the smallest currency unit.
    #[arg(long)]
    pub principal: u128,

    #[arg(long, default_value_t = 0)]
    pub down_payment_bp: u32,

    #[arg(long)]
    pub interest_bp: u32,

    #[arg(long, default_value_t = cyan_protocol::config::DEFAULT_PLAN_SERVICE_FEE_RATE_BP)]
    pub service_fee_bp: u32,

    #[arg(long)]
    pub installments: u8,
}

#[derive(Parser, Debug)]
pub struct KeygenArgs {
    /// Where to write the hex-encoded secret key.
    #[arg(long, short = 'o', default_value = "pricing.key")]
    pub out: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SignArgs {
    /// File holding the hex-encoded secret key.
    #[arg(long, short = 'k')]
    pub key_file: PathBuf,

    /// JSON file with `item`, `terms` and `plan_id`.
    #[arg(long)]
    pub offer: PathBuf,

    #[arg(long, env = "CYAN_CHAIN_DOMAIN", default_value = "devnet")]
    pub chain_domain: String,

    /// Seconds the signature stays valid. Defaults to one day.
    #[arg(long)]
    pub valid_for_secs: Option<u64>,
}
