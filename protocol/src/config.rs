//! # Protocol Configuration & Constants
//!
//! Every magic number lives here. Fee splits, domain identifiers and timing
//! windows are consensus between the off-chain pricing service and the
//! engine: change one side without the other and every signature stops
//! verifying.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Chain Domain Identifiers
// ---------------------------------------------------------------------------

/// Mainnet deployment domain. Signatures carry this value so an offer priced
/// for one deployment can never be replayed against another.
pub const CHAIN_DOMAIN_MAINNET: u64 = 1;

/// Testnet deployment domain.
pub const CHAIN_DOMAIN_TESTNET: u64 = 11_155_111;

/// Local development domain. Matches the id the legacy hardhat harness used.
pub const CHAIN_DOMAIN_DEVNET: u64 = 31_337;

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

/// Basis-point denominator. 1 bp = 0.01%, so 10_000 bp = 100%.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Largest rate accepted anywhere in the protocol.
pub const MAX_BPS: u32 = 10_000;

// ---------------------------------------------------------------------------
// Vault Defaults
// ---------------------------------------------------------------------------

/// Share of vault deposits held back from lending, and share of interest set
/// aside to absorb defaults. 20%.
pub const DEFAULT_SAFETY_FUND_PERCENT_BP: u32 = 2_000;

/// Share of interest the vault operator keeps. 0.3%.
pub const DEFAULT_VAULT_SERVICE_FEE_PERCENT_BP: u32 = 30;

/// Plan-level service fee charged on principal when the pricing service
/// doesn't quote one. 1%.
pub const DEFAULT_PLAN_SERVICE_FEE_RATE_BP: u32 = 100;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long a freshly priced offer stays signable. One day.
pub const SIGNATURE_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// Default installment period: 31 days, in minutes.
pub const DEFAULT_TERM_MINUTES: u32 = 31 * 24 * 60;

/// How often the node looks for plans past their due date.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// `total_installments` is packed as a uint8, so the schedule can never be
/// longer than this.
pub const MAX_INSTALLMENTS: u8 = u8::MAX;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Default HTTP API port.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Crate version, surfaced by the node's `version` command.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns a friendly name for a chain domain id, mainly for logging.
pub fn domain_name(chain_domain_id: u64) -> String {
    match chain_domain_id {
        CHAIN_DOMAIN_MAINNET => "mainnet".to_string(),
        CHAIN_DOMAIN_TESTNET => "testnet".to_string(),
        CHAIN_DOMAIN_DEVNET => "devnet".to_string(),
        other => format!("custom({})", other),
    }
}

/// Parses a network name or a raw numeric domain id.
pub fn parse_domain(s: &str) -> Option<u64> {
    match s.to_lowercase().as_str() {
        "mainnet" => Some(CHAIN_DOMAIN_MAINNET),
        "testnet" => Some(CHAIN_DOMAIN_TESTNET),
        "devnet" => Some(CHAIN_DOMAIN_DEVNET),
        other => other.parse().ok(),
    }
}
