// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cyan Operator Node
//!
//! Entry point for the `cyan-node` binary. Subcommands:
//!
//! - `run`     start the node: HTTP API, metrics, default sweep
//! - `quote`   price a set of terms
//! - `keygen`  generate a pricing keypair
//! - `sign`    sign a plan offer
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use cyan_contracts::authorization::sign_plan_authorization;
use cyan_contracts::engine::PlanEngineBuilder;
use cyan_contracts::schedule::expected_plan;
use cyan_contracts::services::{InMemoryAccessControl, InMemoryCustody, Role, StaticSignerRegistry};
use cyan_contracts::types::{AutoRepayStatus, Item, PlanId, PlanTerms};
use cyan_protocol::address::Address;
use cyan_protocol::config::{self, DEFAULT_SWEEP_INTERVAL, SIGNATURE_VALIDITY};
use cyan_protocol::crypto::keys::{PublicKey, SignerKeypair};

use cli::{Commands, CyanNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use store::PlanStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CyanNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Quote(args) => quote(args),
        Commands::Keygen(args) => keygen(args),
        Commands::Sign(args) => sign_offer(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn parse_domain(raw: &str) -> Result<u64> {
    config::parse_domain(raw).with_context(|| format!("unknown chain domain: {raw}"))
}

fn parse_addresses(raw: &[String]) -> Result<Vec<Address>> {
    raw.iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.trim()
                .parse::<Address>()
                .with_context(|| format!("invalid address: {s}"))
        })
        .collect()
}

/// Starts the node: restores the ledger, serves the API and metrics and
/// sweeps overdue plans into default.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "cyan_node=info,cyan_contracts=info,cyan_protocol=info,tower_http=debug",
        LogFormat::from(args.log_format),
    );

    let chain_domain_id = parse_domain(&args.chain_domain)?;
    let network = config::domain_name(chain_domain_id);
    tracing::info!(
        api_port = args.api_port,
        metrics_port = args.metrics_port,
        %network,
        data_dir = %args.data_dir.display(),
        "starting cyan-node"
    );

    // --- Collaborators ---
    let authority =
        PublicKey::from_hex(&args.signer_pubkey).context("invalid CYAN_SIGNER_PUBKEY")?;
    let access = Arc::new(InMemoryAccessControl::new());
    for who in parse_addresses(&args.funding_authorities)? {
        access.grant(who, Role::FundingAuthority);
    }
    for who in parse_addresses(&args.vault_managers)? {
        access.grant(who, Role::VaultManager);
    }
    let custody = Arc::new(InMemoryCustody::new());

    let engine = PlanEngineBuilder::new()
        .chain_domain(chain_domain_id)
        .custody(custody.clone())
        .access_control(access)
        .signer_registry(Arc::new(StaticSignerRegistry::new(authority)))
        .build()
        .context("failed to build plan engine")?;

    // --- Persistent storage ---
    std::fs::create_dir_all(&args.data_dir).with_context(|| {
        format!("failed to create data directory: {}", args.data_dir.display())
    })?;
    let store = PlanStore::open(&args.data_dir.join("ledger"))?;
    store.bind_domain(chain_domain_id)?;
    let restored = store.restore_into(&engine, &custody)?;
    tracing::info!(plans = restored, "ledger restored");

    // --- Application state ---
    let state = api::AppState::new(
        format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            config::PROTOCOL_VERSION,
        ),
        network,
        Arc::new(engine),
        store.clone(),
        Arc::new(NodeMetrics::new()),
    );
    state.refresh_gauges();

    // --- API server ---
    let api_router = api::create_router(state.clone());
    let api_addr = format!("0.0.0.0:{}", args.api_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&state.metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Default sweep ---
    let sweep_every = args
        .sweep_interval_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL);
    let sweep_state = state.clone();
    let sweep_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            match sweep_state.sweep() {
                Ok(flagged) if !flagged.is_empty() => {
                    tracing::info!(count = flagged.len(), plans = ?flagged, "plans defaulted by sweep");
                }
                Ok(_) => {}
                Err(e) => tracing::error!("default sweep failed: {}", e),
            }
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    sweep_loop.abort();
    store.flush().context("failed to flush ledger")?;
    tracing::info!("cyan-node stopped");
    Ok(())
}

/// Prints the schedule quote for the given terms as JSON.
fn quote(args: cli::QuoteArgs) -> Result<()> {
    let terms = PlanTerms {
        principal_amount: args.principal,
        down_payment_percent_bp: args.down_payment_bp,
        interest_rate_bp: args.interest_bp,
        service_fee_rate_bp: args.service_fee_bp,
        term_minutes: config::DEFAULT_TERM_MINUTES,
        total_installments: args.installments,
        paid_installments: u8::from(args.down_payment_bp > 0),
        auto_repay_status: AutoRepayStatus::Disabled,
    };
    let quote = expected_plan(&terms).context("terms cannot be priced")?;
    println!("{}", serde_json::to_string_pretty(&quote)?);
    Ok(())
}

/// Generates a pricing keypair and writes the secret key to a file.
fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keypair = SignerKeypair::generate();
    let key_path = &args.out;
    std::fs::write(key_path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write key to {}", key_path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    println!("Key file   : {}", key_path.display());
    println!("Public key : {}", keypair.public_key().to_hex());
    Ok(())
}

/// Offer file consumed by `sign`.
#[derive(Debug, Deserialize)]
struct OfferFile {
    plan_id: PlanId,
    item: Item,
    terms: PlanTerms,
}

/// Signs an offer file and prints the authorization as JSON.
fn sign_offer(args: cli::SignArgs) -> Result<()> {
    let secret = std::fs::read_to_string(&args.key_file)
        .with_context(|| format!("failed to read key file {}", args.key_file.display()))?;
    let keypair = SignerKeypair::from_hex(secret.trim()).context("invalid secret key")?;

    let raw = std::fs::read(&args.offer)
        .with_context(|| format!("failed to read offer {}", args.offer.display()))?;
    let offer: OfferFile = serde_json::from_slice(&raw).context("malformed offer file")?;

    let chain_domain_id = parse_domain(&args.chain_domain)?;
    let valid_for = args
        .valid_for_secs
        .unwrap_or(SIGNATURE_VALIDITY.as_secs());
    let now = u64::try_from(chrono::Utc::now().timestamp()).context("clock before epoch")?;
    let expiry = now.saturating_add(valid_for);

    let authorization = sign_plan_authorization(
        &keypair,
        &offer.item,
        &offer.terms,
        offer.plan_id,
        expiry,
        chain_domain_id,
    );
    println!("{}", serde_json::to_string_pretty(&authorization)?);
    Ok(())
}

fn print_version() {
    println!("cyan-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", config::PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
