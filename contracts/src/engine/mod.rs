//! # Plan Lifecycle Engine
//!
//! Owns every plan and vault and applies the lifecycle transitions:
//!
//! ```text
//!            fund            activate          pay (last)
//! CREATED ─────────► FUNDED ─────────► ACTIVE ───────────► COMPLETED
//!    │                                  │  ▲ pay
//!    │ reject                           │  └──┘
//!    ▼                                  │ mark_defaulted
//! REJECTED                              ▼
//!                                   DEFAULTED ──liquidate──► LIQUIDATED
//!
//! create_pawn ──► ACTIVE
//! ```
//!
//! ## Concurrency
//!
//! Each plan sits behind its own `RwLock` and each vault behind its own
//! `Mutex`, both in `DashMap` registries. Writers take the plan lock before
//! the vault lock. Creation holds the plan-id map entry until the plan is
//! inserted, so two creations racing on one id can't both succeed.
//!
//! ## Atomicity
//!
//! An operation works on clones of the plan and vault, calls custody last,
//! and writes the clones back only once everything has succeeded. A refused
//! transition or a custody failure leaves no trace.
//!
//! Every write also holds the commit gate in shared mode. Snapshots and
//! restores take it exclusively, so a snapshot never pairs a plan from
//! before a commit with a vault from after it.

mod builder;
mod lifecycle;
mod vaults;

pub use builder::{BuildError, PlanEngineBuilder};

use chrono::{DateTime, Utc};
use cyan_protocol::address::Address;
use cyan_protocol::config::CHAIN_DOMAIN_DEVNET;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::authorization::{CollectionEntry, CollectionRegistry};
use crate::error::{PlanError, PlanResult};
use crate::schedule::{installment_due, ScheduleQuote};
use crate::services::{AccessControl, Clock, CustodyService, SignerRegistry};
use crate::types::{Plan, PlanId, PlanStatus};
use crate::vault::{LiquidationOutcome, RepaymentSplit, VaultAccount};

// ---------------------------------------------------------------------------
// Configuration & context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bound into every authorization digest.
    pub chain_domain_id: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_domain_id: CHAIN_DOMAIN_DEVNET,
        }
    }
}

/// The engine's collaborators.
#[derive(Clone)]
pub struct EngineContext {
    pub custody: Arc<dyn CustodyService>,
    pub access: Arc<dyn AccessControl>,
    pub signers: Arc<dyn SignerRegistry>,
    pub clock: Arc<dyn Clock>,
}

/// Owned copy of every record the engine holds. Serializable so it can be
/// persisted or handed to a snapshot stack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub plans: Vec<Plan>,
    pub vaults: Vec<VaultAccount>,
    pub collections: Vec<CollectionEntry>,
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Result of `create_bnpl` / `create_pawn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreationReceipt {
    pub plan_id: PlanId,
    pub status: PlanStatus,
    pub quote: ScheduleQuote,
    /// Down payment kept by the plan. Zero for pawn.
    pub charged: u128,
    /// Excess of the offered down payment, returned to the caller.
    pub change: u128,
    /// Principal sent to the borrower. Zero for BNPL until funding.
    pub advanced: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub plan_id: PlanId,
    pub status: PlanStatus,
    pub paid_installments: u8,
    pub charged: u128,
    pub change: u128,
    pub split: RepaymentSplit,
    /// Truncation residual written off on completion.
    pub written_off: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationReceipt {
    pub plan_id: PlanId,
    pub proceeds: u128,
    pub outcome: LiquidationOutcome,
}

/// The next payment on a plan, recomputed from its current terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub principal: u128,
    pub interest_fee: u128,
    pub service_fee: u128,
    /// What the payer owes now.
    pub current_payment: u128,
    pub due_date: Option<DateTime<Utc>>,
    pub remaining_installments: u8,
    pub early: bool,
}

impl PaymentInfo {
    /// `(principal, interestFee, serviceFee, currentPayment, dueDate)`.
    pub fn as_tuple(&self) -> (u128, u128, u128, u128, Option<DateTime<Utc>>) {
        (
            self.principal,
            self.interest_fee,
            self.service_fee,
            self.current_payment,
            self.due_date,
        )
    }
}

// ---------------------------------------------------------------------------
// PlanEngine
// ---------------------------------------------------------------------------

pub struct PlanEngine {
    config: EngineConfig,
    ctx: EngineContext,
    plans: DashMap<PlanId, Arc<RwLock<Plan>>>,
    vaults: DashMap<Address, Arc<Mutex<VaultAccount>>>,
    collections: RwLock<CollectionRegistry>,
    /// Shared by writers, exclusive for snapshot and restore. Taken before
    /// any plan or vault lock and never nested.
    commit_gate: RwLock<()>,
}

impl PlanEngine {
    pub(crate) fn from_parts(config: EngineConfig, ctx: EngineContext) -> Self {
        Self {
            config,
            ctx,
            plans: DashMap::new(),
            vaults: DashMap::new(),
            collections: RwLock::new(CollectionRegistry::new()),
            commit_gate: RwLock::new(()),
        }
    }

    pub fn builder() -> PlanEngineBuilder {
        PlanEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ctx.clock.now()
    }

    // -- Reads --------------------------------------------------------------

    pub fn get_plan_status(&self, plan_id: PlanId) -> PlanResult<PlanStatus> {
        Ok(self.plan_handle(plan_id)?.read().status)
    }

    pub fn plan(&self, plan_id: PlanId) -> PlanResult<Plan> {
        Ok(self.plan_handle(plan_id)?.read().clone())
    }

    /// Every plan, ordered by id.
    pub fn plans(&self) -> Vec<Plan> {
        let mut out: Vec<Plan> = self
            .plan_handles()
            .into_iter()
            .map(|h| h.read().clone())
            .collect();
        out.sort_by_key(|p| p.plan_id);
        out
    }

    pub fn plan_count(&self) -> usize {
        self.plans.len()
    }

    /// Next payment on a plan that is created, funded or active.
    pub fn get_payment_info(&self, plan_id: PlanId, early: bool) -> PlanResult<PaymentInfo> {
        let handle = self.plan_handle(plan_id)?;
        let plan = handle.read();
        require_status(
            &plan,
            &[PlanStatus::Created, PlanStatus::Funded, PlanStatus::Active],
            "quote payment for",
        )?;
        let due = installment_due(&plan.terms, early)?;
        Ok(PaymentInfo {
            principal: due.principal,
            interest_fee: due.interest_fee,
            service_fee: due.service_fee,
            current_payment: due.total,
            due_date: plan.due_date(),
            remaining_installments: plan.terms.remaining_installments(),
            early,
        })
    }

    // -- Snapshots ----------------------------------------------------------

    /// Copy of every plan, vault and enabled collection, taken between
    /// commits.
    pub fn snapshot(&self) -> EngineSnapshot {
        let _quiesced = self.commit_gate.write();
        let mut vaults: Vec<VaultAccount> = self
            .vault_handles()
            .into_iter()
            .map(|h| h.lock().clone())
            .collect();
        vaults.sort_by_key(|v| v.address);
        EngineSnapshot {
            plans: self.plans(),
            vaults,
            collections: self.collections.read().entries(),
        }
    }

    /// Replace all state with `snapshot`. Waits for in-flight writes.
    pub fn restore(&self, snapshot: EngineSnapshot) {
        let _quiesced = self.commit_gate.write();
        self.plans.clear();
        self.vaults.clear();
        for plan in snapshot.plans {
            self.plans.insert(plan.plan_id, Arc::new(RwLock::new(plan)));
        }
        for vault in snapshot.vaults {
            self.vaults.insert(vault.address, Arc::new(Mutex::new(vault)));
        }
        *self.collections.write() = CollectionRegistry::from_entries(snapshot.collections);
    }

    // -- Internals ----------------------------------------------------------

    fn commit_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate.read()
    }

    fn plan_handle(&self, plan_id: PlanId) -> PlanResult<Arc<RwLock<Plan>>> {
        self.plans
            .get(&plan_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PlanError::PlanNotFound(plan_id))
    }

    fn vault_handle(&self, address: Address) -> PlanResult<Arc<Mutex<VaultAccount>>> {
        self.vaults
            .get(&address)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(PlanError::VaultNotFound(address))
    }

    /// Handles cloned out of the map so no shard lock is held while the
    /// caller locks individual plans.
    fn plan_handles(&self) -> Vec<Arc<RwLock<Plan>>> {
        self.plans.iter().map(|e| Arc::clone(e.value())).collect()
    }

    fn vault_handles(&self) -> Vec<Arc<Mutex<VaultAccount>>> {
        self.vaults.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

fn require_status(plan: &Plan, allowed: &[PlanStatus], action: &'static str) -> PlanResult<()> {
    if allowed.contains(&plan.status) {
        return Ok(());
    }
    warn!(
        plan_id = %plan.plan_id,
        status = %plan.status,
        action,
        "refused transition"
    );
    Err(PlanError::PreconditionViolation {
        plan_id: plan.plan_id,
        status: plan.status,
        action,
    })
}
