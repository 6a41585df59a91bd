//! Plan transitions: creation, funding, payment, default and liquidation.

use chrono::{DateTime, Utc};
use cyan_protocol::address::Address;
use cyan_protocol::math::{checked_add, checked_sub};
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    require_status, CreationReceipt, LiquidationReceipt, PaymentReceipt, PlanEngine,
};
use crate::authorization::{verify_plan_authorization, AuthorizationSignature};
use crate::error::{PlanError, PlanResult};
use crate::schedule::{breakdown, expected_plan, installment_due, validate_bnpl, validate_pawn};
use crate::services::Role;
use crate::types::{AutoRepayStatus, Item, Plan, PlanId, PlanKind, PlanLedger, PlanStatus, PlanTerms};

impl PlanEngine {
    fn authorize(
        &self,
        item: &Item,
        terms: &PlanTerms,
        plan_id: PlanId,
        auth: &AuthorizationSignature,
    ) -> PlanResult<()> {
        let authority = self.ctx.signers.current_authority();
        verify_plan_authorization(
            &authority,
            item,
            terms,
            plan_id,
            auth,
            self.config.chain_domain_id,
            self.now(),
        )?;
        Ok(())
    }

    fn new_plan(
        plan_id: PlanId,
        kind: PlanKind,
        item: Item,
        terms: PlanTerms,
        owner: Address,
        status: PlanStatus,
        now: DateTime<Utc>,
    ) -> Plan {
        Plan {
            plan_id,
            kind,
            item,
            terms,
            owner,
            status,
            created_at: now,
            funded_at: None,
            activated_at: None,
            last_payment_at: None,
            closed_at: None,
            ledger: PlanLedger::default(),
        }
    }

    // -- BNPL ---------------------------------------------------------------

    /// Open a BNPL plan. The buyer pays the down payment now; anything
    /// offered above it comes back as change.
    pub fn create_bnpl(
        &self,
        caller: Address,
        item: Item,
        terms: PlanTerms,
        plan_id: PlanId,
        auth: &AuthorizationSignature,
        down_payment: u128,
    ) -> PlanResult<CreationReceipt> {
        let _commit = self.commit_guard();
        validate_bnpl(&terms)?;
        let quote = expected_plan(&terms)?;
        self.authorize(&item, &terms, plan_id, auth)?;

        let slot = match self.plans.entry(plan_id) {
            Entry::Occupied(_) => return Err(PlanError::DuplicatePlan(plan_id)),
            Entry::Vacant(slot) => slot,
        };
        self.vault_handle(item.vault_address)?;

        if down_payment < quote.down_payment_due {
            return Err(PlanError::InsufficientPayment {
                required: quote.down_payment_due,
                offered: down_payment,
            });
        }
        let change = down_payment - quote.down_payment_due;

        let now = self.now();
        let mut plan = Self::new_plan(
            plan_id,
            PlanKind::Bnpl,
            item,
            terms,
            caller,
            PlanStatus::Created,
            now,
        );
        plan.ledger.down_payment_paid = quote.down_payment_due;
        plan.ledger.down_payment_held = quote.down_payment_due;

        self.ctx.custody.transfer_in(&plan.item, caller)?;
        slot.insert(Arc::new(RwLock::new(plan)));

        info!(
            %plan_id,
            owner = %caller,
            down_payment = quote.down_payment_due,
            per_installment = quote.per_installment,
            "BNPL plan created"
        );
        Ok(CreationReceipt {
            plan_id,
            status: PlanStatus::Created,
            quote,
            charged: quote.down_payment_due,
            change,
            advanced: 0,
        })
    }

    /// Advance the financed amount from the plan's vault.
    pub fn fund(&self, caller: Address, plan_id: PlanId) -> PlanResult<()> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::FundingAuthority)?;
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        require_status(&plan, &[PlanStatus::Created], "fund")?;

        let financed = breakdown(&plan.terms)?.financed_amount;
        let vault_handle = self.vault_handle(plan.item.vault_address)?;
        let mut vault = vault_handle.lock();

        let mut next_vault = vault.clone();
        next_vault.advance(financed)?;

        let mut next = plan.clone();
        next.status = PlanStatus::Funded;
        next.funded_at = Some(self.now());
        next.ledger.principal_advanced = financed;

        *vault = next_vault;
        *plan = next;
        info!(%plan_id, financed, vault = %plan.item.vault_address, "plan funded");
        Ok(())
    }

    /// Start the installment clock. The down payment's service-fee slice
    /// goes to the vault; the rest is released to the seller.
    pub fn activate(&self, caller: Address, plan_id: PlanId) -> PlanResult<()> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::FundingAuthority)?;
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        require_status(&plan, &[PlanStatus::Funded], "activate")?;

        let fee = breakdown(&plan.terms)?.single_service_fee;
        let vault_handle = self.vault_handle(plan.item.vault_address)?;
        let mut vault = vault_handle.lock();

        let mut next_vault = vault.clone();
        next_vault.receive_down_payment_fee(fee)?;

        let mut next = plan.clone();
        next.status = PlanStatus::Active;
        next.activated_at = Some(self.now());
        next.ledger.service_fee_paid = checked_add(next.ledger.service_fee_paid, fee)?;
        next.ledger.down_payment_held = 0;

        *vault = next_vault;
        *plan = next;
        info!(%plan_id, due = ?plan.due_date(), "plan activated");
        Ok(())
    }

    /// Decline a plan before funding. Returns the refunded down payment.
    pub fn reject(&self, caller: Address, plan_id: PlanId) -> PlanResult<u128> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::FundingAuthority)?;
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        require_status(&plan, &[PlanStatus::Created], "reject")?;

        let refund = plan.ledger.down_payment_held;
        let mut next = plan.clone();
        next.status = PlanStatus::Rejected;
        next.closed_at = Some(self.now());
        next.ledger.down_payment_held = 0;

        self.ctx.custody.transfer_out(&next.item, next.owner)?;
        *plan = next;
        info!(%plan_id, refund, "plan rejected");
        Ok(refund)
    }

    // -- Pawn ---------------------------------------------------------------

    /// Open a pawn loan: the item goes into custody and the vault advances
    /// the full principal straight away.
    pub fn create_pawn(
        &self,
        caller: Address,
        item: Item,
        terms: PlanTerms,
        plan_id: PlanId,
        auth: &AuthorizationSignature,
    ) -> PlanResult<CreationReceipt> {
        let _commit = self.commit_guard();
        validate_pawn(&terms)?;
        let quote = expected_plan(&terms)?;
        let principal = terms.principal_amount;
        self.authorize(&item, &terms, plan_id, auth)?;

        let slot = match self.plans.entry(plan_id) {
            Entry::Occupied(_) => return Err(PlanError::DuplicatePlan(plan_id)),
            Entry::Vacant(slot) => slot,
        };
        let vault_handle = self.vault_handle(item.vault_address)?;
        let mut vault = vault_handle.lock();

        let mut next_vault = vault.clone();
        next_vault.advance(principal)?;

        let now = self.now();
        let mut plan = Self::new_plan(
            plan_id,
            PlanKind::Pawn,
            item,
            terms,
            caller,
            PlanStatus::Active,
            now,
        );
        plan.activated_at = Some(now);
        plan.ledger.principal_advanced = principal;

        self.ctx.custody.transfer_in(&plan.item, caller)?;
        *vault = next_vault;
        slot.insert(Arc::new(RwLock::new(plan)));

        info!(%plan_id, owner = %caller, principal, "pawn plan created");
        Ok(CreationReceipt {
            plan_id,
            status: PlanStatus::Active,
            quote,
            charged: 0,
            change: 0,
            advanced: principal,
        })
    }

    // -- Repayment ----------------------------------------------------------

    /// Pay the next installment, or with `early` every remaining one.
    /// Anyone may pay; overpayment is returned as change.
    pub fn pay(
        &self,
        plan_id: PlanId,
        payer: Address,
        amount: u128,
        early: bool,
    ) -> PlanResult<PaymentReceipt> {
        let _commit = self.commit_guard();
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        require_status(&plan, &[PlanStatus::Active], "pay")?;

        let now = self.now();
        if let Some(due) = plan.due_date() {
            if now > due {
                return Err(PlanError::PaymentOverdue { plan_id, due });
            }
        }

        let due = installment_due(&plan.terms, early)?;
        if amount < due.total {
            return Err(PlanError::InsufficientPayment {
                required: due.total,
                offered: amount,
            });
        }

        let vault_handle = self.vault_handle(plan.item.vault_address)?;
        let mut vault = vault_handle.lock();
        let mut next_vault = vault.clone();
        let split = next_vault.receive_repayment(due.principal, due.interest_fee, due.service_fee)?;

        let mut next = plan.clone();
        next.terms.paid_installments = next
            .terms
            .paid_installments
            .checked_add(due.installments)
            .ok_or(PlanError::Overflow)?;
        next.last_payment_at = Some(now);
        next.ledger.principal_repaid = checked_add(next.ledger.principal_repaid, due.principal)?;
        next.ledger.interest_paid = checked_add(next.ledger.interest_paid, due.interest_fee)?;
        next.ledger.service_fee_paid = checked_add(next.ledger.service_fee_paid, due.service_fee)?;

        let mut written_off = 0;
        if next.terms.remaining_installments() == 0 {
            written_off = checked_sub(next.ledger.principal_advanced, next.ledger.principal_repaid)?;
            next_vault.write_off(written_off)?;
            next.ledger.principal_written_off = written_off;
            next.status = PlanStatus::Completed;
            next.closed_at = Some(now);
            self.ctx.custody.transfer_out(&next.item, next.owner)?;
        }

        *vault = next_vault;
        *plan = next;

        info!(
            %plan_id,
            %payer,
            charged = due.total,
            paid = plan.terms.paid_installments,
            total = plan.terms.total_installments,
            status = %plan.status,
            "installment paid"
        );
        Ok(PaymentReceipt {
            plan_id,
            status: plan.status,
            paid_installments: plan.terms.paid_installments,
            charged: due.total,
            change: amount - due.total,
            split,
            written_off,
        })
    }

    /// Flag an active plan whose due date has passed. Anyone may call this.
    pub fn mark_defaulted(&self, plan_id: PlanId) -> PlanResult<()> {
        let _commit = self.commit_guard();
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        require_status(&plan, &[PlanStatus::Active], "default")?;

        let now = self.now();
        let due = plan.due_date().ok_or(PlanError::PreconditionViolation {
            plan_id,
            status: plan.status,
            action: "default",
        })?;
        if now <= due {
            return Err(PlanError::NotYetDue { plan_id, due });
        }

        plan.status = PlanStatus::Defaulted;
        info!(%plan_id, %due, "plan defaulted");
        Ok(())
    }

    /// Default every active plan that is past due. Returns the ids flagged.
    pub fn sweep_defaults(&self) -> Vec<PlanId> {
        let now = self.now();
        let candidates: Vec<PlanId> = self
            .plan_handles()
            .into_iter()
            .filter_map(|h| {
                let plan = h.read();
                plan.is_past_due(now).then_some(plan.plan_id)
            })
            .collect();

        let mut flagged: Vec<PlanId> = candidates
            .into_iter()
            .filter(|id| match self.mark_defaulted(*id) {
                Ok(()) => true,
                Err(e) => {
                    debug!(plan_id = %id, error = %e, "sweep skipped plan");
                    false
                }
            })
            .collect();
        flagged.sort();
        debug!(count = flagged.len(), "default sweep finished");
        flagged
    }

    /// Sell defaulted collateral: the item goes to `caller`, who supplies
    /// the sale `proceeds` to the vault.
    pub fn liquidate(
        &self,
        caller: Address,
        plan_id: PlanId,
        proceeds: u128,
    ) -> PlanResult<LiquidationReceipt> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::FundingAuthority)?;
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        require_status(&plan, &[PlanStatus::Defaulted], "liquidate")?;

        let vault_handle = self.vault_handle(plan.item.vault_address)?;
        let mut vault = vault_handle.lock();
        let mut next_vault = vault.clone();
        let outstanding = plan.ledger.outstanding_principal();
        let outcome = next_vault.credit_liquidation(outstanding, proceeds)?;

        let mut next = plan.clone();
        next.status = PlanStatus::Liquidated;
        next.closed_at = Some(self.now());
        next.ledger.liquidation_proceeds = proceeds;

        self.ctx.custody.transfer_out(&next.item, caller)?;
        *vault = next_vault;
        *plan = next;

        info!(
            %plan_id,
            outstanding,
            proceeds,
            safety_fund_loss = outcome.absorbed_by_safety_fund,
            lp_loss = outcome.absorbed_by_lps,
            "plan liquidated"
        );
        Ok(LiquidationReceipt {
            plan_id,
            proceeds,
            outcome,
        })
    }

    // -- Preferences --------------------------------------------------------

    /// Owner-only. Allowed on any plan that hasn't closed.
    pub fn set_auto_repay_status(
        &self,
        plan_id: PlanId,
        caller: Address,
        status: AutoRepayStatus,
    ) -> PlanResult<()> {
        let _commit = self.commit_guard();
        let handle = self.plan_handle(plan_id)?;
        let mut plan = handle.write();
        if plan.owner != caller {
            return Err(PlanError::NotPlanOwner {
                plan_id,
                owner: plan.owner,
                caller,
            });
        }
        require_status(
            &plan,
            &[
                PlanStatus::Created,
                PlanStatus::Funded,
                PlanStatus::Active,
                PlanStatus::Defaulted,
            ],
            "change auto-repay on",
        )?;
        plan.terms.auto_repay_status = status;
        debug!(%plan_id, ?status, "auto-repay preference updated");
        Ok(())
    }
}
