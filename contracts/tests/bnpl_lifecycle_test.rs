//! End-to-end BNPL scenarios: create, fund, activate, pay to completion,
//! the rejection path, and default through liquidation.

mod common;

use chrono::Duration;
use common::{Harness, ETHER, TERM_MINUTES};
use cyan_contracts::engine::PlanEngine;
use cyan_contracts::error::PlanError;
use cyan_contracts::types::{PlanId, PlanStatus};
use cyan_contracts::vault::LiquidationOutcome;

const PLAN: u128 = 123_456;
const SINGLE_PAYMENT: u128 = 3_272_500_000_000_000_000;
const DOWN_PAYMENT: u128 = 2_777_500_000_000_000_000;

fn status(engine: &PlanEngine, plan_id: u128) -> PlanStatus {
    engine.get_plan_status(PlanId::new(plan_id)).unwrap()
}

#[test]
fn create_and_complete_bnpl_plan() {
    let h = Harness::new();
    let receipt = h.create_bnpl(PLAN, 1);
    assert_eq!(receipt.status, PlanStatus::Created);
    assert_eq!(receipt.charged, DOWN_PAYMENT);
    assert_eq!(receipt.quote.per_installment, SINGLE_PAYMENT);

    let first = h.engine.get_payment_info(PlanId::new(PLAN), false).unwrap();
    assert_eq!(first.as_tuple().3, SINGLE_PAYMENT);
    assert_eq!(status(&h.engine, PLAN), PlanStatus::Created);
    assert_eq!(h.engine.plan(PLAN.into()).unwrap().status_code(), 0);

    h.engine.fund(h.admin, PlanId::new(PLAN)).unwrap();
    assert_eq!(status(&h.engine, PLAN), PlanStatus::Funded);
    h.engine.activate(h.admin, PlanId::new(PLAN)).unwrap();
    assert_eq!(status(&h.engine, PLAN), PlanStatus::Active);
    assert_eq!(h.engine.plan(PLAN.into()).unwrap().status_code(), 2);

    for n in 2..=4u8 {
        let receipt = h.pay_next(PLAN);
        assert_eq!(receipt.charged, SINGLE_PAYMENT);
        assert_eq!(receipt.paid_installments, n);
        h.assert_vault_balanced();
    }

    let plan = h.engine.plan(PlanId::new(PLAN)).unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.status_code(), 5);
    assert_eq!(plan.ledger.principal_repaid, 8_250_000_000_000_000_000);
    assert_eq!(plan.ledger.principal_written_off, 0);
    assert_eq!(h.custody.released_to(&h.item(1)), Some(h.user));
}

#[test]
fn vault_accounting_through_a_full_plan() {
    let h = Harness::new();
    h.active_bnpl(PLAN, 1);

    let vault = h.engine.vault(h.vault).unwrap();
    assert_eq!(vault.principal_outstanding, 8_250_000_000_000_000_000);
    // Service-fee slice of the down payment.
    assert_eq!(vault.protocol_fees, 27_500_000_000_000_000);

    for _ in 0..3 {
        h.pay_next(PLAN);
    }

    let vault = h.engine.vault(h.vault).unwrap();
    assert_eq!(vault.principal_outstanding, 0);
    assert_eq!(vault.safety_fund, 3 * 99_000_000_000_000_000);
    assert_eq!(vault.accrued_service_fee, 3 * 1_485_000_000_000_000);
    assert_eq!(vault.protocol_fees, 4 * 27_500_000_000_000_000);
    assert_eq!(vault.total_deposited, 100 * ETHER + 3 * 394_515_000_000_000_000);
    assert!(vault.is_balanced());

    let fees = h.engine.collect_fees(h.manager, h.vault).unwrap();
    assert_eq!(fees.protocol_fees, 110_000_000_000_000_000);
    h.assert_vault_balanced();
}

#[test]
fn down_payment_overpayment_returns_change() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::bnpl_terms();
    let auth = h.sign(&item, &terms, PlanId::new(PLAN));
    let receipt = h
        .engine
        .create_bnpl(h.user, item, terms, PlanId::new(PLAN), &auth, DOWN_PAYMENT + 5)
        .unwrap();
    assert_eq!(receipt.charged, DOWN_PAYMENT);
    assert_eq!(receipt.change, 5);
}

#[test]
fn short_down_payment_refused_without_side_effects() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::bnpl_terms();
    let auth = h.sign(&item, &terms, PlanId::new(PLAN));
    let err = h
        .engine
        .create_bnpl(h.user, item.clone(), terms, PlanId::new(PLAN), &auth, DOWN_PAYMENT - 1)
        .unwrap_err();
    assert_eq!(
        err,
        PlanError::InsufficientPayment {
            required: DOWN_PAYMENT,
            offered: DOWN_PAYMENT - 1
        }
    );
    assert!(matches!(
        h.engine.plan(PlanId::new(PLAN)),
        Err(PlanError::PlanNotFound(_))
    ));
    assert!(!h.custody.is_held(&item));
}

#[test]
fn rejected_plan_refunds_and_releases_item() {
    let h = Harness::new();
    h.create_bnpl(PLAN, 1);
    let refund = h.engine.reject(h.admin, PlanId::new(PLAN)).unwrap();
    assert_eq!(refund, DOWN_PAYMENT);

    let plan = h.engine.plan(PlanId::new(PLAN)).unwrap();
    assert_eq!(plan.status, PlanStatus::Rejected);
    assert_eq!(plan.status_code(), 4);
    assert_eq!(plan.ledger.down_payment_held, 0);
    assert!(plan.closed_at.is_some());
    assert_eq!(h.custody.released_to(&h.item(1)), Some(h.user));

    let vault = h.engine.vault(h.vault).unwrap();
    assert_eq!(vault.principal_outstanding, 0);
    assert_eq!(vault.protocol_fees, 0);
}

#[test]
fn early_payoff_completes_in_one_payment() {
    let h = Harness::new();
    h.active_bnpl(PLAN, 1);
    h.pay_next(PLAN);

    let quote = h.engine.get_payment_info(PlanId::new(PLAN), true).unwrap();
    assert_eq!(quote.remaining_installments, 2);
    assert_eq!(quote.principal, 2 * 2_750_000_000_000_000_000);
    assert_eq!(quote.interest_fee, 495_000_000_000_000_000);
    assert_eq!(quote.service_fee, 2 * 27_500_000_000_000_000);

    let receipt = h
        .engine
        .pay(PlanId::new(PLAN), h.user, quote.current_payment + 1, true)
        .unwrap();
    assert_eq!(receipt.status, PlanStatus::Completed);
    assert_eq!(receipt.paid_installments, 4);
    assert_eq!(receipt.change, 1);
    h.assert_vault_balanced();
    assert_eq!(h.engine.vault(h.vault).unwrap().principal_outstanding, 0);
}

#[test]
fn funding_needs_lendable_liquidity() {
    // 10 units deposited, 8 lendable after the 20% reserve; the plan needs 8.25.
    let h = Harness::with_deposit(10 * ETHER);
    h.create_bnpl(PLAN, 1);
    let err = h.engine.fund(h.admin, PlanId::new(PLAN)).unwrap_err();
    assert!(matches!(err, PlanError::Vault(_)));
    assert_eq!(status(&h.engine, PLAN), PlanStatus::Created);
    h.assert_vault_balanced();
}

#[test]
fn missed_installment_defaults_and_liquidates_with_shortfall() {
    let h = Harness::new();
    h.active_bnpl(PLAN, 1);
    h.pay_next(PLAN);

    // Financed 8.25, one principal slice of 2.75 repaid.
    let vault = h.engine.vault(h.vault).unwrap();
    assert_eq!(vault.principal_outstanding, 5_500_000_000_000_000_000);
    assert_eq!(vault.safety_fund, 99_000_000_000_000_000);
    let deposited = vault.total_deposited;

    h.clock
        .advance(Duration::minutes(i64::from(TERM_MINUTES) + 1));
    assert_eq!(h.engine.sweep_defaults(), vec![PlanId::new(PLAN)]);
    assert_eq!(status(&h.engine, PLAN), PlanStatus::Defaulted);
    assert_eq!(h.engine.plan(PLAN.into()).unwrap().status_code(), 3);

    let receipt = h
        .engine
        .liquidate(h.admin, PlanId::new(PLAN), 5 * ETHER)
        .unwrap();
    // Shortfall of 0.5: the safety fund covers 0.099, LPs the rest.
    assert_eq!(
        receipt.outcome,
        LiquidationOutcome {
            recovered: 5 * ETHER,
            absorbed_by_safety_fund: 99_000_000_000_000_000,
            absorbed_by_lps: 401_000_000_000_000_000,
            surplus: 0,
        }
    );

    let plan = h.engine.plan(PlanId::new(PLAN)).unwrap();
    assert_eq!(plan.status, PlanStatus::Liquidated);
    assert_eq!(plan.status_code(), 6);
    assert_eq!(plan.ledger.liquidation_proceeds, 5 * ETHER);
    assert_eq!(h.custody.released_to(&h.item(1)), Some(h.admin));

    let vault = h.engine.vault(h.vault).unwrap();
    assert_eq!(vault.principal_outstanding, 0);
    assert_eq!(vault.safety_fund, 0);
    assert_eq!(vault.total_deposited, deposited - 401_000_000_000_000_000);
    assert!(vault.is_balanced());
}
