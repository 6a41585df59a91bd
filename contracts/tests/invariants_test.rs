//! Cross-cutting guarantees: all-or-nothing operations, vault balance,
//! concurrent access, snapshots and persistence.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::{Harness, ETHER};
use cyan_contracts::error::PlanError;
use cyan_contracts::services::CustodyError;
use cyan_contracts::types::{Plan, PlanId, PlanStatus};
use cyan_contracts::vault::VaultAccount;
use cyan_protocol::storage::{LedgerDb, SnapshotStack};
use cyan_protocol::uint::U256;

#[test]
fn custody_failure_leaves_no_trace() {
    let h = Harness::new();
    h.create_pawn(1, 7);
    let vault_before = h.engine.vault(h.vault).unwrap();

    // Same item again: custody refuses after the vault advance was staged.
    let item = h.item(7);
    let terms = Harness::pawn_terms();
    let auth = h.sign(&item, &terms, PlanId::new(2));
    let err = h
        .engine
        .create_pawn(h.user, item, terms, PlanId::new(2), &auth)
        .unwrap_err();

    assert_eq!(
        err,
        PlanError::Custody(CustodyError::AlreadyHeld {
            asset_contract: h.nft,
            asset_id: U256::from(7u64),
        })
    );
    assert_eq!(h.engine.vault(h.vault).unwrap(), vault_before);
    assert_eq!(h.engine.get_plan_status(PlanId::new(2)), Err(PlanError::PlanNotFound(PlanId::new(2))));
    assert_eq!(h.engine.plan_count(), 1);
}

#[test]
fn vault_stays_balanced_across_mixed_activity() {
    let h = Harness::new();
    h.active_bnpl(1, 1);
    h.create_pawn(2, 2);
    h.create_bnpl(3, 3);
    h.assert_vault_balanced();

    h.pay_next(1);
    h.pay_next(2);
    h.assert_vault_balanced();

    h.engine.reject(h.admin, PlanId::new(3)).unwrap();
    h.engine.collect_fees(h.manager, h.vault).unwrap();
    h.assert_vault_balanced();

    h.engine.withdraw(h.manager, h.vault, ETHER).unwrap();
    h.assert_vault_balanced();
}

#[test]
fn racing_creations_on_one_id_admit_exactly_one() {
    let h = Harness::new();
    let results: Vec<Result<_, PlanError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8u128)
            .map(|asset| {
                let h = &h;
                s.spawn(move || {
                    let item = h.item(100 + asset);
                    let terms = Harness::pawn_terms();
                    let auth = h.sign(&item, &terms, PlanId::new(7));
                    h.engine.create_pawn(h.user, item, terms, PlanId::new(7), &auth)
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == PlanError::DuplicatePlan(PlanId::new(7))));
    assert_eq!(
        h.engine.vault(h.vault).unwrap().principal_outstanding,
        11 * ETHER
    );
}

#[test]
fn racing_payments_never_overpay_installments() {
    let h = Harness::new();
    h.create_pawn(1, 1);

    let successes = thread::scope(|s| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let h = &h;
                s.spawn(move || h.engine.pay(PlanId::new(1), h.user, 5 * ETHER, false).is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });

    assert_eq!(successes, 3);
    let plan = h.engine.plan(PlanId::new(1)).unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.terms.paid_installments, 3);
    h.assert_vault_balanced();
}

#[test]
fn parallel_payments_on_distinct_plans() {
    let h = Harness::new();
    for id in 1..=4 {
        h.create_pawn(id, id);
    }

    thread::scope(|s| {
        for id in 1..=4u128 {
            let h = &h;
            s.spawn(move || {
                for _ in 0..3 {
                    h.pay_next(id);
                }
            });
        }
    });

    for id in 1..=4 {
        assert_eq!(h.engine.get_plan_status(PlanId::new(id)).unwrap(), PlanStatus::Completed);
    }
    let vault = h.engine.vault(h.vault).unwrap();
    assert_eq!(vault.principal_outstanding, 0);
    assert!(vault.is_balanced());
    assert_eq!(h.engine.total_outstanding(), 0);
}

#[test]
fn snapshots_taken_during_payments_are_consistent() {
    let h = Harness::new();
    for id in 1..=4 {
        h.create_pawn(id, id);
    }
    let done = AtomicBool::new(false);

    let cuts = thread::scope(|s| {
        let h = &h;
        let done = &done;
        let watcher = s.spawn(move || {
            let mut cuts = Vec::new();
            while !done.load(Ordering::Acquire) {
                cuts.push(h.engine.snapshot());
            }
            cuts.push(h.engine.snapshot());
            cuts
        });
        let payers: Vec<_> = (1..=4u128)
            .map(|id| {
                s.spawn(move || {
                    for _ in 0..3 {
                        h.pay_next(id);
                    }
                })
            })
            .collect();
        for payer in payers {
            payer.join().unwrap();
        }
        done.store(true, Ordering::Release);
        watcher.join().unwrap()
    });

    for cut in &cuts {
        let owed: u128 = cut
            .plans
            .iter()
            .map(|p| p.ledger.outstanding_principal())
            .sum();
        assert_eq!(cut.vaults.len(), 1);
        assert_eq!(cut.vaults[0].principal_outstanding, owed);
        assert!(cut.vaults[0].is_balanced());
    }
    let last = cuts.last().unwrap();
    assert!(last.plans.iter().all(|p| p.status == PlanStatus::Completed));
}

#[test]
fn sweep_flags_each_overdue_plan_once() {
    let h = Harness::new();
    h.create_pawn(1, 1);
    h.create_pawn(2, 2);
    h.clock
        .advance(chrono::Duration::minutes(i64::from(common::TERM_MINUTES) + 1));

    h.engine.mark_defaulted(PlanId::new(2)).unwrap();
    assert_eq!(h.engine.sweep_defaults(), vec![PlanId::new(1)]);
    assert!(h.engine.sweep_defaults().is_empty());
}

#[test]
fn snapshot_stack_rolls_engine_back() {
    let h = Harness::new();
    h.create_pawn(1, 1);
    let mut stack = SnapshotStack::new();

    let before_payment = stack.begin(&h.engine.snapshot());
    h.pay_next(1);
    let after_payment = stack.begin(&h.engine.snapshot());
    h.pay_next(1);
    assert_eq!(stack.depth(), 2);

    h.engine.restore(stack.rollback(before_payment).unwrap());
    assert_eq!(stack.depth(), 0);
    assert!(stack.rollback(after_payment).is_err());

    let plan = h.engine.plan(PlanId::new(1)).unwrap();
    assert_eq!(plan.terms.paid_installments, 0);
    assert_eq!(
        h.engine.vault(h.vault).unwrap().principal_outstanding,
        11 * ETHER
    );
    // Custody is outside the snapshot and still holds the item.
    assert!(h.custody.is_held(&plan.item));
}

#[test]
fn ledger_db_round_trips_engine_state() {
    let h = Harness::new();
    h.active_bnpl(1, 1);
    h.create_pawn(2, 2);
    h.pay_next(2);
    let snapshot = h.engine.snapshot();

    let db = LedgerDb::open_temporary().unwrap();
    assert_eq!(db.fingerprint().unwrap(), [0u8; 32]);
    db.put_all(&snapshot.plans).unwrap();
    db.put_all(&snapshot.vaults).unwrap();

    let plans: Vec<Plan> = db.load_all().unwrap();
    let vaults: Vec<VaultAccount> = db.load_all().unwrap();
    assert_eq!(plans, snapshot.plans);
    assert_eq!(vaults, snapshot.vaults);

    // Insertion order doesn't change the fingerprint.
    let other = LedgerDb::open_temporary().unwrap();
    for plan in snapshot.plans.iter().rev() {
        other.put(plan).unwrap();
    }
    other.put_all(&snapshot.vaults).unwrap();
    assert_eq!(db.fingerprint().unwrap(), other.fingerprint().unwrap());
    assert_ne!(db.fingerprint().unwrap(), [0u8; 32]);

    let restored = Harness::new();
    restored.engine.restore(cyan_contracts::engine::EngineSnapshot {
        plans,
        vaults,
        collections: Vec::new(),
    });
    assert_eq!(restored.engine.snapshot(), snapshot);
}
