// Schedule calculator and offer-digest benchmarks.
//
// Pricing runs on every creation, quote and payment, and the offer digest
// is rebuilt for every authorization check.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cyan_contracts::authorization::plan_message;
use cyan_contracts::schedule::{expected_plan, installment_due};
use cyan_contracts::types::{AutoRepayStatus, Item, ItemKind, PlanId, PlanTerms};
use cyan_protocol::address::Address;
use cyan_protocol::uint::U256;

const ETHER: u128 = 1_000_000_000_000_000_000;

fn terms(total_installments: u8) -> PlanTerms {
    PlanTerms {
        principal_amount: 11 * ETHER,
        down_payment_percent_bp: 2500,
        interest_rate_bp: 1800,
        service_fee_rate_bp: 100,
        term_minutes: 44_640,
        total_installments,
        paid_installments: 1,
        auto_repay_status: AutoRepayStatus::Disabled,
    }
}

fn bench_expected_plan(c: &mut Criterion) {
    let mut group = c.benchmark_group("schedule/expected_plan");
    for installments in [2u8, 4, 12, 255] {
        let t = terms(installments);
        group.bench_with_input(BenchmarkId::from_parameter(installments), &t, |b, t| {
            b.iter(|| expected_plan(black_box(t)).unwrap());
        });
    }
    group.finish();
}

fn bench_installment_due(c: &mut Criterion) {
    let t = terms(4);
    c.bench_function("schedule/installment_due", |b| {
        b.iter(|| installment_due(black_box(&t), false).unwrap());
    });
    c.bench_function("schedule/installment_due_early", |b| {
        b.iter(|| installment_due(black_box(&t), true).unwrap());
    });
}

fn bench_plan_message(c: &mut Criterion) {
    let item = Item {
        vault_address: Address::from_low_u8(1),
        asset_contract: Address::from_low_u8(2),
        asset_id: U256::from(42u64),
        amount: U256::zero(),
        kind: ItemKind::Erc721,
    };
    let t = terms(4);
    c.bench_function("authorization/plan_message", |b| {
        b.iter(|| plan_message(black_box(&item), &t, PlanId::new(7), 1_900_000_000, 31_337));
    });
}

criterion_group!(
    benches,
    bench_expected_plan,
    bench_installment_due,
    bench_plan_message,
);
criterion_main!(benches);
