//! # Payment Schedule Calculator
//!
//! Pure functions from [`PlanTerms`] to amounts. No clock, no storage, no
//! state: the same terms always produce the same numbers.
//!
//! ## Formulae
//!
//! ```text
//! payCount       = totalInstallments - (downPaymentBp > 0 ? 1 : 0)
//! downPayment    = principal * downPaymentBp / 10000
//! financed       = principal - downPayment
//! totalInterest  = financed * interestBp / 10000
//! totalService   = principal * serviceBp / 10000
//! singlePrincipal = financed / payCount
//! singleInterest  = totalInterest / payCount
//! singleService   = totalService / totalInstallments
//! ```
//!
//! Every division truncates. The residuals are intentional and reproduced
//! exactly, because the off-chain quote and the engine have to agree to the
//! smallest unit. Whatever principal the truncation leaves behind is written
//! off when the plan completes.

use cyan_protocol::config::MAX_BPS;
use cyan_protocol::math::{apply_bps, checked_add, checked_mul, checked_sub, MathError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PlanTerms;

/// Reasons a set of terms can't be priced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("total installments must be at least 1")]
    ZeroInstallments,

    #[error("{field} of {bps} bp exceeds 10000")]
    RateOutOfRange { field: &'static str, bps: u32 },

    /// A down payment takes one installment; at least one has to be left.
    #[error("a down payment requires at least 2 installments, got {total}")]
    NoFinancedInstallments { total: u8 },

    #[error("paid installments {paid} exceed total {total}")]
    PaidExceedsTotal { paid: u8, total: u8 },

    #[error("no installments remain")]
    NothingDue,

    /// Terms don't have the shape their plan kind requires.
    #[error("{0}")]
    WrongShape(&'static str),

    #[error("arithmetic overflow while pricing terms")]
    Overflow,
}

impl From<MathError> for ScheduleError {
    fn from(_: MathError) -> Self {
        ScheduleError::Overflow
    }
}

/// The five-value quote returned to callers and signed-offer tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleQuote {
    /// Down payment plus its service-fee slice. Zero without a down payment.
    pub down_payment_due: u128,
    pub total_interest_fee: u128,
    pub total_service_fee: u128,
    pub per_installment: u128,
    /// Principal plus total interest plus total service fee.
    pub total_financing: u128,
}

impl ScheduleQuote {
    /// `(downPaymentDue, totalInterestFee, totalServiceFee,
    /// perInstallmentAmount, totalFinancingAmount)`.
    pub fn as_tuple(&self) -> (u128, u128, u128, u128, u128) {
        (
            self.down_payment_due,
            self.total_interest_fee,
            self.total_service_fee,
            self.per_installment,
            self.total_financing,
        )
    }
}

/// Intermediate values of the schedule. The engine charges installments and
/// splits them across the vault from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBreakdown {
    pub down_payment_amount: u128,
    /// Down payment plus its service-fee slice. Zero without a down payment.
    pub down_payment_due: u128,
    pub financed_amount: u128,
    pub total_interest_fee: u128,
    pub total_service_fee: u128,
    pub pay_count_without_down_payment: u8,
    pub single_principal: u128,
    pub single_interest_fee: u128,
    pub single_service_fee: u128,
}

impl ScheduleBreakdown {
    pub fn per_installment(&self) -> Result<u128, ScheduleError> {
        let partial = checked_add(self.single_principal, self.single_interest_fee)?;
        Ok(checked_add(partial, self.single_service_fee)?)
    }
}

/// What one payment is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentQuote {
    pub principal: u128,
    pub interest_fee: u128,
    pub service_fee: u128,
    /// Sum of the three components. This is what the payer owes.
    pub total: u128,
    /// Installments this payment settles.
    pub installments: u8,
}

fn validate(terms: &PlanTerms) -> Result<(), ScheduleError> {
    if terms.total_installments < 1 {
        return Err(ScheduleError::ZeroInstallments);
    }
    for (field, bps) in [
        ("down payment", terms.down_payment_percent_bp),
        ("interest rate", terms.interest_rate_bp),
        ("service fee rate", terms.service_fee_rate_bp),
    ] {
        if bps > MAX_BPS {
            return Err(ScheduleError::RateOutOfRange { field, bps });
        }
    }
    if terms.has_down_payment() && terms.total_installments < 2 {
        return Err(ScheduleError::NoFinancedInstallments {
            total: terms.total_installments,
        });
    }
    if terms.paid_installments > terms.total_installments {
        return Err(ScheduleError::PaidExceedsTotal {
            paid: terms.paid_installments,
            total: terms.total_installments,
        });
    }
    Ok(())
}

/// A BNPL offer carries a down payment that counts as the first
/// installment.
pub fn validate_bnpl(terms: &PlanTerms) -> Result<(), ScheduleError> {
    if !terms.has_down_payment() {
        return Err(ScheduleError::WrongShape("BNPL terms need a down payment"));
    }
    if terms.paid_installments != 1 {
        return Err(ScheduleError::WrongShape(
            "BNPL terms must count the down payment as the first installment",
        ));
    }
    validate(terms)
}

/// A pawn offer has no down payment and nothing paid yet.
pub fn validate_pawn(terms: &PlanTerms) -> Result<(), ScheduleError> {
    if terms.has_down_payment() {
        return Err(ScheduleError::WrongShape("pawn terms take no down payment"));
    }
    if terms.paid_installments != 0 {
        return Err(ScheduleError::WrongShape("pawn terms start with nothing paid"));
    }
    validate(terms)
}

/// Every intermediate value of the schedule.
pub fn breakdown(terms: &PlanTerms) -> Result<ScheduleBreakdown, ScheduleError> {
    validate(terms)?;

    let pay_count = terms.total_installments - u8::from(terms.has_down_payment());
    let down_payment_amount = apply_bps(terms.principal_amount, terms.down_payment_percent_bp)?;
    let financed_amount = checked_sub(terms.principal_amount, down_payment_amount)?;
    let total_interest_fee = apply_bps(financed_amount, terms.interest_rate_bp)?;
    let total_service_fee = apply_bps(terms.principal_amount, terms.service_fee_rate_bp)?;
    let single_service_fee = total_service_fee / u128::from(terms.total_installments);
    let down_payment_due = if terms.has_down_payment() {
        checked_add(down_payment_amount, single_service_fee)?
    } else {
        0
    };

    Ok(ScheduleBreakdown {
        down_payment_amount,
        down_payment_due,
        financed_amount,
        total_interest_fee,
        total_service_fee,
        pay_count_without_down_payment: pay_count,
        single_principal: financed_amount / u128::from(pay_count),
        single_interest_fee: total_interest_fee / u128::from(pay_count),
        single_service_fee,
    })
}

/// Quote a set of terms.
///
/// # Examples
///
/// ```
/// use cyan_contracts::schedule::expected_plan;
/// use cyan_contracts::types::{AutoRepayStatus, PlanTerms};
///
/// let terms = PlanTerms {
///     principal_amount: 11_000_000_000_000_000_000,
///     down_payment_percent_bp: 2500,
///     interest_rate_bp: 1800,
///     service_fee_rate_bp: 100,
///     term_minutes: 44_640,
///     total_installments: 4,
///     paid_installments: 1,
///     auto_repay_status: AutoRepayStatus::Disabled,
/// };
/// let quote = expected_plan(&terms).unwrap();
/// assert_eq!(quote.per_installment, 3_272_500_000_000_000_000);
/// assert_eq!(quote.down_payment_due, 2_777_500_000_000_000_000);
/// ```
pub fn expected_plan(terms: &PlanTerms) -> Result<ScheduleQuote, ScheduleError> {
    let b = breakdown(terms)?;
    let total_financing = checked_add(
        checked_add(terms.principal_amount, b.total_interest_fee)?,
        b.total_service_fee,
    )?;
    Ok(ScheduleQuote {
        down_payment_due: b.down_payment_due,
        total_interest_fee: b.total_interest_fee,
        total_service_fee: b.total_service_fee,
        per_installment: b.per_installment()?,
        total_financing,
    })
}

/// The next payment given how many installments are already paid.
///
/// A regular payment settles one installment. An early payoff settles all
/// of the remaining ones: their principal and service fee in full, plus
/// the current period's interest only.
pub fn installment_due(terms: &PlanTerms, early: bool) -> Result<InstallmentQuote, ScheduleError> {
    let b = breakdown(terms)?;
    let remaining = terms.remaining_installments();
    if remaining == 0 {
        return Err(ScheduleError::NothingDue);
    }

    let installments = if early { remaining } else { 1 };
    let count = u128::from(installments);
    let principal = checked_mul(b.single_principal, count)?;
    let service_fee = checked_mul(b.single_service_fee, count)?;
    let interest_fee = b.single_interest_fee;
    let total = checked_add(checked_add(principal, interest_fee)?, service_fee)?;

    Ok(InstallmentQuote {
        principal,
        interest_fee,
        service_fee,
        total,
        installments,
    })
}
