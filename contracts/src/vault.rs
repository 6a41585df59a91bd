//! # Vault Funding Ledger
//!
//! A vault is a pool of LP capital that advances principal to plans and
//! takes repayments back. It keeps six balances:
//!
//! | Field                   | Meaning                                     |
//! |-------------------------|---------------------------------------------|
//! | `total_deposited`       | LP claim on the vault, yield included       |
//! | `cash`                  | Funds physically in the vault               |
//! | `principal_outstanding` | Principal currently lent out                |
//! | `safety_fund`           | Interest set aside to absorb losses         |
//! | `accrued_service_fee`   | Vault's cut of interest, not yet collected  |
//! | `protocol_fees`         | Plan service fees, not yet collected        |
//!
//! and one identity that holds after every operation:
//!
//! ```text
//! cash + principal_outstanding
//!     == total_deposited + safety_fund + accrued_service_fee + protocol_fees
//! ```
//!
//! Every method below either moves both sides of that identity by the same
//! amount or fails without touching anything.

use cyan_protocol::address::Address;
use cyan_protocol::config::{DEFAULT_SAFETY_FUND_PERCENT_BP, DEFAULT_VAULT_SERVICE_FEE_PERCENT_BP};
use cyan_protocol::math::{apply_bps, checked_add, checked_sub, validate_bps, MathError};
use cyan_protocol::storage::Record;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("insufficient liquidity: requested {requested}, lendable {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    #[error("vault {0} already exists")]
    VaultExists(Address),

    #[error("vault arithmetic failed: {0}")]
    Math(#[from] MathError),
}

/// How one repayment was split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepaymentSplit {
    pub principal: u128,
    pub safety_fund: u128,
    pub vault_fee: u128,
    pub lp_yield: u128,
    pub protocol_fee: u128,
}

/// How liquidation proceeds were applied against outstanding principal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    pub recovered: u128,
    pub absorbed_by_safety_fund: u128,
    pub absorbed_by_lps: u128,
    pub surplus: u128,
}

/// Fees paid out by [`VaultAccount::collect_fees`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedFees {
    pub service_fee: u128,
    pub protocol_fees: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAccount {
    pub address: Address,
    pub total_deposited: u128,
    pub cash: u128,
    pub principal_outstanding: u128,
    pub safety_fund: u128,
    pub accrued_service_fee: u128,
    pub protocol_fees: u128,
    /// Share of interest set aside in the safety fund, and the share of
    /// deposits held back from lending.
    pub safety_fund_percent_bp: u32,
    /// Vault's share of interest.
    pub service_fee_percent_bp: u32,
}

impl VaultAccount {
    /// An empty vault with the default fee split.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            total_deposited: 0,
            cash: 0,
            principal_outstanding: 0,
            safety_fund: 0,
            accrued_service_fee: 0,
            protocol_fees: 0,
            safety_fund_percent_bp: DEFAULT_SAFETY_FUND_PERCENT_BP,
            service_fee_percent_bp: DEFAULT_VAULT_SERVICE_FEE_PERCENT_BP,
        }
    }

    pub fn with_fee_split(
        address: Address,
        safety_fund_percent_bp: u32,
        service_fee_percent_bp: u32,
    ) -> Result<Self, VaultError> {
        validate_bps(safety_fund_percent_bp)?;
        validate_bps(service_fee_percent_bp)?;
        if safety_fund_percent_bp + service_fee_percent_bp > 10_000 {
            return Err(VaultError::Math(MathError::RateOutOfRange(
                safety_fund_percent_bp + service_fee_percent_bp,
            )));
        }
        Ok(Self {
            safety_fund_percent_bp,
            service_fee_percent_bp,
            ..Self::new(address)
        })
    }

    /// Liquidity available for new advances and withdrawals.
    pub fn lendable(&self) -> u128 {
        let reserve = self.reserve_required();
        self.cash
            .saturating_sub(self.safety_fund)
            .saturating_sub(self.accrued_service_fee)
            .saturating_sub(self.protocol_fees)
            .saturating_sub(reserve)
    }

    /// Share of deposits held back from lending.
    pub fn reserve_required(&self) -> u128 {
        apply_bps(self.total_deposited, self.safety_fund_percent_bp)
            .unwrap_or(u128::MAX)
    }

    pub fn is_balanced(&self) -> bool {
        let assets = self.cash.checked_add(self.principal_outstanding);
        let claims = self
            .total_deposited
            .checked_add(self.safety_fund)
            .and_then(|v| v.checked_add(self.accrued_service_fee))
            .and_then(|v| v.checked_add(self.protocol_fees));
        matches!((assets, claims), (Some(a), Some(c)) if a == c)
    }

    // -- LP capital ---------------------------------------------------------

    pub fn deposit(&mut self, amount: u128) -> Result<(), VaultError> {
        let total_deposited = checked_add(self.total_deposited, amount)?;
        let cash = checked_add(self.cash, amount)?;
        self.total_deposited = total_deposited;
        self.cash = cash;
        Ok(())
    }

    /// Bounded by lendable liquidity, so a withdrawal never eats into the
    /// safety fund, uncollected fees or the reserve.
    pub fn withdraw(&mut self, amount: u128) -> Result<(), VaultError> {
        self.ensure_lendable(amount)?;
        let total_deposited = checked_sub(self.total_deposited, amount)?;
        self.cash = checked_sub(self.cash, amount)?;
        self.total_deposited = total_deposited;
        Ok(())
    }

    // -- Lending ------------------------------------------------------------

    /// Send principal out to a plan.
    pub fn advance(&mut self, amount: u128) -> Result<(), VaultError> {
        self.ensure_lendable(amount)?;
        let principal_outstanding = checked_add(self.principal_outstanding, amount)?;
        self.cash = checked_sub(self.cash, amount)?;
        self.principal_outstanding = principal_outstanding;
        Ok(())
    }

    /// Take one repayment and split its interest.
    pub fn receive_repayment(
        &mut self,
        principal: u128,
        interest: u128,
        plan_service_fee: u128,
    ) -> Result<RepaymentSplit, VaultError> {
        let safety = apply_bps(interest, self.safety_fund_percent_bp)?;
        let vault_fee = apply_bps(interest, self.service_fee_percent_bp)?;
        let lp_yield = checked_sub(checked_sub(interest, safety)?, vault_fee)?;

        let mut next = self.clone();
        let incoming = checked_add(checked_add(principal, interest)?, plan_service_fee)?;
        next.cash = checked_add(next.cash, incoming)?;
        next.principal_outstanding = checked_sub(next.principal_outstanding, principal)?;
        next.safety_fund = checked_add(next.safety_fund, safety)?;
        next.accrued_service_fee = checked_add(next.accrued_service_fee, vault_fee)?;
        next.total_deposited = checked_add(next.total_deposited, lp_yield)?;
        next.protocol_fees = checked_add(next.protocol_fees, plan_service_fee)?;
        *self = next;

        Ok(RepaymentSplit {
            principal,
            safety_fund: safety,
            vault_fee,
            lp_yield,
            protocol_fee: plan_service_fee,
        })
    }

    /// Service-fee slice of a BNPL down payment, credited on activation.
    pub fn receive_down_payment_fee(&mut self, fee: u128) -> Result<(), VaultError> {
        let cash = checked_add(self.cash, fee)?;
        self.protocol_fees = checked_add(self.protocol_fees, fee)?;
        self.cash = cash;
        Ok(())
    }

    /// Principal that will never come back. LPs carry it.
    pub fn write_off(&mut self, amount: u128) -> Result<(), VaultError> {
        let principal_outstanding = checked_sub(self.principal_outstanding, amount)?;
        self.total_deposited = checked_sub(self.total_deposited, amount)?;
        self.principal_outstanding = principal_outstanding;
        Ok(())
    }

    /// Apply sale proceeds of defaulted collateral against `outstanding`
    /// principal. A shortfall comes out of the safety fund first, then out of
    /// LP capital; a surplus is LP yield.
    pub fn credit_liquidation(
        &mut self,
        outstanding: u128,
        proceeds: u128,
    ) -> Result<LiquidationOutcome, VaultError> {
        let mut next = self.clone();
        next.cash = checked_add(next.cash, proceeds)?;
        next.principal_outstanding = checked_sub(next.principal_outstanding, outstanding)?;

        let mut outcome = LiquidationOutcome {
            recovered: proceeds.min(outstanding),
            ..LiquidationOutcome::default()
        };

        if proceeds >= outstanding {
            outcome.surplus = proceeds - outstanding;
            next.total_deposited = checked_add(next.total_deposited, outcome.surplus)?;
        } else {
            let shortfall = outstanding - proceeds;
            outcome.absorbed_by_safety_fund = shortfall.min(next.safety_fund);
            outcome.absorbed_by_lps = shortfall - outcome.absorbed_by_safety_fund;
            next.safety_fund -= outcome.absorbed_by_safety_fund;
            next.total_deposited = checked_sub(next.total_deposited, outcome.absorbed_by_lps)?;
        }

        *self = next;
        Ok(outcome)
    }

    /// Pay out every uncollected fee.
    pub fn collect_fees(&mut self) -> Result<CollectedFees, VaultError> {
        let total = checked_add(self.accrued_service_fee, self.protocol_fees)?;
        self.cash = checked_sub(self.cash, total)?;
        let collected = CollectedFees {
            service_fee: self.accrued_service_fee,
            protocol_fees: self.protocol_fees,
        };
        self.accrued_service_fee = 0;
        self.protocol_fees = 0;
        Ok(collected)
    }

    fn ensure_lendable(&self, amount: u128) -> Result<(), VaultError> {
        let available = self.lendable();
        if amount > available {
            return Err(VaultError::InsufficientLiquidity {
                requested: amount,
                available,
            });
        }
        Ok(())
    }
}

impl Record for VaultAccount {
    const TREE: &'static str = "vaults";

    fn key(&self) -> Vec<u8> {
        self.address.as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(amount: u128) -> VaultAccount {
        let mut v = VaultAccount::new(Address::from_low_u8(1));
        v.deposit(amount).unwrap();
        v
    }

    #[test]
    fn deposit_and_reserve() {
        let v = funded(100_000);
        assert_eq!(v.total_deposited, 100_000);
        assert_eq!(v.cash, 100_000);
        assert_eq!(v.reserve_required(), 20_000);
        assert_eq!(v.lendable(), 80_000);
        assert!(v.is_balanced());
    }

    #[test]
    fn advance_beyond_lendable_fails_cleanly() {
        let mut v = funded(100_000);
        let before = v.clone();
        assert_eq!(
            v.advance(80_001),
            Err(VaultError::InsufficientLiquidity {
                requested: 80_001,
                available: 80_000
            })
        );
        assert_eq!(v, before);
        v.advance(80_000).unwrap();
        assert_eq!(v.principal_outstanding, 80_000);
        assert_eq!(v.lendable(), 0);
        assert!(v.is_balanced());
    }

    #[test]
    fn repayment_split() {
        let mut v = funded(1_000_000);
        v.advance(500_000).unwrap();
        let split = v.receive_repayment(100_000, 10_000, 1_000).unwrap();
        assert_eq!(split.safety_fund, 2_000);
        assert_eq!(split.vault_fee, 30);
        assert_eq!(split.lp_yield, 7_970);
        assert_eq!(split.protocol_fee, 1_000);
        assert_eq!(v.principal_outstanding, 400_000);
        assert_eq!(v.total_deposited, 1_007_970);
        assert!(v.is_balanced());
    }

    #[test]
    fn shortfall_hits_safety_fund_first() {
        let mut v = funded(1_000_000);
        v.advance(500_000).unwrap();
        v.receive_repayment(0, 100_000, 0).unwrap();
        assert_eq!(v.safety_fund, 20_000);

        let outcome = v.credit_liquidation(500_000, 470_000).unwrap();
        assert_eq!(outcome.absorbed_by_safety_fund, 20_000);
        assert_eq!(outcome.absorbed_by_lps, 10_000);
        assert_eq!(v.safety_fund, 0);
        assert_eq!(v.principal_outstanding, 0);
        assert!(v.is_balanced());
    }

    #[test]
    fn liquidation_surplus_is_yield() {
        let mut v = funded(1_000_000);
        v.advance(100_000).unwrap();
        let outcome = v.credit_liquidation(100_000, 130_000).unwrap();
        assert_eq!(outcome.surplus, 30_000);
        assert_eq!(v.total_deposited, 1_030_000);
        assert!(v.is_balanced());
    }

    #[test]
    fn withdraw_respects_fees_and_reserve() {
        let mut v = funded(100_000);
        v.receive_down_payment_fee(5_000).unwrap();
        assert_eq!(v.lendable(), 80_000);
        assert!(v.withdraw(80_001).is_err());
        v.withdraw(50_000).unwrap();
        assert!(v.is_balanced());

        let fees = v.collect_fees().unwrap();
        assert_eq!(fees.protocol_fees, 5_000);
        assert_eq!(v.protocol_fees, 0);
        assert!(v.is_balanced());
    }

    #[test]
    fn write_off_reduces_lp_capital() {
        let mut v = funded(10_000);
        v.advance(3).unwrap();
        v.write_off(2).unwrap();
        assert_eq!(v.principal_outstanding, 1);
        assert_eq!(v.total_deposited, 9_998);
        assert!(v.is_balanced());
    }

    #[test]
    fn fee_split_validated() {
        assert!(VaultAccount::with_fee_split(Address::ZERO, 9_000, 2_000).is_err());
        let v = VaultAccount::with_fee_split(Address::ZERO, 1_000, 50).unwrap();
        assert_eq!(v.safety_fund_percent_bp, 1_000);
    }
}
