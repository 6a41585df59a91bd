//! # Plan Data Model
//!
//! Items, terms and plans as the engine stores them. Everything here is
//! plain data: the rules for changing a [`Plan`] live in
//! [`crate::engine`], and the numbers derived from [`PlanTerms`] live in
//! [`crate::schedule`].

use chrono::{DateTime, Duration, Utc};
use cyan_protocol::address::Address;
use cyan_protocol::storage::Record;
use cyan_protocol::uint::{parse_u256, serde_u256, to_be_bytes, UintError, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Caller-chosen plan identifier, a full uint256. Unique across all plans
/// for the lifetime of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(#[serde(with = "serde_u256")] pub U256);

impl PlanId {
    pub fn new(value: u128) -> Self {
        PlanId(U256::from(value))
    }

    /// Big-endian bytes, so storage order is numeric order.
    pub fn to_key(self) -> [u8; 32] {
        to_be_bytes(&self.0)
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlanId {
    type Err = UintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_u256(s).map(PlanId)
    }
}

impl From<u128> for PlanId {
    fn from(v: u128) -> Self {
        PlanId::new(v)
    }
}

impl From<U256> for PlanId {
    fn from(v: U256) -> Self {
        PlanId(v)
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// Token standard of the collateral. The numeric codes are part of the
/// signed item digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Erc721,
    Erc1155,
    CryptoPunks,
}

impl ItemKind {
    pub fn code(self) -> u8 {
        match self {
            ItemKind::Erc721 => 1,
            ItemKind::Erc1155 => 2,
            ItemKind::CryptoPunks => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(ItemKind::Erc721),
            2 => Some(ItemKind::Erc1155),
            3 => Some(ItemKind::CryptoPunks),
            _ => None,
        }
    }
}

/// The collateral a plan is written against. Immutable once bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Vault that funds the plan.
    pub vault_address: Address,
    /// Token contract of the collateral.
    pub asset_contract: Address,
    #[serde(with = "serde_u256")]
    pub asset_id: U256,
    /// Quantity. Zero for single-instance standards.
    #[serde(with = "serde_u256")]
    pub amount: U256,
    pub kind: ItemKind,
}

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// Owner preference for automatic installment payment. Recorded on the plan;
/// executing it is the wallet's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AutoRepayStatus {
    #[default]
    Disabled,
    Enabled,
    EnabledFromMain,
}

impl AutoRepayStatus {
    pub fn code(self) -> u8 {
        match self {
            AutoRepayStatus::Disabled => 0,
            AutoRepayStatus::Enabled => 1,
            AutoRepayStatus::EnabledFromMain => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AutoRepayStatus::Disabled),
            1 => Some(AutoRepayStatus::Enabled),
            2 => Some(AutoRepayStatus::EnabledFromMain),
            _ => None,
        }
    }
}

/// Priced terms of a plan, as signed by the pricing authority.
///
/// For BNPL the down payment counts as the first installment, so a fresh
/// offer carries `paid_installments = 1`. A pawn offer carries `0` and no
/// down payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTerms {
    pub principal_amount: u128,
    pub down_payment_percent_bp: u32,
    pub interest_rate_bp: u32,
    pub service_fee_rate_bp: u32,
    /// Length of one installment period.
    pub term_minutes: u32,
    pub total_installments: u8,
    pub paid_installments: u8,
    #[serde(default)]
    pub auto_repay_status: AutoRepayStatus,
}

impl PlanTerms {
    pub fn has_down_payment(&self) -> bool {
        self.down_payment_percent_bp > 0
    }

    pub fn remaining_installments(&self) -> u8 {
        self.total_installments
            .saturating_sub(self.paid_installments)
    }

    pub fn term(&self) -> Duration {
        Duration::minutes(i64::from(self.term_minutes))
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanKind {
    Bnpl,
    Pawn,
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanKind::Bnpl => write!(f, "BNPL"),
            PlanKind::Pawn => write!(f, "Pawn"),
        }
    }
}

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    /// BNPL only. Down payment held, waiting on the vault.
    Created,
    /// BNPL only. Principal advanced, waiting on activation.
    Funded,
    /// Installments are being paid.
    Active,
    /// An installment was missed. Only liquidation follows.
    Defaulted,
    /// BNPL only. Declined before funding; down payment refunded.
    Rejected,
    /// Every installment paid; item released to the owner.
    Completed,
    /// Collateral sold after default.
    Liquidated,
}

impl PlanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Rejected | PlanStatus::Liquidated
        )
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Created => write!(f, "Created"),
            PlanStatus::Funded => write!(f, "Funded"),
            PlanStatus::Active => write!(f, "Active"),
            PlanStatus::Defaulted => write!(f, "Defaulted"),
            PlanStatus::Rejected => write!(f, "Rejected"),
            PlanStatus::Completed => write!(f, "Completed"),
            PlanStatus::Liquidated => write!(f, "Liquidated"),
        }
    }
}

/// Money that has moved on behalf of one plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLedger {
    pub principal_advanced: u128,
    pub principal_repaid: u128,
    pub interest_paid: u128,
    pub service_fee_paid: u128,
    /// Down payment collected at creation.
    pub down_payment_paid: u128,
    /// Portion of the down payment still held by the plan. Released on
    /// activation, refunded on rejection.
    pub down_payment_held: u128,
    /// Truncation residual written off at completion.
    pub principal_written_off: u128,
    pub liquidation_proceeds: u128,
}

impl PlanLedger {
    /// Principal the vault advanced and hasn't got back yet.
    pub fn outstanding_principal(&self) -> u128 {
        self.principal_advanced
            .saturating_sub(self.principal_repaid)
            .saturating_sub(self.principal_written_off)
    }
}

/// A BNPL plan or pawn loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: PlanId,
    pub kind: PlanKind,
    pub item: Item,
    pub terms: PlanTerms,
    pub owner: Address,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub funded_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub ledger: PlanLedger,
}

impl Plan {
    /// Numeric status code shared with existing tooling. BNPL and pawn
    /// statuses occupy disjoint ranges.
    pub fn status_code(&self) -> u8 {
        match (self.kind, self.status) {
            (PlanKind::Bnpl, PlanStatus::Created) => 0,
            (PlanKind::Bnpl, PlanStatus::Funded) => 1,
            (PlanKind::Bnpl, PlanStatus::Active) => 2,
            (PlanKind::Bnpl, PlanStatus::Defaulted) => 3,
            (PlanKind::Bnpl, PlanStatus::Rejected) => 4,
            (PlanKind::Bnpl, PlanStatus::Completed) => 5,
            (PlanKind::Bnpl, PlanStatus::Liquidated) => 6,
            (PlanKind::Pawn, PlanStatus::Active) => 7,
            (PlanKind::Pawn, PlanStatus::Defaulted) => 8,
            (PlanKind::Pawn, PlanStatus::Completed) => 9,
            (PlanKind::Pawn, PlanStatus::Liquidated) => 10,
            // Pawn plans are never created, funded or rejected.
            (PlanKind::Pawn, PlanStatus::Created)
            | (PlanKind::Pawn, PlanStatus::Funded)
            | (PlanKind::Pawn, PlanStatus::Rejected) => u8::MAX,
        }
    }

    /// When the next installment is due: one term after activation or after
    /// the last payment. `None` until the plan is active.
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        let anchor = self.last_payment_at.or(self.activated_at)?;
        anchor.checked_add_signed(self.terms.term())
    }

    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.status == PlanStatus::Active && self.due_date().is_some_and(|due| now > due)
    }
}

impl Record for Plan {
    const TREE: &'static str = "plans";

    fn key(&self) -> Vec<u8> {
        self.plan_id.to_key().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan(kind: PlanKind, status: PlanStatus) -> Plan {
        let now = Utc::now();
        Plan {
            plan_id: PlanId::new(1),
            kind,
            item: Item {
                vault_address: Address::from_low_u8(1),
                asset_contract: Address::from_low_u8(2),
                asset_id: U256::from(7u64),
                amount: U256::zero(),
                kind: ItemKind::Erc721,
            },
            terms: PlanTerms {
                principal_amount: 1_000,
                down_payment_percent_bp: 0,
                interest_rate_bp: 0,
                service_fee_rate_bp: 0,
                term_minutes: 60,
                total_installments: 3,
                paid_installments: 0,
                auto_repay_status: AutoRepayStatus::Disabled,
            },
            owner: Address::from_low_u8(3),
            status,
            created_at: now,
            funded_at: None,
            activated_at: None,
            last_payment_at: None,
            closed_at: None,
            ledger: PlanLedger::default(),
        }
    }

    #[test]
    fn status_codes_match_legacy_numbering() {
        assert_eq!(sample_plan(PlanKind::Bnpl, PlanStatus::Created).status_code(), 0);
        assert_eq!(sample_plan(PlanKind::Bnpl, PlanStatus::Active).status_code(), 2);
        assert_eq!(sample_plan(PlanKind::Bnpl, PlanStatus::Liquidated).status_code(), 6);
        assert_eq!(sample_plan(PlanKind::Pawn, PlanStatus::Active).status_code(), 7);
        assert_eq!(sample_plan(PlanKind::Pawn, PlanStatus::Completed).status_code(), 9);
        assert_eq!(sample_plan(PlanKind::Pawn, PlanStatus::Liquidated).status_code(), 10);
    }

    #[test]
    fn due_date_follows_last_payment() {
        let mut plan = sample_plan(PlanKind::Pawn, PlanStatus::Active);
        assert_eq!(plan.due_date(), None);

        let activated = plan.created_at;
        plan.activated_at = Some(activated);
        assert_eq!(plan.due_date(), Some(activated + Duration::minutes(60)));

        let paid = activated + Duration::minutes(30);
        plan.last_payment_at = Some(paid);
        assert_eq!(plan.due_date(), Some(paid + Duration::minutes(60)));
        assert!(!plan.is_past_due(paid + Duration::minutes(60)));
        assert!(plan.is_past_due(paid + Duration::minutes(61)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(PlanStatus::Completed.is_terminal());
        assert!(PlanStatus::Rejected.is_terminal());
        assert!(PlanStatus::Liquidated.is_terminal());
        assert!(!PlanStatus::Defaulted.is_terminal());
        assert!(!PlanStatus::Active.is_terminal());
    }

    #[test]
    fn enum_codes_roundtrip() {
        for kind in [ItemKind::Erc721, ItemKind::Erc1155, ItemKind::CryptoPunks] {
            assert_eq!(ItemKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ItemKind::from_code(0), None);
        assert_eq!(AutoRepayStatus::from_code(2), Some(AutoRepayStatus::EnabledFromMain));
        assert_eq!(AutoRepayStatus::from_code(3), None);
    }

    #[test]
    fn plan_id_parses_and_keys_in_order() {
        assert_eq!("123456".parse::<PlanId>().unwrap(), PlanId::new(123_456));
        assert_eq!("0x100".parse::<PlanId>().unwrap(), PlanId::new(256));
        assert!(PlanId::new(1).to_key() < PlanId::new(256).to_key());
        assert!(PlanId::new(u128::MAX).to_key() < PlanId(U256::MAX).to_key());
        assert!("plan-1".parse::<PlanId>().is_err());
    }

    #[test]
    fn item_accepts_ids_beyond_u128() {
        let json = r#"{
            "vault_address": "0x0000000000000000000000000000000000000001",
            "asset_contract": "0x0000000000000000000000000000000000000002",
            "asset_id": "340282366920938463463374607431768211456",
            "amount": 0,
            "kind": "ERC721"
        }"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.asset_id, U256::from(u128::MAX) + U256::one());
        assert!(item.amount.is_zero());

        let text = serde_json::to_string(&item).unwrap();
        assert!(text.contains(r#""asset_id":"340282366920938463463374607431768211456""#));
        assert_eq!(serde_json::from_str::<Item>(&text).unwrap(), item);
    }

    #[test]
    fn plan_with_full_width_id_survives_bincode() {
        let mut plan = sample_plan(PlanKind::Pawn, PlanStatus::Active);
        plan.plan_id = PlanId(U256::MAX);
        plan.item.asset_id = U256::MAX - U256::from(5u64);
        let bytes = bincode::serialize(&plan).unwrap();
        assert_eq!(bincode::deserialize::<Plan>(&bytes).unwrap(), plan);
    }

    #[test]
    fn plan_survives_bincode() {
        let plan = sample_plan(PlanKind::Bnpl, PlanStatus::Funded);
        let bytes = bincode::serialize(&plan).unwrap();
        assert_eq!(bincode::deserialize::<Plan>(&bytes).unwrap(), plan);
    }

    #[test]
    fn status_serializes_in_upper_case() {
        assert_eq!(
            serde_json::to_string(&PlanStatus::Defaulted).unwrap(),
            "\"DEFAULTED\""
        );
        let kind: PlanKind = serde_json::from_str("\"PAWN\"").unwrap();
        assert_eq!(kind, PlanKind::Pawn);
    }
}
