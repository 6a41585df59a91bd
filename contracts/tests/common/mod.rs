//! Shared fixture for the engine integration tests.
//!
//! One engine wired to in-memory collaborators and a manual clock, one vault
//! holding 100 units of LP capital, and a pricing key that signs offers the
//! way the off-chain service does.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use cyan_contracts::authorization::{sign_plan_authorization, AuthorizationSignature};
use cyan_contracts::engine::{CreationReceipt, PaymentReceipt, PlanEngine, PlanEngineBuilder};
use cyan_contracts::services::{
    InMemoryAccessControl, InMemoryCustody, ManualClock, Role, StaticSignerRegistry,
};
use cyan_contracts::types::{AutoRepayStatus, Item, ItemKind, PlanId, PlanTerms};
use cyan_protocol::address::Address;
use cyan_protocol::crypto::keys::SignerKeypair;
use cyan_protocol::uint::U256;

pub const ETHER: u128 = 1_000_000_000_000_000_000;
pub const DOMAIN: u64 = 31_337;
pub const TERM_MINUTES: u32 = 31 * 24 * 60;

pub fn genesis() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
}

pub struct Harness {
    pub engine: PlanEngine,
    pub signer: SignerKeypair,
    pub custody: Arc<InMemoryCustody>,
    pub access: Arc<InMemoryAccessControl>,
    pub signers: Arc<StaticSignerRegistry>,
    pub clock: Arc<ManualClock>,
    pub admin: Address,
    pub manager: Address,
    pub user: Address,
    pub vault: Address,
    pub nft: Address,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_deposit(100 * ETHER)
    }

    pub fn with_deposit(deposit: u128) -> Self {
        let signer = SignerKeypair::from_seed(&[0x5a; 32]);
        let custody = Arc::new(InMemoryCustody::new());
        let access = Arc::new(InMemoryAccessControl::new());
        let signers = Arc::new(StaticSignerRegistry::new(signer.public_key()));
        let clock = Arc::new(ManualClock::new(genesis()));

        let admin = Address::from_low_u8(0xad);
        let manager = Address::from_low_u8(0x3a);
        access.grant(admin, Role::FundingAuthority);
        access.grant(manager, Role::VaultManager);

        let engine = PlanEngineBuilder::new()
            .chain_domain(DOMAIN)
            .custody(custody.clone())
            .access_control(access.clone())
            .signer_registry(signers.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        let vault = Address::from_low_u8(0xc0);
        engine.open_vault(manager, vault, None, None).unwrap();
        engine.deposit(vault, deposit).unwrap();

        Self {
            engine,
            signer,
            custody,
            access,
            signers,
            clock,
            admin,
            manager,
            user: Address::from_low_u8(0x01),
            vault,
            nft: Address::from_low_u8(0x72),
        }
    }

    pub fn item(&self, asset_id: u128) -> Item {
        self.item_with_id(U256::from(asset_id))
    }

    pub fn item_with_id(&self, asset_id: U256) -> Item {
        Item {
            vault_address: self.vault,
            asset_contract: self.nft,
            asset_id,
            amount: U256::zero(),
            kind: ItemKind::Erc721,
        }
    }

    pub fn bnpl_terms() -> PlanTerms {
        PlanTerms {
            principal_amount: 11 * ETHER,
            down_payment_percent_bp: 2500,
            interest_rate_bp: 1800,
            service_fee_rate_bp: 100,
            term_minutes: TERM_MINUTES,
            total_installments: 4,
            paid_installments: 1,
            auto_repay_status: AutoRepayStatus::Disabled,
        }
    }

    pub fn pawn_terms() -> PlanTerms {
        PlanTerms {
            principal_amount: 11 * ETHER,
            down_payment_percent_bp: 0,
            interest_rate_bp: 1800,
            service_fee_rate_bp: 100,
            term_minutes: TERM_MINUTES,
            total_installments: 3,
            paid_installments: 0,
            auto_repay_status: AutoRepayStatus::Disabled,
        }
    }

    /// Offer signature valid for one minute.
    pub fn sign(&self, item: &Item, terms: &PlanTerms, plan_id: PlanId) -> AuthorizationSignature {
        let expiry = self.clock_secs() + 60;
        sign_plan_authorization(&self.signer, item, terms, plan_id, expiry, DOMAIN)
    }

    pub fn clock_secs(&self) -> u64 {
        use cyan_contracts::services::Clock;
        self.clock.now().timestamp() as u64
    }

    pub fn create_bnpl(&self, plan_id: u128, asset_id: u128) -> CreationReceipt {
        let item = self.item(asset_id);
        let terms = Self::bnpl_terms();
        let auth = self.sign(&item, &terms, PlanId::new(plan_id));
        self.engine
            .create_bnpl(self.user, item, terms, PlanId::new(plan_id), &auth, 2_777_500_000_000_000_000)
            .unwrap()
    }

    /// Create, fund and activate.
    pub fn active_bnpl(&self, plan_id: u128, asset_id: u128) {
        self.create_bnpl(plan_id, asset_id);
        self.engine.fund(self.admin, PlanId::new(plan_id)).unwrap();
        self.engine.activate(self.admin, PlanId::new(plan_id)).unwrap();
    }

    pub fn create_pawn(&self, plan_id: u128, asset_id: u128) -> CreationReceipt {
        let item = self.item(asset_id);
        let terms = Self::pawn_terms();
        let auth = self.sign(&item, &terms, PlanId::new(plan_id));
        self.engine
            .create_pawn(self.user, item, terms, PlanId::new(plan_id), &auth)
            .unwrap()
    }

    /// Pay exactly what the engine quotes for the next installment.
    pub fn pay_next(&self, plan_id: u128) -> PaymentReceipt {
        let id = PlanId::new(plan_id);
        let info = self.engine.get_payment_info(id, false).unwrap();
        self.engine
            .pay(id, self.user, info.current_payment, false)
            .unwrap()
    }

    pub fn assert_vault_balanced(&self) {
        let vault = self.engine.vault(self.vault).unwrap();
        assert!(vault.is_balanced(), "vault out of balance: {vault:?}");
    }
}
