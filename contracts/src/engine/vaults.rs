//! Vault administration and the collection registry.

use cyan_protocol::address::Address;
use cyan_protocol::crypto::keys::Signature;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use super::PlanEngine;
use crate::authorization::{verify_collection, CollectionEntry};
use crate::error::PlanResult;
use crate::services::Role;
use crate::vault::{CollectedFees, VaultAccount, VaultError};

impl PlanEngine {
    /// Register a vault. `None` fee parameters take the protocol defaults.
    pub fn open_vault(
        &self,
        caller: Address,
        address: Address,
        safety_fund_percent_bp: Option<u32>,
        service_fee_percent_bp: Option<u32>,
    ) -> PlanResult<VaultAccount> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::VaultManager)?;
        let defaults = VaultAccount::new(address);
        let vault = VaultAccount::with_fee_split(
            address,
            safety_fund_percent_bp.unwrap_or(defaults.safety_fund_percent_bp),
            service_fee_percent_bp.unwrap_or(defaults.service_fee_percent_bp),
        )?;

        match self.vaults.entry(address) {
            Entry::Occupied(_) => Err(VaultError::VaultExists(address).into()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(vault.clone())));
                info!(vault = %address, "vault opened");
                Ok(vault)
            }
        }
    }

    /// LP deposit. Open to anyone.
    pub fn deposit(&self, address: Address, amount: u128) -> PlanResult<VaultAccount> {
        let _commit = self.commit_guard();
        let handle = self.vault_handle(address)?;
        let mut vault = handle.lock();
        vault.deposit(amount)?;
        info!(vault = %address, amount, total = vault.total_deposited, "deposit");
        Ok(vault.clone())
    }

    pub fn withdraw(
        &self,
        caller: Address,
        address: Address,
        amount: u128,
    ) -> PlanResult<VaultAccount> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::VaultManager)?;
        let handle = self.vault_handle(address)?;
        let mut vault = handle.lock();
        vault.withdraw(amount)?;
        info!(vault = %address, amount, "withdrawal");
        Ok(vault.clone())
    }

    pub fn collect_fees(&self, caller: Address, address: Address) -> PlanResult<CollectedFees> {
        let _commit = self.commit_guard();
        self.ctx.access.require_role(caller, Role::VaultManager)?;
        let handle = self.vault_handle(address)?;
        let mut vault = handle.lock();
        let fees = vault.collect_fees()?;
        info!(
            vault = %address,
            service_fee = fees.service_fee,
            protocol_fees = fees.protocol_fees,
            "fees collected"
        );
        Ok(fees)
    }

    pub fn vault(&self, address: Address) -> PlanResult<VaultAccount> {
        Ok(self.vault_handle(address)?.lock().clone())
    }

    /// Principal lent out across every vault.
    pub fn total_outstanding(&self) -> u128 {
        self.vault_handles()
            .into_iter()
            .map(|h| h.lock().principal_outstanding)
            .fold(0u128, u128::saturating_add)
    }

    // -- Collections --------------------------------------------------------

    /// Accept a signed enablement for `collection` at `version`.
    pub fn enable_collection(
        &self,
        collection: Address,
        version: u64,
        signature: &Signature,
    ) -> PlanResult<()> {
        let _commit = self.commit_guard();
        let authority = self.ctx.signers.current_authority();
        verify_collection(
            &authority,
            &collection,
            self.config.chain_domain_id,
            version,
            signature,
        )?;
        self.collections.write().enable(collection, version)?;
        info!(%collection, version, "collection enabled");
        Ok(())
    }

    pub fn is_collection_enabled(&self, collection: &Address) -> bool {
        self.collections.read().is_enabled(collection)
    }

    pub fn collection_version(&self, collection: &Address) -> Option<u64> {
        self.collections.read().version_of(collection)
    }

    pub fn collections(&self) -> Vec<CollectionEntry> {
        self.collections.read().entries()
    }
}
