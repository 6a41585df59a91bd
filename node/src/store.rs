//! Write-through persistence of engine state.
//!
//! The engine is the source of truth while the node runs; the store mirrors
//! every committed change so a restart can rebuild the engine from disk.

use std::path::Path;

use anyhow::{Context, Result};
use cyan_contracts::authorization::CollectionEntry;
use cyan_contracts::engine::{EngineSnapshot, PlanEngine};
use cyan_contracts::services::InMemoryCustody;
use cyan_contracts::types::{Plan, PlanId};
use cyan_contracts::vault::VaultAccount;
use cyan_protocol::address::Address;
use cyan_protocol::storage::LedgerDb;

/// Metadata key recording the chain domain the ledger was written under.
const DOMAIN_KEY: &str = "chain_domain_id";

#[derive(Debug, Clone)]
pub struct PlanStore {
    db: LedgerDb,
}

impl PlanStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = LedgerDb::open(path)
            .with_context(|| format!("failed to open ledger at {}", path.display()))?;
        Ok(Self { db })
    }

    pub fn temporary() -> Result<Self> {
        Ok(Self {
            db: LedgerDb::open_temporary().context("failed to open temporary ledger")?,
        })
    }

    /// Everything persisted so far.
    pub fn load(&self) -> Result<EngineSnapshot> {
        Ok(EngineSnapshot {
            plans: self.db.load_all::<Plan>().context("failed to load plans")?,
            vaults: self
                .db
                .load_all::<VaultAccount>()
                .context("failed to load vaults")?,
            collections: self
                .db
                .load_all::<CollectionEntry>()
                .context("failed to load collections")?,
        })
    }

    /// Refuse to reuse a ledger written under another chain domain.
    pub fn bind_domain(&self, chain_domain_id: u64) -> Result<()> {
        match self.db.get_meta(DOMAIN_KEY)? {
            Some(bytes) => {
                let stored = <[u8; 8]>::try_from(bytes.as_slice())
                    .map(u64::from_be_bytes)
                    .context("corrupt chain domain metadata")?;
                anyhow::ensure!(
                    stored == chain_domain_id,
                    "ledger belongs to chain domain {stored}, node configured for {chain_domain_id}"
                );
            }
            None => self.db.set_meta(DOMAIN_KEY, &chain_domain_id.to_be_bytes())?,
        }
        Ok(())
    }

    /// Persist a plan and the vault funding it.
    pub fn sync_plan(&self, engine: &PlanEngine, plan_id: PlanId) -> Result<()> {
        let plan = engine.plan(plan_id)?;
        self.db.put(&plan)?;
        self.sync_vault(engine, plan.item.vault_address)
    }

    pub fn sync_vault(&self, engine: &PlanEngine, address: Address) -> Result<()> {
        let vault = engine.vault(address)?;
        self.db.put(&vault)?;
        Ok(())
    }

    pub fn sync_collections(&self, engine: &PlanEngine) -> Result<()> {
        let entries = engine.collections();
        self.db.put_all(&entries)?;
        Ok(())
    }

    /// BLAKE3 fingerprint of the persisted plans and vaults, hex encoded.
    pub fn fingerprint(&self) -> Result<String> {
        Ok(hex::encode(self.db.fingerprint()?))
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Load persisted state into `engine` and mark the collateral of every
    /// open plan as held. Returns the number of plans restored.
    pub fn restore_into(&self, engine: &PlanEngine, custody: &InMemoryCustody) -> Result<usize> {
        let snapshot = self.load()?;
        for plan in snapshot.plans.iter().filter(|p| !p.status.is_terminal()) {
            custody.restore_held(&plan.item, plan.owner);
        }
        let count = snapshot.plans.len();
        engine.restore(snapshot);
        Ok(count)
    }
}
