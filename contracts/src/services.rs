//! # External Collaborators
//!
//! The engine doesn't move collateral, decide who is an admin, hold the
//! pricing key or read the wall clock itself. It asks these traits, and the
//! embedding application decides what answers.
//!
//! In-memory implementations ship alongside so the engine is runnable on its
//! own: the operator node uses them directly, and tests use them to script
//! failures and move time.

use chrono::{DateTime, Duration, Utc};
use cyan_protocol::address::Address;
use cyan_protocol::crypto::keys::PublicKey;
use cyan_protocol::uint::U256;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::types::Item;

// ---------------------------------------------------------------------------
// Custody
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodyError {
    #[error("item {asset_id} of {asset_contract} is already in custody")]
    AlreadyHeld {
        asset_contract: Address,
        asset_id: U256,
    },

    #[error("item {asset_id} of {asset_contract} is not in custody")]
    NotHeld {
        asset_contract: Address,
        asset_id: U256,
    },

    #[error("custody unavailable: {0}")]
    Unavailable(String),
}

/// Moves collateral in and out of protocol custody.
pub trait CustodyService: Send + Sync {
    fn transfer_in(&self, item: &Item, from: Address) -> Result<(), CustodyError>;
    fn transfer_out(&self, item: &Item, to: Address) -> Result<(), CustodyError>;
}

type ItemKey = (Address, U256);

fn item_key(item: &Item) -> ItemKey {
    (item.asset_contract, item.asset_id)
}

#[derive(Debug, Default)]
struct CustodyBook {
    /// Items in custody and who deposited them.
    held: HashMap<ItemKey, Address>,
    /// Last address each released item went to.
    released_to: HashMap<ItemKey, Address>,
}

/// Custody as a pair of maps. An item can be taken in when it isn't already
/// held and released when it is.
#[derive(Debug, Default)]
pub struct InMemoryCustody {
    book: RwLock<CustodyBook>,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, item: &Item) -> bool {
        self.book.read().held.contains_key(&item_key(item))
    }

    pub fn depositor(&self, item: &Item) -> Option<Address> {
        self.book.read().held.get(&item_key(item)).copied()
    }

    pub fn released_to(&self, item: &Item) -> Option<Address> {
        self.book.read().released_to.get(&item_key(item)).copied()
    }

    /// Mark an item as held without a transfer. Used when rebuilding state
    /// from storage.
    pub fn restore_held(&self, item: &Item, depositor: Address) {
        self.book.write().held.insert(item_key(item), depositor);
    }
}

impl CustodyService for InMemoryCustody {
    fn transfer_in(&self, item: &Item, from: Address) -> Result<(), CustodyError> {
        let mut book = self.book.write();
        let key = item_key(item);
        if book.held.contains_key(&key) {
            return Err(CustodyError::AlreadyHeld {
                asset_contract: item.asset_contract,
                asset_id: item.asset_id,
            });
        }
        book.held.insert(key, from);
        book.released_to.remove(&key);
        Ok(())
    }

    fn transfer_out(&self, item: &Item, to: Address) -> Result<(), CustodyError> {
        let mut book = self.book.write();
        let key = item_key(item);
        if book.held.remove(&key).is_none() {
            return Err(CustodyError::NotHeld {
                asset_contract: item.asset_contract,
                asset_id: item.asset_id,
            });
        }
        book.released_to.insert(key, to);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Funds, activates, rejects and liquidates plans.
    FundingAuthority,
    /// Opens vaults, withdraws LP capital and collects fees.
    VaultManager,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::FundingAuthority => write!(f, "FundingAuthority"),
            Role::VaultManager => write!(f, "VaultManager"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{caller} lacks role {role}")]
pub struct AccessDenied {
    pub caller: Address,
    pub role: Role,
}

pub trait AccessControl: Send + Sync {
    fn require_role(&self, caller: Address, role: Role) -> Result<(), AccessDenied>;
}

/// Role grants held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAccessControl {
    grants: RwLock<HashSet<(Address, Role)>>,
}

impl InMemoryAccessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, who: Address, role: Role) {
        self.grants.write().insert((who, role));
    }

    pub fn revoke(&self, who: Address, role: Role) {
        self.grants.write().remove(&(who, role));
    }

    pub fn has_role(&self, who: Address, role: Role) -> bool {
        self.grants.read().contains(&(who, role))
    }
}

impl AccessControl for InMemoryAccessControl {
    fn require_role(&self, caller: Address, role: Role) -> Result<(), AccessDenied> {
        if self.has_role(caller, role) {
            Ok(())
        } else {
            Err(AccessDenied { caller, role })
        }
    }
}

// ---------------------------------------------------------------------------
// Signer registry
// ---------------------------------------------------------------------------

/// Source of the pricing authority's public key.
pub trait SignerRegistry: Send + Sync {
    fn current_authority(&self) -> PublicKey;
}

/// A single authority key that can be rotated at runtime. Offers signed by
/// the previous key stop verifying as soon as it is rotated out.
#[derive(Debug)]
pub struct StaticSignerRegistry {
    authority: RwLock<PublicKey>,
}

impl StaticSignerRegistry {
    pub fn new(authority: PublicKey) -> Self {
        Self {
            authority: RwLock::new(authority),
        }
    }

    pub fn rotate(&self, authority: PublicKey) {
        *self.authority.write() = authority;
    }
}

impl SignerRegistry for StaticSignerRegistry {
    fn current_authority(&self) -> PublicKey {
        *self.authority.read()
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
