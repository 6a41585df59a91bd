//! # Signature Authorization
//!
//! Every plan starts as an offer priced off-chain. The pricing authority
//! signs a digest binding the item, the terms, the plan id, an expiry and
//! the chain domain; the engine recomputes the digest and checks the
//! signature before it will create anything.
//!
//! ## Digest layout
//!
//! All digests are SHA-256 over tightly packed, fixed-width, big-endian
//! fields (see [`PackedHasher`]):
//!
//! ```text
//! item       = H(vault, assetContract, assetId, amount, kind)
//! terms      = H(principal, downPaymentBp, interestBp, serviceFeeBp,
//!                termMinutes, totalInstallments, paidInstallments, autoRepay)
//! message    = H(item, terms, planId, expiry, chainDomainId)
//! collection = H(collection, chainDomainId, version)
//! ```
//!
//! The chain domain id keeps a signature issued for one deployment from
//! being replayed on another. A signature is single use because its plan id
//! can only ever be created once.

use chrono::{DateTime, Utc};
use cyan_protocol::address::Address;
use cyan_protocol::crypto::keys::{PublicKey, Signature, SignerKeypair};
use cyan_protocol::crypto::PackedHasher;
use cyan_protocol::storage::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::types::{Item, PlanId, PlanTerms};

/// Why an offer or collection signature was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// Checked before the signature, so an expired offer is always reported
    /// as expired regardless of who signed it.
    #[error("authorization expired at {expiry}, now {now}")]
    ExpiredAuthorization { expiry: u64, now: u64 },

    #[error("signature was not produced by the current pricing authority")]
    UnauthorizedSigner,

    #[error("collection {collection} already enabled at version {current}, offered {offered}")]
    StaleCollectionVersion {
        collection: Address,
        current: u64,
        offered: u64,
    },
}

/// A signed offer: the signature plus the expiry it commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationSignature {
    /// Unix seconds after which the offer is void.
    pub expiry_timestamp: u64,
    pub signature: Signature,
}

// ---------------------------------------------------------------------------
// Digests
// ---------------------------------------------------------------------------

pub fn item_digest(item: &Item) -> [u8; 32] {
    PackedHasher::new()
        .address(&item.vault_address)
        .address(&item.asset_contract)
        .uint256(item.asset_id)
        .uint256(item.amount)
        .uint8(item.kind.code())
        .finalize()
}

pub fn terms_digest(terms: &PlanTerms) -> [u8; 32] {
    PackedHasher::new()
        .uint256(terms.principal_amount)
        .uint32(terms.down_payment_percent_bp)
        .uint32(terms.interest_rate_bp)
        .uint32(terms.service_fee_rate_bp)
        .uint32(terms.term_minutes)
        .uint8(terms.total_installments)
        .uint8(terms.paid_installments)
        .uint8(terms.auto_repay_status.code())
        .finalize()
}

pub fn message_digest(
    item_digest: &[u8; 32],
    terms_digest: &[u8; 32],
    plan_id: PlanId,
    expiry_timestamp: u64,
    chain_domain_id: u64,
) -> [u8; 32] {
    PackedHasher::new()
        .bytes32(item_digest)
        .bytes32(terms_digest)
        .uint256(plan_id.0)
        .uint256(expiry_timestamp)
        .uint256(chain_domain_id)
        .finalize()
}

/// The digest a pricing authority signs for one offer.
pub fn plan_message(
    item: &Item,
    terms: &PlanTerms,
    plan_id: PlanId,
    expiry_timestamp: u64,
    chain_domain_id: u64,
) -> [u8; 32] {
    message_digest(
        &item_digest(item),
        &terms_digest(terms),
        plan_id,
        expiry_timestamp,
        chain_domain_id,
    )
}

pub fn collection_digest(collection: &Address, chain_domain_id: u64, version: u64) -> [u8; 32] {
    PackedHasher::new()
        .address(collection)
        .uint256(chain_domain_id)
        .uint256(version)
        .finalize()
}

// ---------------------------------------------------------------------------
// Signing & verification
// ---------------------------------------------------------------------------

fn unix_seconds(now: DateTime<Utc>) -> u64 {
    u64::try_from(now.timestamp()).unwrap_or(0)
}

/// Produce an offer signature. Used by operator tooling and tests; the
/// engine itself never holds a signing key.
pub fn sign_plan_authorization(
    keypair: &SignerKeypair,
    item: &Item,
    terms: &PlanTerms,
    plan_id: PlanId,
    expiry_timestamp: u64,
    chain_domain_id: u64,
) -> AuthorizationSignature {
    let digest = plan_message(item, terms, plan_id, expiry_timestamp, chain_domain_id);
    AuthorizationSignature {
        expiry_timestamp,
        signature: keypair.sign(&digest),
    }
}

/// Check an offer against the current authority. Expiry first, then the
/// signature.
pub fn verify_plan_authorization(
    authority: &PublicKey,
    item: &Item,
    terms: &PlanTerms,
    plan_id: PlanId,
    auth: &AuthorizationSignature,
    chain_domain_id: u64,
    now: DateTime<Utc>,
) -> Result<(), AuthorizationError> {
    let now = unix_seconds(now);
    if now > auth.expiry_timestamp {
        return Err(AuthorizationError::ExpiredAuthorization {
            expiry: auth.expiry_timestamp,
            now,
        });
    }

    let digest = plan_message(item, terms, plan_id, auth.expiry_timestamp, chain_domain_id);
    if !authority.verify(&digest, &auth.signature) {
        return Err(AuthorizationError::UnauthorizedSigner);
    }
    Ok(())
}

pub fn sign_collection(
    keypair: &SignerKeypair,
    collection: &Address,
    chain_domain_id: u64,
    version: u64,
) -> Signature {
    keypair.sign(&collection_digest(collection, chain_domain_id, version))
}

pub fn verify_collection(
    authority: &PublicKey,
    collection: &Address,
    chain_domain_id: u64,
    version: u64,
    signature: &Signature,
) -> Result<(), AuthorizationError> {
    let digest = collection_digest(collection, chain_domain_id, version);
    if authority.verify(&digest, signature) {
        Ok(())
    } else {
        Err(AuthorizationError::UnauthorizedSigner)
    }
}

// ---------------------------------------------------------------------------
// Collection registry
// ---------------------------------------------------------------------------

/// An enabled collection and the signature version it was enabled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub collection: Address,
    pub version: u64,
}

impl Record for CollectionEntry {
    const TREE: &'static str = "collections";

    fn key(&self) -> Vec<u8> {
        self.collection.as_bytes().to_vec()
    }
}

/// Collections whose signed enablement has been accepted. Versions only go
/// up; re-submitting an old signature is refused.
#[derive(Debug, Clone, Default)]
pub struct CollectionRegistry {
    enabled: HashMap<Address, u64>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `collection` at `version`. The caller has already verified the
    /// signature.
    pub fn enable(&mut self, collection: Address, version: u64) -> Result<(), AuthorizationError> {
        if let Some(&current) = self.enabled.get(&collection) {
            if version <= current {
                return Err(AuthorizationError::StaleCollectionVersion {
                    collection,
                    current,
                    offered: version,
                });
            }
        }
        self.enabled.insert(collection, version);
        Ok(())
    }

    pub fn is_enabled(&self, collection: &Address) -> bool {
        self.enabled.contains_key(collection)
    }

    pub fn version_of(&self, collection: &Address) -> Option<u64> {
        self.enabled.get(collection).copied()
    }

    pub fn entries(&self) -> Vec<CollectionEntry> {
        let mut out: Vec<_> = self
            .enabled
            .iter()
            .map(|(collection, version)| CollectionEntry {
                collection: *collection,
                version: *version,
            })
            .collect();
        out.sort_by_key(|e| e.collection);
        out
    }

    pub fn from_entries<I: IntoIterator<Item = CollectionEntry>>(entries: I) -> Self {
        Self {
            enabled: entries
                .into_iter()
                .map(|e| (e.collection, e.version))
                .collect(),
        }
    }
}
