//! Offer signatures as the engine sees them: expiry, domain separation,
//! signer rotation and single use.

mod common;

use chrono::Duration;
use common::{Harness, DOMAIN};
use cyan_contracts::authorization::{sign_collection, sign_plan_authorization, AuthorizationError};
use cyan_contracts::error::PlanError;
use cyan_contracts::types::PlanId;
use cyan_protocol::address::Address;
use cyan_protocol::crypto::keys::SignerKeypair;

#[test]
fn expired_offer_is_refused() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::bnpl_terms();
    let auth = h.sign(&item, &terms, PlanId::new(1));
    h.clock.advance(Duration::seconds(61));

    let err = h
        .engine
        .create_bnpl(h.user, item, terms, PlanId::new(1), &auth, u128::MAX)
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::Authorization(AuthorizationError::ExpiredAuthorization { .. })
    ));
}

#[test]
fn expiry_wins_over_a_bad_signature() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::pawn_terms();
    let stranger = SignerKeypair::from_seed(&[1u8; 32]);
    let auth = sign_plan_authorization(&stranger, &item, &terms, PlanId::new(1), 0, DOMAIN);

    let err = h
        .engine
        .create_pawn(h.user, item, terms, PlanId::new(1), &auth)
        .unwrap_err();
    assert!(matches!(
        err,
        PlanError::Authorization(AuthorizationError::ExpiredAuthorization { .. })
    ));
}

#[test]
fn signature_for_another_domain_fails() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::pawn_terms();
    let expiry = h.clock_secs() + 60;
    let auth = sign_plan_authorization(&h.signer, &item, &terms, PlanId::new(1), expiry, 1);

    assert_eq!(
        h.engine
            .create_pawn(h.user, item, terms, PlanId::new(1), &auth)
            .unwrap_err(),
        PlanError::Authorization(AuthorizationError::UnauthorizedSigner)
    );
}

#[test]
fn tampered_terms_fail() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::pawn_terms();
    let auth = h.sign(&item, &terms, PlanId::new(1));

    let mut cheaper = terms.clone();
    cheaper.interest_rate_bp = 100;
    assert_eq!(
        h.engine
            .create_pawn(h.user, item, cheaper, PlanId::new(1), &auth)
            .unwrap_err(),
        PlanError::Authorization(AuthorizationError::UnauthorizedSigner)
    );
    h.assert_vault_balanced();
}

#[test]
fn rotated_signer_invalidates_old_offers() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::pawn_terms();
    let auth = h.sign(&item, &terms, PlanId::new(1));

    let next = SignerKeypair::from_seed(&[2u8; 32]);
    h.signers.rotate(next.public_key());
    assert_eq!(
        h.engine
            .create_pawn(h.user, item.clone(), terms.clone(), PlanId::new(1), &auth)
            .unwrap_err(),
        PlanError::Authorization(AuthorizationError::UnauthorizedSigner)
    );

    let expiry = h.clock_secs() + 60;
    let fresh = sign_plan_authorization(&next, &item, &terms, PlanId::new(1), expiry, DOMAIN);
    h.engine
        .create_pawn(h.user, item, terms, PlanId::new(1), &fresh)
        .unwrap();
}

#[test]
fn signature_is_single_use() {
    let h = Harness::new();
    let item = h.item(1);
    let terms = Harness::pawn_terms();
    let auth = h.sign(&item, &terms, PlanId::new(1));
    h.engine
        .create_pawn(h.user, item.clone(), terms.clone(), PlanId::new(1), &auth)
        .unwrap();

    let outstanding = h.engine.vault(h.vault).unwrap().principal_outstanding;
    assert_eq!(
        h.engine
            .create_pawn(h.user, item, terms, PlanId::new(1), &auth)
            .unwrap_err(),
        PlanError::DuplicatePlan(PlanId::new(1))
    );
    assert_eq!(
        h.engine.vault(h.vault).unwrap().principal_outstanding,
        outstanding
    );
}

#[test]
fn collections_enable_with_signed_versions() {
    let h = Harness::new();
    let collection = Address::from_low_u8(0x99);
    assert!(!h.engine.is_collection_enabled(&collection));

    let forged = sign_collection(&SignerKeypair::from_seed(&[3u8; 32]), &collection, DOMAIN, 1);
    assert!(h.engine.enable_collection(collection, 1, &forged).is_err());

    let v1 = sign_collection(&h.signer, &collection, DOMAIN, 1);
    h.engine.enable_collection(collection, 1, &v1).unwrap();
    assert!(h.engine.is_collection_enabled(&collection));

    assert!(matches!(
        h.engine.enable_collection(collection, 1, &v1),
        Err(PlanError::Authorization(
            AuthorizationError::StaleCollectionVersion { .. }
        ))
    ));
    let v2 = sign_collection(&h.signer, &collection, DOMAIN, 2);
    h.engine.enable_collection(collection, 2, &v2).unwrap();
}
