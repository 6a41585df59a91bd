//! # Digital Signatures
//!
//! Free-function wrappers over [`SignerKeypair`] and [`PublicKey`] so every
//! signing and verification path in the workspace goes through one place.

use thiserror::Error;

use super::keys::{PublicKey, Signature, SignerKeypair};

/// Errors during signature verification over raw bytes.
///
/// Intentionally vague. We don't tell callers why verification failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Sign a message with the given keypair.
pub fn sign(keypair: &SignerKeypair, message: &[u8]) -> Signature {
    keypair.sign(message)
}

/// Verify a signature. `true` if valid, `false` for every kind of failure.
pub fn verify(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    public_key.verify(message, signature)
}

/// Verify using bytes straight off the wire.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8; 64],
) -> Result<(), SignatureError> {
    let public_key =
        PublicKey::from_bytes(*public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;
    let signature = Signature::from_bytes(*signature_bytes);
    if public_key.verify(message, &signature) {
        Ok(())
    } else {
        Err(SignatureError::VerificationFailed)
    }
}
