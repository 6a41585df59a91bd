//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256** for anything an external signer must reproduce. Offers are
//!   priced and signed off-chain, so the authorization digests use the hash
//!   every language ships with.
//! - **BLAKE3** for node-internal fingerprints, where speed matters and
//!   interoperability doesn't.
//!
//! ## Packed encoding
//!
//! Authorization digests hash fields back to back with fixed widths and no
//! length prefixes: a uint256 is 32 big-endian bytes, a uint32 is 4, a uint8
//! is 1, an address is 20. Because every width is fixed by the field's type,
//! two different field sequences of the same schema can't produce the same
//! byte string. [`PackedHasher`] is the only way digests get built, so the
//! widths live in exactly one place.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::uint::{to_be_bytes, U256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use cyan_protocol::crypto::sha256;
///
/// let hash = sha256(b"cyan");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    sha256_array(data).to_vec()
}

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Incremental SHA-256 over tightly packed, fixed-width fields.
///
/// ```
/// use cyan_protocol::crypto::PackedHasher;
///
/// let a = PackedHasher::new().uint256(1u64).uint8(2).finalize();
/// let b = PackedHasher::new().uint256(1u64).uint8(2).finalize();
/// assert_eq!(a, b);
/// ```
#[derive(Clone, Default)]
pub struct PackedHasher {
    inner: Sha256,
}

impl PackedHasher {
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// A 256-bit unsigned integer, 32 big-endian bytes.
    pub fn uint256(mut self, value: impl Into<U256>) -> Self {
        self.inner.update(to_be_bytes(&value.into()));
        self
    }

    pub fn uint32(mut self, value: u32) -> Self {
        self.inner.update(value.to_be_bytes());
        self
    }

    pub fn uint8(mut self, value: u8) -> Self {
        self.inner.update([value]);
        self
    }

    pub fn address(mut self, value: &Address) -> Self {
        self.inner.update(value.as_bytes());
        self
    }

    /// A previously computed digest.
    pub fn bytes32(mut self, value: &[u8; 32]) -> Self {
        self.inner.update(value);
        self
    }

    pub fn finalize(self) -> [u8; 32] {
        self.inner.finalize().into()
    }
}
