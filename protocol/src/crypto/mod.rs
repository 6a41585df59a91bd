//! # Cryptographic Primitives
//!
//! Everything that signs, verifies or hashes flows through here.
//!
//! - **Ed25519** for authorization signatures. The pricing service holds the
//!   signing key; the engine only ever sees the public half.
//! - **SHA-256** over tightly packed fields for authorization digests, so an
//!   off-chain signer in any language can reproduce them byte for byte.
//! - **BLAKE3** for internal fingerprints (ledger snapshots) where nobody
//!   outside the node needs to agree with us.
//!
//! Nothing here is hand-rolled. These are thin, typed wrappers over audited
//! crates.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, sha256, sha256_array, PackedHasher};
pub use keys::{KeyError, PublicKey, Signature, SignerKeypair};
pub use signatures::{sign, verify, verify_raw, SignatureError};
