// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cyan Protocol Core Primitives
//!
//! The low-level building blocks shared by the payment-plan engine and the
//! operator node. Nothing in here knows what a BNPL plan is; it only knows
//! how to do money math without floats, how to hash and sign tightly packed
//! messages, and how to keep records on disk.
//!
//! ## Architecture
//!
//! - **address**: 20-byte account identifiers with hex text forms.
//! - **math**: Basis-point arithmetic over `u128` smallest units.
//! - **uint**: `U256` identifiers with decimal text and 32-byte binary forms.
//! - **crypto**: SHA-256 / BLAKE3 hashing, packed encoding, Ed25519 keys.
//! - **storage**: sled persistence and the snapshot stack used for test
//!   isolation.
//! - **config**: Protocol constants and domain identifiers.
//!
//! ## Design Philosophy
//!
//! 1. Integers only. A rate is basis points, an amount is the smallest unit.
//! 2. Every overflow is an error, never a wrap.
//! 3. Hash inputs are packed with fixed widths so two encoders can never
//!    disagree about where one field ends.

pub mod address;
pub mod config;
pub mod crypto;
pub mod math;
pub mod storage;
pub mod uint;

pub use address::{Address, AddressError};
pub use math::{apply_bps, MathError};
pub use uint::U256;
