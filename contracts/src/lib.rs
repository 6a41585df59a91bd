// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cyan Payment Plans
//!
//! Collateral-backed installment financing: buy-now-pay-later plans that a
//! vault funds after the buyer puts a down payment on an item, and pawn loans
//! where the borrower hands the item over and gets principal straight away.
//!
//! - **Schedule**: pure installment math. Same terms, same numbers, down to
//!   the truncated smallest unit.
//! - **Authorization**: an off-chain pricing authority signs each offer;
//!   the engine only accepts plans whose item, terms and id carry a fresh
//!   signature for this chain domain.
//! - **Vault**: pooled liquidity that advances principal, takes repayments,
//!   and splits interest between the safety fund, the vault fee and LPs.
//! - **Engine**: the plan lifecycle state machine tying the three together.
//!
//! ## Design Principles
//!
//! 1. Every amount is a `u128` in the smallest unit and every rate is basis
//!    points. Overflow is an error.
//! 2. State transitions are explicit enum variants checked against a table.
//! 3. An operation either commits everything it touched or nothing at all.
//! 4. Collaborators (custody, roles, signer keys, time) sit behind traits so
//!    the engine runs the same against in-memory fakes and real backends.

pub mod authorization;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod services;
pub mod types;
pub mod vault;

pub use engine::{EngineConfig, EngineContext, EngineSnapshot, PlanEngine, PlanEngineBuilder};
pub use error::PlanError;
pub use schedule::{expected_plan, ScheduleQuote};
pub use types::{Item, ItemKind, Plan, PlanId, PlanKind, PlanStatus, PlanTerms};
