//! Errors surfaced by the plan engine.
//!
//! Each module owns its own error type; [`PlanError`] composes them so an
//! engine caller matches on one enum. Nothing here is retried internally.

use chrono::{DateTime, Utc};
use cyan_protocol::address::Address;
use cyan_protocol::math::MathError;
use thiserror::Error;

use crate::authorization::AuthorizationError;
use crate::schedule::ScheduleError;
use crate::services::{AccessDenied, CustodyError};
use crate::types::{PlanId, PlanStatus};
use crate::vault::VaultError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    // ---- Input ------------------------------------------------------------
    /// The terms can't be priced.
    #[error("invalid terms: {0}")]
    InvalidTerms(#[from] ScheduleError),

    /// Expired offer or wrong signer.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    // ---- Collaborators ----------------------------------------------------
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error("custody failed: {0}")]
    Custody(#[from] CustodyError),

    #[error("access denied: {0}")]
    AccessDenied(#[from] AccessDenied),

    // ---- Lifecycle --------------------------------------------------------
    /// The plan isn't in a status that allows `action`.
    #[error("cannot {action} plan {plan_id} while {status}")]
    PreconditionViolation {
        plan_id: PlanId,
        status: PlanStatus,
        action: &'static str,
    },

    #[error("plan {0} not found")]
    PlanNotFound(PlanId),

    /// Plan ids are single use; so is every signature bound to one.
    #[error("plan {0} already exists")]
    DuplicatePlan(PlanId),

    #[error("vault {0} not found")]
    VaultNotFound(Address),

    #[error("plan {plan_id} is owned by {owner}, not {caller}")]
    NotPlanOwner {
        plan_id: PlanId,
        owner: Address,
        caller: Address,
    },

    // ---- Payments ---------------------------------------------------------
    #[error("insufficient payment: required {required}, offered {offered}")]
    InsufficientPayment { required: u128, offered: u128 },

    /// The installment is late. Only default and liquidation remain.
    #[error("plan {plan_id} payment overdue since {due}")]
    PaymentOverdue { plan_id: PlanId, due: DateTime<Utc> },

    /// Default was requested before the due date passed.
    #[error("plan {plan_id} not due until {due}")]
    NotYetDue { plan_id: PlanId, due: DateTime<Utc> },

    #[error("arithmetic overflow")]
    Overflow,
}

impl From<MathError> for PlanError {
    fn from(_: MathError) -> Self {
        PlanError::Overflow
    }
}

pub type PlanResult<T> = Result<T, PlanError>;
