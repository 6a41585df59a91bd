//! Engine construction via the builder pattern.
//!
//! The only collaborator without a sensible default is the signer registry:
//! an engine that can't verify offers can't create plans. Everything else
//! falls back to the in-memory implementations and the system clock.

use std::sync::Arc;
use thiserror::Error;

use super::{EngineConfig, EngineContext, EngineSnapshot, PlanEngine};
use crate::services::{
    AccessControl, Clock, CustodyService, InMemoryAccessControl, InMemoryCustody, SignerRegistry,
    SystemClock,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("a signer registry is required")]
    MissingSignerRegistry,
}

/// Fluent builder for [`PlanEngine`].
///
/// ```
/// use std::sync::Arc;
/// use cyan_contracts::engine::PlanEngineBuilder;
/// use cyan_contracts::services::StaticSignerRegistry;
/// use cyan_protocol::crypto::keys::SignerKeypair;
///
/// let signer = SignerKeypair::generate();
/// let engine = PlanEngineBuilder::new()
///     .chain_domain(31_337)
///     .signer_registry(Arc::new(StaticSignerRegistry::new(signer.public_key())))
///     .build()
///     .unwrap();
/// assert_eq!(engine.plan_count(), 0);
/// ```
#[derive(Default)]
pub struct PlanEngineBuilder {
    config: EngineConfig,
    custody: Option<Arc<dyn CustodyService>>,
    access: Option<Arc<dyn AccessControl>>,
    signers: Option<Arc<dyn SignerRegistry>>,
    clock: Option<Arc<dyn Clock>>,
    state: Option<EngineSnapshot>,
}

impl PlanEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn chain_domain(mut self, chain_domain_id: u64) -> Self {
        self.config.chain_domain_id = chain_domain_id;
        self
    }

    pub fn custody(mut self, custody: Arc<dyn CustodyService>) -> Self {
        self.custody = Some(custody);
        self
    }

    pub fn access_control(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = Some(access);
        self
    }

    pub fn signer_registry(mut self, signers: Arc<dyn SignerRegistry>) -> Self {
        self.signers = Some(signers);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Start from previously persisted state.
    pub fn state(mut self, snapshot: EngineSnapshot) -> Self {
        self.state = Some(snapshot);
        self
    }

    pub fn build(self) -> Result<PlanEngine, BuildError> {
        let signers = self.signers.ok_or(BuildError::MissingSignerRegistry)?;
        let ctx = EngineContext {
            custody: self
                .custody
                .unwrap_or_else(|| Arc::new(InMemoryCustody::new())),
            access: self
                .access
                .unwrap_or_else(|| Arc::new(InMemoryAccessControl::new())),
            signers,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };
        let engine = PlanEngine::from_parts(self.config, ctx);
        if let Some(state) = self.state {
            engine.restore(state);
        }
        Ok(engine)
    }
}
