//! # REST API
//!
//! Builds the axum router that exposes the plan engine over HTTP. Handlers
//! share [`AppState`] through axum's `State` extractor. Privileged calls
//! identify the caller with the `x-caller` header.
//!
//! ## Endpoints
//!
//! | Method | Path                            | Description                        |
//! |--------|---------------------------------|------------------------------------|
//! | GET    | `/health`                       | Liveness check                     |
//! | GET    | `/status`                       | Node and ledger summary            |
//! | POST   | `/quote`                        | Price a set of terms               |
//! | POST   | `/vaults`                       | Open a vault                       |
//! | GET    | `/vaults/:address`              | Vault account                      |
//! | POST   | `/vaults/:address/deposit`      | LP deposit                         |
//! | POST   | `/vaults/:address/withdraw`     | Withdraw lendable liquidity        |
//! | POST   | `/vaults/:address/collect-fees` | Pay out accrued fees               |
//! | GET    | `/plans`                        | Every plan                         |
//! | POST   | `/plans/bnpl`                   | Create a BNPL plan                 |
//! | POST   | `/plans/pawn`                   | Create a pawn plan                 |
//! | GET    | `/plans/:id`                    | Plan record                        |
//! | GET    | `/plans/:id/payment-info`       | Next payment (`?early=true`)       |
//! | POST   | `/plans/:id/fund`               | Advance the financed amount        |
//! | POST   | `/plans/:id/activate`           | Start the installment clock        |
//! | POST   | `/plans/:id/reject`             | Decline and refund                 |
//! | POST   | `/plans/:id/pay`                | Pay one or all installments        |
//! | POST   | `/plans/:id/default`            | Flag an overdue plan               |
//! | POST   | `/plans/:id/liquidate`          | Sell defaulted collateral          |
//! | POST   | `/plans/:id/auto-repay`         | Owner's auto-repay preference      |
//! | POST   | `/sweep`                        | Default every overdue plan now     |
//! | POST   | `/collections`                  | Enable a collection                |
//! | GET    | `/collections/:address`         | Collection enablement              |

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cyan_contracts::authorization::{AuthorizationError, AuthorizationSignature};
use cyan_contracts::engine::{
    CreationReceipt, LiquidationReceipt, PaymentInfo, PaymentReceipt, PlanEngine,
};
use cyan_contracts::error::{PlanError, PlanResult};
use cyan_contracts::schedule::{expected_plan, ScheduleQuote};
use cyan_contracts::types::{AutoRepayStatus, Item, Plan, PlanId, PlanTerms};
use cyan_contracts::vault::{CollectedFees, VaultAccount, VaultError};
use cyan_protocol::address::Address;
use cyan_protocol::crypto::keys::Signature;

use crate::metrics::SharedMetrics;
use crate::store::PlanStore;

/// Header carrying the caller's address.
pub const CALLER_HEADER: &str = "x-caller";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub version: String,
    /// Network name derived from the chain domain.
    pub network: String,
    pub engine: Arc<PlanEngine>,
    pub store: PlanStore,
    pub metrics: SharedMetrics,
    /// Held across each write and its write-through, so the ledger sees
    /// commits in the order the engine applied them.
    commits: Arc<Mutex<()>>,
}

/// Records a committed operation changed.
#[derive(Debug, Clone, Copy)]
pub enum Touched {
    /// A plan and the vault funding it.
    Plan(PlanId),
    Vault(Address),
    Collections,
}

impl AppState {
    pub fn new(
        version: String,
        network: String,
        engine: Arc<PlanEngine>,
        store: PlanStore,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            version,
            network,
            engine,
            store,
            metrics,
            commits: Arc::new(Mutex::new(())),
        }
    }

    /// Run an engine operation, timing it and counting failures.
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&PlanEngine) -> PlanResult<T>,
    ) -> Result<T, ApiError> {
        let timer = self.metrics.operation_latency_seconds.start_timer();
        let result = f(&self.engine);
        timer.observe_duration();
        result.map_err(|e| {
            self.metrics.record_failure(operation);
            tracing::debug!(operation, error = %e, "operation refused");
            ApiError::Plan(e)
        })
    }

    /// Run a write and persist what it touched before the next write starts.
    pub fn commit<T>(
        &self,
        operation: &'static str,
        touched: Touched,
        f: impl FnOnce(&PlanEngine) -> PlanResult<T>,
    ) -> Result<T, ApiError> {
        let _serial = self.commits.lock();
        let value = self.run(operation, f)?;
        self.persist(touched)?;
        Ok(value)
    }

    fn persist(&self, touched: Touched) -> Result<(), ApiError> {
        let synced = match touched {
            Touched::Plan(plan_id) => self.store.sync_plan(&self.engine, plan_id),
            Touched::Vault(address) => self.store.sync_vault(&self.engine, address),
            Touched::Collections => self.store.sync_collections(&self.engine),
        };
        synced.map_err(ApiError::storage)?;
        self.refresh_gauges();
        Ok(())
    }

    pub fn refresh_gauges(&self) {
        self.metrics
            .observe_book(self.engine.plan_count(), self.engine.total_outstanding());
    }

    /// Default every overdue plan and persist the result.
    pub fn sweep(&self) -> Result<Vec<PlanId>, ApiError> {
        let _serial = self.commits.lock();
        let flagged = self.engine.sweep_defaults();
        for plan_id in &flagged {
            self.persist(Touched::Plan(*plan_id))?;
            self.metrics.record_transition("defaulted");
        }
        self.metrics.swept_defaults_total.inc_by(flagged.len() as u64);
        Ok(flagged)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing x-caller header")]
    MissingCaller,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ApiError {
    fn storage(e: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{e:#}"), "write-through failed");
        ApiError::Storage(format!("{e:#}"))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::MissingCaller => (StatusCode::UNAUTHORIZED, "missing_caller"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            ApiError::Plan(e) => plan_error_status(e),
        }
    }
}

fn plan_error_status(e: &PlanError) -> (StatusCode, &'static str) {
    match e {
        PlanError::InvalidTerms(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_terms"),
        PlanError::Authorization(AuthorizationError::ExpiredAuthorization { .. }) => {
            (StatusCode::UNAUTHORIZED, "expired_authorization")
        }
        PlanError::Authorization(AuthorizationError::UnauthorizedSigner) => {
            (StatusCode::UNAUTHORIZED, "unauthorized_signer")
        }
        PlanError::Authorization(AuthorizationError::StaleCollectionVersion { .. }) => {
            (StatusCode::CONFLICT, "stale_collection_version")
        }
        PlanError::Vault(VaultError::InsufficientLiquidity { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_liquidity")
        }
        PlanError::Vault(VaultError::VaultExists(_)) => (StatusCode::CONFLICT, "vault_exists"),
        PlanError::Vault(VaultError::Math(_)) | PlanError::Overflow => {
            (StatusCode::UNPROCESSABLE_ENTITY, "overflow")
        }
        PlanError::Custody(_) => (StatusCode::CONFLICT, "custody_failed"),
        PlanError::AccessDenied(_) => (StatusCode::FORBIDDEN, "access_denied"),
        PlanError::NotPlanOwner { .. } => (StatusCode::FORBIDDEN, "not_plan_owner"),
        PlanError::PreconditionViolation { .. } => (StatusCode::CONFLICT, "precondition_violation"),
        PlanError::PlanNotFound(_) => (StatusCode::NOT_FOUND, "plan_not_found"),
        PlanError::VaultNotFound(_) => (StatusCode::NOT_FOUND, "vault_not_found"),
        PlanError::DuplicatePlan(_) => (StatusCode::CONFLICT, "duplicate_plan"),
        PlanError::InsufficientPayment { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "insufficient_payment")
        }
        PlanError::PaymentOverdue { .. } => (StatusCode::CONFLICT, "payment_overdue"),
        PlanError::NotYetDue { .. } => (StatusCode::CONFLICT, "not_yet_due"),
    }
}

/// Error body returned on every failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable error kind.
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Caller extraction
// ---------------------------------------------------------------------------

/// The address in the `x-caller` header.
pub struct Caller(pub Address);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CALLER_HEADER)
            .ok_or(ApiError::MissingCaller)?;
        let text = value
            .to_str()
            .map_err(|_| ApiError::BadRequest(format!("{CALLER_HEADER} is not ASCII")))?;
        text.parse::<Address>()
            .map(Caller)
            .map_err(|e| ApiError::BadRequest(format!("{CALLER_HEADER}: {e}")))
    }
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("address {raw}: {e}")))
}

fn parse_plan_id(raw: &str) -> Result<PlanId, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("plan id: {e}")))
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full router with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/quote", post(quote_handler))
        .route("/vaults", post(open_vault_handler))
        .route("/vaults/:address", get(vault_handler))
        .route("/vaults/:address/deposit", post(deposit_handler))
        .route("/vaults/:address/withdraw", post(withdraw_handler))
        .route("/vaults/:address/collect-fees", post(collect_fees_handler))
        .route("/plans", get(plans_handler))
        .route("/plans/bnpl", post(create_bnpl_handler))
        .route("/plans/pawn", post(create_pawn_handler))
        .route("/plans/:id", get(plan_handler))
        .route("/plans/:id/payment-info", get(payment_info_handler))
        .route("/plans/:id/fund", post(fund_handler))
        .route("/plans/:id/activate", post(activate_handler))
        .route("/plans/:id/reject", post(reject_handler))
        .route("/plans/:id/pay", post(pay_handler))
        .route("/plans/:id/default", post(default_handler))
        .route("/plans/:id/liquidate", post(liquidate_handler))
        .route("/plans/:id/auto-repay", post(auto_repay_handler))
        .route("/sweep", post(sweep_handler))
        .route("/collections", post(enable_collection_handler))
        .route("/collections/:address", get(collection_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request & Response Types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub network: String,
    pub chain_domain_id: u64,
    pub plans: usize,
    pub total_outstanding: u128,
    /// BLAKE3 fingerprint of the persisted ledger, hex encoded.
    pub ledger_fingerprint: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OpenVaultRequest {
    pub address: Address,
    #[serde(default)]
    pub safety_fund_percent_bp: Option<u32>,
    #[serde(default)]
    pub service_fee_percent_bp: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AmountRequest {
    pub amount: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateBnplRequest {
    pub plan_id: PlanId,
    pub item: Item,
    pub terms: PlanTerms,
    pub authorization: AuthorizationSignature,
    /// Offered down payment. Any excess comes back as change.
    pub down_payment: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePawnRequest {
    pub plan_id: PlanId,
    pub item: Item,
    pub terms: PlanTerms,
    pub authorization: AuthorizationSignature,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PayRequest {
    pub amount: u128,
    #[serde(default)]
    pub early: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentInfoQuery {
    #[serde(default)]
    pub early: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LiquidateRequest {
    pub proceeds: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoRepayRequest {
    pub status: AutoRepayStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RejectResponse {
    pub plan_id: PlanId,
    pub refunded: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub defaulted: Vec<PlanId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EnableCollectionRequest {
    pub collection: Address,
    pub version: u64,
    pub signature: Signature,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionResponse {
    pub collection: Address,
    pub enabled: bool,
    pub version: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers: node
// ---------------------------------------------------------------------------

/// `GET /health`. Liveness only; `/status` reports on the ledger.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn status_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let ledger_fingerprint = state.store.fingerprint().map_err(ApiError::storage)?;
    Ok(Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        chain_domain_id: state.engine.config().chain_domain_id,
        plans: state.engine.plan_count(),
        total_outstanding: state.engine.total_outstanding(),
        ledger_fingerprint,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

async fn quote_handler(Json(terms): Json<PlanTerms>) -> Result<Json<ScheduleQuote>, ApiError> {
    let quote = expected_plan(&terms).map_err(PlanError::from)?;
    Ok(Json(quote))
}

// ---------------------------------------------------------------------------
// Handlers: vaults
// ---------------------------------------------------------------------------

async fn open_vault_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<OpenVaultRequest>,
) -> Result<(StatusCode, Json<VaultAccount>), ApiError> {
    let vault = state.commit("open_vault", Touched::Vault(req.address), |e| {
        e.open_vault(
            caller,
            req.address,
            req.safety_fund_percent_bp,
            req.service_fee_percent_bp,
        )
    })?;
    Ok((StatusCode::CREATED, Json(vault)))
}

async fn vault_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<VaultAccount>, ApiError> {
    let address = parse_address(&address)?;
    Ok(Json(state.run("vault", |e| e.vault(address))?))
}

async fn deposit_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<VaultAccount>, ApiError> {
    let address = parse_address(&address)?;
    let vault = state.commit("deposit", Touched::Vault(address), |e| {
        e.deposit(address, req.amount)
    })?;
    Ok(Json(vault))
}

async fn withdraw_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(address): Path<String>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<VaultAccount>, ApiError> {
    let address = parse_address(&address)?;
    let vault = state.commit("withdraw", Touched::Vault(address), |e| {
        e.withdraw(caller, address, req.amount)
    })?;
    Ok(Json(vault))
}

async fn collect_fees_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(address): Path<String>,
) -> Result<Json<CollectedFees>, ApiError> {
    let address = parse_address(&address)?;
    let fees = state.commit("collect_fees", Touched::Vault(address), |e| {
        e.collect_fees(caller, address)
    })?;
    Ok(Json(fees))
}

// ---------------------------------------------------------------------------
// Handlers: plans
// ---------------------------------------------------------------------------

async fn plans_handler(State(state): State<AppState>) -> Json<Vec<Plan>> {
    Json(state.engine.plans())
}

async fn plan_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    Ok(Json(state.run("plan", |e| e.plan(plan_id))?))
}

async fn payment_info_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PaymentInfoQuery>,
) -> Result<Json<PaymentInfo>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    Ok(Json(state.run("payment_info", |e| {
        e.get_payment_info(plan_id, query.early)
    })?))
}

async fn create_bnpl_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateBnplRequest>,
) -> Result<(StatusCode, Json<CreationReceipt>), ApiError> {
    let receipt = state.commit("create_bnpl", Touched::Plan(req.plan_id), |e| {
        e.create_bnpl(
            caller,
            req.item,
            req.terms,
            req.plan_id,
            &req.authorization,
            req.down_payment,
        )
    })?;
    state.metrics.plans_created_total.with_label_values(&["bnpl"]).inc();
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn create_pawn_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreatePawnRequest>,
) -> Result<(StatusCode, Json<CreationReceipt>), ApiError> {
    let receipt = state.commit("create_pawn", Touched::Plan(req.plan_id), |e| {
        e.create_pawn(caller, req.item, req.terms, req.plan_id, &req.authorization)
    })?;
    state.metrics.plans_created_total.with_label_values(&["pawn"]).inc();
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn fund_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    state.commit("fund", Touched::Plan(plan_id), |e| e.fund(caller, plan_id))?;
    state.metrics.record_transition("funded");
    Ok(Json(state.run("plan", |e| e.plan(plan_id))?))
}

async fn activate_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    state.commit("activate", Touched::Plan(plan_id), |e| {
        e.activate(caller, plan_id)
    })?;
    state.metrics.record_transition("active");
    Ok(Json(state.run("plan", |e| e.plan(plan_id))?))
}

async fn reject_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Result<Json<RejectResponse>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    let refunded = state.commit("reject", Touched::Plan(plan_id), |e| {
        e.reject(caller, plan_id)
    })?;
    state.metrics.record_transition("rejected");
    Ok(Json(RejectResponse { plan_id, refunded }))
}

/// Anyone may pay; the `x-caller` header names the payer.
async fn pay_handler(
    State(state): State<AppState>,
    Caller(payer): Caller,
    Path(id): Path<String>,
    Json(req): Json<PayRequest>,
) -> Result<Json<PaymentReceipt>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    let receipt = state.commit("pay", Touched::Plan(plan_id), |e| {
        e.pay(plan_id, payer, req.amount, req.early)
    })?;
    state.metrics.payments_total.inc();
    if receipt.status.is_terminal() {
        state.metrics.record_transition("completed");
    }
    Ok(Json(receipt))
}

async fn default_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    state.commit("mark_defaulted", Touched::Plan(plan_id), |e| {
        e.mark_defaulted(plan_id)
    })?;
    state.metrics.record_transition("defaulted");
    Ok(Json(state.run("plan", |e| e.plan(plan_id))?))
}

async fn liquidate_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<LiquidateRequest>,
) -> Result<Json<LiquidationReceipt>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    let receipt = state.commit("liquidate", Touched::Plan(plan_id), |e| {
        e.liquidate(caller, plan_id, req.proceeds)
    })?;
    state.metrics.record_transition("liquidated");
    Ok(Json(receipt))
}

async fn auto_repay_handler(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    Json(req): Json<AutoRepayRequest>,
) -> Result<Json<Plan>, ApiError> {
    let plan_id = parse_plan_id(&id)?;
    state.commit("set_auto_repay_status", Touched::Plan(plan_id), |e| {
        e.set_auto_repay_status(plan_id, caller, req.status)
    })?;
    Ok(Json(state.run("plan", |e| e.plan(plan_id))?))
}

async fn sweep_handler(State(state): State<AppState>) -> Result<Json<SweepResponse>, ApiError> {
    Ok(Json(SweepResponse {
        defaulted: state.sweep()?,
    }))
}

// ---------------------------------------------------------------------------
// Handlers: collections
// ---------------------------------------------------------------------------

async fn enable_collection_handler(
    State(state): State<AppState>,
    Json(req): Json<EnableCollectionRequest>,
) -> Result<Json<CollectionResponse>, ApiError> {
    state.commit("enable_collection", Touched::Collections, |e| {
        e.enable_collection(req.collection, req.version, &req.signature)
    })?;
    Ok(Json(CollectionResponse {
        collection: req.collection,
        enabled: true,
        version: Some(req.version),
    }))
}

async fn collection_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<CollectionResponse>, ApiError> {
    let collection = parse_address(&address)?;
    Ok(Json(CollectionResponse {
        collection,
        enabled: state.engine.is_collection_enabled(&collection),
        version: state.engine.collection_version(&collection),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
