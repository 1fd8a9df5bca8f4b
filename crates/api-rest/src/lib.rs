//! # API REST
//!
//! REST API for the delivery dispatch workflows.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, status codes)
//!
//! All business rules live in `dispatch-core`; handlers only translate between HTTP and the
//! workflow types.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use dispatch_core::duplicates::DuplicateWarning;
use dispatch_core::workflows::assignment::{AssignmentFailure, AssignmentReport, AssignmentRequest};
use dispatch_core::workflows::split::{DisplayedLine, QuantitySplitRequest, SplitOutcome};
use dispatch_core::workflows::submission::{
    CommitReport, DuplicateSignal, FailureKind, SubmissionFailure, SubmissionOutcome,
    SubmissionState,
};
use dispatch_core::{
    DeliveryDraft, DeliveryEntry, DeliveryGateway, DispatchConfig, DispatchError, DispatchResult,
    DraftStore, HttpDeliveryGateway, HttpNotificationSender, InMemoryDraftStore, Notice,
    NotificationDispatcher, NotificationSender, PharmacyAssignmentWorkflow,
    QuantitySplitWorkflow, RefreshSignal, SubmissionWorkflow,
};

/// Application state for the REST API server
///
/// One draft store and one submission workflow are shared by every request. The workflow sits
/// behind an async mutex so a submit and a confirm can never interleave.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DraftStore>,
    gateway: Arc<dyn DeliveryGateway>,
    submission: Arc<Mutex<SubmissionWorkflow>>,
    split: Arc<QuantitySplitWorkflow>,
    assignment: Arc<PharmacyAssignmentWorkflow>,
    refresh: RefreshSignal,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn DeliveryGateway>,
        sender: Arc<dyn NotificationSender>,
        notifications_enabled: bool,
    ) -> Self {
        let store: Arc<dyn DraftStore> = Arc::new(InMemoryDraftStore::new());
        let refresh = RefreshSignal::new();
        let dispatcher = NotificationDispatcher::new(sender, notifications_enabled);

        Self {
            submission: Arc::new(Mutex::new(SubmissionWorkflow::new(
                gateway.clone(),
                dispatcher.clone(),
                store.clone(),
                refresh.clone(),
            ))),
            split: Arc::new(QuantitySplitWorkflow::new(gateway.clone(), refresh.clone())),
            assignment: Arc::new(PharmacyAssignmentWorkflow::new(
                gateway.clone(),
                dispatcher,
                refresh.clone(),
            )),
            store,
            gateway,
            refresh,
        }
    }

    /// Wire the HTTP gateway and notification sender from resolved configuration.
    pub fn from_config(cfg: &DispatchConfig) -> DispatchResult<Self> {
        let client = cfg.http_client()?;
        let gateway = HttpDeliveryGateway::new(client.clone(), cfg.backend_url().clone());
        let sender = HttpNotificationSender::new(client, cfg.notify_url().clone());
        Ok(Self::new(
            Arc::new(gateway),
            Arc::new(sender),
            cfg.notifications_enabled(),
        ))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        get_draft,
        set_draft,
        reset_draft,
        edit_entry,
        submit,
        confirm,
        submission_state,
        split,
        assign,
        delete_delivery,
    ),
    components(schemas(
        HealthRes,
        ConfirmReq,
        SubmissionStateRes,
        SplitReq,
        SplitRes,
        DeleteRes,
        DeliveryDraft,
        DeliveryEntry,
        SubmissionOutcome,
        SubmissionState,
        SubmissionFailure,
        FailureKind,
        DuplicateSignal,
        DuplicateWarning,
        CommitReport,
        QuantitySplitRequest,
        DisplayedLine,
        SplitOutcome,
        AssignmentRequest,
        AssignmentReport,
        AssignmentFailure,
        Notice,
    ))
)]
pub struct ApiDoc;

/// Build the REST router, including Swagger UI.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/draft", get(get_draft).put(set_draft).delete(reset_draft))
        .route("/draft/edit", post(edit_entry))
        .route("/submissions", post(submit))
        .route("/submissions/confirm", post(confirm))
        .route("/submissions/state", get(submission_state))
        .route("/splits", post(split))
        .route("/assignments", post(assign))
        .route("/deliveries/:entry_id", delete(delete_delivery))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `addr` and serve the REST API until the server stops.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    tracing::info!("-- Starting dispatch REST API on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============================================================================
// Request/response bodies
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmReq {
    /// `true` resends with duplicates confirmed; `false` cancels.
    pub proceed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionStateRes {
    pub state: SubmissionState,
    pub is_submitting: bool,
    pub pending_warnings: Vec<DuplicateWarning>,
    pub history: Vec<SubmissionState>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SplitReq {
    pub line: DisplayedLine,
    pub request: QuantitySplitRequest,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SplitRes {
    pub outcome: SplitOutcome,
    /// The line as it should now be displayed.
    pub line: DisplayedLine,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteQuery {
    pub procedure_id: String,
    pub diagnosis_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteRes {
    pub deleted: bool,
    pub notice: Notice,
}

type ApiError = (StatusCode, String);

fn api_error(e: DispatchError) -> ApiError {
    let status = match &e {
        DispatchError::InvalidInput(_)
        | DispatchError::Validation(_)
        | DispatchError::MissingIdentifier(_) => StatusCode::BAD_REQUEST,
        DispatchError::SubmissionInProgress | DispatchError::NoPendingConfirmation => {
            StatusCode::CONFLICT
        }
        DispatchError::Network(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("REST handler error: {:?}", e);
    }
    (status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Dispatch REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/draft",
    responses(
        (status = 200, description = "Current draft", body = DeliveryDraft),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
async fn get_draft(State(state): State<AppState>) -> Result<Json<DeliveryDraft>, ApiError> {
    state.store.get().map(Json).map_err(api_error)
}

#[utoipa::path(
    put,
    path = "/draft",
    request_body = DeliveryDraft,
    responses(
        (status = 200, description = "Draft replaced", body = DeliveryDraft),
        (status = 409, description = "A submission is in progress")
    )
)]
/// Replace the current draft
///
/// Editing is locked while a submission is in flight or awaiting duplicate confirmation.
#[axum::debug_handler]
async fn set_draft(
    State(state): State<AppState>,
    Json(draft): Json<DeliveryDraft>,
) -> Result<Json<DeliveryDraft>, ApiError> {
    let _editing = ensure_editable(&state).await?;
    state.store.set(draft.clone()).map_err(api_error)?;
    Ok(Json(draft))
}

#[utoipa::path(
    delete,
    path = "/draft",
    responses(
        (status = 200, description = "Draft cleared", body = DeliveryDraft),
        (status = 409, description = "A submission is in progress")
    )
)]
#[axum::debug_handler]
async fn reset_draft(State(state): State<AppState>) -> Result<Json<DeliveryDraft>, ApiError> {
    let _editing = ensure_editable(&state).await?;
    state.store.reset().map_err(api_error)?;
    state.store.get().map(Json).map_err(api_error)
}

#[utoipa::path(
    post,
    path = "/draft/edit",
    request_body = DeliveryEntry,
    responses(
        (status = 200, description = "Entry loaded into the draft for editing", body = DeliveryDraft),
        (status = 409, description = "A submission is in progress")
    )
)]
/// Load an existing delivery line into the draft for editing
#[axum::debug_handler]
async fn edit_entry(
    State(state): State<AppState>,
    Json(entry): Json<DeliveryEntry>,
) -> Result<Json<DeliveryDraft>, ApiError> {
    let _editing = ensure_editable(&state).await?;
    state.store.load_for_edit(&entry).map_err(api_error)?;
    state.store.get().map(Json).map_err(api_error)
}

/// Hold the workflow lock for the length of a draft edit; no submission can start until the
/// returned guard is dropped.
async fn ensure_editable(
    state: &AppState,
) -> Result<MutexGuard<'_, SubmissionWorkflow>, ApiError> {
    let workflow = state.submission.lock().await;
    if workflow.is_submitting() {
        return Err(api_error(DispatchError::SubmissionInProgress));
    }
    Ok(workflow)
}

#[utoipa::path(
    post,
    path = "/submissions",
    responses(
        (status = 200, description = "Submission outcome", body = SubmissionOutcome),
        (status = 409, description = "A submission is already in progress")
    )
)]
/// Submit the current draft
///
/// A `duplicateDetected` outcome means the backend found an overlapping delivery; resolve it
/// with `POST /submissions/confirm`.
#[axum::debug_handler]
async fn submit(State(state): State<AppState>) -> Result<Json<SubmissionOutcome>, ApiError> {
    let mut workflow = state.submission.lock().await;
    workflow.submit().await.map(Json).map_err(api_error)
}

#[utoipa::path(
    post,
    path = "/submissions/confirm",
    request_body = ConfirmReq,
    responses(
        (status = 200, description = "Outcome after the duplicate decision", body = SubmissionOutcome),
        (status = 409, description = "No duplicate confirmation is pending")
    )
)]
/// Confirm or decline a pending duplicate submission
#[axum::debug_handler]
async fn confirm(
    State(state): State<AppState>,
    Json(req): Json<ConfirmReq>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let mut workflow = state.submission.lock().await;
    workflow.confirm(req.proceed).await.map(Json).map_err(api_error)
}

#[utoipa::path(
    get,
    path = "/submissions/state",
    responses(
        (status = 200, description = "Current submission state", body = SubmissionStateRes)
    )
)]
#[axum::debug_handler]
async fn submission_state(State(state): State<AppState>) -> Json<SubmissionStateRes> {
    let workflow = state.submission.lock().await;
    Json(SubmissionStateRes {
        state: workflow.state(),
        is_submitting: workflow.is_submitting(),
        pending_warnings: workflow.pending_warnings().to_vec(),
        history: workflow.history().to_vec(),
    })
}

#[utoipa::path(
    post,
    path = "/splits",
    request_body = SplitReq,
    responses(
        (status = 200, description = "Split outcome and the line to display", body = SplitRes)
    )
)]
/// Reduce a delivery line's quantity and re-pool the difference
#[axum::debug_handler]
async fn split(State(state): State<AppState>, Json(req): Json<SplitReq>) -> Json<SplitRes> {
    let SplitReq { mut line, request } = req;
    let outcome = state.split.split(&mut line, &request).await;
    Json(SplitRes { outcome, line })
}

#[utoipa::path(
    post,
    path = "/assignments",
    request_body = AssignmentRequest,
    responses(
        (status = 200, description = "Per-entry assignment results", body = AssignmentReport)
    )
)]
/// Assign several delivery lines to one pharmacy
#[axum::debug_handler]
async fn assign(
    State(state): State<AppState>,
    Json(req): Json<AssignmentRequest>,
) -> Json<AssignmentReport> {
    Json(state.assignment.assign(req).await)
}

#[utoipa::path(
    delete,
    path = "/deliveries/{entry_id}",
    params(
        ("entry_id" = String, Path, description = "Delivery entry id"),
        DeleteQuery
    ),
    responses(
        (status = 200, description = "Delete result", body = DeleteRes),
        (status = 400, description = "Missing identifier"),
        (status = 502, description = "Backend unreachable")
    )
)]
/// Delete one procedure/diagnosis line of a delivery
#[axum::debug_handler]
async fn delete_delivery(
    State(state): State<AppState>,
    AxumPath(entry_id): AxumPath<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteRes>, ApiError> {
    let result = state
        .gateway
        .delete(&entry_id, &query.procedure_id, &query.diagnosis_id)
        .await
        .map_err(api_error)?;

    if !result.is_accepted() {
        return Ok(Json(DeleteRes {
            deleted: false,
            notice: Notice::error(result.failure_message()),
        }));
    }

    state.refresh.notify();
    tracing::info!(%entry_id, procedure_id = %query.procedure_id, "delivery line deleted");
    Ok(Json(DeleteRes {
        deleted: true,
        notice: Notice::success("Delivery deleted."),
    }))
}
