use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::audit::ConsistencyAuditor;
use super::domain::{Actor, ApplicationId, ApplicationStatus, NewApplication, PropertyId, UserRole};
use super::expiry::ExpirySweeper;
use super::notify::Notifier;
use super::service::{Decision, LeasingError, LeasingService};
use super::store::EntityStore;

/// Header carrying the authenticated user id, set by the auth collaborator
/// upstream of this service. The value is trusted as-is.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";
/// Header carrying the authenticated role (`tenant` or `owner`).
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Router builder exposing the application lifecycle endpoints.
pub fn application_router<S, N>(service: Arc<LeasingService<S, N>>) -> Router
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/applications",
            post(create_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/my",
            get(my_applications_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/received",
            get(received_applications_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/stats",
            get(stats_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(get_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/decision",
            put(decision_handler::<S, N>),
        )
        .route(
            "/api/v1/applications/:application_id/withdraw",
            put(withdraw_handler::<S, N>),
        )
        .route(
            "/api/v1/properties/:property_id/applications",
            get(property_applications_handler::<S, N>),
        )
        .route(
            "/api/v1/properties/:property_id/release",
            put(release_handler::<S, N>),
        )
        .with_state(service)
}

/// Router builder for the operational endpoints: sweep, audit, repair.
pub fn ops_router<S>(sweeper: Arc<ExpirySweeper<S>>, auditor: Arc<ConsistencyAuditor<S>>) -> Router
where
    S: EntityStore + 'static,
{
    Router::new()
        .route("/api/v1/ops/expiry/sweep", post(sweep_handler::<S>))
        .route("/api/v1/ops/consistency", get(diagnose_handler::<S>))
        .route(
            "/api/v1/ops/consistency/repair",
            post(repair_handler::<S>),
        )
        .with_state((sweeper, auditor))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecisionRequest {
    status: DecisionStatus,
    #[serde(default)]
    owner_response: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum DecisionStatus {
    Approved,
    Rejected,
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Response> {
    let id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let role = headers
        .get(ACTOR_ROLE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(UserRole::parse);

    match (id, role) {
        (Some(id), Some(role)) => Ok(Actor::new(id, role)),
        _ => {
            let payload = json!({
                "error": {
                    "kind": "unauthenticated",
                    "message": "missing or invalid actor headers",
                }
            });
            Err((StatusCode::UNAUTHORIZED, Json(payload)).into_response())
        }
    }
}

fn parse_status_filter(query: &StatusQuery) -> Result<Option<ApplicationStatus>, Response> {
    match query.status.as_deref() {
        None => Ok(None),
        Some(raw) => match ApplicationStatus::parse(raw) {
            Some(status) => Ok(Some(status)),
            None => {
                let payload = json!({
                    "error": {
                        "kind": "validation",
                        "message": format!("unknown status filter: {raw}"),
                    }
                });
                Err((StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response())
            }
        },
    }
}

fn error_response(err: LeasingError) -> Response {
    let status = match &err {
        LeasingError::NotFound { .. } => StatusCode::NOT_FOUND,
        LeasingError::Forbidden(_) => StatusCode::FORBIDDEN,
        LeasingError::InvalidState { .. }
        | LeasingError::Duplicate { .. }
        | LeasingError::Conflict => StatusCode::CONFLICT,
        LeasingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LeasingError::Transaction(_) => StatusCode::SERVICE_UNAVAILABLE,
        LeasingError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut error = json!({
        "kind": err.kind(),
        "message": err.to_string(),
    });
    if let LeasingError::Duplicate { existing } = &err {
        error["existingApplication"] = json!(existing.0);
    }

    (status, Json(json!({ "error": error }))).into_response()
}

async fn create_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Json(intake): Json<NewApplication>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.create_application(&actor, intake) {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.get_application(&actor, &ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn my_applications_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let status = match parse_status_filter(&query) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match service.my_applications(&actor, status) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn received_applications_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let status = match parse_status_filter(&query) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match service.received_applications(&actor, status) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn stats_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.application_stats(&actor) {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn decision_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    Json(request): Json<DecisionRequest>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let decision = match request.status {
        DecisionStatus::Approved => Decision::Approve,
        DecisionStatus::Rejected => Decision::Reject,
    };
    match service.decide_application(
        &actor,
        &ApplicationId(application_id),
        decision,
        request.owner_response,
    ) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn withdraw_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.withdraw_application(&actor, &ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn property_applications_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
    Query(query): Query<StatusQuery>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    let status = match parse_status_filter(&query) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match service.property_applications(&actor, &PropertyId(property_id), status) {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn release_handler<S, N>(
    State(service): State<Arc<LeasingService<S, N>>>,
    headers: HeaderMap,
    Path(property_id): Path<String>,
) -> Response
where
    S: EntityStore + 'static,
    N: Notifier + 'static,
{
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.release_property(&actor, &PropertyId(property_id)) {
        Ok(property) => (StatusCode::OK, Json(property)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn sweep_handler<S>(
    State((sweeper, _)): State<(Arc<ExpirySweeper<S>>, Arc<ConsistencyAuditor<S>>)>,
) -> Response
where
    S: EntityStore + 'static,
{
    match sweeper.sweep(Utc::now()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn diagnose_handler<S>(
    State((_, auditor)): State<(Arc<ExpirySweeper<S>>, Arc<ConsistencyAuditor<S>>)>,
) -> Response
where
    S: EntityStore + 'static,
{
    match auditor.diagnose() {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn repair_handler<S>(
    State((_, auditor)): State<(Arc<ExpirySweeper<S>>, Arc<ConsistencyAuditor<S>>)>,
) -> Response
where
    S: EntityStore + 'static,
{
    match auditor.repair(Utc::now()) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}
