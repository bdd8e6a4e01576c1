//! Router and handlers.
//!
//! Handlers are thin: extract identity and body, call the application
//! service, translate the result. Caller identity arrives in the
//! `x-sprout-user` header, set by the authenticating reverse proxy in
//! front of this service; webhook callers authenticate with a shared
//! bearer secret instead.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use sprout_common::{
    AgentChangesRequest, ChangeRequestEvent, CreatePrototypeRequest, IngestResponse,
    PreviewResponse, PrototypeStatus, PrototypeView, SubmitResponse,
};

use crate::api::error::ApiError;
use crate::application::locks::PrototypeLocks;
use crate::application::ports::{
    DatabaseBranches, DeploymentConfig, PrototypeStore, VersionControl,
};
use crate::application::services::{ingest, lifecycle, provision};
use crate::domain::BranchNamer;

/// Header carrying the authenticated owner identity.
const USER_HEADER: &str = "x-sprout-user";

pub struct AppState<V, D, C, S> {
    pub vcs: V,
    pub db: D,
    pub deploy: C,
    pub store: S,
    pub locks: PrototypeLocks,
    pub namer: BranchNamer,
    /// Environment-variable key the connection string is bound under.
    pub database_url_key: String,
    /// Shared secret for agent-webhook callers; `None` disables the check.
    pub agent_webhook_secret: Option<String>,
}

pub fn router<V, D, C, S>(state: Arc<AppState<V, D, C, S>>) -> Router
where
    V: VersionControl + Send + Sync + 'static,
    D: DatabaseBranches + Send + Sync + 'static,
    C: DeploymentConfig + Send + Sync + 'static,
    S: PrototypeStore + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/api/prototypes",
            post(create_prototype).get(list_prototypes),
        )
        .route(
            "/api/prototypes/{id}",
            get(get_prototype).delete(archive_prototype),
        )
        .route("/api/prototypes/{id}/submit", post(submit_prototype))
        .route("/api/prototypes/{id}/preview", post(refresh_preview))
        .route("/api/webhooks/agent", post(agent_changes))
        .route("/api/webhooks/change-request", post(change_request_merged))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

fn owner_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized("Missing caller identity header."))
}

fn check_webhook_auth(headers: &HeaderMap, secret: Option<&str>) -> Result<(), ApiError> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if presented == Some(secret) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("Invalid webhook credentials."))
    }
}

#[derive(Deserialize)]
struct ListQuery {
    /// Status filter; `filter` is accepted as an alias for older callers.
    #[serde(alias = "filter")]
    status: Option<PrototypeStatus>,
    search: Option<String>,
}

async fn create_prototype<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Json(body): Json<CreatePrototypeRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    V: VersionControl + Send + Sync,
    D: DatabaseBranches + Send + Sync,
    C: DeploymentConfig + Send + Sync,
    S: PrototypeStore + Send + Sync,
{
    let owner = owner_id(&headers)?;
    let prototype = provision::provision(
        &state.vcs,
        &state.db,
        &state.deploy,
        &state.store,
        &state.namer,
        &state.database_url_key,
        &owner,
        &body.description,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(prototype.view())))
}

async fn list_prototypes<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<PrototypeView>>, ApiError>
where
    S: PrototypeStore + Send + Sync,
{
    let owner = owner_id(&headers)?;
    let prototypes = lifecycle::list(
        &state.store,
        &owner,
        query.status,
        query.search.as_deref(),
    )
    .await?;
    Ok(Json(prototypes.iter().map(|p| p.view()).collect()))
}

async fn get_prototype<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PrototypeView>, ApiError>
where
    S: PrototypeStore + Send + Sync,
{
    let owner = owner_id(&headers)?;
    let prototype = lifecycle::fetch(&state.store, &id, &owner).await?;
    Ok(Json(prototype.view()))
}

async fn archive_prototype<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    V: VersionControl + Send + Sync,
    D: DatabaseBranches + Send + Sync,
    C: DeploymentConfig + Send + Sync,
    S: PrototypeStore + Send + Sync,
{
    let owner = owner_id(&headers)?;
    lifecycle::archive(
        &state.vcs,
        &state.db,
        &state.deploy,
        &state.store,
        &state.locks,
        &id,
        &owner,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_prototype<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SubmitResponse>, ApiError>
where
    V: VersionControl + Send + Sync,
    S: PrototypeStore + Send + Sync,
{
    let owner = owner_id(&headers)?;
    let change_request =
        lifecycle::submit(&state.vcs, &state.store, &state.locks, &id, &owner).await?;
    Ok(Json(SubmitResponse {
        change_request_number: change_request.number,
        change_request_url: change_request.url,
    }))
}

async fn refresh_preview<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>, ApiError>
where
    C: DeploymentConfig + Send + Sync,
    S: PrototypeStore + Send + Sync,
{
    let owner = owner_id(&headers)?;
    let deployment =
        lifecycle::refresh_preview(&state.deploy, &state.store, &state.locks, &id, &owner).await?;
    Ok(Json(PreviewResponse {
        preview_url: deployment.url,
        deployment_state: deployment.state,
    }))
}

async fn agent_changes<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Json(body): Json<AgentChangesRequest>,
) -> Result<Json<IngestResponse>, ApiError>
where
    V: VersionControl + Send + Sync,
    S: PrototypeStore + Send + Sync,
{
    check_webhook_auth(&headers, state.agent_webhook_secret.as_deref())?;
    let committed = ingest::ingest(
        &state.vcs,
        &state.store,
        &state.locks,
        &body.project_id,
        &body.files,
        body.message.as_deref(),
    )
    .await?;
    Ok(Json(IngestResponse { committed }))
}

async fn change_request_merged<V, D, C, S>(
    State(state): State<Arc<AppState<V, D, C, S>>>,
    headers: HeaderMap,
    Json(body): Json<ChangeRequestEvent>,
) -> Result<Json<PrototypeView>, ApiError>
where
    S: PrototypeStore + Send + Sync,
{
    // Merge is a terminal transition; this webhook takes the same shared
    // secret as the agent webhook so an anonymous caller cannot drive it.
    check_webhook_auth(&headers, state.agent_webhook_secret.as_deref())?;
    let prototype =
        lifecycle::mark_merged(&state.store, &state.locks, body.change_request_number).await?;
    Ok(Json(prototype.view()))
}
