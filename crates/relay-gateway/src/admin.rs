//! Bearer-protected tenant administration.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use relay_tenancy::{TenantPatch, TenantRecord};
use serde_json::{json, Value};
use tracing::info;

use crate::api_error::ApiError;
use crate::GatewayState;

fn bearer_token_from_headers(headers: &HeaderMap) -> Option<&str> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = raw.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn authorize_admin_request(state: &GatewayState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.admin_token() else {
        return Err(ApiError::not_found(
            "admin_disabled",
            "admin API is disabled; set RELAY_ADMIN_TOKEN to enable it",
        ));
    };
    match bearer_token_from_headers(headers) {
        Some(observed) if observed == expected => Ok(()),
        _ => Err(ApiError::unauthorized()),
    }
}

fn tenant_not_found(tenant_id: &str) -> ApiError {
    ApiError::not_found("tenant_not_found", format!("tenant '{tenant_id}' does not exist"))
}

fn redacted_json(record: &TenantRecord) -> Json<Value> {
    Json(json!({ "tenant": record.redacted() }))
}

pub(crate) async fn handle_list_tenants(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize_admin_request(&state, &headers)?;
    let (summary, tenants) = state
        .with_registry(|registry| Ok((registry.summary()?, registry.get_all_tenants()?)))
        .await?;
    let tenants: Vec<TenantRecord> = tenants.iter().map(TenantRecord::redacted).collect();
    Ok(Json(json!({ "summary": summary, "tenants": tenants })))
}

pub(crate) async fn handle_get_tenant(
    State(state): State<Arc<GatewayState>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize_admin_request(&state, &headers)?;
    let lookup_id = tenant_id.clone();
    let tenant = state
        .with_registry(move |registry| registry.get_tenant(Some(&lookup_id)))
        .await?
        .ok_or_else(|| tenant_not_found(&tenant_id))?;
    Ok(redacted_json(&tenant))
}

pub(crate) async fn handle_upsert_tenant(
    State(state): State<Arc<GatewayState>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    authorize_admin_request(&state, &headers)?;
    let mut patch: TenantPatch = if body.iter().all(u8::is_ascii_whitespace) {
        TenantPatch::default()
    } else {
        serde_json::from_slice(&body).map_err(|error| {
            ApiError::bad_request("invalid_patch", format!("tenant patch is invalid: {error}"))
        })?
    };
    patch.tenant_id = tenant_id;
    let record = state
        .with_registry(move |registry| registry.upsert_tenant(patch))
        .await?;
    info!(tenant_id = %record.tenant_id, "tenant upserted via admin API");
    Ok(redacted_json(&record))
}

pub(crate) async fn handle_deactivate_tenant(
    State(state): State<Arc<GatewayState>>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize_admin_request(&state, &headers)?;
    let target_id = tenant_id.clone();
    let record = state
        .with_registry(move |registry| registry.deactivate_tenant(&target_id))
        .await?
        .ok_or_else(|| tenant_not_found(&tenant_id))?;
    Ok(redacted_json(&record))
}

pub(crate) async fn handle_reload(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    authorize_admin_request(&state, &headers)?;
    let summary = state
        .with_registry(|registry| {
            registry.reload()?;
            registry.summary()
        })
        .await?;
    Ok(Json(json!({ "status": "reloaded", "summary": summary })))
}
