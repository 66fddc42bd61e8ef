//! Inbound handlers: bot-framework activities, inbox webhooks, health.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_trust::{payload_sha256, verify_tenant_webhook, SIGNATURE_HEADER};
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::api_error::ApiError;
use crate::relay_sink::{RelayDirection, RelayEvent};
use crate::GatewayState;

/// Channel prefix bot-framework puts in front of a bot's appId.
const BOT_CHANNEL_PREFIX: &str = "28:";

pub(crate) async fn handle_teams_activity(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let activity: Value = serde_json::from_slice(&body).map_err(|error| {
        ApiError::bad_request("invalid_activity", format!("activity is not valid JSON: {error}"))
    })?;
    let app_id = bot_identity_from_activity(&activity).ok_or_else(|| {
        ApiError::bad_request("missing_bot_identity", "activity has no recipient.id")
    })?;

    let lookup_id = app_id.clone();
    let tenant = state
        .with_registry(move |registry| registry.get_tenant_by_bot_identity(&lookup_id))
        .await?;
    let Some(tenant) = tenant else {
        warn!(bot_app_id = %app_id, "inbound activity for unknown bot identity");
        return Err(ApiError::not_found(
            "unknown_tenant",
            "no active tenant is registered for this bot",
        ));
    };

    let event = RelayEvent::new(tenant.tenant_id.as_str(), RelayDirection::TeamsToInbox, activity);
    state.sink.deliver(event).await.map_err(|error| {
        error!(tenant_id = %tenant.tenant_id, error = %format!("{error:#}"), "relay hand-off failed");
        ApiError::internal("relay_failed", "failed to hand off activity")
    })?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "accepted" }))).into_response())
}

/// Always answers `200 {"status":"received"}`; drops are only visible in logs.
pub(crate) async fn handle_inbox_webhook(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    process_inbox_webhook(&state, &headers, &body).await;
    (StatusCode::OK, Json(json!({ "status": "received" }))).into_response()
}

async fn process_inbox_webhook(state: &GatewayState, headers: &HeaderMap, body: &[u8]) {
    let Ok(event) = serde_json::from_slice::<Value>(body) else {
        warn!(
            payload_sha256 = %payload_sha256(body),
            reason_code = "deny_webhook_payload_malformed",
            "inbound webhook dropped"
        );
        return;
    };
    let Some(inbox_id) = inbox_identity_from_event(&event) else {
        warn!(
            payload_sha256 = %payload_sha256(body),
            reason_code = "deny_webhook_inbox_missing",
            "inbound webhook dropped"
        );
        return;
    };

    let lookup_id = inbox_id.clone();
    let tenant = match state
        .with_registry(move |registry| registry.get_tenant_by_inbox_identity(&lookup_id))
        .await
    {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            warn!(
                inbox_id = %inbox_id,
                payload_sha256 = %payload_sha256(body),
                reason_code = "deny_webhook_unknown_inbox",
                "inbound webhook for unknown inbox identity"
            );
            return;
        }
        Err(error) => {
            error!(
                inbox_id = %inbox_id,
                code = error.code,
                message = %error.message,
                "tenant resolution failed"
            );
            return;
        }
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let verdict = verify_tenant_webhook(&tenant, body, signature);
    verdict.log(&tenant.tenant_id, body);
    if !verdict.is_accepted() {
        return;
    }

    let event = RelayEvent::new(tenant.tenant_id.as_str(), RelayDirection::InboxToTeams, event)
        .with_verification(verdict.status());
    if let Err(error) = state.sink.deliver(event).await {
        error!(tenant_id = %tenant.tenant_id, error = %format!("{error:#}"), "relay hand-off failed");
    }
}

pub(crate) async fn handle_health(
    State(state): State<Arc<GatewayState>>,
) -> Result<Response, ApiError> {
    let summary = state.with_registry(|registry| registry.summary()).await?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "mode": summary.mode,
            "active_tenants": summary.active_tenants,
        })),
    )
        .into_response())
}

fn bot_identity_from_activity(activity: &Value) -> Option<String> {
    let raw = activity
        .get("recipient")
        .and_then(|recipient| recipient.get("id"))
        .and_then(Value::as_str)?
        .trim();
    let app_id = raw.strip_prefix(BOT_CHANNEL_PREFIX).unwrap_or(raw).trim();
    (!app_id.is_empty()).then(|| app_id.to_string())
}

fn inbox_identity_from_event(event: &Value) -> Option<String> {
    [
        event.pointer("/data/message/channel_id"),
        event.pointer("/data/channel_id"),
        event.get("channel_id"),
    ]
    .into_iter()
    .flatten()
    .find_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{bot_identity_from_activity, inbox_identity_from_event};

    #[test]
    fn unit_bot_identity_strips_channel_prefix() {
        let activity = json!({ "recipient": { "id": "28:bot-app-1", "name": "Support" } });
        assert_eq!(
            bot_identity_from_activity(&activity).as_deref(),
            Some("bot-app-1")
        );
        let bare = json!({ "recipient": { "id": "bot-app-2" } });
        assert_eq!(bot_identity_from_activity(&bare).as_deref(), Some("bot-app-2"));
        assert!(bot_identity_from_activity(&json!({ "recipient": { "id": "28:" } })).is_none());
        assert!(bot_identity_from_activity(&json!({ "type": "message" })).is_none());
    }

    #[test]
    fn unit_inbox_identity_prefers_message_channel() {
        let nested = json!({
            "channel_id": "top",
            "data": { "channel_id": "data", "message": { "channel_id": "message" } }
        });
        assert_eq!(inbox_identity_from_event(&nested).as_deref(), Some("message"));

        let data_only = json!({ "data": { "channel_id": "data" } });
        assert_eq!(inbox_identity_from_event(&data_only).as_deref(), Some("data"));

        let top_only = json!({ "channel_id": 42 });
        assert_eq!(inbox_identity_from_event(&top_only).as_deref(), Some("42"));

        assert!(inbox_identity_from_event(&json!({ "data": {} })).is_none());
    }
}
