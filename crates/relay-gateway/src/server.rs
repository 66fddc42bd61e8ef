//! Gateway server bootstrap and router wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use relay_tenancy::TenantRegistry;
use tokio::net::TcpListener;
use tracing::info;

use crate::admin::{
    handle_deactivate_tenant, handle_get_tenant, handle_list_tenants, handle_reload,
    handle_upsert_tenant,
};
use crate::inbound::{handle_health, handle_inbox_webhook, handle_teams_activity};
use crate::relay_sink::RelaySink;
use crate::{
    GatewayState, ADMIN_RELOAD_ENDPOINT, ADMIN_TENANTS_ENDPOINT, ADMIN_TENANT_DEACTIVATE_ENDPOINT,
    ADMIN_TENANT_ENDPOINT, HEALTH_ENDPOINT, INBOX_WEBHOOK_ENDPOINT, TEAMS_MESSAGES_ENDPOINT,
};

pub const DEFAULT_GATEWAY_BIND: &str = "127.0.0.1:3978";

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind: String,
    pub admin_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_GATEWAY_BIND.to_string(),
            admin_token: None,
        }
    }
}

/// Serves the gateway until ctrl-c.
pub async fn run_gateway_server(
    config: GatewayConfig,
    registry: Arc<TenantRegistry>,
    sink: Arc<dyn RelaySink>,
) -> Result<()> {
    let bind_addr = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid gateway bind address '{}'", config.bind))?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind relay gateway on {bind_addr}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve bound gateway address")?;

    let state = GatewayState::new(registry, sink).with_admin_token(config.admin_token);
    info!(
        addr = %local_addr,
        mode = %state.registry.mode(),
        admin_enabled = state.admin_token().is_some(),
        "relay gateway listening"
    );

    let app = build_gateway_router(Arc::new(state));
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("relay gateway exited unexpectedly")?;
    info!("relay gateway stopped");
    Ok(())
}

pub fn build_gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route(TEAMS_MESSAGES_ENDPOINT, post(handle_teams_activity))
        .route(INBOX_WEBHOOK_ENDPOINT, post(handle_inbox_webhook))
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(ADMIN_TENANTS_ENDPOINT, get(handle_list_tenants))
        .route(
            ADMIN_TENANT_ENDPOINT,
            get(handle_get_tenant).put(handle_upsert_tenant),
        )
        .route(
            ADMIN_TENANT_DEACTIVATE_ENDPOINT,
            post(handle_deactivate_tenant),
        )
        .route(ADMIN_RELOAD_ENDPOINT, post(handle_reload))
        .with_state(state)
}
