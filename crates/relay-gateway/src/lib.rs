//! HTTP surface of the relay: inbound bot activities, inbound inbox webhooks,
//! health, and the tenant admin API.
//!
//! Every inbound event is resolved to exactly one tenant through the
//! [`relay_tenancy::TenantRegistry`] before anything else happens. Webhooks
//! are additionally checked against the tenant's signing key. Accepted events
//! are handed to a [`RelaySink`].

use std::sync::Arc;

use relay_tenancy::{TenancyResult, TenantRegistry};

mod admin;
mod api_error;
mod inbound;
mod relay_sink;
mod server;

pub use api_error::ApiError;
pub use relay_sink::{OutboxRelaySink, RelayDirection, RelayEvent, RelaySink};
pub use server::{build_gateway_router, run_gateway_server, GatewayConfig, DEFAULT_GATEWAY_BIND};

pub const TEAMS_MESSAGES_ENDPOINT: &str = "/api/messages";
pub const INBOX_WEBHOOK_ENDPOINT: &str = "/freshchat/webhook";
pub const HEALTH_ENDPOINT: &str = "/healthz";
pub const ADMIN_TENANTS_ENDPOINT: &str = "/admin/tenants";
pub const ADMIN_TENANT_ENDPOINT: &str = "/admin/tenants/{tenant_id}";
pub const ADMIN_TENANT_DEACTIVATE_ENDPOINT: &str = "/admin/tenants/{tenant_id}/deactivate";
pub const ADMIN_RELOAD_ENDPOINT: &str = "/admin/reload";

/// Shared state behind every handler.
pub struct GatewayState {
    pub registry: Arc<TenantRegistry>,
    pub sink: Arc<dyn RelaySink>,
    admin_token: Option<String>,
}

impl GatewayState {
    pub fn new(registry: Arc<TenantRegistry>, sink: Arc<dyn RelaySink>) -> Self {
        Self {
            registry,
            sink,
            admin_token: None,
        }
    }

    /// Enables the admin API. A blank token leaves it disabled.
    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        self
    }

    pub(crate) fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    /// Runs `operation` against the registry on the blocking pool. Any
    /// registry call may read or rewrite the tenant document while holding
    /// the registry's write lock.
    pub(crate) async fn with_registry<T, F>(&self, operation: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&TenantRegistry) -> TenancyResult<T> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let join = tokio::task::spawn_blocking(move || operation(&registry));
        let result = join.await.map_err(|error| {
            ApiError::internal(
                "registry_task_failed",
                format!("failed to join tenant registry task: {error}"),
            )
        })?;
        Ok(result?)
    }
}
