//! Builds a [`TenantStore`] from environment values or from the tenant document.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::{TenancyConfig, TenancyMode, DEFAULT_SINGLE_TENANT_ID};
use crate::document::{bootstrap_template_document, read_tenant_document};
use crate::env::EnvSnapshot;
use crate::error::{TenancyError, TenancyResult};
use crate::record::{
    TenantRecord, DEFAULT_ACCENT_COLOR, DEFAULT_BRAND_DESCRIPTION, DEFAULT_BRAND_NAME,
    DEFAULT_ICON_COLOR, DEFAULT_ICON_OUTLINE, DEFAULT_INBOX_API_URL, DEFAULT_TENANT_NAME,
    DEFAULT_UPLOAD_DIR, DEFAULT_WELCOME_MESSAGE,
};
use crate::store::TenantStore;

pub const ENV_TENANT_NAME: &str = "TENANT_NAME";
pub const ENV_MICROSOFT_APP_ID: &str = "MICROSOFT_APP_ID";
pub const ENV_MICROSOFT_APP_PASSWORD: &str = "MICROSOFT_APP_PASSWORD";
pub const ENV_MICROSOFT_APP_TENANT_ID: &str = "MICROSOFT_APP_TENANT_ID";
pub const ENV_FRESHCHAT_API_KEY: &str = "FRESHCHAT_API_KEY";
pub const ENV_FRESHCHAT_API_URL: &str = "FRESHCHAT_API_URL";
pub const ENV_FRESHCHAT_INBOX_ID: &str = "FRESHCHAT_INBOX_ID";
pub const ENV_FRESHCHAT_WEBHOOK_PUBLIC_KEY: &str = "FRESHCHAT_WEBHOOK_PUBLIC_KEY";
pub const ENV_FRESHCHAT_WEBHOOK_SIGNATURE_STRICT: &str = "FRESHCHAT_WEBHOOK_SIGNATURE_STRICT";
pub const ENV_WELCOME_MESSAGE: &str = "WELCOME_MESSAGE";
pub const ENV_PUBLIC_URL: &str = "PUBLIC_URL";
pub const ENV_UPLOAD_DIR: &str = "UPLOAD_DIR";
pub const ENV_BOT_NAME: &str = "BOT_NAME";
pub const ENV_BOT_DESCRIPTION: &str = "BOT_DESCRIPTION";
pub const ENV_BOT_ACCENT_COLOR: &str = "BOT_ACCENT_COLOR";
pub const ENV_BOT_ICON_COLOR: &str = "BOT_ICON_COLOR";
pub const ENV_BOT_ICON_OUTLINE: &str = "BOT_ICON_OUTLINE";

/// Maps single-mode environment values onto one record.
///
/// Settings and branding fall back to defaults; credentials stay empty when
/// unset so downstream checks can tell they are missing.
pub fn tenant_from_environment(
    env: &EnvSnapshot,
    tenant_id: &str,
    loaded_at: DateTime<Utc>,
) -> TenantRecord {
    let mut record = TenantRecord::new(tenant_id, loaded_at);
    record.name = env.get_or(ENV_TENANT_NAME, DEFAULT_TENANT_NAME);

    record.bot.app_id = env.get_or_empty(ENV_MICROSOFT_APP_ID);
    record.bot.app_password = env.get_or_empty(ENV_MICROSOFT_APP_PASSWORD);
    record.bot.tenant_id = env.get_or_empty(ENV_MICROSOFT_APP_TENANT_ID);

    record.inbox.api_key = env.get_or_empty(ENV_FRESHCHAT_API_KEY);
    record.inbox.api_url = env.get_or(ENV_FRESHCHAT_API_URL, DEFAULT_INBOX_API_URL);
    record.inbox.inbox_id = env.get_or_empty(ENV_FRESHCHAT_INBOX_ID);
    record.inbox.webhook_public_key = env.get_or_empty(ENV_FRESHCHAT_WEBHOOK_PUBLIC_KEY);
    record.inbox.signature_strict = env.get_bool(ENV_FRESHCHAT_WEBHOOK_SIGNATURE_STRICT, true);

    record.settings.welcome_message = env.get_or(ENV_WELCOME_MESSAGE, DEFAULT_WELCOME_MESSAGE);
    record.settings.public_url = env.get_or_empty(ENV_PUBLIC_URL);
    record.settings.upload_dir = env.get_or(ENV_UPLOAD_DIR, DEFAULT_UPLOAD_DIR);

    record.branding.display_name = env.get_or(ENV_BOT_NAME, DEFAULT_BRAND_NAME);
    record.branding.description = env.get_or(ENV_BOT_DESCRIPTION, DEFAULT_BRAND_DESCRIPTION);
    record.branding.accent_color = env.get_or(ENV_BOT_ACCENT_COLOR, DEFAULT_ACCENT_COLOR);
    record.branding.icon_color = env.get_or(ENV_BOT_ICON_COLOR, DEFAULT_ICON_COLOR);
    record.branding.icon_outline = env.get_or(ENV_BOT_ICON_OUTLINE, DEFAULT_ICON_OUTLINE);
    record
}

/// Runs the loader selected by `config.mode`.
pub fn load_tenant_store(config: &TenancyConfig) -> TenancyResult<TenantStore> {
    config.validate()?;
    let store = match config.mode {
        TenancyMode::Single => load_single_tenant_store(config)?,
        TenancyMode::Multi => load_multi_tenant_store(config)?,
    };
    let summary = store.summary();
    info!(
        mode = %summary.mode,
        active_tenants = summary.active_tenants,
        retained_inactive_tenants = summary.retained_inactive_tenants,
        default_tenant = summary.default_tenant.as_deref().unwrap_or("-"),
        "tenant registry loaded"
    );
    Ok(store)
}

fn load_single_tenant_store(config: &TenancyConfig) -> TenancyResult<TenantStore> {
    let tenant_id = config
        .default_tenant
        .as_deref()
        .map(str::trim)
        .unwrap_or(DEFAULT_SINGLE_TENANT_ID)
        .to_string();
    let env = config.environment.snapshot();
    let record = tenant_from_environment(&env, &tenant_id, relay_core::utc_now());
    TenantStore::build(
        TenancyMode::Single,
        Some(tenant_id),
        None,
        vec![record],
    )
    .map_err(|conflict| TenancyError::Configuration(conflict.to_string()))
}

fn load_multi_tenant_store(config: &TenancyConfig) -> TenancyResult<TenantStore> {
    let path = config.document_path.as_path();
    let document = match read_tenant_document(path)? {
        Some(document) => document,
        None => bootstrap_template_document(path).unwrap_or_default(),
    };

    let mut records = Vec::with_capacity(document.tenants.len());
    for mut record in document.tenants {
        let tenant_id = record.tenant_id.trim().to_string();
        if tenant_id.is_empty() {
            return Err(TenancyError::Configuration(format!(
                "tenant document {} contains a tenant without a tenantId",
                path.display()
            )));
        }
        record.tenant_id = tenant_id;
        records.push(record);
    }

    let declared_default_tenant = document
        .default_tenant
        .map(|tenant_id| tenant_id.trim().to_string())
        .filter(|tenant_id| !tenant_id.is_empty());
    let default_tenant = config
        .default_tenant
        .as_deref()
        .map(str::trim)
        .filter(|tenant_id| !tenant_id.is_empty())
        .map(str::to_string)
        .or_else(|| declared_default_tenant.clone())
        .or_else(|| {
            records
                .iter()
                .find(|record| record.active)
                .map(|record| record.tenant_id.clone())
        });

    TenantStore::build(
        TenancyMode::Multi,
        default_tenant,
        Some(path.to_path_buf()),
        records,
    )
    .map(|store| store.with_declared_default_tenant(declared_default_tenant))
    .map_err(|conflict| {
        TenancyError::Configuration(format!(
            "tenant document {}: {conflict}",
            path.display()
        ))
    })
}
