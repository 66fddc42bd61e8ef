use std::fmt::Write as _;
use std::path::Path;

use anyhow::{bail, Context, Result};
use relay_tenancy::{
    StoreSummary, TenancyConfig, TenancyMode, TenantPatch, TenantRecord, TenantRegistry,
};
use relay_trust::parse_webhook_public_key;

use crate::cli_args::TenantsCommand;

pub(crate) fn execute_tenants_command(
    config: TenancyConfig,
    command: &TenantsCommand,
) -> Result<String> {
    match command {
        TenantsCommand::Check => check_tenant_configuration(config),
        TenantsCommand::List { json } => list_tenants(&open_registry(config)?, *json),
        TenantsCommand::Show { tenant_id } => {
            show_tenant(&open_registry(config)?, tenant_id.as_deref())
        }
        TenantsCommand::Upsert { file } => upsert_tenant_from_file(&open_registry(config)?, file),
        TenantsCommand::Deactivate { tenant_id } => {
            deactivate_tenant(&open_registry(config)?, tenant_id)
        }
    }
}

fn open_registry(config: TenancyConfig) -> Result<TenantRegistry> {
    TenantRegistry::open(config).context("failed to load tenants")
}

fn list_tenants(registry: &TenantRegistry, json: bool) -> Result<String> {
    let tenants: Vec<TenantRecord> = registry
        .get_all_tenants()?
        .iter()
        .map(TenantRecord::redacted)
        .collect();
    if json {
        return serde_json::to_string_pretty(&tenants).context("failed to render tenants");
    }
    let summary = registry.summary()?;
    let mut out = render_summary_line("tenant list", &summary);
    for tenant in &tenants {
        let _ = write!(
            out,
            "\ntenant: id={} name={} bot_app_id={} inbox_id={} webhook_key={} strict={}",
            tenant.tenant_id,
            display_or_dash(&tenant.name),
            display_or_dash(&tenant.bot.app_id),
            display_or_dash(&tenant.inbox.inbox_id),
            if tenant.inbox.webhook_public_key.trim().is_empty() {
                "missing"
            } else {
                "present"
            },
            tenant.inbox.signature_strict,
        );
    }
    Ok(out)
}

fn show_tenant(registry: &TenantRegistry, tenant_id: Option<&str>) -> Result<String> {
    let Some(tenant) = registry.get_tenant(tenant_id)? else {
        match tenant_id {
            Some(tenant_id) => bail!("tenant '{tenant_id}' not found"),
            None => bail!("no default tenant is configured"),
        }
    };
    serde_json::to_string_pretty(&tenant.redacted()).context("failed to render tenant")
}

fn upsert_tenant_from_file(registry: &TenantRegistry, file: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let patch: TenantPatch = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse tenant patch {}", file.display()))?;
    let record = registry.upsert_tenant(patch)?;
    let mut out = format!(
        "tenant upsert: id={} active={} updated_at={}",
        record.tenant_id,
        record.active,
        record
            .updated_at
            .map(|stamp| stamp.to_rfc3339())
            .unwrap_or_else(|| "-".to_string()),
    );
    if registry.mode() == TenancyMode::Single {
        out.push_str("\nnote: single mode does not persist changes; this upsert ends with the process");
    }
    Ok(out)
}

fn deactivate_tenant(registry: &TenantRegistry, tenant_id: &str) -> Result<String> {
    Ok(match registry.deactivate_tenant(tenant_id)? {
        Some(record) => format!(
            "tenant deactivate: id={} active={} deactivated_at={}",
            record.tenant_id,
            record.active,
            record
                .deactivated_at
                .map(|stamp| stamp.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ),
        None => format!("tenant deactivate: id={tenant_id} status=not_found"),
    })
}

fn check_tenant_configuration(config: TenancyConfig) -> Result<String> {
    let registry = TenantRegistry::new(config);
    registry
        .initialize()
        .context("tenant configuration check failed")?;
    let summary = registry.summary()?;
    let mut out = render_summary_line("tenant check", &summary);
    if let Some(path) = registry.document_path() {
        let _ = write!(out, " document={}", path.display());
    }
    let findings: Vec<String> = registry
        .get_all_tenants()?
        .iter()
        .flat_map(tenant_findings)
        .collect();
    if findings.is_empty() {
        out.push_str("\nstatus: ok");
    } else {
        for finding in &findings {
            let _ = write!(out, "\nwarning: {finding}");
        }
        let _ = write!(out, "\nstatus: {} warning(s)", findings.len());
    }
    Ok(out)
}

/// Provisioning gaps that leave an active tenant unroutable or unverifiable.
fn tenant_findings(tenant: &TenantRecord) -> Vec<String> {
    let id = &tenant.tenant_id;
    let mut findings = Vec::new();
    if tenant.bot_identity().is_none() {
        findings.push(format!("tenant '{id}' has no bot appId; Teams activities cannot reach it"));
    }
    if tenant.inbox_identity().is_none() {
        findings.push(format!("tenant '{id}' has no inbox id; webhooks cannot reach it"));
    }
    let key = tenant.inbox.webhook_public_key.trim();
    if key.is_empty() {
        findings.push(format!("tenant '{id}' has no webhook public key"));
    } else if let Err(error) = parse_webhook_public_key(key) {
        findings.push(format!("tenant '{id}' webhook public key is unusable: {error:#}"));
    }
    if !tenant.inbox.signature_strict {
        findings.push(format!(
            "tenant '{id}' accepts unverified webhooks (signatureStrict=false)"
        ));
    }
    findings
}

fn render_summary_line(label: &str, summary: &StoreSummary) -> String {
    format!(
        "{label}: mode={} active={} inactive={} retained_inactive={} default={}",
        summary.mode,
        summary.active_tenants,
        summary.inactive_tenants,
        summary.retained_inactive_tenants,
        summary.default_tenant.as_deref().unwrap_or("-"),
    )
}

fn display_or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}
