use anyhow::{bail, Context, Result};
use relay_tenancy::{TenancyConfig, TenantRegistry};
use relay_trust::{payload_sha256, verify_tenant_webhook, WebhookVerdict};

use crate::cli_args::VerifyWebhookArgs;

#[derive(Debug)]
pub(crate) struct WebhookVerifyReport {
    pub(crate) tenant_id: String,
    pub(crate) payload_sha256: String,
    pub(crate) verdict: WebhookVerdict,
}

impl WebhookVerifyReport {
    pub(crate) fn render(&self) -> String {
        let mut out = format!(
            "webhook verify: tenant={} status={} reason_code={} payload_sha256={}",
            self.tenant_id,
            self.verdict.status(),
            self.verdict.reason_code(),
            self.payload_sha256,
        );
        if let Some(rejection) = self.verdict.rejection() {
            out.push_str("\nremediation: ");
            out.push_str(rejection.remediation());
        }
        if let Some(warning) = self.verdict.warning() {
            out.push_str("\nwarning: ");
            out.push_str(warning);
        }
        out
    }
}

pub(crate) fn execute_verify_webhook_command(
    config: TenancyConfig,
    args: &VerifyWebhookArgs,
) -> Result<WebhookVerifyReport> {
    let payload = std::fs::read(&args.payload)
        .with_context(|| format!("failed to read {}", args.payload.display()))?;
    let registry = TenantRegistry::open(config).context("failed to load tenants")?;
    let Some(tenant) = registry.get_tenant_by_inbox_identity(args.inbox_id.trim())? else {
        bail!("no active tenant owns inbox id '{}'", args.inbox_id.trim());
    };
    let verdict = verify_tenant_webhook(&tenant, &payload, args.signature.as_deref());
    Ok(WebhookVerifyReport {
        tenant_id: tenant.tenant_id,
        payload_sha256: payload_sha256(&payload),
        verdict,
    })
}
