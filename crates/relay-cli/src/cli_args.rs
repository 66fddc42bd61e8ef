use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use relay_core::LogRotationPolicy;
use relay_tenancy::{EnvironmentSource, TenancyConfig, TenancyMode};

const DEFAULT_OUTBOX_DIR: &str = ".relay/outbox";

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "freshteams-relay",
    about = "Multi-tenant relay between Microsoft Teams bots and Freshchat inboxes",
    version
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub(crate) tenancy: TenancyArgs,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum CliTenancyMode {
    Single,
    Multi,
}

impl From<CliTenancyMode> for TenancyMode {
    fn from(value: CliTenancyMode) -> Self {
        match value {
            CliTenancyMode::Single => TenancyMode::Single,
            CliTenancyMode::Multi => TenancyMode::Multi,
        }
    }
}

/// Overrides for the `RELAY_*` tenancy variables.
#[derive(Debug, Clone, Default, Args)]
pub(crate) struct TenancyArgs {
    #[arg(
        long = "tenant-mode",
        global = true,
        value_enum,
        help = "Tenancy mode; overrides RELAY_TENANT_MODE"
    )]
    pub(crate) tenant_mode: Option<CliTenancyMode>,

    #[arg(
        long = "tenants-file",
        global = true,
        help = "Multi-mode tenant document; overrides RELAY_TENANTS_FILE"
    )]
    pub(crate) tenants_file: Option<PathBuf>,

    #[arg(
        long = "default-tenant",
        global = true,
        help = "Default tenant id; overrides RELAY_DEFAULT_TENANT"
    )]
    pub(crate) default_tenant: Option<String>,
}

impl TenancyArgs {
    pub(crate) fn resolve(&self) -> Result<TenancyConfig> {
        let mut config = TenancyConfig::from_environment(EnvironmentSource::Process)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn apply(&self, config: &mut TenancyConfig) {
        if let Some(mode) = self.tenant_mode {
            config.mode = mode.into();
        }
        if let Some(path) = &self.tenants_file {
            config.document_path = path.clone();
        }
        if let Some(default_tenant) = &self.default_tenant {
            config.default_tenant = Some(default_tenant.clone());
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Run the inbound gateway and admin API.
    Serve(ServeArgs),
    /// Inspect and administer tenant records.
    #[command(subcommand)]
    Tenants(TenantsCommand),
    /// Check a webhook payload against the resolved tenant's key.
    VerifyWebhook(VerifyWebhookArgs),
}

#[derive(Debug, Args)]
pub(crate) struct ServeArgs {
    #[arg(
        long,
        env = "RELAY_BIND",
        default_value = relay_gateway::DEFAULT_GATEWAY_BIND,
        help = "Socket address for the gateway listener"
    )]
    pub(crate) bind: String,

    #[arg(
        long = "admin-token",
        env = "RELAY_ADMIN_TOKEN",
        hide_env_values = true,
        help = "Bearer token for /admin routes; admin API is disabled when unset"
    )]
    pub(crate) admin_token: Option<String>,

    #[arg(
        long = "outbox-dir",
        env = "RELAY_OUTBOX_DIR",
        default_value = DEFAULT_OUTBOX_DIR,
        help = "Directory receiving per-tenant NDJSON outbox files"
    )]
    pub(crate) outbox_dir: PathBuf,

    #[arg(
        long = "outbox-max-bytes",
        env = "RELAY_OUTBOX_MAX_BYTES",
        default_value_t = relay_core::log_rotation::DEFAULT_ROTATION_MAX_BYTES,
        value_parser = parse_positive_u64,
        help = "Rotate an outbox file once it would exceed this size"
    )]
    pub(crate) outbox_max_bytes: u64,

    #[arg(
        long = "outbox-max-files",
        env = "RELAY_OUTBOX_MAX_FILES",
        default_value_t = relay_core::log_rotation::DEFAULT_ROTATION_MAX_FILES,
        value_parser = parse_positive_usize,
        help = "Outbox files kept per tenant, including the live one"
    )]
    pub(crate) outbox_max_files: usize,
}

impl ServeArgs {
    pub(crate) fn outbox_rotation(&self) -> LogRotationPolicy {
        LogRotationPolicy {
            max_bytes: self.outbox_max_bytes,
            max_files: self.outbox_max_files,
        }
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum TenantsCommand {
    /// List active tenants with credentials redacted.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one tenant, or the default tenant when no id is given.
    Show { tenant_id: Option<String> },
    /// Apply a JSON tenant patch.
    Upsert {
        #[arg(long)]
        file: PathBuf,
    },
    /// Deactivate a tenant.
    Deactivate { tenant_id: String },
    /// Load the configuration and report problems.
    Check,
}

#[derive(Debug, Args)]
pub(crate) struct VerifyWebhookArgs {
    #[arg(long = "inbox-id")]
    pub(crate) inbox_id: String,

    #[arg(long, help = "File holding the raw webhook body")]
    pub(crate) payload: PathBuf,

    #[arg(long, help = "Base64 signature from the X-Freshchat-Signature header")]
    pub(crate) signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use relay_tenancy::{EnvSnapshot, EnvironmentSource, TenancyConfig, TenancyMode};

    use super::{Cli, CliTenancyMode, Command, TenancyArgs, TenantsCommand};

    #[test]
    fn unit_cli_parses_tenant_subcommands() {
        let cli = Cli::try_parse_from(["freshteams-relay", "tenants", "list", "--json"])
            .expect("parse list");
        assert!(matches!(
            cli.command,
            Command::Tenants(TenantsCommand::List { json: true })
        ));

        let cli = Cli::try_parse_from(["freshteams-relay", "tenants", "show"]).expect("parse show");
        assert!(matches!(
            cli.command,
            Command::Tenants(TenantsCommand::Show { tenant_id: None })
        ));

        let cli = Cli::try_parse_from([
            "freshteams-relay",
            "tenants",
            "deactivate",
            "acme",
            "--tenant-mode",
            "multi",
        ])
        .expect("parse deactivate");
        assert_eq!(cli.tenancy.tenant_mode, Some(CliTenancyMode::Multi));
        match cli.command {
            Command::Tenants(TenantsCommand::Deactivate { tenant_id }) => {
                assert_eq!(tenant_id, "acme")
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unit_cli_parses_serve_and_verify_webhook() {
        let cli = Cli::try_parse_from([
            "freshteams-relay",
            "serve",
            "--bind",
            "0.0.0.0:8080",
            "--outbox-max-files",
            "3",
        ])
        .expect("parse serve");
        let Command::Serve(serve) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(serve.bind, "0.0.0.0:8080");
        assert_eq!(serve.outbox_rotation().max_files, 3);

        let cli = Cli::try_parse_from([
            "freshteams-relay",
            "verify-webhook",
            "--inbox-id",
            "inbox-a",
            "--payload",
            "body.json",
        ])
        .expect("parse verify");
        let Command::VerifyWebhook(verify) = cli.command else {
            panic!("expected verify-webhook");
        };
        assert_eq!(verify.payload, PathBuf::from("body.json"));
        assert!(verify.signature.is_none());
    }

    #[test]
    fn regression_cli_rejects_zero_outbox_rotation() {
        let error = Cli::try_parse_from(["freshteams-relay", "serve", "--outbox-max-bytes", "0"])
            .expect_err("zero bytes");
        assert!(error.to_string().contains("greater than 0"));
    }

    #[test]
    fn unit_tenancy_overrides_replace_environment_values() {
        let env = EnvSnapshot::from_pairs([("RELAY_TENANT_MODE", "single")]);
        let mut config =
            TenancyConfig::from_snapshot(&env, EnvironmentSource::Fixed(env.clone())).expect("config");
        let args = TenancyArgs {
            tenant_mode: Some(CliTenancyMode::Multi),
            tenants_file: Some(PathBuf::from("/srv/tenants.json")),
            default_tenant: Some("acme".to_string()),
        };
        args.apply(&mut config);
        assert_eq!(config.mode, TenancyMode::Multi);
        assert_eq!(config.document_path, PathBuf::from("/srv/tenants.json"));
        assert_eq!(config.default_tenant.as_deref(), Some("acme"));
    }
}
