use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::env::{EnvSnapshot, EnvironmentSource};
use crate::error::{TenancyError, TenancyResult};

pub const ENV_TENANT_MODE: &str = "RELAY_TENANT_MODE";
pub const ENV_TENANTS_FILE: &str = "RELAY_TENANTS_FILE";
pub const ENV_DEFAULT_TENANT: &str = "RELAY_DEFAULT_TENANT";
pub const DEFAULT_TENANTS_FILE: &str = "./config/tenants.json";
pub const DEFAULT_SINGLE_TENANT_ID: &str = "default";

/// Selects which source populates the tenant store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenancyMode {
    /// One tenant built from environment values; mutations are never persisted.
    Single,
    /// Any number of tenants read from, and written back to, a JSON document.
    Multi,
}

impl TenancyMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multi => "multi",
        }
    }
}

impl fmt::Display for TenancyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenancyMode {
    type Err = TenancyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi" => Ok(Self::Multi),
            other => Err(TenancyError::Configuration(format!(
                "unsupported tenant mode '{other}' (expected single or multi)"
            ))),
        }
    }
}

/// Everything the loader needs to (re)build the tenant store.
#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub mode: TenancyMode,
    pub document_path: PathBuf,
    pub default_tenant: Option<String>,
    pub environment: EnvironmentSource,
}

impl TenancyConfig {
    pub fn single(environment: EnvironmentSource) -> Self {
        Self {
            mode: TenancyMode::Single,
            document_path: PathBuf::from(DEFAULT_TENANTS_FILE),
            default_tenant: None,
            environment,
        }
    }

    pub fn multi(document_path: impl Into<PathBuf>) -> Self {
        Self {
            mode: TenancyMode::Multi,
            document_path: document_path.into(),
            default_tenant: None,
            environment: EnvironmentSource::Process,
        }
    }

    /// Reads `RELAY_TENANT_MODE`, `RELAY_TENANTS_FILE` and `RELAY_DEFAULT_TENANT`.
    pub fn from_environment(environment: EnvironmentSource) -> TenancyResult<Self> {
        let env = environment.snapshot();
        Self::from_snapshot(&env, environment)
    }

    pub fn from_snapshot(env: &EnvSnapshot, environment: EnvironmentSource) -> TenancyResult<Self> {
        let mode = match env.get(ENV_TENANT_MODE) {
            Some(raw) => raw.parse::<TenancyMode>()?,
            None => TenancyMode::Single,
        };
        let config = Self {
            mode,
            document_path: PathBuf::from(env.get_or(ENV_TENANTS_FILE, DEFAULT_TENANTS_FILE)),
            default_tenant: env.get(ENV_DEFAULT_TENANT).map(str::to_string),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_default_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.default_tenant = Some(tenant_id.into());
        self
    }

    pub fn validate(&self) -> TenancyResult<()> {
        if self.mode == TenancyMode::Multi && self.document_path.as_os_str().is_empty() {
            return Err(TenancyError::Configuration(
                "multi-tenant mode requires a tenant document path".to_string(),
            ));
        }
        if let Some(default_tenant) = &self.default_tenant {
            if default_tenant.trim().is_empty() {
                return Err(TenancyError::Configuration(
                    "default tenant override cannot be blank".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{TenancyConfig, TenancyMode};
    use crate::env::{EnvSnapshot, EnvironmentSource};

    #[test]
    fn unit_config_defaults_to_single_mode() {
        let env = EnvSnapshot::default();
        let config = TenancyConfig::from_snapshot(&env, EnvironmentSource::Fixed(env.clone()))
            .expect("config");
        assert_eq!(config.mode, TenancyMode::Single);
        assert!(config.default_tenant.is_none());
    }

    #[test]
    fn functional_config_reads_multi_mode_inputs() {
        let env = EnvSnapshot::from_pairs([
            ("RELAY_TENANT_MODE", "Multi"),
            ("RELAY_TENANTS_FILE", "/etc/relay/tenants.json"),
            ("RELAY_DEFAULT_TENANT", "acme"),
        ]);
        let config = TenancyConfig::from_snapshot(&env, EnvironmentSource::Process).expect("config");
        assert_eq!(config.mode, TenancyMode::Multi);
        assert_eq!(config.document_path, Path::new("/etc/relay/tenants.json"));
        assert_eq!(config.default_tenant.as_deref(), Some("acme"));
    }

    #[test]
    fn regression_config_rejects_unknown_mode() {
        let env = EnvSnapshot::from_pairs([("RELAY_TENANT_MODE", "sharded")]);
        let error = TenancyConfig::from_snapshot(&env, EnvironmentSource::Process)
            .expect_err("unknown mode must fail");
        assert!(error.to_string().contains("unsupported tenant mode 'sharded'"));
    }

    #[test]
    fn regression_config_rejects_empty_document_path_in_multi_mode() {
        let config = TenancyConfig::multi("");
        assert!(config.validate().is_err());
    }
}
