use std::path::PathBuf;

use thiserror::Error;

use crate::store::IdentityKind;

/// Result type for tenant registry operations.
pub type TenancyResult<T> = Result<T, TenancyError>;

/// Errors surfaced by loading, resolving, and mutating tenant records.
///
/// A lookup that finds nothing is not an error; it is `Ok(None)`.
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("tenant document {path} is malformed: {source}")]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to read tenant document {path}: {source}")]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tenant configuration: {0}")]
    Configuration(String),
    #[error("tenantId is required")]
    MissingTenantId,
    #[error("{kind} '{key}' is already claimed by active tenant '{existing_tenant}'")]
    IdentityConflict {
        kind: IdentityKind,
        key: String,
        existing_tenant: String,
    },
    #[error("failed to persist tenant document {path}: {message}")]
    Persistence { path: PathBuf, message: String },
}

impl TenancyError {
    /// True for errors caused by the caller's input rather than the deployment.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingTenantId | Self::IdentityConflict { .. }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedDocument { .. } => "malformed_document",
            Self::DocumentRead { .. } => "document_read_failed",
            Self::Configuration(_) => "invalid_configuration",
            Self::MissingTenantId => "missing_tenant_id",
            Self::IdentityConflict { .. } => "identity_conflict",
            Self::Persistence { .. } => "persistence_failed",
        }
    }
}
