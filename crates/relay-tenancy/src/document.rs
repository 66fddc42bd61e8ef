//! The multi-tenant JSON document: read, wholesale rewrite, and bootstrap template.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TenancyError, TenancyResult};
use crate::record::TenantRecord;
use crate::store::TenantStore;

pub const TEMPLATE_TENANT_ID: &str = "example";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_tenant: Option<String>,
    #[serde(default)]
    pub tenants: Vec<TenantRecord>,
}

impl TenantDocument {
    pub fn from_store(store: &TenantStore) -> Self {
        Self {
            default_tenant: store.declared_default_tenant().map(str::to_string),
            tenants: store.persisted_records().cloned().collect(),
        }
    }

    /// An illustrative document whose only tenant is inactive and carries
    /// obviously fake credentials.
    pub fn template() -> Self {
        let mut example = TenantRecord::new(TEMPLATE_TENANT_ID, relay_core::utc_now());
        example.name = "Example Organization".to_string();
        example.active = false;
        example.bot.app_id = "YOUR_MICROSOFT_APP_ID".to_string();
        example.bot.app_password = "YOUR_MICROSOFT_APP_PASSWORD".to_string();
        example.bot.tenant_id = "YOUR_MICROSOFT_TENANT_ID".to_string();
        example.inbox.api_key = "YOUR_FRESHCHAT_API_KEY".to_string();
        example.inbox.inbox_id = "YOUR_FRESHCHAT_INBOX_ID".to_string();
        example.inbox.webhook_public_key = "YOUR_FRESHCHAT_WEBHOOK_PUBLIC_KEY".to_string();
        example.settings.public_url = "https://relay.example.com".to_string();
        Self {
            default_tenant: Some(TEMPLATE_TENANT_ID.to_string()),
            tenants: vec![example],
        }
    }
}

/// Reads and parses the document. `Ok(None)` means the file does not exist.
pub fn read_tenant_document(path: &Path) -> TenancyResult<Option<TenantDocument>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(TenancyError::DocumentRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str::<TenantDocument>(&raw)
        .map(Some)
        .map_err(|source| TenancyError::MalformedDocument {
            path: path.to_path_buf(),
            source,
        })
}

/// Rewrites the whole document atomically.
pub fn write_tenant_document(path: &Path, document: &TenantDocument) -> TenancyResult<()> {
    let persistence_error = |message: String| TenancyError::Persistence {
        path: path.to_path_buf(),
        message,
    };
    let mut payload = serde_json::to_string_pretty(document)
        .map_err(|error| persistence_error(format!("failed to encode document: {error}")))?;
    payload.push('\n');
    relay_core::write_text_atomic(path, &payload)
        .map_err(|error| persistence_error(format!("{error:#}")))?;
    debug!(
        path = %path.display(),
        tenants = document.tenants.len(),
        "tenant document written"
    );
    Ok(())
}

/// Writes the template to `path` and returns the document written, so the
/// caller loads exactly what is on disk. Failure is logged, never returned:
/// the caller proceeds with zero tenants either way.
pub fn bootstrap_template_document(path: &Path) -> Option<TenantDocument> {
    let template = TenantDocument::template();
    match write_tenant_document(path, &template) {
        Ok(()) => {
            warn!(
                path = %path.display(),
                "tenant document not found; wrote an example template with zero active tenants, edit it and set active to true"
            );
            Some(template)
        }
        Err(error) => {
            warn!(
                path = %path.display(),
                error = %error,
                "tenant document not found and the example template could not be written"
            );
            None
        }
    }
}
