//! Multi-tenant resolution for the Teams/Freshchat relay.
//!
//! Loads tenant records from environment values (single mode) or a JSON
//! document (multi mode), resolves inbound events to their tenant by bot
//! identity or inbox identity, and applies administrative upserts and
//! deactivations with write-back of the document.
//!
//! ```rust
//! use relay_tenancy::{EnvSnapshot, EnvironmentSource, TenancyConfig, TenantRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let env = EnvSnapshot::from_pairs([
//!     ("MICROSOFT_APP_ID", "bot-app-1"),
//!     ("FRESHCHAT_INBOX_ID", "inbox-1"),
//! ]);
//! let registry = TenantRegistry::open(TenancyConfig::single(EnvironmentSource::Fixed(env)))?;
//!
//! let tenant = registry.get_tenant_by_inbox_identity("inbox-1")?.expect("routed");
//! assert_eq!(tenant.tenant_id, "default");
//! assert!(registry.get_tenant_by_bot_identity("someone-else")?.is_none());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod document;
pub mod env;
pub mod error;
pub mod loader;
pub mod record;
pub mod registry;
pub mod store;

pub use config::{TenancyConfig, TenancyMode};
pub use document::{read_tenant_document, write_tenant_document, TenantDocument};
pub use env::{EnvSnapshot, EnvironmentSource};
pub use error::{TenancyError, TenancyResult};
pub use loader::{load_tenant_store, tenant_from_environment};
pub use record::{
    BotCredentials, BotCredentialsPatch, InboxCredentials, InboxCredentialsPatch, TenantBranding,
    TenantBrandingPatch, TenantPatch, TenantRecord, TenantSettings, TenantSettingsPatch,
};
pub use registry::TenantRegistry;
pub use store::{IdentityKind, StoreConflict, StoreSummary, TenantStore};
