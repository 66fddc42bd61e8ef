//! Tenant records and the typed patch used to merge updates into them.
//!
//! A [`TenantRecord`] carries everything needed to route one customer
//! organization's traffic: bot-framework credentials, support-inbox
//! credentials, relay settings, and branding. The bot `appId` and the inbox
//! `inboxId` double as the inbound identity keys that map events back to
//! their tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TENANT_NAME: &str = "Default Tenant";
pub const DEFAULT_INBOX_API_URL: &str = "https://api.freshchat.com/v2";
pub const DEFAULT_WELCOME_MESSAGE: &str =
    "Hello! Send a message and our support team will get back to you.";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_BRAND_NAME: &str = "Support";
pub const DEFAULT_BRAND_DESCRIPTION: &str = "Chat with our support team";
pub const DEFAULT_ACCENT_COLOR: &str = "#2B7CD3";
pub const DEFAULT_ICON_COLOR: &str = "icons/color.png";
pub const DEFAULT_ICON_OUTLINE: &str = "icons/outline.png";

const REDACTED: &str = "***";

fn default_true() -> bool {
    true
}

fn default_inbox_api_url() -> String {
    DEFAULT_INBOX_API_URL.to_string()
}

fn default_welcome_message() -> String {
    DEFAULT_WELCOME_MESSAGE.to_string()
}

fn default_upload_dir() -> String {
    DEFAULT_UPLOAD_DIR.to_string()
}

/// Bot-framework application credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BotCredentials {
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_password: String,
    /// Messaging-platform directory tenant, not the relay tenant id.
    #[serde(default)]
    pub tenant_id: String,
}

/// Support-inbox API credentials and webhook trust settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_inbox_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub inbox_id: String,
    #[serde(default)]
    pub webhook_public_key: String,
    #[serde(default = "default_true")]
    pub signature_strict: bool,
}

impl Default for InboxCredentials {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_url: default_inbox_api_url(),
            inbox_id: String::new(),
            webhook_public_key: String::new(),
            signature_strict: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantSettings {
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    #[serde(default)]
    pub public_url: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            welcome_message: default_welcome_message(),
            public_url: String::new(),
            upload_dir: default_upload_dir(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantBranding {
    pub display_name: String,
    pub description: String,
    pub accent_color: String,
    pub icon_color: String,
    pub icon_outline: String,
}

impl Default for TenantBranding {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_BRAND_NAME.to_string(),
            description: DEFAULT_BRAND_DESCRIPTION.to_string(),
            accent_color: DEFAULT_ACCENT_COLOR.to_string(),
            icon_color: DEFAULT_ICON_COLOR.to_string(),
            icon_outline: DEFAULT_ICON_OUTLINE.to_string(),
        }
    }
}

/// One tenant's complete configuration plus lifecycle metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub tenant_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bot: BotCredentials,
    #[serde(default)]
    pub inbox: InboxCredentials,
    #[serde(default)]
    pub settings: TenantSettings,
    #[serde(default)]
    pub branding: TenantBranding,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "relay_core::utc_now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl TenantRecord {
    /// Builds an active record with documented defaults and empty credentials.
    pub fn new(tenant_id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            name: String::new(),
            bot: BotCredentials::default(),
            inbox: InboxCredentials::default(),
            settings: TenantSettings::default(),
            branding: TenantBranding::default(),
            active: true,
            created_at,
            updated_at: None,
            deactivated_at: None,
        }
    }

    /// Bot appId used to route inbound activities, if configured.
    pub fn bot_identity(&self) -> Option<&str> {
        non_empty(&self.bot.app_id)
    }

    /// Inbox id used to route inbound webhooks, if configured.
    pub fn inbox_identity(&self) -> Option<&str> {
        non_empty(&self.inbox.inbox_id)
    }

    /// Latest lifecycle stamp, used as the floor for the next `updated_at`.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.updated_at
            .into_iter()
            .chain(self.deactivated_at)
            .fold(self.created_at, std::cmp::max)
    }

    /// Copy safe to show on admin surfaces: secrets are masked, key material kept.
    pub fn redacted(&self) -> Self {
        let mut record = self.clone();
        mask(&mut record.bot.app_password);
        mask(&mut record.inbox.api_key);
        record
    }

    /// Merges every `Some` field of `patch` over this record. Lifecycle
    /// stamps are left to the caller.
    ///
    /// A secret equal to the redaction mask is ignored, so an admin response
    /// edited and sent back never replaces a credential with the mask.
    pub fn apply_patch(&mut self, patch: &TenantPatch) {
        assign(&mut self.name, &patch.name);
        assign(&mut self.active, &patch.active);

        let bot = &patch.bot;
        assign(&mut self.bot.app_id, &bot.app_id);
        assign_secret(&mut self.bot.app_password, &bot.app_password);
        assign(&mut self.bot.tenant_id, &bot.tenant_id);

        let inbox = &patch.inbox;
        assign_secret(&mut self.inbox.api_key, &inbox.api_key);
        assign(&mut self.inbox.api_url, &inbox.api_url);
        assign(&mut self.inbox.inbox_id, &inbox.inbox_id);
        assign(&mut self.inbox.webhook_public_key, &inbox.webhook_public_key);
        assign(&mut self.inbox.signature_strict, &inbox.signature_strict);

        let settings = &patch.settings;
        assign(&mut self.settings.welcome_message, &settings.welcome_message);
        assign(&mut self.settings.public_url, &settings.public_url);
        assign(&mut self.settings.upload_dir, &settings.upload_dir);

        let branding = &patch.branding;
        assign(&mut self.branding.display_name, &branding.display_name);
        assign(&mut self.branding.description, &branding.description);
        assign(&mut self.branding.accent_color, &branding.accent_color);
        assign(&mut self.branding.icon_color, &branding.icon_color);
        assign(&mut self.branding.icon_outline, &branding.icon_outline);
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn mask(value: &mut String) {
    if !value.is_empty() {
        *value = REDACTED.to_string();
    }
}

fn assign_secret(target: &mut String, value: &Option<String>) {
    if value.as_deref() != Some(REDACTED) {
        assign(target, value);
    }
}

fn assign<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct BotCredentialsPatch {
    pub app_id: Option<String>,
    pub app_password: Option<String>,
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct InboxCredentialsPatch {
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub inbox_id: Option<String>,
    pub webhook_public_key: Option<String>,
    pub signature_strict: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TenantSettingsPatch {
    pub welcome_message: Option<String>,
    pub public_url: Option<String>,
    pub upload_dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TenantBrandingPatch {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub accent_color: Option<String>,
    pub icon_color: Option<String>,
    pub icon_outline: Option<String>,
}

/// Partial update for one tenant. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct TenantPatch {
    pub tenant_id: String,
    pub name: Option<String>,
    pub bot: BotCredentialsPatch,
    pub inbox: InboxCredentialsPatch,
    pub settings: TenantSettingsPatch,
    pub branding: TenantBrandingPatch,
    pub active: Option<bool>,
}

impl TenantPatch {
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Self::default()
        }
    }
}

impl From<&TenantRecord> for TenantPatch {
    /// A patch that sets every field to the record's current value.
    fn from(record: &TenantRecord) -> Self {
        Self {
            tenant_id: record.tenant_id.clone(),
            name: Some(record.name.clone()),
            bot: BotCredentialsPatch {
                app_id: Some(record.bot.app_id.clone()),
                app_password: Some(record.bot.app_password.clone()),
                tenant_id: Some(record.bot.tenant_id.clone()),
            },
            inbox: InboxCredentialsPatch {
                api_key: Some(record.inbox.api_key.clone()),
                api_url: Some(record.inbox.api_url.clone()),
                inbox_id: Some(record.inbox.inbox_id.clone()),
                webhook_public_key: Some(record.inbox.webhook_public_key.clone()),
                signature_strict: Some(record.inbox.signature_strict),
            },
            settings: TenantSettingsPatch {
                welcome_message: Some(record.settings.welcome_message.clone()),
                public_url: Some(record.settings.public_url.clone()),
                upload_dir: Some(record.settings.upload_dir.clone()),
            },
            branding: TenantBrandingPatch {
                display_name: Some(record.branding.display_name.clone()),
                description: Some(record.branding.description.clone()),
                accent_color: Some(record.branding.accent_color.clone()),
                icon_color: Some(record.branding.icon_color.clone()),
                icon_outline: Some(record.branding.icon_outline.clone()),
            },
            active: Some(record.active),
        }
    }
}
