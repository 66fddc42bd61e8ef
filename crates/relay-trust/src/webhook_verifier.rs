//! Signature verification for inbound support-inbox webhooks.
//!
//! Verification is a pure function of the tenant's inbox credentials, the raw
//! request body, and the claimed signature. It never touches the registry;
//! callers decide whether to log via [`WebhookVerdict::log`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use relay_tenancy::{InboxCredentials, TenantRecord};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::public_key::parse_webhook_public_key;

/// Header carrying the base64 signature over the raw body.
pub const SIGNATURE_HEADER: &str = "x-freshchat-signature";

const REASON_ALLOW_SIGNATURE_VERIFIED: &str = "allow_webhook_signature_verified";

/// Why a webhook failed verification. Each maps to a different fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookRejection {
    MissingSignature,
    MissingPublicKey,
    InvalidPublicKey,
    SignatureMismatch,
}

impl WebhookRejection {
    pub fn reason_code(self) -> &'static str {
        match self {
            Self::MissingSignature => "deny_webhook_signature_missing",
            Self::MissingPublicKey => "deny_webhook_public_key_missing",
            Self::InvalidPublicKey => "deny_webhook_public_key_invalid",
            Self::SignatureMismatch => "deny_webhook_signature_mismatch",
        }
    }

    /// Operator-facing hint for the log line; never sent to the webhook sender.
    pub fn remediation(self) -> &'static str {
        match self {
            Self::MissingSignature => {
                "sender did not sign the payload; confirm webhook signing is enabled upstream"
            }
            Self::MissingPublicKey => "register the inbox webhook public key on this tenant",
            Self::InvalidPublicKey => {
                "tenant webhook public key cannot be parsed; re-copy it from the inbox settings"
            }
            Self::SignatureMismatch => {
                "signature does not match the tenant key; check for key rotation or a forged request"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookVerdict {
    Verified,
    /// Strict enforcement is off, so the payload is let through despite `rejection`.
    AcceptedUnverified {
        rejection: WebhookRejection,
        warning: String,
    },
    Rejected {
        rejection: WebhookRejection,
    },
}

impl WebhookVerdict {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    pub fn rejection(&self) -> Option<WebhookRejection> {
        match self {
            Self::Verified => None,
            Self::AcceptedUnverified { rejection, .. } | Self::Rejected { rejection } => {
                Some(*rejection)
            }
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::AcceptedUnverified { warning, .. } => Some(warning),
            _ => None,
        }
    }

    pub fn reason_code(&self) -> &'static str {
        match self.rejection() {
            None => REASON_ALLOW_SIGNATURE_VERIFIED,
            Some(rejection) => rejection.reason_code(),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::AcceptedUnverified { .. } => "accepted_unverified",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Emits the internal audit line for this verdict. Payload content is
    /// only ever logged as a SHA-256 fingerprint.
    pub fn log(&self, tenant_id: &str, payload: &[u8]) {
        let payload_sha256 = payload_sha256(payload);
        match self {
            Self::Verified => debug!(
                tenant_id,
                reason_code = self.reason_code(),
                %payload_sha256,
                "inbound webhook signature verified"
            ),
            Self::AcceptedUnverified { rejection, warning } => warn!(
                tenant_id,
                reason_code = rejection.reason_code(),
                remediation = rejection.remediation(),
                %payload_sha256,
                "{warning}"
            ),
            Self::Rejected { rejection } => warn!(
                tenant_id,
                reason_code = rejection.reason_code(),
                remediation = rejection.remediation(),
                %payload_sha256,
                "inbound webhook rejected and dropped"
            ),
        }
    }
}

/// Verifies `payload` against the tenant's registered webhook key.
pub fn verify_tenant_webhook(
    tenant: &TenantRecord,
    payload: &[u8],
    signature: Option<&str>,
) -> WebhookVerdict {
    verify_webhook_signature(&tenant.inbox, payload, signature)
}

pub fn verify_webhook_signature(
    inbox: &InboxCredentials,
    payload: &[u8],
    signature: Option<&str>,
) -> WebhookVerdict {
    let Err(rejection) = check_signature(inbox.webhook_public_key.as_str(), payload, signature)
    else {
        return WebhookVerdict::Verified;
    };
    if inbox.signature_strict {
        return WebhookVerdict::Rejected { rejection };
    }
    WebhookVerdict::AcceptedUnverified {
        rejection,
        warning: format!(
            "inbound webhook accepted without a valid signature ({}) because strict signature enforcement is disabled",
            rejection.reason_code()
        ),
    }
}

fn check_signature(
    public_key: &str,
    payload: &[u8],
    signature: Option<&str>,
) -> Result<(), WebhookRejection> {
    let signature = signature
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(WebhookRejection::MissingSignature)?;
    if public_key.trim().is_empty() {
        return Err(WebhookRejection::MissingPublicKey);
    }
    let verifying_key =
        parse_webhook_public_key(public_key).map_err(|_| WebhookRejection::InvalidPublicKey)?;
    let signature_bytes = BASE64
        .decode(signature)
        .map_err(|_| WebhookRejection::SignatureMismatch)?;
    verifying_key
        .verify(payload, &signature_bytes)
        .map_err(|_| WebhookRejection::SignatureMismatch)
}

/// Hex SHA-256 of a payload, for correlating log lines without logging bodies.
pub fn payload_sha256(payload: &[u8]) -> String {
    format!("{:x}", Sha256::digest(payload))
}
