//! Trust checks for inbound support-inbox webhooks.
//!
//! Verifies the RSA-SHA256 (or Ed25519) signature a webhook carries against
//! the public key registered on the resolved tenant, honouring the tenant's
//! strict enforcement flag.

pub mod public_key;
pub mod webhook_verifier;

pub use public_key::{parse_webhook_public_key, WebhookPublicKey};
pub use webhook_verifier::{
    payload_sha256, verify_tenant_webhook, verify_webhook_signature, WebhookRejection,
    WebhookVerdict, SIGNATURE_HEADER,
};
