//! Tenant webhook key material.
//!
//! Freshchat signs webhooks with RSA over SHA-256 (PKCS#1 v1.5) and shows the
//! inbox key as a PEM block. Ed25519 keys are also accepted so self-hosted
//! senders can sign with a smaller key. The scheme is picked from the key
//! itself, never from the request.

use anyhow::{anyhow, bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::pkcs8::DecodePublicKey as _;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature as RsaSignature, VerifyingKey as RsaVerifyingKey};
use rsa::pkcs8::DecodePublicKey as _;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use sha2::Sha256;

const PKCS1_PEM_HEADER: &str = "-----BEGIN RSA PUBLIC KEY-----";
const SPKI_PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_BOUNDARY: &str = "-----";
const ED25519_KEY_LEN: usize = 32;

#[derive(Debug, Clone)]
pub enum WebhookPublicKey {
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    Rsa(RsaVerifyingKey<Sha256>),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl WebhookPublicKey {
    fn rsa(key: RsaPublicKey) -> Self {
        Self::Rsa(RsaVerifyingKey::new(key))
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "rsa-sha256",
            Self::Ed25519(_) => "ed25519",
        }
    }

    /// Checks `signature` (already base64-decoded) over the raw `payload`.
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<()> {
        match self {
            Self::Rsa(key) => {
                let signature =
                    RsaSignature::try_from(signature).context("malformed RSA signature")?;
                key.verify(payload, &signature)
                    .context("RSA signature does not match payload")
            }
            Self::Ed25519(key) => {
                let signature = ed25519_dalek::Signature::from_slice(signature)
                    .context("malformed Ed25519 signature")?;
                key.verify_strict(payload, &signature)
                    .context("Ed25519 signature does not match payload")
            }
        }
    }
}

/// Parses tenant webhook key material.
///
/// Accepts a PEM `RSA PUBLIC KEY` (PKCS#1) block, a PEM `PUBLIC KEY`
/// (SubjectPublicKeyInfo) block holding an RSA or Ed25519 key, or bare
/// base64 of either a raw 32-byte Ed25519 key or a DER-encoded RSA key.
pub fn parse_webhook_public_key(raw: &str) -> Result<WebhookPublicKey> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("webhook public key is empty");
    }
    if raw.starts_with(PKCS1_PEM_HEADER) {
        let key = RsaPublicKey::from_pkcs1_pem(raw)
            .context("failed to decode PKCS#1 RSA webhook public key")?;
        return Ok(WebhookPublicKey::rsa(key));
    }
    if raw.starts_with(SPKI_PEM_HEADER) {
        if let Ok(key) = RsaPublicKey::from_public_key_pem(raw) {
            return Ok(WebhookPublicKey::rsa(key));
        }
        let key = ed25519_dalek::VerifyingKey::from_public_key_pem(raw).map_err(|_| {
            anyhow!("PEM webhook public key is neither an RSA nor an Ed25519 SubjectPublicKeyInfo")
        })?;
        return Ok(WebhookPublicKey::Ed25519(key));
    }
    if raw.starts_with(PEM_BOUNDARY) {
        bail!("unsupported PEM block (expected PUBLIC KEY or RSA PUBLIC KEY)");
    }

    let der = BASE64
        .decode(raw)
        .context("failed to decode base64 webhook public key")?;
    if let Ok(key_bytes) = <[u8; ED25519_KEY_LEN]>::try_from(der.as_slice()) {
        let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
            .context("webhook public key is not a valid Ed25519 point")?;
        return Ok(WebhookPublicKey::Ed25519(key));
    }
    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map(WebhookPublicKey::rsa)
        .map_err(|_| {
            anyhow!(
                "webhook public key decoded to {} bytes that are neither a raw Ed25519 key nor a DER RSA key",
                der.len()
            )
        })
}
