use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use relay_core::LogRotationPolicy;
use relay_gateway::{build_gateway_router, GatewayState, OutboxRelaySink};
use relay_tenancy::{TenancyConfig, TenantRegistry};
use reqwest::{Client, StatusCode};
use rsa::pkcs1::{EncodeRsaPublicKey, LineEnding};
use rsa::pkcs1v15::SigningKey as RsaSigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::SignatureEncoding;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};
use sha2::Sha256;
use tokio::net::TcpListener;

const ADMIN_TOKEN: &str = "integration-admin";
const RSA_PRIVATE_KEY_PEM: &str =
    include_str!("../../../crates/relay-trust/testdata/webhook-rsa-primary.pem");

struct RelayFixture {
    _temp: tempfile::TempDir,
    document_path: PathBuf,
    outbox_dir: PathBuf,
    addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
    client: Client,
}

impl RelayFixture {
    async fn start(seed_document: Option<Value>) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let document_path = temp.path().join("config").join("tenants.json");
        if let Some(document) = seed_document {
            std::fs::create_dir_all(document_path.parent().expect("parent")).expect("mkdir");
            std::fs::write(&document_path, document.to_string()).expect("seed document");
        }
        let outbox_dir = temp.path().join("outbox");

        let registry =
            Arc::new(TenantRegistry::open(TenancyConfig::multi(&document_path)).expect("open"));
        let sink = Arc::new(OutboxRelaySink::new(&outbox_dir, LogRotationPolicy::default()));
        let state = GatewayState::new(registry, sink).with_admin_token(Some(ADMIN_TOKEN.into()));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("resolve listener addr");
        let app = build_gateway_router(Arc::new(state));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            _temp: temp,
            document_path,
            outbox_dir,
            addr,
            handle,
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn put_tenant(&self, tenant_id: &str, patch: Value) -> StatusCode {
        self.client
            .put(self.url(&format!("/admin/tenants/{tenant_id}")))
            .bearer_auth(ADMIN_TOKEN)
            .json(&patch)
            .send()
            .await
            .expect("send upsert")
            .status()
    }

    async fn post_webhook(&self, payload: &[u8], signer: &SigningKey) {
        self.post_signed_webhook(payload, BASE64.encode(signer.sign(payload).to_bytes()))
            .await;
    }

    async fn post_signed_webhook(&self, payload: &[u8], signature: String) {
        let response = self
            .client
            .post(self.url("/freshchat/webhook"))
            .header("X-Freshchat-Signature", signature)
            .body(payload.to_vec())
            .send()
            .await
            .expect("send webhook");
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn outbox_lines(&self, tenant_id: &str) -> Vec<Value> {
        read_ndjson(&self.outbox_dir.join(format!("{tenant_id}.ndjson")))
    }
}

impl Drop for RelayFixture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn read_ndjson(path: &Path) -> Vec<Value> {
    match std::fs::read_to_string(path) {
        Ok(raw) => raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("ndjson line"))
            .collect(),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(error) => panic!("failed to read {}: {error}", path.display()),
    }
}

fn public_key(signer: &SigningKey) -> String {
    BASE64.encode(signer.verifying_key().to_bytes())
}

fn rsa_private_key() -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(RSA_PRIVATE_KEY_PEM).expect("fixture private key")
}

fn rsa_public_key_pem(private_key: &RsaPrivateKey) -> String {
    private_key
        .to_public_key()
        .to_pkcs1_pem(LineEnding::LF)
        .expect("encode public key")
}

fn rsa_signature(private_key: &RsaPrivateKey, payload: &[u8]) -> String {
    use rsa::signature::Signer as _;
    let signer = RsaSigningKey::<Sha256>::new(private_key.clone());
    BASE64.encode(signer.sign(payload).to_bytes())
}

#[tokio::test]
async fn integration_bootstrap_template_then_admin_onboarding_routes_traffic() {
    let fixture = RelayFixture::start(None).await;
    assert!(fixture.document_path.exists(), "template document written");

    let health: Value = fixture
        .client
        .get(fixture.url("/healthz"))
        .send()
        .await
        .expect("send health")
        .json()
        .await
        .expect("health body");
    assert_eq!(health["active_tenants"], 0);

    let private_key = rsa_private_key();
    let status = fixture
        .put_tenant(
            "acme",
            json!({
                "name": "Acme",
                "bot": { "appId": "bot-acme", "appPassword": "pw" },
                "inbox": {
                    "inboxId": "inbox-acme",
                    "webhookPublicKey": rsa_public_key_pem(&private_key)
                }
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let response = fixture
        .client
        .post(fixture.url("/api/messages"))
        .json(&json!({ "type": "message", "recipient": { "id": "28:bot-acme" } }))
        .send()
        .await
        .expect("send activity");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let payload = br#"{"action":"message_create","data":{"message":{"channel_id":"inbox-acme"}}}"#;
    fixture
        .post_signed_webhook(payload, rsa_signature(&private_key, payload))
        .await;
    let forged = br#"{"action":"message_create","data":{"message":{"channel_id":"inbox-acme","text":"forged"}}}"#;
    fixture
        .post_signed_webhook(forged, rsa_signature(&private_key, payload))
        .await;

    let lines = fixture.outbox_lines("acme");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["direction"], "teams_to_inbox");
    assert_eq!(lines[1]["direction"], "inbox_to_teams");
    assert_eq!(lines[1]["verification"], "verified");

    let document: Value = serde_json::from_str(
        &std::fs::read_to_string(&fixture.document_path).expect("read document"),
    )
    .expect("parse document");
    let ids: Vec<&str> = document["tenants"]
        .as_array()
        .expect("tenants array")
        .iter()
        .filter_map(|tenant| tenant["tenantId"].as_str())
        .collect();
    assert_eq!(ids, vec!["example", "acme"]);
    assert_eq!(document["defaultTenant"], "example");
}

#[tokio::test]
async fn integration_key_rotation_rejects_payloads_signed_with_retired_key() {
    let retired = SigningKey::from_bytes(&[17; 32]);
    let current = SigningKey::from_bytes(&[18; 32]);
    let fixture = RelayFixture::start(Some(json!({
        "tenants": [{
            "tenantId": "acme",
            "inbox": { "inboxId": "inbox-acme", "webhookPublicKey": public_key(&retired) }
        }]
    })))
    .await;

    let payload = br#"{"data":{"message":{"channel_id":"inbox-acme"}}}"#;
    fixture.post_webhook(payload, &retired).await;
    assert_eq!(fixture.outbox_lines("acme").len(), 1);

    let status = fixture
        .put_tenant(
            "acme",
            json!({ "inbox": { "webhookPublicKey": public_key(&current) } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    fixture.post_webhook(payload, &retired).await;
    assert_eq!(fixture.outbox_lines("acme").len(), 1);
    fixture.post_webhook(payload, &current).await;
    assert_eq!(fixture.outbox_lines("acme").len(), 2);
}

#[tokio::test]
async fn integration_tenants_never_receive_each_others_traffic() {
    let signer_a = SigningKey::from_bytes(&[31; 32]);
    let signer_b = SigningKey::from_bytes(&[32; 32]);
    let fixture = RelayFixture::start(Some(json!({
        "tenants": [
            {
                "tenantId": "a",
                "bot": { "appId": "bot-a" },
                "inbox": { "inboxId": "inbox-a", "webhookPublicKey": public_key(&signer_a) }
            },
            {
                "tenantId": "b",
                "bot": { "appId": "bot-b" },
                "inbox": { "inboxId": "inbox-b", "webhookPublicKey": public_key(&signer_b) }
            }
        ]
    })))
    .await;

    let to_a = br#"{"data":{"message":{"channel_id":"inbox-a"}}}"#;
    let to_b = br#"{"data":{"message":{"channel_id":"inbox-b"}}}"#;
    fixture.post_webhook(to_a, &signer_b).await;
    fixture.post_webhook(to_b, &signer_a).await;
    assert!(fixture.outbox_lines("a").is_empty());
    assert!(fixture.outbox_lines("b").is_empty());

    fixture.post_webhook(to_a, &signer_a).await;
    fixture.post_webhook(to_b, &signer_b).await;
    assert_eq!(fixture.outbox_lines("a").len(), 1);
    assert_eq!(fixture.outbox_lines("b").len(), 1);
    assert_eq!(fixture.outbox_lines("a")[0]["payload"]["data"]["message"]["channel_id"], "inbox-a");
}
