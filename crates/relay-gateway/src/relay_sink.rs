//! Hand-off boundary between tenant resolution and message relaying.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use relay_core::{append_line_with_rotation, LogRotationPolicy};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

const FALLBACK_OUTBOX_KEY: &str = "tenant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayDirection {
    TeamsToInbox,
    InboxToTeams,
}

/// One inbound event after it has been attributed to a tenant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayEvent {
    pub tenant_id: String,
    pub direction: RelayDirection,
    pub received_unix_ms: u64,
    /// Verdict status for webhooks; `None` for bot activities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<&'static str>,
    pub payload: Value,
}

impl RelayEvent {
    pub fn new(tenant_id: impl Into<String>, direction: RelayDirection, payload: Value) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            direction,
            received_unix_ms: relay_core::current_unix_timestamp_ms(),
            verification: None,
            payload,
        }
    }

    pub fn with_verification(mut self, status: &'static str) -> Self {
        self.verification = Some(status);
        self
    }
}

#[async_trait]
pub trait RelaySink: Send + Sync {
    async fn deliver(&self, event: RelayEvent) -> Result<()>;
}

/// Appends each event as one NDJSON line to `<root>/<tenant>.ndjson`.
pub struct OutboxRelaySink {
    root: PathBuf,
    rotation: LogRotationPolicy,
    write_lock: Mutex<()>,
}

impl OutboxRelaySink {
    pub fn new(root: impl Into<PathBuf>, rotation: LogRotationPolicy) -> Self {
        Self {
            root: root.into(),
            rotation,
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn outbox_path(&self, tenant_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.ndjson", sanitize_outbox_key(tenant_id)))
    }
}

#[async_trait]
impl RelaySink for OutboxRelaySink {
    async fn deliver(&self, event: RelayEvent) -> Result<()> {
        let line = serde_json::to_string(&event).context("failed to encode relay event")?;
        let path = self.outbox_path(&event.tenant_id);
        let _guard = self.write_lock.lock().await;
        append_line_with_rotation(&path, &line, self.rotation)
            .with_context(|| format!("failed to append relay event to {}", path.display()))
    }
}

fn sanitize_outbox_key(raw: &str) -> String {
    let normalized: String = raw
        .trim()
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let normalized = normalized.trim_matches('_');
    if normalized.is_empty() {
        FALLBACK_OUTBOX_KEY.to_string()
    } else {
        normalized.to_string()
    }
}

#[cfg(test)]
mod tests {
    use relay_core::LogRotationPolicy;
    use serde_json::{json, Value};

    use super::{sanitize_outbox_key, OutboxRelaySink, RelayDirection, RelayEvent, RelaySink};

    #[test]
    fn unit_outbox_key_never_escapes_the_root() {
        assert_eq!(sanitize_outbox_key("acme"), "acme");
        assert_eq!(sanitize_outbox_key("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_outbox_key("///"), "tenant");
    }

    #[tokio::test]
    async fn functional_outbox_sink_appends_one_line_per_event() {
        let temp = tempfile::tempdir().expect("tempdir");
        let sink = OutboxRelaySink::new(temp.path(), LogRotationPolicy::disabled());
        for text in ["first", "second"] {
            sink.deliver(
                RelayEvent::new("acme", RelayDirection::TeamsToInbox, json!({ "text": text })),
            )
            .await
            .expect("deliver");
        }
        sink.deliver(
            RelayEvent::new("other", RelayDirection::InboxToTeams, json!({}))
                .with_verification("verified"),
        )
        .await
        .expect("deliver other");

        let raw = std::fs::read_to_string(sink.outbox_path("acme")).expect("read outbox");
        let lines: Vec<Value> = raw
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["direction"], "teams_to_inbox");
        assert_eq!(lines[1]["payload"]["text"], "second");
        assert!(lines[0].get("verification").is_none());

        let other = std::fs::read_to_string(sink.outbox_path("other")).expect("read other");
        assert!(other.contains("\"verification\":\"verified\""));
    }
}
