//! Immutable tenant store snapshots with identity-key indices.
//!
//! A [`TenantStore`] is never edited in place by the registry: every mutation
//! builds a new store via [`TenantStore::with_record`] and the registry swaps
//! it in whole, so readers always observe a complete, consistent snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::TenancyMode;
use crate::record::TenantRecord;

/// Which inbound identity key a conflict or lookup refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    BotAppId,
    InboxId,
}

impl IdentityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BotAppId => "bot appId",
            Self::InboxId => "inbox id",
        }
    }
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two records that cannot coexist in one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConflict {
    DuplicateTenantId(String),
    Identity {
        kind: IdentityKind,
        key: String,
        existing_tenant: String,
        incoming_tenant: String,
    },
}

impl fmt::Display for StoreConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTenantId(tenant_id) => {
                write!(f, "tenantId '{tenant_id}' is listed more than once")
            }
            Self::Identity {
                kind,
                key,
                existing_tenant,
                incoming_tenant,
            } => write!(
                f,
                "active tenants '{existing_tenant}' and '{incoming_tenant}' both claim {kind} '{key}'"
            ),
        }
    }
}

/// Counts reported by health and admin surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub mode: TenancyMode,
    pub initialized: bool,
    pub default_tenant: Option<String>,
    pub active_tenants: usize,
    pub inactive_tenants: usize,
    pub retained_inactive_tenants: usize,
}

#[derive(Debug, Clone)]
pub struct TenantStore {
    mode: TenancyMode,
    initialized: bool,
    default_tenant_id: Option<String>,
    // The `defaultTenant` the document itself declares; this, not the
    // resolved default, is what a rewrite persists.
    declared_default_tenant: Option<String>,
    document_path: Option<PathBuf>,
    // Every record in document order.
    records: Vec<TenantRecord>,
    // Records that were already inactive when loaded. They stay hidden from
    // every lookup until an upsert names them, but keep their place in
    // `records` so a rewrite does not reorder the document.
    retained: BTreeSet<String>,
    by_bot_identity: BTreeMap<String, usize>,
    by_inbox_identity: BTreeMap<String, usize>,
}

impl TenantStore {
    pub fn uninitialized(mode: TenancyMode) -> Self {
        Self {
            mode,
            initialized: false,
            default_tenant_id: None,
            declared_default_tenant: None,
            document_path: None,
            records: Vec::new(),
            retained: BTreeSet::new(),
            by_bot_identity: BTreeMap::new(),
            by_inbox_identity: BTreeMap::new(),
        }
    }

    /// Builds an initialized store, rejecting duplicate ids and identity clashes.
    ///
    /// Records that arrive inactive are retained: persisted in place but
    /// invisible to lookups.
    pub fn build(
        mode: TenancyMode,
        default_tenant_id: Option<String>,
        document_path: Option<PathBuf>,
        records: Vec<TenantRecord>,
    ) -> Result<Self, StoreConflict> {
        let retained = records
            .iter()
            .filter(|record| !record.active)
            .map(|record| record.tenant_id.clone())
            .collect();
        let mut store = Self {
            mode,
            initialized: true,
            default_tenant_id,
            declared_default_tenant: None,
            document_path,
            records,
            retained,
            by_bot_identity: BTreeMap::new(),
            by_inbox_identity: BTreeMap::new(),
        };
        store.reindex()?;
        Ok(store)
    }

    pub fn with_declared_default_tenant(mut self, declared: Option<String>) -> Self {
        self.declared_default_tenant = declared;
        self
    }

    fn reindex(&mut self) -> Result<(), StoreConflict> {
        let mut seen_ids = BTreeSet::new();
        for record in &self.records {
            if !seen_ids.insert(record.tenant_id.as_str()) {
                return Err(StoreConflict::DuplicateTenantId(record.tenant_id.clone()));
            }
        }

        let mut by_bot_identity = BTreeMap::new();
        let mut by_inbox_identity = BTreeMap::new();
        for (index, record) in self.records.iter().enumerate() {
            if !record.active {
                continue;
            }
            if let Some(key) = record.bot_identity() {
                self.claim(&mut by_bot_identity, IdentityKind::BotAppId, key, index)?;
            }
            if let Some(key) = record.inbox_identity() {
                self.claim(&mut by_inbox_identity, IdentityKind::InboxId, key, index)?;
            }
        }
        self.by_bot_identity = by_bot_identity;
        self.by_inbox_identity = by_inbox_identity;
        Ok(())
    }

    fn claim(
        &self,
        index: &mut BTreeMap<String, usize>,
        kind: IdentityKind,
        key: &str,
        position: usize,
    ) -> Result<(), StoreConflict> {
        if let Some(existing) = index.insert(key.to_string(), position) {
            return Err(StoreConflict::Identity {
                kind,
                key: key.to_string(),
                existing_tenant: self.records[existing].tenant_id.clone(),
                incoming_tenant: self.records[position].tenant_id.clone(),
            });
        }
        Ok(())
    }

    /// Returns a copy of this store with `record` replacing the record
    /// (visible or retained) with the same tenant id in place, or appended.
    /// The record is visible afterwards either way.
    pub fn with_record(&self, record: TenantRecord) -> Result<Self, StoreConflict> {
        let mut next = self.clone();
        next.retained.remove(&record.tenant_id);
        match next
            .records
            .iter_mut()
            .find(|existing| existing.tenant_id == record.tenant_id)
        {
            Some(existing) => *existing = record,
            None => next.records.push(record),
        }
        next.reindex()?;
        Ok(next)
    }

    pub fn mode(&self) -> TenancyMode {
        self.mode
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn default_tenant_id(&self) -> Option<&str> {
        self.default_tenant_id.as_deref()
    }

    pub fn declared_default_tenant(&self) -> Option<&str> {
        self.declared_default_tenant.as_deref()
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document_path.as_deref()
    }

    fn is_retained(&self, record: &TenantRecord) -> bool {
        self.retained.contains(&record.tenant_id)
    }

    /// Looks up by primary key, including records deactivated since load.
    pub fn get(&self, tenant_id: &str) -> Option<&TenantRecord> {
        let tenant_id = tenant_id.trim();
        self.records
            .iter()
            .find(|record| record.tenant_id == tenant_id && !self.is_retained(record))
    }

    /// Looks up an inactive record that was only carried for persistence.
    pub fn get_retained(&self, tenant_id: &str) -> Option<&TenantRecord> {
        let tenant_id = tenant_id.trim();
        self.records
            .iter()
            .find(|record| record.tenant_id == tenant_id && self.is_retained(record))
    }

    pub fn find_by_bot_identity(&self, app_id: &str) -> Option<&TenantRecord> {
        self.by_bot_identity
            .get(app_id.trim())
            .map(|index| &self.records[*index])
    }

    pub fn find_by_inbox_identity(&self, inbox_id: &str) -> Option<&TenantRecord> {
        self.by_inbox_identity
            .get(inbox_id.trim())
            .map(|index| &self.records[*index])
    }

    pub fn active_records(&self) -> impl Iterator<Item = &TenantRecord> {
        self.records.iter().filter(|record| record.active)
    }

    /// Every record, retained ones included, in document order.
    pub fn persisted_records(&self) -> impl Iterator<Item = &TenantRecord> {
        self.records.iter()
    }

    pub fn summary(&self) -> StoreSummary {
        let active_tenants = self.active_records().count();
        let retained_inactive_tenants = self.retained.len();
        StoreSummary {
            mode: self.mode,
            initialized: self.initialized,
            default_tenant: self.default_tenant_id.clone(),
            active_tenants,
            inactive_tenants: self.records.len() - active_tenants - retained_inactive_tenants,
            retained_inactive_tenants,
        }
    }
}
