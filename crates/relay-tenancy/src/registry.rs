//! The tenant registry: the only entry point request handlers and admin
//! tooling use to resolve and mutate tenants.
//!
//! Reads load the current [`TenantStore`] snapshot without locking. Writers
//! (`initialize`, `reload`, `upsert_tenant`, `deactivate_tenant`) serialize on
//! one mutex, build the next snapshot, persist it in multi mode, and only then
//! publish it. A reader therefore sees either the old store or the new one,
//! never a record that is half updated or not yet durable.
//!
//! The registry is per-process. Several instances pointed at one document do
//! not coordinate and the last writer wins.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::config::{TenancyConfig, TenancyMode};
use crate::document::{write_tenant_document, TenantDocument};
use crate::error::{TenancyError, TenancyResult};
use crate::loader::load_tenant_store;
use crate::record::{TenantPatch, TenantRecord};
use crate::store::{StoreConflict, StoreSummary, TenantStore};

pub struct TenantRegistry {
    config: TenancyConfig,
    snapshot: ArcSwap<TenantStore>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for TenantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRegistry")
            .field("mode", &self.config.mode)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl TenantRegistry {
    /// Creates an uninitialized registry; the first read loads it.
    pub fn new(config: TenancyConfig) -> Self {
        let mode = config.mode;
        Self {
            config,
            snapshot: ArcSwap::from_pointee(TenantStore::uninitialized(mode)),
            write_lock: Mutex::new(()),
        }
    }

    /// Creates and initializes a registry; the normal startup path.
    pub fn open(config: TenancyConfig) -> TenancyResult<Self> {
        let registry = Self::new(config);
        registry.initialize()?;
        Ok(registry)
    }

    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    pub fn mode(&self) -> TenancyMode {
        self.config.mode
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot.load().is_initialized()
    }

    /// Multi-mode document path; `None` in single mode.
    pub fn document_path(&self) -> Option<&Path> {
        (self.config.mode == TenancyMode::Multi).then_some(self.config.document_path.as_path())
    }

    /// Loads tenants if not already loaded. Repeat calls are no-ops.
    pub fn initialize(&self) -> TenancyResult<()> {
        let _guard = self.lock_writes();
        self.initialized_store_locked().map(|_| ())
    }

    /// Drops every in-memory record and runs the loader again.
    ///
    /// Unpersisted changes are lost; in single mode that is every upsert and
    /// deactivation since the last load. If the loader fails the registry is
    /// left uninitialized and the next read retries the load.
    pub fn reload(&self) -> TenancyResult<()> {
        let _guard = self.lock_writes();
        self.snapshot
            .store(Arc::new(TenantStore::uninitialized(self.config.mode)));
        self.initialized_store_locked()?;
        info!(mode = %self.config.mode, "tenant registry reloaded");
        Ok(())
    }

    /// Resolves by tenant id, falling back to the default tenant when `tenant_id`
    /// is `None`. Deactivated records are still returned.
    pub fn get_tenant(&self, tenant_id: Option<&str>) -> TenancyResult<Option<TenantRecord>> {
        let store = self.store()?;
        let tenant_id = match tenant_id {
            Some(tenant_id) => tenant_id,
            None => match store.default_tenant_id() {
                Some(default_tenant) => default_tenant,
                None => return Ok(None),
            },
        };
        Ok(store.get(tenant_id).cloned())
    }

    /// Routes an inbound bot-framework activity by the bot's appId.
    pub fn get_tenant_by_bot_identity(&self, app_id: &str) -> TenancyResult<Option<TenantRecord>> {
        Ok(self.store()?.find_by_bot_identity(app_id).cloned())
    }

    /// Routes an inbound support-inbox webhook by inbox id.
    pub fn get_tenant_by_inbox_identity(
        &self,
        inbox_id: &str,
    ) -> TenancyResult<Option<TenantRecord>> {
        Ok(self.store()?.find_by_inbox_identity(inbox_id).cloned())
    }

    /// Snapshot of every active record in load order.
    pub fn get_all_tenants(&self) -> TenancyResult<Vec<TenantRecord>> {
        Ok(self.store()?.active_records().cloned().collect())
    }

    pub fn default_tenant_id(&self) -> TenancyResult<Option<String>> {
        Ok(self.store()?.default_tenant_id().map(str::to_string))
    }

    pub fn summary(&self) -> TenancyResult<StoreSummary> {
        Ok(self.store()?.summary())
    }

    /// Merges `patch` into the record with the same id, creating it if needed.
    ///
    /// `created_at` is kept from the existing record; `updated_at` always moves
    /// forward. Returns the stored record.
    pub fn upsert_tenant(&self, patch: TenantPatch) -> TenancyResult<TenantRecord> {
        let tenant_id = patch.tenant_id.trim().to_string();
        if tenant_id.is_empty() {
            return Err(TenancyError::MissingTenantId);
        }

        let _guard = self.lock_writes();
        let current = self.initialized_store_locked()?;
        let existing = current
            .get(&tenant_id)
            .or_else(|| current.get_retained(&tenant_id))
            .cloned();

        let record = match existing {
            Some(existing) => {
                let mut record = existing.clone();
                record.apply_patch(&patch);
                let stamp = relay_core::monotonic_utc_after(Some(existing.last_modified()));
                record.updated_at = Some(stamp);
                if existing.active && !record.active {
                    record.deactivated_at = Some(stamp);
                } else if record.active {
                    record.deactivated_at = None;
                }
                record
            }
            None => {
                let now = relay_core::utc_now();
                let mut record = TenantRecord::new(tenant_id.as_str(), now);
                record.apply_patch(&patch);
                record.updated_at = Some(now);
                if !record.active {
                    record.deactivated_at = Some(now);
                }
                record
            }
        };

        let next = current
            .with_record(record.clone())
            .map_err(|conflict| conflict_to_validation_error(conflict, &tenant_id))?;
        self.persist_and_publish(next)?;
        info!(
            tenant_id = %record.tenant_id,
            active = record.active,
            mode = %self.config.mode,
            "tenant upserted"
        );
        Ok(record)
    }

    /// Marks a tenant inactive. Unknown ids are a no-op returning `None`;
    /// already inactive records are returned unchanged.
    pub fn deactivate_tenant(&self, tenant_id: &str) -> TenancyResult<Option<TenantRecord>> {
        let _guard = self.lock_writes();
        let current = self.initialized_store_locked()?;
        let Some(existing) = current.get(tenant_id) else {
            warn!(tenant_id = %tenant_id.trim(), "deactivate requested for unknown tenant");
            return Ok(None);
        };
        if !existing.active {
            return Ok(Some(existing.clone()));
        }

        let mut record = existing.clone();
        let stamp = relay_core::monotonic_utc_after(Some(existing.last_modified()));
        record.active = false;
        record.deactivated_at = Some(stamp);
        record.updated_at = Some(stamp);

        let next = current
            .with_record(record.clone())
            .map_err(|conflict| TenancyError::Configuration(conflict.to_string()))?;
        self.persist_and_publish(next)?;
        info!(tenant_id = %record.tenant_id, mode = %self.config.mode, "tenant deactivated");
        Ok(Some(record))
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no torn state.
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self) -> TenancyResult<Arc<TenantStore>> {
        let store = self.snapshot.load_full();
        if store.is_initialized() {
            return Ok(store);
        }
        let _guard = self.lock_writes();
        self.initialized_store_locked()
    }

    /// Caller must hold the write lock.
    fn initialized_store_locked(&self) -> TenancyResult<Arc<TenantStore>> {
        let store = self.snapshot.load_full();
        if store.is_initialized() {
            return Ok(store);
        }
        let loaded = Arc::new(load_tenant_store(&self.config)?);
        self.snapshot.store(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Caller must hold the write lock.
    fn persist_and_publish(&self, next: TenantStore) -> TenancyResult<()> {
        if let Some(path) = next.document_path() {
            write_tenant_document(path, &TenantDocument::from_store(&next))?;
        }
        self.snapshot.store(Arc::new(next));
        Ok(())
    }
}

/// Reports the other party of a clash; the store may list the upserted
/// record first when it replaced one earlier in load order.
fn conflict_to_validation_error(conflict: StoreConflict, upserted: &str) -> TenancyError {
    match conflict {
        StoreConflict::Identity {
            kind,
            key,
            existing_tenant,
            incoming_tenant,
        } => TenancyError::IdentityConflict {
            kind,
            key,
            existing_tenant: if existing_tenant == upserted {
                incoming_tenant
            } else {
                existing_tenant
            },
        },
        StoreConflict::DuplicateTenantId(tenant_id) => TenancyError::Configuration(format!(
            "tenantId '{tenant_id}' is listed more than once"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::TenantRegistry;
    use crate::config::TenancyConfig;
    use crate::env::{EnvSnapshot, EnvironmentSource};
    use crate::error::TenancyError;
    use crate::record::TenantPatch;

    fn single_registry(pairs: &[(&str, &str)]) -> TenantRegistry {
        let env = EnvSnapshot::from_pairs(pairs.iter().copied());
        TenantRegistry::new(TenancyConfig::single(EnvironmentSource::Fixed(env)))
    }

    #[test]
    fn unit_first_read_initializes_lazily() {
        let registry = single_registry(&[("MICROSOFT_APP_ID", "bot-1")]);
        assert!(!registry.is_initialized());
        let tenant = registry.get_tenant(None).expect("lookup").expect("default tenant");
        assert_eq!(tenant.tenant_id, "default");
        assert!(registry.is_initialized());
    }

    #[test]
    fn unit_get_tenant_unknown_id_is_not_found() {
        let registry = single_registry(&[]);
        assert!(registry.get_tenant(Some("nobody")).expect("lookup").is_none());
        assert!(registry.get_tenant_by_bot_identity("").expect("lookup").is_none());
    }

    #[test]
    fn unit_upsert_without_tenant_id_is_a_validation_error() {
        let registry = single_registry(&[]);
        let error = registry
            .upsert_tenant(TenantPatch::for_tenant("   "))
            .expect_err("blank id");
        assert!(matches!(error, TenancyError::MissingTenantId));
        assert!(error.is_validation());
    }

    #[test]
    fn functional_deactivate_unknown_tenant_is_a_no_op() {
        let registry = single_registry(&[]);
        assert!(registry.deactivate_tenant("ghost").expect("deactivate").is_none());
        assert_eq!(registry.get_all_tenants().expect("list").len(), 1);
    }

    #[test]
    fn functional_upsert_setting_active_false_stamps_deactivation() {
        let registry = single_registry(&[("MICROSOFT_APP_ID", "bot-1")]);
        let mut patch = TenantPatch::for_tenant("default");
        patch.active = Some(false);
        let record = registry.upsert_tenant(patch).expect("upsert");
        assert!(!record.active);
        assert_eq!(record.deactivated_at, record.updated_at);
        assert!(registry.get_tenant_by_bot_identity("bot-1").expect("lookup").is_none());

        let mut patch = TenantPatch::for_tenant("default");
        patch.active = Some(true);
        let record = registry.upsert_tenant(patch).expect("reactivate");
        assert!(record.active);
        assert!(record.deactivated_at.is_none());
    }
}
