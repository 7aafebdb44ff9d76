//! Primary/secondary replication.
//!
//! Every write goes to the store that owns the session first. When a
//! secondary store is configured the session is then converted to a
//! [`SessionRecord`](crate::SessionRecord) and upserted into the secondary
//! on a best-effort basis: a failed secondary leg is logged and never
//! reaches the caller. Reads only ever hit the primary store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::adapter::SessionAdapter;
use crate::config::ReplicationConfig;
use crate::error::{Result, SessionError};
use crate::handle::SessionHandle;
use crate::registry::AdapterRegistry;
use crate::selector::{StoreKind, StoreSelector};

/// Routes session operations to the primary store and mirrors writes to
/// the secondary store.
#[derive(Debug)]
pub struct ReplicationEngine {
    registry: Arc<AdapterRegistry>,
    config: ReplicationConfig,
}

impl ReplicationEngine {
    /// Create an engine.
    ///
    /// Fails if the registry cannot serve the primary store or the
    /// configured replica.
    pub fn new(registry: Arc<AdapterRegistry>, config: ReplicationConfig) -> Result<Self> {
        let selector = config.selector;
        if !registry.supports(selector.primary()) {
            return Err(SessionError::Configuration(format!(
                "primary store {} has no registered adapter",
                selector.primary()
            )));
        }
        if let Some(replica) = selector.replica() {
            if !registry.supports(replica) {
                return Err(SessionError::Configuration(format!(
                    "secondary store {replica} has no registered adapter"
                )));
            }
        }
        debug!(
            %selector,
            timeout_ms = config.store_timeout.as_millis() as u64,
            "Replication engine configured"
        );
        Ok(Self { registry, config })
    }

    /// The active store selection.
    pub fn selector(&self) -> &StoreSelector {
        &self.config.selector
    }

    /// The per-call store timeout.
    pub fn store_timeout(&self) -> Duration {
        self.config.store_timeout
    }

    /// The adapter registry backing this engine.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    async fn bounded<T>(
        &self,
        store: StoreKind,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SessionError::unavailable(
                store,
                format!(
                    "{operation} timed out after {} ms",
                    self.config.store_timeout.as_millis()
                ),
            )),
        }
    }

    /// Create a new, unsaved session in the primary store.
    pub async fn create(&self, max_inactive_interval: Duration) -> Result<SessionHandle> {
        let primary = self.registry.get(self.config.selector.primary()).await?;
        let session = primary.create_session(max_inactive_interval);
        debug!(
            session_id = %session.id(),
            store = %primary.kind(),
            ttl_secs = max_inactive_interval.as_secs(),
            "Created session"
        );
        Ok(session)
    }

    /// Save to the owning store, then replicate.
    ///
    /// Only the owning store's outcome is returned.
    pub async fn save(&self, session: &mut SessionHandle) -> Result<()> {
        let origin_kind = session.kind();
        let origin = self.registry.get(origin_kind).await?;
        self.bounded(origin_kind, "save", origin.save(session)).await?;
        debug!(session_id = %session.id(), store = %origin_kind, "Saved session");

        let Some(target) = self.config.selector.replication_target(origin_kind) else {
            return Ok(());
        };

        if let Err(e) = self.replicate(origin.as_ref(), session, target).await {
            warn!(
                session_id = %session.id(),
                origin = %origin_kind,
                target = %target,
                error = %e,
                "Secondary session save failed"
            );
        }
        Ok(())
    }

    async fn replicate(
        &self,
        origin: &dyn SessionAdapter,
        session: &SessionHandle,
        target: StoreKind,
    ) -> Result<()> {
        let record = origin.to_value_object(session)?;
        let secondary = self.registry.get(target).await?;

        let existing = self
            .bounded(target, "find", secondary.find_by_id(&record.id))
            .await?;
        let merged = existing.is_some();
        let mut replica = secondary.from_value_object(&record, existing)?;
        self.bounded(target, "save", secondary.save(&mut replica))
            .await?;

        debug!(
            session_id = %record.id,
            store = %target,
            merged,
            attributes = record.attributes.len(),
            "Replicated session"
        );
        Ok(())
    }

    /// Load a session from the primary store.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<SessionHandle>> {
        let kind = self.config.selector.primary();
        let primary = self.registry.get(kind).await?;
        let session = self.bounded(kind, "find", primary.find_by_id(id)).await?;
        debug!(session_id = %id, store = %kind, found = session.is_some(), "Looked up session");
        Ok(session)
    }

    /// Delete from the primary store, then from the secondary store.
    pub async fn delete_by_id(&self, id: &str) -> Result<()> {
        let kind = self.config.selector.primary();
        let primary = self.registry.get(kind).await?;
        self.bounded(kind, "delete", primary.delete_by_id(id))
            .await?;
        debug!(session_id = %id, store = %kind, "Deleted session");

        let Some(target) = self.config.selector.replication_target(kind) else {
            return Ok(());
        };

        let result = match self.registry.get(target).await {
            Ok(secondary) => {
                self.bounded(target, "delete", secondary.delete_by_id(id))
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(
                session_id = %id,
                target = %target,
                error = %e,
                "Secondary session delete failed"
            );
        }
        Ok(())
    }
}
