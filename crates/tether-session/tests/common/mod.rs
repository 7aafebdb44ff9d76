//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use tether_session::{
    AdapterRegistry, DocumentAdapter, InMemoryDocumentClient, InMemoryKeyValueClient,
    KeyValueAdapter, RelationalAdapter, ReplicationConfig, ReplicationEngine, SessionAdapter,
    SessionError, SessionHandle, SessionRecord, SessionRepository, StoreKind, StoreSelector,
    policy_for,
};

/// An adapter wrapper that counts calls and can be told to fail.
pub struct CountingAdapter {
    inner: Arc<dyn SessionAdapter>,
    pub saves: AtomicUsize,
    pub finds: AtomicUsize,
    pub deletes: AtomicUsize,
    pub failing: AtomicBool,
}

impl CountingAdapter {
    pub fn wrap(inner: Arc<dyn SessionAdapter>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            saves: AtomicUsize::new(0),
            finds: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    /// The wrapped adapter, bypassing counting and failure injection.
    pub fn inner(&self) -> &Arc<dyn SessionAdapter> {
        &self.inner
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check(&self) -> tether_session::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionError::unavailable(self.inner.kind(), "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionAdapter for CountingAdapter {
    fn kind(&self) -> StoreKind {
        self.inner.kind()
    }

    fn create_session(&self, max_inactive_interval: Duration) -> SessionHandle {
        self.inner.create_session(max_inactive_interval)
    }

    async fn save(&self, session: &mut SessionHandle) -> tether_session::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.save(session).await
    }

    async fn find_by_id(&self, id: &str) -> tether_session::Result<Option<SessionHandle>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.find_by_id(id).await
    }

    async fn delete_by_id(&self, id: &str) -> tether_session::Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete_by_id(id).await
    }

    fn to_value_object(&self, session: &SessionHandle) -> tether_session::Result<SessionRecord> {
        self.inner.to_value_object(session)
    }

    fn from_value_object(
        &self,
        record: &SessionRecord,
        existing: Option<SessionHandle>,
    ) -> tether_session::Result<SessionHandle> {
        self.inner.from_value_object(record, existing)
    }
}

/// One counting adapter per store kind, backed by real adapters.
pub struct TestStores {
    pub key_value: Arc<CountingAdapter>,
    pub document: Arc<CountingAdapter>,
    pub relational: Arc<CountingAdapter>,
    /// Raw access to the document store behind `document`.
    pub document_client: Arc<InMemoryDocumentClient>,
    /// Holds the relational database file.
    pub temp_dir: TempDir,
}

impl TestStores {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let relational = RelationalAdapter::open(temp_dir.path().join("sessions.db"))?;
        let document_client = Arc::new(InMemoryDocumentClient::new());

        Ok(Self {
            key_value: CountingAdapter::wrap(Arc::new(KeyValueAdapter::new(Arc::new(
                InMemoryKeyValueClient::new(),
            )))),
            document: CountingAdapter::wrap(Arc::new(DocumentAdapter::new(
                document_client.clone(),
            ))),
            relational: CountingAdapter::wrap(Arc::new(relational)),
            document_client,
            temp_dir,
        })
    }

    pub fn get(&self, kind: StoreKind) -> &Arc<CountingAdapter> {
        match kind {
            StoreKind::KeyValue => &self.key_value,
            StoreKind::Document => &self.document,
            StoreKind::Relational => &self.relational,
        }
    }

    pub fn registry(&self) -> AdapterRegistry {
        StoreKind::ALL
            .into_iter()
            .fold(AdapterRegistry::new(), |registry, kind| {
                let adapter: Arc<dyn SessionAdapter> = Arc::<CountingAdapter>::clone(self.get(kind));
                registry.with_adapter(adapter)
            })
    }

    /// Path of the relational database file.
    pub fn relational_path(&self) -> PathBuf {
        self.temp_dir.path().join("sessions.db")
    }

    pub fn engine(&self, config: ReplicationConfig) -> Result<ReplicationEngine> {
        Ok(ReplicationEngine::new(Arc::new(self.registry()), config)?)
    }

    pub fn repository(&self, selector: StoreSelector) -> Result<SessionRepository> {
        let engine = self.engine(ReplicationConfig::new(selector))?;
        Ok(SessionRepository::new(engine, policy_for(30, true)))
    }
}
