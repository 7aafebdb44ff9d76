//! Builds the session repository from configuration.
//!
//! Key-value and document stores run on the in-process clients; the
//! relational store opens the configured SQLite database. Each adapter is
//! constructed lazily on first use.

use std::sync::Arc;

use anyhow::Result;
use tether_config::TetherConfig;
use tether_session::{
    AdapterRegistry, DocumentAdapter, InMemoryDocumentClient, InMemoryKeyValueClient,
    KeyValueAdapter, RelationalAdapter, ReplicationEngine, SessionAdapter, SessionRepository,
    StoreKind,
};
use tracing::info;

/// Register a factory for every store kind using the configured settings.
pub fn adapter_registry(config: &TetherConfig) -> AdapterRegistry {
    let namespace = config.key_value_namespace();
    let collection = config.document_collection();
    let relational_path = config.relational_path();

    AdapterRegistry::new()
        .with_factory(StoreKind::KeyValue, move || {
            let adapter: Arc<dyn SessionAdapter> = Arc::new(KeyValueAdapter::with_namespace(
                Arc::new(InMemoryKeyValueClient::new()),
                namespace.clone(),
            ));
            Ok(adapter)
        })
        .with_factory(StoreKind::Document, move || {
            let adapter: Arc<dyn SessionAdapter> = Arc::new(DocumentAdapter::with_collection(
                Arc::new(InMemoryDocumentClient::new()),
                collection.clone(),
            ));
            Ok(adapter)
        })
        .with_factory(StoreKind::Relational, move || {
            let adapter = match &relational_path {
                Some(path) => RelationalAdapter::open(path)?,
                None => RelationalAdapter::open_in_memory()?,
            };
            let adapter: Arc<dyn SessionAdapter> = Arc::new(adapter);
            Ok(adapter)
        })
}

/// Build the repository described by `config`.
pub fn build_repository(config: &TetherConfig) -> Result<SessionRepository> {
    let replication = config.replication_config()?;
    let selector = replication.selector;
    let engine = ReplicationEngine::new(Arc::new(adapter_registry(config)), replication)?;
    info!(%selector, "Session repository ready");
    Ok(SessionRepository::new(engine, config.max_age_policy()?))
}
