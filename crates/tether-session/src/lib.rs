//! Multi-store HTTP session repository.
//!
//! This crate keeps web sessions in one of several backing stores and can
//! mirror every write into a second store:
//! - Key-value, document and relational store adapters behind one
//!   [`SessionAdapter`] trait
//! - A store-neutral [`SessionRecord`] used to copy sessions between stores
//! - Primary/secondary replication where only the primary outcome counts
//! - Idle-timeout policies that shorten sessions for synthetic traffic
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_session::{
//!     AdapterRegistry, ReplicationConfig, ReplicationEngine, RequestContext,
//!     SessionRepository, StoreKind, StoreSelector, policy_for,
//! };
//!
//! let registry = AdapterRegistry::new()
//!     .with_factory(StoreKind::KeyValue, || Ok(key_value_adapter()))
//!     .with_factory(StoreKind::Document, || Ok(document_adapter()));
//!
//! let config = ReplicationConfig::new(StoreSelector::with_secondary(
//!     StoreKind::KeyValue,
//!     StoreKind::Document,
//! ));
//! let engine = ReplicationEngine::new(Arc::new(registry), config)?;
//! let repository = SessionRepository::new(engine, policy_for(43_200, true));
//!
//! let mut session = repository.create_session(&RequestContext::new()).await?;
//! session.set_attribute("user", "alice");
//! repository.save(&mut session).await?;
//! ```

pub mod adapter;
pub mod client;
mod config;
mod context;
mod engine;
mod error;
mod handle;
pub mod policy;
mod record;
mod registry;
mod repository;
mod selector;

pub use adapter::{
    DocumentAdapter, DocumentSession, KeyValueAdapter, KeyValueSession, RelationalAdapter,
    RelationalSession, SessionAdapter,
};
pub use client::{DocumentClient, InMemoryDocumentClient, InMemoryKeyValueClient, KeyValueClient};
pub use config::{DEFAULT_STORE_TIMEOUT, ReplicationConfig};
pub use context::RequestContext;
pub use engine::ReplicationEngine;
pub use error::{Result, SessionError};
pub use handle::{NativeSession, SessionHandle};
pub use policy::{
    DEFAULT_MAX_AGE_MINUTES, FixedMaxAgePolicy, MaxAgePolicy, RequestTypeAwarePolicy,
    SYNTHETIC_MAX_INACTIVE_INTERVAL, is_synthetic_traffic, policy_for,
};
pub use record::SessionRecord;
pub use registry::{AdapterFactory, AdapterRegistry};
pub use repository::{Session, SessionRepository};
pub use selector::{StoreKind, StoreSelector};
