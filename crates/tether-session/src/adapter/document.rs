//! Document store adapter.
//!
//! One document per session in a single collection:
//!
//! ```json
//! { "_id": "…", "created": 1700000000000, "accessed": 1700000000000,
//!   "interval": 1800, "expireAt": 1700001800000, "attr": { … } }
//! ```
//!
//! Saving replaces the whole document.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::adapter::SessionAdapter;
use crate::client::DocumentClient;
use crate::error::{Result, SessionError};
use crate::handle::{NativeSession, SessionHandle};
use crate::record::SessionRecord;
use crate::selector::StoreKind;

/// Default collection holding session documents.
pub const DEFAULT_COLLECTION: &str = "sessions";

/// Stored document layout.
#[derive(Debug, Serialize, Deserialize)]
struct SessionDocument {
    #[serde(rename = "_id")]
    id: String,
    created: i64,
    accessed: i64,
    interval: u64,
    #[serde(rename = "expireAt", default)]
    expire_at: Option<i64>,
    #[serde(default)]
    attr: HashMap<String, Value>,
}

/// Native document session.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    id: String,
    created: DateTime<Utc>,
    accessed: DateTime<Utc>,
    interval: Duration,
    /// Absolute expiry as last written to the store.
    expire_at: Option<DateTime<Utc>>,
    attributes: HashMap<String, Value>,
}

impl DocumentSession {
    /// Create a new session with a random id.
    pub fn new(interval: Duration) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), interval)
    }

    /// Create a new session with the given id.
    pub fn with_id(id: impl Into<String>, interval: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created: now,
            accessed: now,
            interval,
            expire_at: None,
            attributes: HashMap::new(),
        }
    }

    /// The absolute expiry recorded by the last save.
    pub fn expire_at(&self) -> Option<DateTime<Utc>> {
        self.expire_at
    }

    fn compute_expire_at(&self) -> Option<DateTime<Utc>> {
        if self.interval.is_zero() {
            return None;
        }
        chrono::Duration::from_std(self.interval)
            .ok()
            .and_then(|d| self.accessed.checked_add_signed(d))
    }

    fn to_document(&self) -> SessionDocument {
        SessionDocument {
            id: self.id.clone(),
            created: self.created.timestamp_millis(),
            accessed: self.accessed.timestamp_millis(),
            interval: self.interval.as_secs(),
            expire_at: self.expire_at.map(|at| at.timestamp_millis()),
            attr: self.attributes.clone(),
        }
    }

    fn from_document(doc: SessionDocument) -> Result<Self> {
        let millis = |field: &str, value: i64| {
            DateTime::from_timestamp_millis(value).ok_or_else(|| {
                SessionError::conversion(
                    StoreKind::Document,
                    format!("invalid {field} timestamp {value}"),
                )
            })
        };
        Ok(Self {
            created: millis("created", doc.created)?,
            accessed: millis("accessed", doc.accessed)?,
            expire_at: doc
                .expire_at
                .map(|at| millis("expireAt", at))
                .transpose()?,
            interval: Duration::from_secs(doc.interval),
            attributes: doc.attr,
            id: doc.id,
        })
    }
}

impl NativeSession for DocumentSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    fn attribute_names(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    fn set_attribute(&mut self, name: String, value: Value) {
        self.attributes.insert(name, value);
    }

    fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    fn max_inactive_interval(&self) -> Duration {
        self.interval
    }

    fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.created
    }

    fn last_accessed_time(&self) -> DateTime<Utc> {
        self.accessed
    }

    fn set_last_accessed_time(&mut self, now: DateTime<Utc>) {
        self.accessed = now;
    }
}

/// Adapter for the document store.
pub struct DocumentAdapter {
    client: Arc<dyn DocumentClient>,
    collection: String,
}

impl DocumentAdapter {
    /// Create an adapter using [`DEFAULT_COLLECTION`].
    pub fn new(client: Arc<dyn DocumentClient>) -> Self {
        Self::with_collection(client, DEFAULT_COLLECTION)
    }

    /// Create an adapter writing to a custom collection.
    pub fn with_collection(client: Arc<dyn DocumentClient>, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// The collection holding session documents.
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl SessionAdapter for DocumentAdapter {
    fn kind(&self) -> StoreKind {
        StoreKind::Document
    }

    fn create_session(&self, max_inactive_interval: Duration) -> SessionHandle {
        SessionHandle::Document(DocumentSession::new(max_inactive_interval))
    }

    async fn save(&self, session: &mut SessionHandle) -> Result<()> {
        let kind = session.kind();
        let SessionHandle::Document(native) = session else {
            return Err(SessionError::foreign_handle(StoreKind::Document, kind));
        };

        native.expire_at = native.compute_expire_at();
        let document = serde_json::to_value(native.to_document()).map_err(|e| {
            SessionError::conversion(StoreKind::Document, format!("cannot encode document: {e}"))
        })?;
        self.client
            .replace_one(&self.collection, &native.id, document)
            .await?;

        debug!(
            session_id = %native.id,
            collection = %self.collection,
            "Saved document session"
        );
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionHandle>> {
        let Some(raw) = self.client.find_one(&self.collection, id).await? else {
            return Ok(None);
        };
        let document: SessionDocument = serde_json::from_value(raw).map_err(|e| {
            SessionError::conversion(StoreKind::Document, format!("malformed session document: {e}"))
        })?;
        let session = DocumentSession::from_document(document)?;

        let now = Utc::now();
        let expired = match session.expire_at {
            Some(at) => at <= now,
            None => session.is_expired_at(now),
        };
        if expired {
            debug!(session_id = %id, "Document session expired, deleting");
            self.client.delete_one(&self.collection, id).await?;
            return Ok(None);
        }
        Ok(Some(SessionHandle::Document(session)))
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let existed = self.client.delete_one(&self.collection, id).await?;
        debug!(session_id = %id, existed, "Deleted document session");
        Ok(())
    }

    fn to_value_object(&self, session: &SessionHandle) -> Result<SessionRecord> {
        let SessionHandle::Document(native) = session else {
            return Err(SessionError::foreign_handle(
                StoreKind::Document,
                session.kind(),
            ));
        };
        Ok(SessionRecord::new(native.id.clone(), native.interval)
            .with_attributes(native.attributes.clone())
            .with_created_at_millis(native.created.timestamp_millis()))
    }

    fn from_value_object(
        &self,
        record: &SessionRecord,
        existing: Option<SessionHandle>,
    ) -> Result<SessionHandle> {
        let mut native = match existing {
            Some(SessionHandle::Document(native)) => native,
            Some(other) => {
                return Err(SessionError::foreign_handle(
                    StoreKind::Document,
                    other.kind(),
                ));
            }
            None => {
                let mut native =
                    DocumentSession::with_id(record.id.clone(), record.max_inactive_interval);
                if let Some(created) = record
                    .created_at_millis
                    .and_then(DateTime::from_timestamp_millis)
                {
                    native.created = created;
                }
                native
            }
        };

        native.interval = record.max_inactive_interval;
        native.attributes.extend(
            record
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        Ok(SessionHandle::Document(native))
    }
}
