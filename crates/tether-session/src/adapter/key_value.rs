//! Key/attribute-value store adapter.
//!
//! Each session is one hash under `<namespace>sessions:<id>`:
//!
//! ```text
//! creationTime          epoch millis
//! lastAccessedTime      epoch millis
//! maxInactiveInterval   seconds
//! sessionAttr:<name>    JSON-encoded attribute value
//! ```
//!
//! The native session records which fields changed since it was loaded so
//! that `save` writes only the delta. The hash expires with the session's
//! idle lifetime.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, trace};

use crate::adapter::SessionAdapter;
use crate::client::KeyValueClient;
use crate::error::{Result, SessionError};
use crate::handle::{NativeSession, SessionHandle};
use crate::record::SessionRecord;
use crate::selector::StoreKind;

/// Default key prefix for session hashes.
pub const DEFAULT_NAMESPACE: &str = "tether:session:";

const CREATION_TIME: &str = "creationTime";
const LAST_ACCESSED_TIME: &str = "lastAccessedTime";
const MAX_INACTIVE_INTERVAL: &str = "maxInactiveInterval";
const ATTRIBUTE_PREFIX: &str = "sessionAttr:";

/// Native key-value session.
#[derive(Debug, Clone)]
pub struct KeyValueSession {
    id: String,
    creation_time: DateTime<Utc>,
    last_accessed_time: DateTime<Utc>,
    max_inactive_interval: Duration,
    attributes: HashMap<String, Value>,
    /// Hash fields to write (`Some`) or remove (`None`) on the next save.
    delta: HashMap<String, Option<String>>,
    is_new: bool,
}

impl KeyValueSession {
    /// Create a new session with a random id.
    pub fn new(max_inactive_interval: Duration) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), max_inactive_interval)
    }

    /// Create a new, unsaved session with the given id.
    pub fn with_id(id: impl Into<String>, max_inactive_interval: Duration) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: id.into(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval,
            attributes: HashMap::new(),
            delta: HashMap::new(),
            is_new: true,
        };
        session.stage(CREATION_TIME, now.timestamp_millis().to_string());
        session.stage(LAST_ACCESSED_TIME, now.timestamp_millis().to_string());
        session.stage(
            MAX_INACTIVE_INTERVAL,
            max_inactive_interval.as_secs().to_string(),
        );
        session
    }

    /// Whether the session has never been saved.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Number of hash fields waiting to be written or removed.
    pub fn pending_changes(&self) -> usize {
        self.delta.len()
    }

    fn stage(&mut self, field: impl Into<String>, value: String) {
        self.delta.insert(field.into(), Some(value));
    }

    fn set_creation_time(&mut self, creation_time: DateTime<Utc>) {
        self.creation_time = creation_time;
        self.stage(CREATION_TIME, creation_time.timestamp_millis().to_string());
    }

    /// Rebuild a session from its stored hash.
    fn from_fields(id: &str, fields: HashMap<String, String>) -> Result<Self> {
        let now = Utc::now();
        let mut session = Self {
            id: id.to_string(),
            creation_time: now,
            last_accessed_time: now,
            max_inactive_interval: Duration::ZERO,
            attributes: HashMap::new(),
            delta: HashMap::new(),
            is_new: false,
        };

        for (field, raw) in fields {
            match field.as_str() {
                CREATION_TIME => session.creation_time = parse_millis(&field, &raw)?,
                LAST_ACCESSED_TIME => session.last_accessed_time = parse_millis(&field, &raw)?,
                MAX_INACTIVE_INTERVAL => {
                    let secs: u64 = raw.parse().map_err(|_| {
                        SessionError::conversion(
                            StoreKind::KeyValue,
                            format!("invalid {field} value '{raw}'"),
                        )
                    })?;
                    session.max_inactive_interval = Duration::from_secs(secs);
                }
                _ => {
                    if let Some(name) = field.strip_prefix(ATTRIBUTE_PREFIX) {
                        let value = serde_json::from_str(&raw).map_err(|e| {
                            SessionError::conversion(
                                StoreKind::KeyValue,
                                format!("attribute '{name}' is not valid JSON: {e}"),
                            )
                        })?;
                        session.attributes.insert(name.to_string(), value);
                    } else {
                        trace!(session_id = %id, field = %field, "Ignoring unknown hash field");
                    }
                }
            }
        }

        Ok(session)
    }
}

fn parse_millis(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| {
            SessionError::conversion(
                StoreKind::KeyValue,
                format!("invalid {field} value '{raw}'"),
            )
        })
}

impl NativeSession for KeyValueSession {
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
        self.stage(format!("{ATTRIBUTE_PREFIX}{name}"), value.to_string());
        self.attributes.insert(name, value);
    }

    fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.delta
            .insert(format!("{ATTRIBUTE_PREFIX}{name}"), None);
        self.attributes.remove(name)
    }

    fn max_inactive_interval(&self) -> Duration {
        self.max_inactive_interval
    }

    fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.max_inactive_interval = interval;
        self.stage(MAX_INACTIVE_INTERVAL, interval.as_secs().to_string());
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    fn last_accessed_time(&self) -> DateTime<Utc> {
        self.last_accessed_time
    }

    fn set_last_accessed_time(&mut self, now: DateTime<Utc>) {
        self.last_accessed_time = now;
        self.stage(LAST_ACCESSED_TIME, now.timestamp_millis().to_string());
    }
}

/// Adapter for the key-value store.
pub struct KeyValueAdapter {
    client: Arc<dyn KeyValueClient>,
    namespace: String,
}

impl KeyValueAdapter {
    /// Create an adapter using [`DEFAULT_NAMESPACE`].
    pub fn new(client: Arc<dyn KeyValueClient>) -> Self {
        Self::with_namespace(client, DEFAULT_NAMESPACE)
    }

    /// Create an adapter with a custom key prefix.
    pub fn with_namespace(client: Arc<dyn KeyValueClient>, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    /// The hash key for a session id.
    pub fn session_key(&self, id: &str) -> String {
        format!("{}sessions:{}", self.namespace, id)
    }
}

#[async_trait]
impl SessionAdapter for KeyValueAdapter {
    fn kind(&self) -> StoreKind {
        StoreKind::KeyValue
    }

    fn create_session(&self, max_inactive_interval: Duration) -> SessionHandle {
        SessionHandle::KeyValue(KeyValueSession::new(max_inactive_interval))
    }

    async fn save(&self, session: &mut SessionHandle) -> Result<()> {
        let kind = session.kind();
        let SessionHandle::KeyValue(native) = session else {
            return Err(SessionError::foreign_handle(StoreKind::KeyValue, kind));
        };

        let key = self.session_key(&native.id);
        let mut writes = Vec::new();
        let mut removals = Vec::new();
        for (field, value) in &native.delta {
            match value {
                Some(value) => writes.push((field.clone(), value.clone())),
                None => removals.push(field.clone()),
            }
        }

        if !writes.is_empty() {
            self.client.hash_set(&key, writes).await?;
        }
        if !removals.is_empty() {
            self.client.hash_delete(&key, removals).await?;
        }
        self.client
            .expire(&key, native.max_inactive_interval)
            .await?;

        debug!(
            session_id = %native.id,
            new = native.is_new,
            fields = native.delta.len(),
            "Saved key-value session"
        );
        native.delta.clear();
        native.is_new = false;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionHandle>> {
        let key = self.session_key(id);
        let fields = self.client.hash_get_all(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let session = KeyValueSession::from_fields(id, fields)?;
        if session.is_expired_at(Utc::now()) {
            debug!(session_id = %id, "Key-value session expired, deleting");
            self.client.delete(&key).await?;
            return Ok(None);
        }
        Ok(Some(SessionHandle::KeyValue(session)))
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let existed = self.client.delete(&self.session_key(id)).await?;
        debug!(session_id = %id, existed, "Deleted key-value session");
        Ok(())
    }

    fn to_value_object(&self, session: &SessionHandle) -> Result<SessionRecord> {
        let SessionHandle::KeyValue(native) = session else {
            return Err(SessionError::foreign_handle(
                StoreKind::KeyValue,
                session.kind(),
            ));
        };
        Ok(SessionRecord::new(native.id.clone(), native.max_inactive_interval)
            .with_attributes(native.attributes.clone())
            .with_created_at_millis(native.creation_time.timestamp_millis()))
    }

    fn from_value_object(
        &self,
        record: &SessionRecord,
        existing: Option<SessionHandle>,
    ) -> Result<SessionHandle> {
        let mut native = match existing {
            Some(SessionHandle::KeyValue(native)) => native,
            Some(other) => {
                return Err(SessionError::foreign_handle(
                    StoreKind::KeyValue,
                    other.kind(),
                ));
            }
            None => {
                let mut native =
                    KeyValueSession::with_id(record.id.clone(), record.max_inactive_interval);
                if let Some(created) = record
                    .created_at_millis
                    .and_then(DateTime::from_timestamp_millis)
                {
                    native.set_creation_time(created);
                }
                native
            }
        };

        native.set_max_inactive_interval(record.max_inactive_interval);
        for (name, value) in &record.attributes {
            native.set_attribute(name.clone(), value.clone());
        }
        Ok(SessionHandle::KeyValue(native))
    }
}
