//! Native session handles tagged by their owning store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::adapter::document::DocumentSession;
use crate::adapter::key_value::KeyValueSession;
use crate::adapter::relational::RelationalSession;
use crate::selector::StoreKind;

/// Operations every native session representation supports.
pub trait NativeSession: Send + Sync {
    /// Session identifier.
    fn id(&self) -> &str;

    /// Read an attribute.
    fn attribute(&self, name: &str) -> Option<&Value>;

    /// Names of all attributes, in no particular order.
    fn attribute_names(&self) -> Vec<&str>;

    /// Set an attribute. `Value::Null` is stored as-is, not treated as removal.
    fn set_attribute(&mut self, name: String, value: Value);

    /// Remove an attribute, returning its previous value.
    fn remove_attribute(&mut self, name: &str) -> Option<Value>;

    /// Permitted idle lifetime.
    fn max_inactive_interval(&self) -> Duration;

    /// Change the permitted idle lifetime.
    fn set_max_inactive_interval(&mut self, interval: Duration);

    /// When the session was created.
    fn creation_time(&self) -> DateTime<Utc>;

    /// When the session was last accessed.
    fn last_accessed_time(&self) -> DateTime<Utc>;

    /// Record an access at `now`.
    fn set_last_accessed_time(&mut self, now: DateTime<Utc>);

    /// Whether the session has idled out at `now`. Sessions with a zero
    /// idle lifetime never expire.
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        idle_expired(self.last_accessed_time(), self.max_inactive_interval(), now)
    }
}

pub(crate) fn idle_expired(
    last_accessed: DateTime<Utc>,
    max_inactive_interval: Duration,
    now: DateTime<Utc>,
) -> bool {
    if max_inactive_interval.is_zero() {
        return false;
    }
    let idle = now.signed_duration_since(last_accessed);
    match chrono::Duration::from_std(max_inactive_interval) {
        Ok(limit) => idle >= limit,
        Err(_) => false,
    }
}

/// A native session together with the store that owns it.
///
/// The tag decides which adapter persists the session; adapters reject
/// handles carrying another store's tag.
#[derive(Debug, Clone)]
pub enum SessionHandle {
    /// Session owned by the key-value store.
    KeyValue(KeyValueSession),
    /// Session owned by the document store.
    Document(DocumentSession),
    /// Session owned by the relational store.
    Relational(RelationalSession),
}

impl SessionHandle {
    /// The store this session belongs to.
    pub fn kind(&self) -> StoreKind {
        match self {
            Self::KeyValue(_) => StoreKind::KeyValue,
            Self::Document(_) => StoreKind::Document,
            Self::Relational(_) => StoreKind::Relational,
        }
    }

    fn native(&self) -> &dyn NativeSession {
        match self {
            Self::KeyValue(s) => s,
            Self::Document(s) => s,
            Self::Relational(s) => s,
        }
    }

    fn native_mut(&mut self) -> &mut dyn NativeSession {
        match self {
            Self::KeyValue(s) => s,
            Self::Document(s) => s,
            Self::Relational(s) => s,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        self.native().id()
    }

    /// Read an attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.native().attribute(name)
    }

    /// Names of all attributes, sorted for stable output.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names = self.native().attribute_names();
        names.sort_unstable();
        names
    }

    /// Set an attribute.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.native_mut().set_attribute(name.into(), value.into());
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.native_mut().remove_attribute(name)
    }

    /// Permitted idle lifetime.
    pub fn max_inactive_interval(&self) -> Duration {
        self.native().max_inactive_interval()
    }

    /// Change the permitted idle lifetime.
    pub fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.native_mut().set_max_inactive_interval(interval);
    }

    /// When the session was created.
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.native().creation_time()
    }

    /// When the session was last accessed.
    pub fn last_accessed_time(&self) -> DateTime<Utc> {
        self.native().last_accessed_time()
    }

    /// Record an access now.
    pub fn touch(&mut self) {
        self.native_mut().set_last_accessed_time(Utc::now());
    }

    /// Whether the session has idled out.
    pub fn is_expired(&self) -> bool {
        self.native().is_expired_at(Utc::now())
    }
}
