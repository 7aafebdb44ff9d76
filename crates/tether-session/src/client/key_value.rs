//! Key/attribute-value store client.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::Result;

/// Hash-oriented key-value client.
///
/// Each key maps to a hash of string fields. Implementations report
/// connection failures and timeouts as
/// [`SessionError::StoreUnavailable`](crate::SessionError::StoreUnavailable).
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    /// All fields of the hash at `key`. Empty when the key does not exist.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Set fields on the hash at `key`, creating it if needed.
    async fn hash_set(&self, key: &str, fields: Vec<(String, String)>) -> Result<()>;

    /// Remove fields from the hash at `key`.
    async fn hash_delete(&self, key: &str, fields: Vec<String>) -> Result<()>;

    /// Expire `key` after `ttl`. A zero `ttl` clears any expiry.
    ///
    /// A `ttl` too large to represent leaves the key without expiry.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Delete `key`. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;
}

#[derive(Debug, Default)]
struct HashEntry {
    fields: HashMap<String, String>,
    expires_at: Option<Instant>,
}

impl HashEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// In-process [`KeyValueClient`] with lazy key expiry.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueClient {
    entries: Mutex<HashMap<String, HashEntry>>,
}

impl InMemoryKeyValueClient {
    /// Create an empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Whether there are no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` exists and has not expired.
    pub fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .lock()
            .get(key)
            .is_some_and(|e| e.is_live(now))
    }
}

#[async_trait]
impl KeyValueClient for InMemoryKeyValueClient {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live(Instant::now()) => Ok(entry.fields.clone()),
            Some(_) => {
                entries.remove(key);
                Ok(HashMap::new())
            }
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_set(&self, key: &str, fields: Vec<(String, String)>) -> Result<()> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let entry = entries.entry(key.to_string()).or_default();
        if !entry.is_live(now) {
            *entry = HashEntry::default();
        }
        entry.fields.extend(fields);
        Ok(())
    }

    async fn hash_delete(&self, key: &str, fields: Vec<String>) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            for field in &fields {
                entry.fields.remove(field);
            }
            if entry.fields.is_empty() {
                entries.remove(key);
            }
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        if let Some(entry) = self.entries.lock().get_mut(key) {
            // Lifetimes past the clock's range never expire.
            entry.expires_at = if ttl.is_zero() {
                None
            } else {
                Instant::now().checked_add(ttl)
            };
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .remove(key)
            .is_some_and(|e| e.is_live(now)))
    }
}
