//! Relational store adapter backed by SQLite.
//!
//! Sessions live in two tables: a `sessions` row keyed by a surrogate
//! `primary_id`, and one `session_attributes` row per attribute holding the
//! JSON-encoded value. Only changed attributes are written on save.
//!
//! SQLite calls are synchronous, so every adapter operation runs on the
//! blocking pool and callers can bound it with a timeout.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde_json::Value;
use tracing::{debug, info};

use crate::adapter::SessionAdapter;
use crate::error::{Result, SessionError};
use crate::handle::{NativeSession, SessionHandle};
use crate::record::SessionRecord;
use crate::selector::StoreKind;

/// Attribute whose string value is mirrored into the `principal_name` column.
pub const PRINCIPAL_NAME_ATTRIBUTE: &str = "principalName";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    primary_id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL UNIQUE,
    creation_time INTEGER NOT NULL,
    last_access_time INTEGER NOT NULL,
    max_inactive_interval INTEGER NOT NULL,
    expiry_time INTEGER NOT NULL,
    principal_name TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_expiry ON sessions(expiry_time);
CREATE INDEX IF NOT EXISTS idx_sessions_principal ON sessions(principal_name);

CREATE TABLE IF NOT EXISTS session_attributes (
    session_primary_id TEXT NOT NULL REFERENCES sessions(primary_id) ON DELETE CASCADE,
    attribute_name TEXT NOT NULL,
    attribute_bytes BLOB NOT NULL,
    PRIMARY KEY (session_primary_id, attribute_name)
);
"#;

fn db_err(e: rusqlite::Error) -> SessionError {
    SessionError::unavailable(StoreKind::Relational, e.to_string())
}

/// Native relational session.
#[derive(Debug, Clone)]
pub struct RelationalSession {
    primary_id: String,
    id: String,
    creation_time: DateTime<Utc>,
    last_access_time: DateTime<Utc>,
    max_inactive_interval: Duration,
    principal_name: Option<String>,
    attributes: HashMap<String, Value>,
    changed: HashSet<String>,
    removed: HashSet<String>,
    is_new: bool,
}

impl RelationalSession {
    /// Create a new session with a random id.
    pub fn new(max_inactive_interval: Duration) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), max_inactive_interval)
    }

    /// Create a new, unsaved session with the given id.
    pub fn with_id(id: impl Into<String>, max_inactive_interval: Duration) -> Self {
        let now = Utc::now();
        Self {
            primary_id: uuid::Uuid::new_v4().to_string(),
            id: id.into(),
            creation_time: now,
            last_access_time: now,
            max_inactive_interval,
            principal_name: None,
            attributes: HashMap::new(),
            changed: HashSet::new(),
            removed: HashSet::new(),
            is_new: true,
        }
    }

    /// Surrogate key of the `sessions` row.
    pub fn primary_id(&self) -> &str {
        &self.primary_id
    }

    /// Principal name indexed alongside the session.
    pub fn principal_name(&self) -> Option<&str> {
        self.principal_name.as_deref()
    }

    /// Whether the session has never been saved.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    fn expiry_millis(&self) -> i64 {
        if self.max_inactive_interval.is_zero() {
            return i64::MAX;
        }
        let interval = i64::try_from(self.max_inactive_interval.as_millis()).unwrap_or(i64::MAX);
        self.last_access_time
            .timestamp_millis()
            .saturating_add(interval)
    }
}

impl NativeSession for RelationalSession {
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
        if name == PRINCIPAL_NAME_ATTRIBUTE {
            self.principal_name = value.as_str().map(str::to_string);
        }
        self.removed.remove(&name);
        self.changed.insert(name.clone());
        self.attributes.insert(name, value);
    }

    fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        if name == PRINCIPAL_NAME_ATTRIBUTE {
            self.principal_name = None;
        }
        self.changed.remove(name);
        self.removed.insert(name.to_string());
        self.attributes.remove(name)
    }

    fn max_inactive_interval(&self) -> Duration {
        self.max_inactive_interval
    }

    fn set_max_inactive_interval(&mut self, interval: Duration) {
        self.max_inactive_interval = interval;
    }

    fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    fn last_accessed_time(&self) -> DateTime<Utc> {
        self.last_access_time
    }

    fn set_last_accessed_time(&mut self, now: DateTime<Utc>) {
        self.last_access_time = now;
    }
}

/// Adapter for the relational store.
pub struct RelationalAdapter {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for RelationalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalAdapter").finish_non_exhaustive()
    }
}

impl RelationalAdapter {
    /// Open or create a session database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    SessionError::unavailable(
                        StoreKind::Relational,
                        format!("cannot create {}: {e}", parent.display()),
                    )
                })?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .map_err(db_err)?;

        let adapter = Self::from_connection(conn)?;
        info!("Relational session store opened at {:?}", path);
        Ok(adapter)
    }

    /// Create an in-memory session database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Use an existing connection, creating the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `operation` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock();
            operation(&mut conn)
        })
        .await
        .map_err(|e| {
            SessionError::unavailable(StoreKind::Relational, format!("task join error: {e}"))
        })?
    }

    /// Number of stored sessions, expired or not.
    pub fn session_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .map_err(db_err)?;
        Ok(count as usize)
    }

    /// Number of stored attribute rows for a session id.
    pub fn attribute_count(&self, id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                r#"
                SELECT COUNT(*) FROM session_attributes a
                JOIN sessions s ON s.primary_id = a.session_primary_id
                WHERE s.session_id = ?1
                "#,
                params![id],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(count as usize)
    }
}

fn save_native(conn: &mut Connection, native: &mut RelationalSession) -> Result<()> {
    let tx = conn.transaction().map_err(db_err)?;

    tx.execute(
        r#"
        INSERT INTO sessions (primary_id, session_id, creation_time, last_access_time,
                              max_inactive_interval, expiry_time, principal_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(session_id) DO UPDATE SET
            last_access_time = excluded.last_access_time,
            max_inactive_interval = excluded.max_inactive_interval,
            expiry_time = excluded.expiry_time,
            principal_name = excluded.principal_name
        "#,
        params![
            native.primary_id,
            native.id,
            native.creation_time.timestamp_millis(),
            native.last_access_time.timestamp_millis(),
            i64::try_from(native.max_inactive_interval.as_secs()).unwrap_or(i64::MAX),
            native.expiry_millis(),
            native.principal_name,
        ],
    )
    .map_err(db_err)?;

    // A session synthesized for an id that already has a row adopts the
    // existing surrogate key.
    let primary_id: String = tx
        .query_row(
            "SELECT primary_id FROM sessions WHERE session_id = ?1",
            params![native.id],
            |row| row.get(0),
        )
        .map_err(db_err)?;

    for name in &native.changed {
        let Some(value) = native.attributes.get(name) else {
            continue;
        };
        let bytes = serde_json::to_vec(value).map_err(|e| {
            SessionError::conversion(
                StoreKind::Relational,
                format!("cannot encode attribute '{name}': {e}"),
            )
        })?;
        tx.execute(
            r#"
            INSERT INTO session_attributes (session_primary_id, attribute_name, attribute_bytes)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(session_primary_id, attribute_name)
            DO UPDATE SET attribute_bytes = excluded.attribute_bytes
            "#,
            params![primary_id, name, bytes],
        )
        .map_err(db_err)?;
    }

    for name in &native.removed {
        tx.execute(
            "DELETE FROM session_attributes WHERE session_primary_id = ?1 AND attribute_name = ?2",
            params![primary_id, name],
        )
        .map_err(db_err)?;
    }

    tx.commit().map_err(db_err)?;

    debug!(
        session_id = %native.id,
        new = native.is_new,
        changed = native.changed.len(),
        removed = native.removed.len(),
        "Saved relational session"
    );
    native.primary_id = primary_id;
    native.changed.clear();
    native.removed.clear();
    native.is_new = false;
    Ok(())
}

fn load_native(conn: &mut Connection, id: &str) -> Result<Option<RelationalSession>> {
    let row = conn
        .query_row(
            r#"
            SELECT primary_id, creation_time, last_access_time, max_inactive_interval,
                   expiry_time, principal_name
            FROM sessions WHERE session_id = ?1
            "#,
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    let Some((primary_id, created, accessed, interval, expiry, principal_name)) = row else {
        return Ok(None);
    };

    if expiry <= Utc::now().timestamp_millis() {
        debug!(session_id = %id, "Relational session expired, deleting");
        delete_native(conn, id)?;
        return Ok(None);
    }

    let timestamp = |column: &str, millis: i64| {
        DateTime::from_timestamp_millis(millis).ok_or_else(|| {
            SessionError::conversion(
                StoreKind::Relational,
                format!("invalid {column} value {millis}"),
            )
        })
    };

    let mut stmt = conn
        .prepare(
            "SELECT attribute_name, attribute_bytes FROM session_attributes WHERE session_primary_id = ?1",
        )
        .map_err(db_err)?;
    let mut rows = stmt.query(params![primary_id]).map_err(db_err)?;
    let mut attributes = HashMap::new();
    while let Some(row) = rows.next().map_err(db_err)? {
        let name: String = row.get(0).map_err(db_err)?;
        let bytes: Vec<u8> = row.get(1).map_err(db_err)?;
        let value = serde_json::from_slice(&bytes).map_err(|e| {
            SessionError::conversion(
                StoreKind::Relational,
                format!("attribute '{name}' is not valid JSON: {e}"),
            )
        })?;
        attributes.insert(name, value);
    }

    Ok(Some(RelationalSession {
        primary_id,
        id: id.to_string(),
        creation_time: timestamp("creation_time", created)?,
        last_access_time: timestamp("last_access_time", accessed)?,
        max_inactive_interval: Duration::from_secs(interval.max(0) as u64),
        principal_name,
        attributes,
        changed: HashSet::new(),
        removed: HashSet::new(),
        is_new: false,
    }))
}

fn delete_native(conn: &mut Connection, id: &str) -> Result<bool> {
    let tx = conn.transaction().map_err(db_err)?;
    tx.execute(
        r#"
        DELETE FROM session_attributes
        WHERE session_primary_id IN (SELECT primary_id FROM sessions WHERE session_id = ?1)
        "#,
        params![id],
    )
    .map_err(db_err)?;
    let rows = tx
        .execute("DELETE FROM sessions WHERE session_id = ?1", params![id])
        .map_err(db_err)?;
    tx.commit().map_err(db_err)?;
    Ok(rows > 0)
}

#[async_trait]
impl SessionAdapter for RelationalAdapter {
    fn kind(&self) -> StoreKind {
        StoreKind::Relational
    }

    fn create_session(&self, max_inactive_interval: Duration) -> SessionHandle {
        SessionHandle::Relational(RelationalSession::new(max_inactive_interval))
    }

    async fn save(&self, session: &mut SessionHandle) -> Result<()> {
        let kind = session.kind();
        let SessionHandle::Relational(native) = session else {
            return Err(SessionError::foreign_handle(StoreKind::Relational, kind));
        };
        // Work on a copy so an abandoned save leaves the caller's pending
        // changes intact.
        let mut pending = native.clone();
        *native = self
            .blocking(move |conn| {
                save_native(conn, &mut pending)?;
                Ok(pending)
            })
            .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SessionHandle>> {
        let id = id.to_string();
        let loaded = self.blocking(move |conn| load_native(conn, &id)).await?;
        Ok(loaded.map(SessionHandle::Relational))
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let owned = id.to_string();
        let existed = self
            .blocking(move |conn| delete_native(conn, &owned))
            .await?;
        debug!(session_id = %id, existed, "Deleted relational session");
        Ok(())
    }

    fn to_value_object(&self, session: &SessionHandle) -> Result<SessionRecord> {
        let SessionHandle::Relational(native) = session else {
            return Err(SessionError::foreign_handle(
                StoreKind::Relational,
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
            Some(SessionHandle::Relational(native)) => native,
            Some(other) => {
                return Err(SessionError::foreign_handle(
                    StoreKind::Relational,
                    other.kind(),
                ));
            }
            None => {
                let mut native =
                    RelationalSession::with_id(record.id.clone(), record.max_inactive_interval);
                if let Some(created) = record
                    .created_at_millis
                    .and_then(DateTime::from_timestamp_millis)
                {
                    native.creation_time = created;
                }
                native
            }
        };

        native.set_max_inactive_interval(record.max_inactive_interval);
        for (name, value) in &record.attributes {
            native.set_attribute(name.clone(), value.clone());
        }
        Ok(SessionHandle::Relational(native))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_find() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let mut session = adapter.create_session(Duration::from_secs(600));
        session.set_attribute("user", "alice");
        session.set_attribute("prefs", json!({"theme": "dark"}));
        adapter.save(&mut session).await.unwrap();

        let found = adapter.find_by_id(session.id()).await.unwrap().unwrap();
        assert_eq!(found.kind(), StoreKind::Relational);
        assert_eq!(found.attribute("user"), Some(&json!("alice")));
        assert_eq!(found.attribute("prefs"), Some(&json!({"theme": "dark"})));
        assert_eq!(found.max_inactive_interval(), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_removed_attribute_is_deleted() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let mut session = adapter.create_session(Duration::from_secs(600));
        session.set_attribute("a", 1);
        session.set_attribute("b", 2);
        adapter.save(&mut session).await.unwrap();

        session.remove_attribute("a");
        adapter.save(&mut session).await.unwrap();

        assert_eq!(adapter.attribute_count(session.id()).unwrap(), 1);
        let found = adapter.find_by_id(session.id()).await.unwrap().unwrap();
        assert_eq!(found.attribute("a"), None);
        assert_eq!(found.attribute("b"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_delete_absent_is_noop() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        adapter.delete_by_id("ghost").await.unwrap();
        assert!(adapter.find_by_id("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_attributes() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let mut session = adapter.create_session(Duration::from_secs(600));
        session.set_attribute("a", 1);
        adapter.save(&mut session).await.unwrap();

        adapter.delete_by_id(session.id()).await.unwrap();
        assert_eq!(adapter.session_count().unwrap(), 0);
        assert_eq!(adapter.attribute_count(session.id()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_row_is_removed() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let mut session = adapter.create_session(Duration::from_secs(1));
        if let SessionHandle::Relational(native) = &mut session {
            native.set_last_accessed_time(Utc::now() - chrono::Duration::seconds(10));
        }
        adapter.save(&mut session).await.unwrap();

        assert!(adapter.find_by_id(session.id()).await.unwrap().is_none());
        assert_eq!(adapter.session_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_huge_interval_does_not_wrap() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let mut session = adapter.create_session(Duration::from_secs(u64::MAX));
        adapter.save(&mut session).await.unwrap();

        let found = adapter.find_by_id(session.id()).await.unwrap().unwrap();
        assert_eq!(
            found.max_inactive_interval(),
            Duration::from_secs(i64::MAX as u64)
        );
        assert!(!found.is_expired());
    }

    #[tokio::test]
    async fn test_synthesized_session_upsert_is_idempotent() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let record = SessionRecord::new("s1", Duration::from_secs(300))
            .with_attribute("user", "bob")
            .with_attribute("count", 3);

        let mut first = adapter.from_value_object(&record, None).unwrap();
        adapter.save(&mut first).await.unwrap();
        adapter.save(&mut first).await.unwrap();

        // A second synthesized handle for the same id must not duplicate rows.
        let mut second = adapter.from_value_object(&record, None).unwrap();
        adapter.save(&mut second).await.unwrap();

        assert_eq!(adapter.session_count().unwrap(), 1);
        assert_eq!(adapter.attribute_count("s1").unwrap(), 2);
        let SessionHandle::Relational(second) = second else {
            panic!("expected relational session");
        };
        let SessionHandle::Relational(first) = first else {
            panic!("expected relational session");
        };
        assert_eq!(second.primary_id(), first.primary_id());
    }

    #[tokio::test]
    async fn test_merge_preserves_bookkeeping_fields() {
        let adapter = RelationalAdapter::open_in_memory().unwrap();
        let mut existing = adapter.create_session(Duration::from_secs(600));
        existing.set_attribute(PRINCIPAL_NAME_ATTRIBUTE, "erin");
        adapter.save(&mut existing).await.unwrap();

        let loaded = adapter.find_by_id(existing.id()).await.unwrap();
        let record = SessionRecord::new(existing.id(), Duration::from_secs(1200))
            .with_attribute("cart", json!([1, 2, 3]));
        let merged = adapter.from_value_object(&record, loaded).unwrap();

        let SessionHandle::Relational(native) = &merged else {
            panic!("expected relational session");
        };
        let SessionHandle::Relational(original) = &existing else {
            panic!("expected relational session");
        };
        assert_eq!(native.primary_id(), original.primary_id());
        assert_eq!(native.principal_name(), Some("erin"));
        assert_eq!(merged.attribute("cart"), Some(&json!([1, 2, 3])));
        assert_eq!(merged.max_inactive_interval(), Duration::from_secs(1200));
    }

    #[tokio::test]
    async fn test_open_file_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        let id = {
            let adapter = RelationalAdapter::open(&path).unwrap();
            let mut session = adapter.create_session(Duration::from_secs(600));
            session.set_attribute("k", "v");
            adapter.save(&mut session).await.unwrap();
            session.id().to_string()
        };

        let reopened = RelationalAdapter::open(&path).unwrap();
        let found = reopened.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.attribute("k"), Some(&json!("v")));
    }
}
