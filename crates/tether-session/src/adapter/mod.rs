//! Backing store adapters.
//!
//! An adapter owns one store's native session model and translates it to
//! and from [`SessionRecord`]. The replication engine only ever talks to
//! stores through this trait.
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_session::{KeyValueAdapter, InMemoryKeyValueClient, SessionAdapter};
//!
//! let adapter = KeyValueAdapter::new(Arc::new(InMemoryKeyValueClient::new()));
//! let mut session = adapter.create_session(Duration::from_secs(1800));
//! session.set_attribute("user", "alice");
//! adapter.save(&mut session).await?;
//! ```

pub mod document;
pub mod key_value;
pub mod relational;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::handle::SessionHandle;
use crate::record::SessionRecord;
use crate::selector::StoreKind;

pub use document::{DocumentAdapter, DocumentSession};
pub use key_value::{KeyValueAdapter, KeyValueSession};
pub use relational::{RelationalAdapter, RelationalSession};

/// Store-specific session access and conversion.
///
/// Implementations must be safe for concurrent use; one instance per store
/// kind is shared by every request.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// The store kind this adapter serves.
    fn kind(&self) -> StoreKind;

    /// Create a new, unsaved session with no attributes.
    fn create_session(&self, max_inactive_interval: Duration) -> SessionHandle;

    /// Persist the session. Repeated saves of the same id overwrite rather
    /// than duplicate.
    async fn save(&self, session: &mut SessionHandle) -> Result<()>;

    /// Load a session. Missing and expired sessions are `None`.
    async fn find_by_id(&self, id: &str) -> Result<Option<SessionHandle>>;

    /// Remove a session. Removing an absent id succeeds.
    async fn delete_by_id(&self, id: &str) -> Result<()>;

    /// Convert a native session of this store into a [`SessionRecord`].
    fn to_value_object(&self, session: &SessionHandle) -> Result<SessionRecord>;

    /// Apply a [`SessionRecord`] to this store's native model.
    ///
    /// With an `existing` session only the record's attributes and idle
    /// lifetime are applied; store bookkeeping is left untouched. Without
    /// one, a new session is synthesized carrying the record's id.
    fn from_value_object(
        &self,
        record: &SessionRecord,
        existing: Option<SessionHandle>,
    ) -> Result<SessionHandle>;
}
