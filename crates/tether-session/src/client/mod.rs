//! Store client interfaces consumed by the adapters.
//!
//! Connection pooling, credentials and wire encodings belong to whoever
//! implements these traits. The in-memory clients here are complete
//! implementations suitable for tests and single-process deployments.

pub mod document;
pub mod key_value;

pub use document::{DocumentClient, InMemoryDocumentClient};
pub use key_value::{InMemoryKeyValueClient, KeyValueClient};
