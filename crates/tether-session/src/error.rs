//! Error types for session repository operations.

use crate::selector::StoreKind;

/// Error type for session repository operations.
///
/// A missing session is never an error: reads return `None` and deletes
/// of absent IDs succeed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Missing or contradictory primary/secondary configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A native session could not be translated to or from a [`SessionRecord`](crate::SessionRecord).
    #[error("Conversion error ({store}): {message}")]
    Conversion { store: StoreKind, message: String },

    /// The backing store client failed or did not respond in time.
    #[error("Store unavailable ({store}): {message}")]
    StoreUnavailable { store: StoreKind, message: String },

    /// A minutes value could not be parsed into a duration.
    #[error("Invalid minutes value: {0:?}")]
    InvalidMinutes(String),
}

impl SessionError {
    /// Build a conversion error for the given store.
    pub fn conversion(store: StoreKind, message: impl Into<String>) -> Self {
        Self::Conversion {
            store,
            message: message.into(),
        }
    }

    /// Build a store-unavailable error for the given store.
    pub fn unavailable(store: StoreKind, message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            store,
            message: message.into(),
        }
    }

    /// A handle tagged with one store was passed to another store's adapter.
    pub(crate) fn foreign_handle(expected: StoreKind, actual: StoreKind) -> Self {
        Self::conversion(
            expected,
            format!("session handle belongs to the {actual} store"),
        )
    }

    /// Whether this error reports a failed or unresponsive store client.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// Result type for session repository operations.
pub type Result<T> = std::result::Result<T, SessionError>;
