//! Store kinds and the primary/secondary selection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// The supported backing store technologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    /// Key/attribute-value store (hash per session).
    KeyValue,
    /// Document store (one document per session).
    Document,
    /// Relational store (session row plus attribute rows).
    Relational,
}

impl StoreKind {
    /// All store kinds, in declaration order.
    pub const ALL: [StoreKind; 3] = [Self::KeyValue, Self::Document, Self::Relational];

    /// Canonical name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyValue => "KeyValue",
            Self::Document => "Document",
            Self::Relational => "Relational",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = SessionError;

    /// Parses the canonical names and the legacy `REDIS`/`MONGO`/`RDBMS`
    /// spellings, ignoring case. Blank input is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyvalue" | "key_value" | "key-value" | "redis" => Ok(Self::KeyValue),
            "document" | "mongo" | "mongodb" => Ok(Self::Document),
            "relational" | "rdbms" | "jdbc" | "sql" => Ok(Self::Relational),
            "" => Err(SessionError::Configuration(
                "store kind must not be blank".to_string(),
            )),
            _ => Err(SessionError::Configuration(format!(
                "unknown store kind '{}' (expected one of KeyValue, Document, Relational)",
                s.trim()
            ))),
        }
    }
}

/// Process-wide primary/secondary store selection.
///
/// Set once at startup and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSelector {
    primary: StoreKind,
    secondary: Option<StoreKind>,
}

impl StoreSelector {
    /// Select a primary store with secondary replication disabled.
    pub fn primary_only(primary: StoreKind) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    /// Select a primary store and enable replication to a secondary store.
    pub fn with_secondary(primary: StoreKind, secondary: StoreKind) -> Self {
        Self {
            primary,
            secondary: Some(secondary),
        }
    }

    /// The authoritative store for reads and the first leg of every write.
    pub fn primary(&self) -> StoreKind {
        self.primary
    }

    /// The configured secondary store, if replication is enabled.
    pub fn secondary(&self) -> Option<StoreKind> {
        self.secondary
    }

    /// Whether a secondary store is configured.
    pub fn secondary_enabled(&self) -> bool {
        self.secondary.is_some()
    }

    /// The secondary store, unless it is the primary store itself.
    ///
    /// A store never replicates into itself.
    pub fn replica(&self) -> Option<StoreKind> {
        self.secondary.filter(|kind| *kind != self.primary)
    }

    /// The store that should receive a replicated write of a session
    /// originating in `origin`.
    pub fn replication_target(&self, origin: StoreKind) -> Option<StoreKind> {
        self.replica().filter(|kind| *kind != origin)
    }
}

impl fmt::Display for StoreSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.secondary {
            Some(secondary) => write!(f, "primary={} secondary={}", self.primary, secondary),
            None => write!(f, "primary={} secondary=disabled", self.primary),
        }
    }
}
