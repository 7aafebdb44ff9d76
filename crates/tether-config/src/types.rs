//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [session]                # store selection and timeouts
//! [session.max_age]        # idle-timeout policy
//! [stores.key_value]       # key-value store settings
//! [stores.document]        # document store settings
//! [stores.relational]      # relational store settings
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tether_session::{
    DEFAULT_MAX_AGE_MINUTES, DEFAULT_STORE_TIMEOUT, MaxAgePolicy, ReplicationConfig, StoreKind,
    StoreSelector, policy_for,
};

use crate::{ConfigError, Result};

/// Default key prefix for the key-value store.
pub const DEFAULT_KEY_VALUE_NAMESPACE: &str = tether_session::adapter::key_value::DEFAULT_NAMESPACE;

/// Default collection for the document store.
pub const DEFAULT_DOCUMENT_COLLECTION: &str = tether_session::adapter::document::DEFAULT_COLLECTION;

/// Default database file for the relational store.
pub const DEFAULT_RELATIONAL_PATH: &str = "sessions.db";

/// Relational path that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Largest accepted `session.max_age.minutes` (about ten years).
pub const MAX_MAX_AGE_MINUTES: u64 = 10 * 365 * 24 * 60;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Every field is optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged. Defaults are applied by the
/// accessor methods, not at parse time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    /// Store selection, timeouts and idle-timeout policy.
    pub session: Option<SessionConfig>,

    /// Per-store settings.
    pub stores: Option<StoresConfig>,
}

impl TetherConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TetherConfig) {
        if let Some(session) = other.session {
            match self.session.as_mut() {
                Some(existing) => existing.merge(session),
                None => self.session = Some(session),
            }
        }

        if let Some(stores) = other.stores {
            match self.stores.as_mut() {
                Some(existing) => existing.merge(stores),
                None => self.stores = Some(stores),
            }
        }
    }

    fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    fn stores(&self) -> StoresConfig {
        self.stores.clone().unwrap_or_default()
    }

    /// Check that the store selection, timeouts and max age are usable.
    pub fn validate(&self) -> Result<()> {
        self.store_selector()?;
        self.store_timeout()?;
        self.max_age_minutes()?;
        Ok(())
    }

    /// Resolve the primary/secondary store selection.
    ///
    /// Fails when the primary is missing or unknown, when an enabled
    /// secondary has no usable kind, or when it names the primary store.
    pub fn store_selector(&self) -> Result<StoreSelector> {
        let session = self.session();

        let primary = parse_kind(
            "session.primary_storage",
            session.primary_storage.as_deref(),
        )?;

        if !session.secondary_enabled() {
            return Ok(StoreSelector::primary_only(primary));
        }

        let secondary = parse_kind(
            "session.secondary_storage",
            session.secondary_storage.as_deref(),
        )?;
        if secondary == primary {
            return Err(ConfigError::Contradiction(format!(
                "secondary storage is enabled but names the primary store ({primary})"
            )));
        }

        Ok(StoreSelector::with_secondary(primary, secondary))
    }

    /// Resolved per-call store timeout.
    pub fn store_timeout(&self) -> Result<Duration> {
        let millis = self
            .session()
            .store_timeout_ms
            .unwrap_or(DEFAULT_STORE_TIMEOUT.as_millis() as u64);
        if millis == 0 {
            return Err(ConfigError::InvalidValue {
                field: "session.store_timeout_ms".to_string(),
                value: millis.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(Duration::from_millis(millis))
    }

    /// Resolved replication engine configuration.
    pub fn replication_config(&self) -> Result<ReplicationConfig> {
        Ok(ReplicationConfig::new(self.store_selector()?).with_store_timeout(self.store_timeout()?))
    }

    /// Configured idle lifetime in minutes.
    pub fn max_age_minutes(&self) -> Result<u64> {
        let minutes = self
            .session()
            .max_age
            .and_then(|m| m.minutes)
            .unwrap_or(DEFAULT_MAX_AGE_MINUTES);
        if minutes > MAX_MAX_AGE_MINUTES {
            return Err(ConfigError::InvalidValue {
                field: "session.max_age.minutes".to_string(),
                value: minutes.to_string(),
                reason: format!("must be at most {MAX_MAX_AGE_MINUTES}"),
            });
        }
        Ok(minutes)
    }

    /// Whether the request-type-aware policy is enabled.
    pub fn policy_enabled(&self) -> bool {
        self.session()
            .max_age
            .and_then(|m| m.policy_enabled)
            .unwrap_or(true)
    }

    /// The idle-timeout policy selected by `[session.max_age]`.
    pub fn max_age_policy(&self) -> Result<Arc<dyn MaxAgePolicy>> {
        Ok(policy_for(self.max_age_minutes()?, self.policy_enabled()))
    }

    /// Key prefix for the key-value store.
    pub fn key_value_namespace(&self) -> String {
        self.stores()
            .key_value
            .and_then(|s| s.namespace)
            .unwrap_or_else(|| DEFAULT_KEY_VALUE_NAMESPACE.to_string())
    }

    /// Collection name for the document store.
    pub fn document_collection(&self) -> String {
        self.stores()
            .document
            .and_then(|s| s.collection)
            .unwrap_or_else(|| DEFAULT_DOCUMENT_COLLECTION.to_string())
    }

    /// Database path for the relational store. `None` means in-memory.
    pub fn relational_path(&self) -> Option<PathBuf> {
        let path = self
            .stores()
            .relational
            .and_then(|s| s.path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RELATIONAL_PATH));
        if path.as_os_str() == IN_MEMORY_PATH {
            None
        } else {
            Some(path)
        }
    }

    /// Notes about settings that are present but have no effect.
    pub fn unused_settings(&self) -> Vec<String> {
        let session = self.session();
        let mut notes = Vec::new();
        if !session.secondary_enabled() && session.secondary_storage.is_some() {
            notes.push(
                "session.secondary_storage is set but secondary_storage_enabled is false; \
                 no replication will happen"
                    .to_string(),
            );
        }
        notes
    }
}

fn parse_kind(field: &str, value: Option<&str>) -> Result<StoreKind> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            field: field.to_string(),
            context: "[session]".to_string(),
        })?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: "expected one of KeyValue, Document, Relational".to_string(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Primary store kind. Required.
    pub primary_storage: Option<String>,

    /// Whether writes are mirrored into a secondary store. Defaults to false.
    pub secondary_storage_enabled: Option<bool>,

    /// Secondary store kind. Required when the secondary is enabled.
    pub secondary_storage: Option<String>,

    /// Bound on each store call, in milliseconds. Defaults to 5000.
    pub store_timeout_ms: Option<u64>,

    /// Idle-timeout policy.
    pub max_age: Option<MaxAgeConfig>,
}

impl SessionConfig {
    fn secondary_enabled(&self) -> bool {
        self.secondary_storage_enabled.unwrap_or(false)
    }

    fn merge(&mut self, other: SessionConfig) {
        if other.primary_storage.is_some() {
            self.primary_storage = other.primary_storage;
        }
        if other.secondary_storage_enabled.is_some() {
            self.secondary_storage_enabled = other.secondary_storage_enabled;
        }
        if other.secondary_storage.is_some() {
            self.secondary_storage = other.secondary_storage;
        }
        if other.store_timeout_ms.is_some() {
            self.store_timeout_ms = other.store_timeout_ms;
        }
        if let Some(max_age) = other.max_age {
            let existing = self.max_age.get_or_insert_with(MaxAgeConfig::default);
            if max_age.minutes.is_some() {
                existing.minutes = max_age.minutes;
            }
            if max_age.policy_enabled.is_some() {
                existing.policy_enabled = max_age.policy_enabled;
            }
        }
    }
}

/// `[session.max_age]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxAgeConfig {
    /// Idle lifetime for real user traffic, in minutes. Defaults to 43200.
    pub minutes: Option<u64>,

    /// Use the request-type-aware policy. Defaults to true.
    pub policy_enabled: Option<bool>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Stores
// ─────────────────────────────────────────────────────────────────────────────

/// `[stores]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoresConfig {
    pub key_value: Option<KeyValueStoreConfig>,
    pub document: Option<DocumentStoreConfig>,
    pub relational: Option<RelationalStoreConfig>,
}

impl StoresConfig {
    fn merge(&mut self, other: StoresConfig) {
        if other.key_value.is_some() {
            self.key_value = other.key_value;
        }
        if other.document.is_some() {
            self.document = other.document;
        }
        if other.relational.is_some() {
            self.relational = other.relational;
        }
    }
}

/// `[stores.key_value]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValueStoreConfig {
    /// Prefix for every session key.
    pub namespace: Option<String>,
}

/// `[stores.document]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentStoreConfig {
    /// Collection holding session documents.
    pub collection: Option<String>,
}

/// `[stores.relational]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationalStoreConfig {
    /// SQLite database file, or `:memory:`.
    pub path: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> TetherConfig {
        TetherConfig::from_toml(toml).unwrap()
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
[session]
primary_storage = "KeyValue"
secondary_storage_enabled = true
secondary_storage = "Relational"
store_timeout_ms = 750

[session.max_age]
minutes = 120
policy_enabled = false

[stores.key_value]
namespace = "shop:session:"

[stores.document]
collection = "web_sessions"

[stores.relational]
path = "/var/lib/tether/sessions.db"
"#,
        );

        let selector = config.store_selector().unwrap();
        assert_eq!(selector.primary(), StoreKind::KeyValue);
        assert_eq!(selector.secondary(), Some(StoreKind::Relational));
        assert_eq!(config.store_timeout().unwrap(), Duration::from_millis(750));
        assert_eq!(config.max_age_minutes().unwrap(), 120);
        assert!(!config.policy_enabled());
        assert_eq!(config.key_value_namespace(), "shop:session:");
        assert_eq!(config.document_collection(), "web_sessions");
        assert_eq!(
            config.relational_path(),
            Some(PathBuf::from("/var/lib/tether/sessions.db"))
        );
    }

    #[test]
    fn test_defaults() {
        let config = parse(
            r#"
[session]
primary_storage = "Document"
"#,
        );

        let selector = config.store_selector().unwrap();
        assert_eq!(selector.primary(), StoreKind::Document);
        assert!(!selector.secondary_enabled());
        assert_eq!(config.store_timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.max_age_minutes().unwrap(), 43_200);
        assert!(config.policy_enabled());
        assert_eq!(config.key_value_namespace(), "tether:session:");
        assert_eq!(config.document_collection(), "sessions");
        assert_eq!(config.relational_path(), Some(PathBuf::from("sessions.db")));
    }

    #[test]
    fn test_legacy_store_names() {
        let config = parse(
            r#"
[session]
primary_storage = "REDIS"
secondary_storage_enabled = true
secondary_storage = "mongo"
"#,
        );
        let selector = config.store_selector().unwrap();
        assert_eq!(selector.primary(), StoreKind::KeyValue);
        assert_eq!(selector.secondary(), Some(StoreKind::Document));
    }

    #[test]
    fn test_missing_primary_rejected() {
        let err = TetherConfig::new().validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "session.primary_storage"));

        let err = parse("[session]\nprimary_storage = \"  \"\n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { .. }));
    }

    #[test]
    fn test_unknown_primary_rejected() {
        let err = parse("[session]\nprimary_storage = \"Cassandra\"\n")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref value, .. } if value == "Cassandra"));
    }

    #[test]
    fn test_enabled_secondary_without_kind_rejected() {
        let err = parse(
            r#"
[session]
primary_storage = "KeyValue"
secondary_storage_enabled = true
"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { ref field, .. } if field == "session.secondary_storage"));
    }

    #[test]
    fn test_enabled_secondary_with_unknown_kind_rejected() {
        let err = parse(
            r#"
[session]
primary_storage = "KeyValue"
secondary_storage_enabled = true
secondary_storage = "memcached"
"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_secondary_equal_to_primary_rejected() {
        let err = parse(
            r#"
[session]
primary_storage = "Document"
secondary_storage_enabled = true
secondary_storage = "MONGO"
"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::Contradiction(_)));
    }

    #[test]
    fn test_disabled_secondary_is_ignored() {
        let config = parse(
            r#"
[session]
primary_storage = "Relational"
secondary_storage = "Relational"
"#,
        );
        let selector = config.store_selector().unwrap();
        assert_eq!(selector.secondary(), None);
        assert_eq!(config.unused_settings().len(), 1);
    }

    #[test]
    fn test_oversized_max_age_rejected() {
        let config = parse(
            r#"
[session]
primary_storage = "KeyValue"

[session.max_age]
minutes = 9223372036854775807
"#,
        );
        let err = config.validate().unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "session.max_age.minutes")
        );
        assert!(config.max_age_policy().is_err());
    }

    #[test]
    fn test_max_age_upper_bound_accepted() {
        let config = parse(&format!(
            "[session]\nprimary_storage = \"KeyValue\"\n\n[session.max_age]\nminutes = {MAX_MAX_AGE_MINUTES}\n"
        ));
        config.validate().unwrap();
        assert_eq!(config.max_age_minutes().unwrap(), MAX_MAX_AGE_MINUTES);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = parse(
            r#"
[session]
primary_storage = "KeyValue"
store_timeout_ms = 0
"#,
        )
        .validate()
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_in_memory_relational_path() {
        let config = parse(
            r#"
[stores.relational]
path = ":memory:"
"#,
        );
        assert_eq!(config.relational_path(), None);
    }

    #[test]
    fn test_replication_config() {
        let config = parse(
            r#"
[session]
primary_storage = "Relational"
secondary_storage_enabled = true
secondary_storage = "KeyValue"
store_timeout_ms = 1200
"#,
        );
        let replication = config.replication_config().unwrap();
        assert_eq!(replication.selector.replica(), Some(StoreKind::KeyValue));
        assert_eq!(replication.store_timeout, Duration::from_millis(1200));
    }

    #[test]
    fn test_merge_is_field_level() {
        let mut base = parse(
            r#"
[session]
primary_storage = "KeyValue"
store_timeout_ms = 100

[session.max_age]
minutes = 60

[stores.document]
collection = "base"
"#,
        );
        base.merge(parse(
            r#"
[session]
secondary_storage_enabled = true
secondary_storage = "Document"

[session.max_age]
policy_enabled = false
"#,
        ));

        let selector = base.store_selector().unwrap();
        assert_eq!(selector.primary(), StoreKind::KeyValue);
        assert_eq!(selector.secondary(), Some(StoreKind::Document));
        assert_eq!(base.store_timeout().unwrap(), Duration::from_millis(100));
        assert_eq!(base.max_age_minutes().unwrap(), 60);
        assert!(!base.policy_enabled());
        assert_eq!(base.document_collection(), "base");
    }

    #[test]
    fn test_toml_roundtrip_preserves_settings() {
        let config = parse(
            r#"
[session]
primary_storage = "Document"

[session.max_age]
minutes = 15
"#,
        );
        let reparsed = TetherConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_policy_selection() {
        let config = parse(
            r#"
[session.max_age]
minutes = 1
policy_enabled = true
"#,
        );
        let ctx = tether_session::RequestContext::new().with_param("requestType", "testScript");
        assert_eq!(
            config.max_age_policy().unwrap().applicable_max_inactive_interval(&ctx),
            Duration::from_secs(600)
        );
    }
}
