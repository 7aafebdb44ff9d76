//! Configuration for the replication engine.

use std::time::Duration;

use crate::selector::StoreSelector;

/// Default bound on a single adapter call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the replication engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    /// Which store is authoritative and which, if any, receives copies.
    pub selector: StoreSelector,

    /// Upper bound on each adapter call. A call that exceeds it fails with
    /// a store-unavailable error.
    pub store_timeout: Duration,
}

impl ReplicationConfig {
    /// Create a configuration with the default store timeout.
    pub fn new(selector: StoreSelector) -> Self {
        Self {
            selector,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Set the per-call store timeout.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::StoreKind;

    #[test]
    fn test_defaults() {
        let config = ReplicationConfig::new(StoreSelector::primary_only(StoreKind::Relational));
        assert_eq!(config.store_timeout, DEFAULT_STORE_TIMEOUT);
        assert_eq!(config.selector.primary(), StoreKind::Relational);
        assert!(!config.selector.secondary_enabled());
    }

    #[test]
    fn test_builder() {
        let config = ReplicationConfig::new(StoreSelector::with_secondary(
            StoreKind::KeyValue,
            StoreKind::Document,
        ))
        .with_store_timeout(Duration::from_millis(250));

        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.selector.replica(), Some(StoreKind::Document));
    }
}
