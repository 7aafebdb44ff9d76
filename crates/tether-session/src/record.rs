//! Store-agnostic session value object.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Neutral representation of one session's data.
///
/// Every adapter converts its native session to and from this shape; native
/// records are never passed between adapters directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque session identifier, immutable once assigned.
    pub id: String,

    /// Session attributes. May be empty, never absent.
    pub attributes: HashMap<String, Value>,

    /// Permitted idle lifetime. Zero means the session never idles out.
    pub max_inactive_interval: Duration,

    /// Creation time in epoch milliseconds, when the source store tracks it.
    pub created_at_millis: Option<i64>,
}

impl SessionRecord {
    /// Create a record with no attributes.
    pub fn new(id: impl Into<String>, max_inactive_interval: Duration) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
            max_inactive_interval,
            created_at_millis: None,
        }
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Replace all attributes.
    pub fn with_attributes(mut self, attributes: HashMap<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the creation timestamp.
    pub fn with_created_at_millis(mut self, millis: i64) -> Self {
        self.created_at_millis = Some(millis);
        self
    }
}
