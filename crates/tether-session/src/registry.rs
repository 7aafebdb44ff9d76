//! Lazily constructed, shared adapter instances.
//!
//! The registry holds at most one adapter per [`StoreKind`]. Adapters are
//! built from factories on first use; concurrent first calls for the same
//! kind wait on a single construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::adapter::SessionAdapter;
use crate::error::{Result, SessionError};
use crate::selector::StoreKind;

/// Builds an adapter for one store kind.
pub type AdapterFactory = Box<dyn Fn() -> Result<Arc<dyn SessionAdapter>> + Send + Sync>;

struct Slot {
    factory: Option<AdapterFactory>,
    adapter: OnceCell<Arc<dyn SessionAdapter>>,
}

/// One shared adapter per store kind.
#[derive(Default)]
pub struct AdapterRegistry {
    slots: HashMap<StoreKind, Slot>,
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.slots.keys().map(StoreKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("AdapterRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl AdapterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`. It runs at most once, on first use.
    pub fn with_factory<F>(mut self, kind: StoreKind, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SessionAdapter>> + Send + Sync + 'static,
    {
        self.slots.insert(
            kind,
            Slot {
                factory: Some(Box::new(factory)),
                adapter: OnceCell::new(),
            },
        );
        self
    }

    /// Register an already constructed adapter under its own kind.
    pub fn with_adapter(mut self, adapter: Arc<dyn SessionAdapter>) -> Self {
        self.slots.insert(
            adapter.kind(),
            Slot {
                factory: None,
                adapter: OnceCell::new_with(Some(adapter)),
            },
        );
        self
    }

    /// Whether an adapter or factory is registered for `kind`.
    pub fn supports(&self, kind: StoreKind) -> bool {
        self.slots.contains_key(&kind)
    }

    /// Whether the adapter for `kind` has been constructed.
    pub fn is_initialized(&self, kind: StoreKind) -> bool {
        self.slots
            .get(&kind)
            .is_some_and(|slot| slot.adapter.initialized())
    }

    /// Get the adapter for `kind`, constructing it on first use.
    ///
    /// A failed construction is not cached; the next call retries.
    pub async fn get(&self, kind: StoreKind) -> Result<Arc<dyn SessionAdapter>> {
        let slot = self.slots.get(&kind).ok_or_else(|| {
            SessionError::Configuration(format!("no adapter registered for the {kind} store"))
        })?;

        let adapter = slot
            .adapter
            .get_or_try_init(|| async {
                let factory = slot.factory.as_ref().ok_or_else(|| {
                    SessionError::Configuration(format!("no factory for the {kind} store"))
                })?;
                let adapter = factory()?;
                if adapter.kind() != kind {
                    return Err(SessionError::Configuration(format!(
                        "factory for the {kind} store built a {} adapter",
                        adapter.kind()
                    )));
                }
                info!(store = %kind, "Session adapter initialized");
                Ok::<_, SessionError>(adapter)
            })
            .await?;

        Ok(Arc::clone(adapter))
    }
}
