//! The session repository facade.
//!
//! This is the only surface the transport layer talks to. It hides which
//! store is primary, whether a secondary exists, and how idle lifetimes are
//! chosen.
//!
//! # Example
//!
//! ```rust,ignore
//! let repository = SessionRepository::new(engine, policy_for(43_200, true));
//!
//! let ctx = RequestContext::new().with_param("requestType", "healthCheck");
//! let mut session = repository.create_session(&ctx).await?;
//! session.set_attribute("user", "alice");
//! repository.save(&mut session).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::context::RequestContext;
use crate::engine::ReplicationEngine;
use crate::error::Result;
use crate::handle::SessionHandle;
use crate::policy::MaxAgePolicy;

/// A session as seen by callers of the repository.
pub type Session = SessionHandle;

/// Creates, saves, finds and deletes sessions.
#[derive(Debug)]
pub struct SessionRepository {
    engine: ReplicationEngine,
    policy: Arc<dyn MaxAgePolicy>,
}

impl SessionRepository {
    /// Create a repository over a replication engine and idle-timeout policy.
    pub fn new(engine: ReplicationEngine, policy: Arc<dyn MaxAgePolicy>) -> Self {
        Self { engine, policy }
    }

    /// Create a new, unsaved session in the primary store.
    ///
    /// The idle lifetime comes from the policy, so synthetic traffic gets a
    /// short-lived session.
    pub async fn create_session(&self, ctx: &RequestContext) -> Result<Session> {
        let max_inactive_interval = self.policy.applicable_max_inactive_interval(ctx);
        self.engine.create(max_inactive_interval).await
    }

    /// Persist a session, replicating it when a secondary store is enabled.
    pub async fn save(&self, session: &mut Session) -> Result<()> {
        self.engine.save(session).await
    }

    /// Load a session from the primary store.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Session>> {
        self.engine.find_by_id(id).await
    }

    /// Delete a session from every configured store.
    pub async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.engine.delete_by_id(id).await
    }

    /// Idle lifetime to apply to a cookie or session for this request.
    pub fn applicable_max_inactive_interval(&self, ctx: &RequestContext) -> Duration {
        self.policy.applicable_max_inactive_interval(ctx)
    }

    /// Cart preservation time for this request.
    pub fn cart_preservation_time(
        &self,
        ctx: &RequestContext,
        minutes: Option<&str>,
    ) -> Result<Option<Duration>> {
        self.policy.cart_preservation_time(ctx, minutes)
    }

    /// The underlying replication engine.
    pub fn engine(&self) -> &ReplicationEngine {
        &self.engine
    }

    /// The active idle-timeout policy.
    pub fn policy(&self) -> &Arc<dyn MaxAgePolicy> {
        &self.policy
    }
}
