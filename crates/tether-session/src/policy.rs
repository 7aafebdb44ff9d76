//! Idle-timeout policies.
//!
//! A policy maps a request to the idle lifetime a session created (or a
//! cookie written) for that request is allowed. The request-type-aware
//! policy shortens the lifetime for synthetic traffic such as health checks
//! and load-test scripts so that monitoring does not pile up month-long
//! sessions.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::context::RequestContext;
use crate::error::{Result, SessionError};

/// Default configured idle lifetime in minutes (30 days).
pub const DEFAULT_MAX_AGE_MINUTES: u64 = 43_200;

/// Idle lifetime applied to synthetic traffic.
pub const SYNTHETIC_MAX_INACTIVE_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Parameter values that mark a request as synthetic. Matched case-sensitively.
pub const SYNTHETIC_TRAFFIC_MARKERS: [&str; 3] = ["healthCheck", "testScript", "internalEmployee"];

/// Request parameter carrying the request type.
pub const REQUEST_TYPE_PARAM: &str = "requestType";

/// Request parameter carrying the traffic type.
pub const TRAFFIC_TYPE_PARAM: &str = "trafficType";

const REFERER_HEADER: &str = "referer";

/// Computes session idle lifetimes per request.
pub trait MaxAgePolicy: fmt::Debug + Send + Sync {
    /// Idle lifetime for a session created or refreshed by this request.
    fn applicable_max_inactive_interval(&self, ctx: &RequestContext) -> Duration;

    /// Lifetime for a cart session given a caller-supplied minutes value.
    ///
    /// Returns `Ok(None)` when no value is supplied and no override applies.
    fn cart_preservation_time(
        &self,
        ctx: &RequestContext,
        minutes: Option<&str>,
    ) -> Result<Option<Duration>>;
}

/// Policy that always returns the configured lifetime.
#[derive(Debug, Clone)]
pub struct FixedMaxAgePolicy {
    max_inactive_interval: Duration,
}

impl FixedMaxAgePolicy {
    /// Create a fixed policy.
    pub fn new(max_inactive_interval: Duration) -> Self {
        Self {
            max_inactive_interval,
        }
    }
}

impl MaxAgePolicy for FixedMaxAgePolicy {
    fn applicable_max_inactive_interval(&self, _ctx: &RequestContext) -> Duration {
        debug!(
            seconds = self.max_inactive_interval.as_secs(),
            "Applicable max inactive interval"
        );
        self.max_inactive_interval
    }

    fn cart_preservation_time(
        &self,
        _ctx: &RequestContext,
        minutes: Option<&str>,
    ) -> Result<Option<Duration>> {
        let time = minutes.map(parse_minutes).transpose()?;
        debug!(seconds = ?time.map(|d| d.as_secs()), "Cart preservation time");
        Ok(time)
    }
}

/// Policy that caps the lifetime of synthetic traffic at
/// [`SYNTHETIC_MAX_INACTIVE_INTERVAL`].
#[derive(Debug, Clone)]
pub struct RequestTypeAwarePolicy {
    default_max_inactive_interval: Duration,
}

impl RequestTypeAwarePolicy {
    /// Create a policy that falls back to `default_max_inactive_interval`
    /// for real user traffic.
    pub fn new(default_max_inactive_interval: Duration) -> Self {
        Self {
            default_max_inactive_interval,
        }
    }
}

impl MaxAgePolicy for RequestTypeAwarePolicy {
    fn applicable_max_inactive_interval(&self, ctx: &RequestContext) -> Duration {
        let interval = if is_synthetic_traffic(ctx) {
            SYNTHETIC_MAX_INACTIVE_INTERVAL
        } else {
            self.default_max_inactive_interval
        };
        debug!(seconds = interval.as_secs(), "Applicable max inactive interval");
        interval
    }

    fn cart_preservation_time(
        &self,
        ctx: &RequestContext,
        minutes: Option<&str>,
    ) -> Result<Option<Duration>> {
        let time = if is_synthetic_traffic(ctx) {
            Some(SYNTHETIC_MAX_INACTIVE_INTERVAL)
        } else {
            minutes.map(parse_minutes).transpose()?
        };
        debug!(seconds = ?time.map(|d| d.as_secs()), "Cart preservation time");
        Ok(time)
    }
}

/// Select the policy for the given configuration values.
pub fn policy_for(max_age_minutes: u64, policy_enabled: bool) -> Arc<dyn MaxAgePolicy> {
    let interval = Duration::from_secs(max_age_minutes.saturating_mul(60));
    if policy_enabled {
        Arc::new(RequestTypeAwarePolicy::new(interval))
    } else {
        Arc::new(FixedMaxAgePolicy::new(interval))
    }
}

/// Whether the request looks like automated, test or internal traffic.
///
/// Checks the request's own `requestType`/`trafficType` parameters first,
/// then the same parameters in the query string of the `Referer` URL. A
/// missing or malformed referer means the request is real user traffic.
pub fn is_synthetic_traffic(ctx: &RequestContext) -> bool {
    let request_type = ctx.param(REQUEST_TYPE_PARAM);
    let traffic_type = ctx.param(TRAFFIC_TYPE_PARAM);
    if is_marker(request_type) || is_marker(traffic_type) {
        debug!(
            request_type = ?request_type,
            traffic_type = ?traffic_type,
            "Request parameters mark synthetic traffic"
        );
        return true;
    }

    let Some(referer) = ctx.header(REFERER_HEADER).filter(|r| !r.trim().is_empty()) else {
        debug!("No referer header, treating as real user traffic");
        return false;
    };

    let referer_url = match Url::parse(referer.trim()) {
        Ok(url) => url,
        Err(e) => {
            debug!(referer = %referer, error = %e, "Malformed referer, treating as real user traffic");
            return false;
        }
    };

    let mut referer_request_type = None;
    let mut referer_traffic_type = None;
    for (name, value) in referer_url.query_pairs() {
        if name == REQUEST_TYPE_PARAM && referer_request_type.is_none() {
            referer_request_type = Some(value.into_owned());
        } else if name == TRAFFIC_TYPE_PARAM && referer_traffic_type.is_none() {
            referer_traffic_type = Some(value.into_owned());
        }
    }

    if is_marker(referer_request_type.as_deref()) || is_marker(referer_traffic_type.as_deref()) {
        debug!(
            referer = %referer,
            request_type = ?referer_request_type,
            traffic_type = ?referer_traffic_type,
            "Referer marks synthetic traffic"
        );
        return true;
    }

    debug!(url = ?ctx.url(), "Request is not synthetic traffic");
    false
}

fn is_marker(value: Option<&str>) -> bool {
    value.is_some_and(|v| SYNTHETIC_TRAFFIC_MARKERS.contains(&v))
}

fn parse_minutes(minutes: &str) -> Result<Duration> {
    let parsed: u64 = minutes
        .trim()
        .parse()
        .map_err(|_| SessionError::InvalidMinutes(minutes.to_string()))?;
    Ok(Duration::from_secs(parsed.saturating_mul(60)))
}
