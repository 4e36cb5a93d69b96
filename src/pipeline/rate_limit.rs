//! Fixed-window rate limiting keyed by policy name and caller.
//!
//! Policies come from configuration and are looked up by name once per call.
//! Counting sits behind [`RateLimitStore`] so the in-memory map can be
//! replaced by a shared external store without touching the pipeline.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{PolicySpec, RateLimitConfig};
use crate::error::ApiError;

/// A named quota: at most `max_requests` per `window` per caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub name: String,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(name: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            max_requests,
            window,
        }
    }

    fn from_spec(name: &str, spec: &PolicySpec) -> Self {
        Self::new(name, spec.max_requests, spec.window())
    }
}

/// Outcome of counting one call against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { limit: u32, remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug, thiserror::Error)]
#[error("rate limit store error: {0}")]
pub struct StoreError(#[source] pub anyhow::Error);

/// Counter storage shared by every in-flight call.
///
/// `hit` must count and decide atomically per key: two concurrent calls may
/// never both observe the last free slot.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn hit(&self, policy: &RateLimitPolicy, key: &str) -> Result<RateDecision, StoreError>;

    /// Drops windows that have fully elapsed. Returns how many were removed.
    async fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    length: Duration,
    count: u32,
}

/// In-process store; the per-shard entry lock serializes updates to a key.
#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: DashMap<String, Window>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn hit_at(&self, policy: &RateLimitPolicy, key: &str, now: Instant) -> RateDecision {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            started: now,
            length: policy.window,
            count: 0,
        });
        let window = entry.value_mut();

        if now.duration_since(window.started) >= window.length {
            *window = Window {
                started: now,
                length: policy.window,
                count: 0,
            };
        }

        if window.count >= policy.max_requests {
            let retry_after = window.length.saturating_sub(now.duration_since(window.started));
            return RateDecision::Limited { retry_after };
        }

        window.count += 1;
        RateDecision::Allowed {
            limit: policy.max_requests,
            remaining: policy.max_requests - window.count,
        }
    }

    fn purge_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows
            .retain(|_, window| now.duration_since(window.started) < window.length);
        before.saturating_sub(self.windows.len())
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(&self, policy: &RateLimitPolicy, key: &str) -> Result<RateDecision, StoreError> {
        Ok(self.hit_at(policy, key, Instant::now()))
    }

    async fn purge_expired(&self) -> usize {
        self.purge_at(Instant::now())
    }
}

/// Who a call is counted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerKey {
    User(uuid::Uuid),
    Ip(String),
}

impl CallerKey {
    fn storage_key(&self, policy: &str) -> String {
        match self {
            CallerKey::User(id) => format!("{}:{}", policy, id),
            CallerKey::Ip(ip) => format!("{}:ip:{}", policy, ip),
        }
    }
}

/// Policy table plus the counter store, shared through application state.
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    policies: Arc<BTreeMap<String, RateLimitPolicy>>,
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        let policies = config
            .policies
            .iter()
            .map(|(name, spec)| (name.clone(), RateLimitPolicy::from_spec(name, spec)))
            .collect();

        Self {
            enabled: config.enabled,
            policies: Arc::new(policies),
            store,
        }
    }

    pub fn has_policy(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn policy(&self, name: &str) -> Option<&RateLimitPolicy> {
        self.policies.get(name)
    }

    pub fn store(&self) -> &Arc<dyn RateLimitStore> {
        &self.store
    }

    /// Counts the call and rejects it once the caller is over quota.
    ///
    /// Returns `None` when limiting is disabled or the store failed; a store
    /// failure admits the call rather than turning an outage into rejections.
    pub async fn check(&self, policy_name: &str, caller: &CallerKey) -> Result<Option<RateDecision>, ApiError> {
        if !self.enabled {
            return Ok(None);
        }

        let policy = self.policies.get(policy_name).ok_or_else(|| {
            // Route configs are checked at startup, so this is a wiring bug.
            ApiError::internal(format!("unknown rate limit policy '{}'", policy_name))
        })?;

        let key = caller.storage_key(&policy.name);
        match self.store.hit(policy, &key).await {
            Ok(RateDecision::Limited { retry_after }) => {
                tracing::warn!("Rate limit '{}' exceeded for {}", policy.name, key);
                Err(ApiError::RateLimited {
                    policy: policy.name.clone(),
                    retry_after,
                })
            }
            Ok(decision) => Ok(Some(decision)),
            Err(err) => {
                tracing::error!("Rate limit store failed, admitting call: {:?}", err);
                Ok(None)
            }
        }
    }

    /// Periodically purges elapsed windows until the runtime shuts down.
    pub fn spawn_purger(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = store.purge_expired().await;
                if removed > 0 {
                    tracing::debug!("Purged {} expired rate limit windows", removed);
                }
            }
        })
    }
}
