// In-memory rate limiter for the expensive planner endpoints.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitType {
    /// Composite builds per hour.
    CompositeBuilds,
    /// Explicit elimination passes per hour.
    Eliminations,
}

impl RateLimitType {
    /// Maximum number of events allowed in the window.
    pub fn max_count(&self) -> usize {
        match self {
            RateLimitType::CompositeBuilds => 30,
            RateLimitType::Eliminations => 120,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(3600)
    }
}

impl std::fmt::Display for RateLimitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RateLimitType::CompositeBuilds => write!(f, "composite builds per hour"),
            RateLimitType::Eliminations => write!(f, "eliminations per hour"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Rate limit exceeded: max {max} {limit_type}")]
pub struct RateLimitError {
    pub limit_type: RateLimitType,
    pub max: usize,
}

/// Key for the rate limit map: (summoner_id, limit_type).
type LimitKey = (i64, RateLimitType);

/// Sliding window limiter shared between handlers.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    inner: Arc<Mutex<HashMap<LimitKey, Vec<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an event for the summoner, or fail if the window is full.
    /// Always passes in local mode.
    pub fn check_limit(
        &self,
        summoner_id: i64,
        limit_type: RateLimitType,
    ) -> Result<(), RateLimitError> {
        if crate::config::is_local_mode() {
            return Ok(());
        }
        self.record(summoner_id, limit_type, Instant::now())
    }

    fn record(
        &self,
        summoner_id: i64,
        limit_type: RateLimitType,
        now: Instant,
    ) -> Result<(), RateLimitError> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let window = limit_type.window();
        let max = limit_type.max_count();

        let entries = map.entry((summoner_id, limit_type)).or_default();
        entries.retain(|t| now.saturating_duration_since(*t) < window);

        if entries.len() >= max {
            tracing::debug!(summoner_id, %limit_type, "Rate limit hit");
            return Err(RateLimitError { limit_type, max });
        }

        entries.push(now);
        Ok(())
    }

    /// Events currently inside the window (for diagnostics and tests).
    pub fn current_count(&self, summoner_id: i64, limit_type: RateLimitType) -> usize {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let window = limit_type.window();
        let now = Instant::now();

        match map.get_mut(&(summoner_id, limit_type)) {
            Some(entries) => {
                entries.retain(|t| now.saturating_duration_since(*t) < window);
                entries.len()
            }
            None => 0,
        }
    }
}
