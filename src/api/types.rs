//! Shared types for the HTTP layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::app_state::AppState;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `AppState` plus API-specific caches.
#[derive(Clone)]
pub struct ApiContext {
    pub app: Arc<AppState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl ApiContext {
    pub fn new(app: Arc<AppState>) -> Self {
        Self {
            app,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
        }
    }

    /// Run synchronous work (database, hashing, rendering) on the
    /// blocking pool.
    pub async fn blocking<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&AppState) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let app = self.app.clone();
        tokio::task::spawn_blocking(move || work(&app))
            .await
            .map_err(|e| ApiError::Internal(format!("blocking task: {e}")))?
    }

    /// Like [`ApiContext::blocking`] with a freshly opened connection.
    pub async fn with_db<T, F>(&self, work: F) -> Result<T, ApiError>
    where
        F: FnOnce(&AppState, &Connection) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking(move |app| {
            let conn = app.open_db()?;
            work(app, &conn)
        })
        .await
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-key sliding window
// ═══════════════════════════════════════════════════════════

/// Per-key rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    last_sweep: Instant,
}

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            last_sweep: Instant::now(),
        }
    }

    /// Check if a key is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&mut self, key: &str, now: Instant) -> Result<(), u64> {
        if now.saturating_duration_since(self.last_sweep) >= MINUTE {
            self.sweep(now);
        }

        let entries = self.windows.entry(key.to_string()).or_default();
        entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);

        let last_minute = entries
            .iter()
            .filter(|ts| now.saturating_duration_since(**ts) < MINUTE)
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }

    /// Forget keys with no request in the last hour.
    fn sweep(&mut self, now: Instant) {
        self.windows.retain(|_, entries| {
            entries.retain(|ts| now.saturating_duration_since(*ts) < HOUR);
            !entries.is_empty()
        });
        self.last_sweep = now;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
