use parking_lot::Mutex;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

const GLOBAL_KEY: &str = "*";

/// Whether spacing is tracked per backend or across all backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    PerBackend,
    Global,
}

impl FromStr for RateLimitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backend" | "per_backend" | "per-backend" => Ok(RateLimitScope::PerBackend),
            "global" => Ok(RateLimitScope::Global),
            other => Err(format!("unknown rate limit scope: {}", other)),
        }
    }
}

/// Spacing steps applied as the request counter grows
#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    pub floor: Duration,
    /// (counter threshold, spacing), ascending by threshold
    pub steps: Vec<(u32, Duration)>,
    /// Counter resets when no request was issued for this long
    pub idle_reset: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            floor: Duration::from_secs(2),
            steps: vec![(5, Duration::from_secs(3)), (10, Duration::from_secs(5))],
            idle_reset: Duration::from_secs(60),
        }
    }
}

impl RateLimitPolicy {
    pub fn spacing_for(&self, count: u32) -> Duration {
        self.steps
            .iter()
            .rev()
            .find(|(threshold, _)| count >= *threshold)
            .map(|(_, spacing)| *spacing)
            .unwrap_or(self.floor)
    }
}

#[derive(Debug, Default)]
struct Window {
    last_request: Option<Instant>,
    count: u32,
}

#[derive(Debug, Default)]
struct LimiterState {
    windows: HashMap<String, Window>,
    last_backend: Option<String>,
}

/// Spaces outbound synthesis calls.
///
/// `acquire` reserves the next slot under the lock and sleeps outside it,
/// so concurrent callers queue up one spacing apart.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    scope: RateLimitScope,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(policy: RateLimitPolicy, scope: RateLimitScope) -> Self {
        Self {
            policy,
            scope,
            state: Mutex::new(LimiterState::default()),
        }
    }

    /// Wait until a request to `backend_id` may be issued
    pub async fn acquire(&self, backend_id: &str) {
        let (slot, count) = self.reserve(backend_id, Instant::now());
        let now = Instant::now();

        if slot > now {
            tracing::debug!(
                backend_id = %backend_id,
                wait_ms = (slot - now).as_millis() as u64,
                request_count = count,
                "Rate limiter delaying request"
            );
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Spacing the next acquisition for `backend_id` would honor
    pub fn current_floor(&self, backend_id: &str) -> Duration {
        let state = self.state.lock();
        let count = state
            .windows
            .get(self.window_key(backend_id))
            .filter(|w| !self.is_idle(w, Instant::now()))
            .map(|w| w.count)
            .unwrap_or(0);
        self.policy.spacing_for(count)
    }

    fn reserve(&self, backend_id: &str, now: Instant) -> (Instant, u32) {
        let mut state = self.state.lock();

        let switched = state
            .last_backend
            .as_deref()
            .is_some_and(|last| last != backend_id);
        if switched {
            match self.scope {
                RateLimitScope::PerBackend => {
                    for (id, window) in state.windows.iter_mut() {
                        if id != backend_id {
                            window.count = 0;
                        }
                    }
                }
                RateLimitScope::Global => {
                    if let Some(window) = state.windows.get_mut(GLOBAL_KEY) {
                        window.count = 0;
                    }
                }
            }
        }
        state.last_backend = Some(backend_id.to_string());

        let key = self.window_key(backend_id).to_string();
        let idle = state
            .windows
            .get(&key)
            .is_some_and(|w| self.is_idle(w, now));
        let window = state.windows.entry(key).or_default();
        if idle {
            window.count = 0;
        }

        let spacing = self.policy.spacing_for(window.count);
        let slot = match window.last_request {
            Some(last) => (last + spacing).max(now),
            None => now,
        };

        window.last_request = Some(slot);
        window.count = window.count.saturating_add(1);
        (slot, window.count)
    }

    fn window_key<'a>(&self, backend_id: &'a str) -> &'a str {
        match self.scope {
            RateLimitScope::PerBackend => backend_id,
            RateLimitScope::Global => GLOBAL_KEY,
        }
    }

    fn is_idle(&self, window: &Window, now: Instant) -> bool {
        window
            .last_request
            .is_some_and(|last| now.saturating_duration_since(last) >= self.policy.idle_reset)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default(), RateLimitScope::PerBackend)
    }
}
