use once_cell::sync::Lazy;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Default bound on concurrently-executing actions within one remediation
/// batch. Overridable per-execution via `RemediationEngineOptions`.
pub static MAX_PARALLEL_ACTIONS: Lazy<usize> =
    Lazy::new(|| env_or("DRIFTCORE_MAX_PARALLEL_ACTIONS", 5usize));

/// Start of the business-hours window used by the `business_hours` safety
/// condition. 24h clock, local to whatever timezone the host passes in.
pub static BUSINESS_HOURS_START: Lazy<u32> =
    Lazy::new(|| env_or("DRIFTCORE_BUSINESS_HOURS_START", 9u32));

/// End of the business-hours window used by the `business_hours` safety
/// condition.
pub static BUSINESS_HOURS_END: Lazy<u32> =
    Lazy::new(|| env_or("DRIFTCORE_BUSINESS_HOURS_END", 17u32));

/// Initial delay, in milliseconds, for the action-level retry backoff
/// schedule.
pub static RETRY_INITIAL_DELAY_MS: Lazy<u64> =
    Lazy::new(|| env_or("DRIFTCORE_RETRY_INITIAL_DELAY_MS", 500u64));

/// Multiplicative backoff factor applied between retry attempts.
pub static RETRY_BACKOFF_FACTOR: Lazy<f64> =
    Lazy::new(|| env_or("DRIFTCORE_RETRY_BACKOFF_FACTOR", 2.0f64));

/// Ceiling on the backoff delay, in milliseconds, regardless of attempt
/// count.
pub static RETRY_MAX_DELAY_MS: Lazy<u64> =
    Lazy::new(|| env_or("DRIFTCORE_RETRY_MAX_DELAY_MS", 30_000u64));

/// A retry policy: initial delay, multiplicative backoff factor, and a
/// ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        Self {
            initial_delay_ms: *RETRY_INITIAL_DELAY_MS,
            backoff_factor: *RETRY_BACKOFF_FACTOR,
            max_delay_ms: *RETRY_MAX_DELAY_MS,
        }
    }

    /// Delay before the `attempt`th retry (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let scaled = self.initial_delay_ms as f64 * self.backoff_factor.powi(attempt as i32 - 1);
        let capped = scaled.min(self.max_delay_ms as f64).max(0.0);
        std::time::Duration::from_millis(capped as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

/// Aggregate engine configuration, assembled once at host construction
/// time: initialized at construction, replaced atomically on reload,
/// never mutated piecemeal.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_parallel_actions: usize,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    pub retry_policy: RetryPolicy,
    /// When true, synthesized rollback plans dispatch automatically on
    /// execution failure rather than waiting for an operator to trigger
    /// them manually. Defaults to manual.
    pub safe_mode: bool,
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self {
            max_parallel_actions: *MAX_PARALLEL_ACTIONS,
            business_hours_start: *BUSINESS_HOURS_START,
            business_hours_end: *BUSINESS_HOURS_END,
            retry_policy: RetryPolicy::from_env(),
            safe_mode: env_or("DRIFTCORE_SAFE_MODE", false),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallel_actions: 5,
            business_hours_start: 9,
            business_hours_end: 17,
            retry_policy: RetryPolicy::default(),
            safe_mode: false,
        }
    }
}
