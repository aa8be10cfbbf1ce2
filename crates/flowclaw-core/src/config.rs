//! Engine configuration knobs — polling cadence, bounds, retry policy.

/// Cadence of `session.status()` polls while an agent turn is in flight.
pub const POLL_INTERVAL_MS: u64 = 500;
/// Poll attempts before an agent turn is declared timed out (600 × 500ms = 5 min).
pub const MAX_POLL_ATTEMPTS: u32 = 600;
/// Iteration bound for workflows that do not set their own.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
/// Wall-time bound for workflows that do not set their own.
pub const DEFAULT_MAX_DURATION_MS: u64 = 600_000;
/// Retries for steps that omit `max_retries`.
pub const DEFAULT_MAX_RETRIES: u32 = 0;
/// Base delay between attempts for steps that omit `retry_delay_ms`.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
/// Exponential backoff multiplier applied per retry.
pub const RETRY_BACKOFF_MULTIPLIER: u32 = 2;
/// Upper bound on any single backoff sleep.
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;
/// Per-attempt timeout for steps that omit `timeout_ms`.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = POLL_INTERVAL_MS * MAX_POLL_ATTEMPTS as u64;
/// Attempts to release a session before giving up with a warning.
pub const SESSION_CLEANUP_MAX_RETRIES: u32 = 3;
/// Delay between session release attempts.
pub const SESSION_CLEANUP_RETRY_DELAY_MS: u64 = 1_000;

/// Tunables recognized on engine construction.
///
/// An `EngineConfig` is read-only for the lifetime of the engine; concurrent
/// workflow runs against one engine share it without coordination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub default_max_iterations: u32,
    pub default_max_duration_ms: u64,
    pub default_max_retries: u32,
    pub default_retry_delay_ms: u64,
    pub retry_backoff_multiplier: u32,
    pub max_retry_delay_ms: u64,
    pub default_step_timeout_ms: u64,
    pub session_cleanup_max_retries: u32,
    pub session_cleanup_retry_delay_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: POLL_INTERVAL_MS,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
            default_max_duration_ms: DEFAULT_MAX_DURATION_MS,
            default_max_retries: DEFAULT_MAX_RETRIES,
            default_retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            retry_backoff_multiplier: RETRY_BACKOFF_MULTIPLIER,
            max_retry_delay_ms: MAX_RETRY_DELAY_MS,
            default_step_timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            session_cleanup_max_retries: SESSION_CLEANUP_MAX_RETRIES,
            session_cleanup_retry_delay_ms: SESSION_CLEANUP_RETRY_DELAY_MS,
        }
    }
}

impl EngineConfig {
    /// Total wall time the adapter will spend polling one agent turn.
    pub fn max_poll_duration_ms(&self) -> u64 {
        self.poll_interval_ms * u64::from(self.max_poll_attempts)
    }

    /// Backoff delay before the given retry (1-based attempt that just failed).
    pub fn retry_delay_ms(&self, base_delay_ms: u64, attempt: u32) -> u64 {
        let factor = u64::from(self.retry_backoff_multiplier).saturating_pow(attempt.saturating_sub(1));
        base_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms)
    }
}
