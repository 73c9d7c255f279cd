//! Worker health: a read-only diagnostic, not a dispatch gate.
//!
//! Trimmed from the three-state circuit breaker this codebase uses for
//! domain health (`Closed`/`HalfOpen`/`Open` with failure/success
//! thresholds and a half-open timeout) down to the two counters the pool
//! actually needs: failover already handles per-call retry, so nothing here
//! ever blocks a dispatch.

use std::time::Instant;

/// `last_error`/`consecutive_errors` for one Worker. Updated by the pool
/// after every dispatch attempt, read by `/v1/cookies`-adjacent introspection
/// and logging — never consulted by candidate selection.
#[derive(Debug, Clone, Default)]
pub struct WorkerHealth {
    pub last_error: Option<Instant>,
    pub consecutive_errors: u32,
}

impl WorkerHealth {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    pub fn record_error(&mut self) {
        self.last_error = Some(Instant::now());
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_resets_streak() {
        let mut health = WorkerHealth::new();
        health.record_error();
        health.record_error();
        assert_eq!(health.consecutive_errors, 2);
        health.record_success();
        assert_eq!(health.consecutive_errors, 0);
    }
}
