use serde::{Deserialize, Serialize};

/// Tunable resource limits for the engine.
///
/// The engine has no file/environment configuration of its own (it is a
/// pure, I/O-free library) — but its circuit-breaker constants are
/// surfaced here rather than hard-coded, so callers embedding the engine
/// can tighten or loosen them, and tests can exercise the
/// budget-exceeded path without waiting out a real 1000-round search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineLimits {
    /// Maximum number of candidate-then-exclude rounds the next/previous
    /// occurrence search will attempt before giving up and returning
    /// `None`.
    pub exclusion_retry_budget: u32,

    /// Default cap on the number of occurrences a single
    /// `timesInInterval` call will materialize, used only when a rule's
    /// termination is `Never` and the caller's interval is unbounded in
    /// practice (defensive backstop, not part of the RFC 5545 contract).
    pub max_interval_occurrences: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            exclusion_retry_budget: 1000,
            max_interval_occurrences: 10_000,
        }
    }
}

impl EngineLimits {
    /// Limits with a small exclusion-retry budget, for tests that want
    /// to hit `IterationBudgetExceeded` quickly.
    #[must_use]
    pub fn tight(exclusion_retry_budget: u32) -> Self {
        Self {
            exclusion_retry_budget,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_retry_budget_is_one_thousand() {
        assert_eq!(EngineLimits::default().exclusion_retry_budget, 1000);
    }

    #[test]
    fn tight_overrides_only_retry_budget() {
        let limits = EngineLimits::tight(5);
        assert_eq!(limits.exclusion_retry_budget, 5);
        assert_eq!(
            limits.max_interval_occurrences,
            EngineLimits::default().max_interval_occurrences
        );
    }
}
