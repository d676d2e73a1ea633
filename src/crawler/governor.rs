//! Host-wide request pacing
//!
//! One `RateGovernor` is shared by the walker and every download worker, so
//! search pages and documents draw from the same budget. Grants are spaced by
//! the current interval, which grows geometrically on transient failures and
//! snaps back to the base interval after a run of successes.

use crate::config::GovernorConfig;
use crate::state::FetchOutcome;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// What the host said about the last request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GovernorFeedback {
    /// The host answered normally (including permanent failures)
    Success,

    /// The host is struggling or throttling us
    Transient { retry_after: Option<Duration> },
}

impl GovernorFeedback {
    pub fn from_outcome(outcome: &FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::TransientFailure { retry_after, .. } => Self::Transient {
                retry_after: *retry_after,
            },
            FetchOutcome::Success { .. } | FetchOutcome::PermanentFailure { .. } => Self::Success,
        }
    }
}

#[derive(Debug, Default)]
struct GovernorState {
    /// Earliest instant the next grant may happen; `None` before the first grant
    next_slot: Option<Instant>,
    last_grant: Option<Instant>,
    level: u32,
    consecutive_successes: u32,
}

/// Shared pacing and adaptive backoff for one host
#[derive(Debug)]
pub struct RateGovernor {
    base_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    successes_to_reset: u32,
    state: Mutex<GovernorState>,
}

impl RateGovernor {
    pub fn new(
        base_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
        successes_to_reset: u32,
    ) -> Self {
        Self {
            base_interval,
            multiplier,
            max_interval: max_interval.max(base_interval),
            successes_to_reset: successes_to_reset.max(1),
            state: Mutex::new(GovernorState::default()),
        }
    }

    pub fn from_config(config: &GovernorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_interval_ms),
            config.backoff_multiplier,
            Duration::from_millis(config.max_interval_ms),
            config.successes_to_reset,
        )
    }

    /// Restores a backoff level saved in a checkpoint
    pub fn restore_level(&self, level: u32) {
        let level = level.min(self.ceiling_level());
        let mut state = self.lock();
        state.level = level;
        state.consecutive_successes = 0;
    }

    fn lock(&self) -> MutexGuard<'_, GovernorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Interval at a given backoff level
    fn interval_for(&self, level: u32) -> Duration {
        let exponent = i32::try_from(level).unwrap_or(i32::MAX);
        let millis = self.base_interval.as_secs_f64() * 1000.0 * self.multiplier.powi(exponent);
        let max_millis = self.max_interval.as_secs_f64() * 1000.0;

        if !millis.is_finite() || millis >= max_millis {
            self.max_interval
        } else {
            Duration::from_secs_f64(millis / 1000.0)
        }
    }

    /// Lowest level whose interval reaches the ceiling
    fn ceiling_level(&self) -> u32 {
        let mut level = 0;
        while self.interval_for(level) < self.max_interval && level < 64 {
            level += 1;
        }
        level
    }

    pub fn level(&self) -> u32 {
        self.lock().level
    }

    pub fn current_interval(&self) -> Duration {
        let level = self.lock().level;
        self.interval_for(level)
    }

    /// Waits for the next request slot
    ///
    /// The slot is reserved before sleeping, so concurrent callers queue up
    /// one interval apart. The first grant is immediate.
    pub async fn acquire(&self) {
        let slot = {
            let mut state = self.lock();
            let now = Instant::now();
            let slot = match state.next_slot {
                Some(next) if next > now => next,
                _ => now,
            };
            state.next_slot = Some(slot + self.interval_for(state.level));
            state.last_grant = Some(slot);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }

    /// Feeds the result of a granted request back into the pacing
    pub fn report(&self, feedback: GovernorFeedback) {
        let mut state = self.lock();

        match feedback {
            GovernorFeedback::Success => {
                state.consecutive_successes += 1;
                if state.level > 0 && state.consecutive_successes >= self.successes_to_reset {
                    tracing::debug!(
                        "Backoff reset after {} successes (was level {})",
                        state.consecutive_successes,
                        state.level
                    );
                    state.level = 0;
                    state.consecutive_successes = 0;
                }
            }
            GovernorFeedback::Transient { retry_after } => {
                state.consecutive_successes = 0;
                if self.interval_for(state.level) < self.max_interval {
                    state.level += 1;
                }
                let interval = self.interval_for(state.level);
                tracing::debug!(
                    "Backoff raised to level {} ({} ms)",
                    state.level,
                    interval.as_millis()
                );

                let now = Instant::now();
                let mut earliest = state.last_grant.map(|grant| grant + interval).unwrap_or(now);
                if let Some(delay) = retry_after {
                    earliest = earliest.max(now + delay);
                }
                state.next_slot = Some(match state.next_slot {
                    Some(next) => next.max(earliest),
                    None => earliest,
                });
            }
        }
    }

    /// Shorthand for `report(GovernorFeedback::from_outcome(outcome))`
    pub fn report_outcome(&self, outcome: &FetchOutcome) {
        self.report(GovernorFeedback::from_outcome(outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn governor() -> RateGovernor {
        RateGovernor::new(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(1000),
            3,
        )
    }

    fn transient() -> GovernorFeedback {
        GovernorFeedback::Transient { retry_after: None }
    }

    #[test]
    fn test_interval_grows_and_caps() {
        let gov = governor();
        let mut previous = gov.current_interval();
        assert_eq!(previous, Duration::from_millis(100));

        for _ in 0..10 {
            gov.report(transient());
            let current = gov.current_interval();
            assert!(current >= previous);
            assert!(current <= Duration::from_millis(1000));
            previous = current;
        }

        assert_eq!(gov.current_interval(), Duration::from_millis(1000));
        // 100 * 2^4 = 1600 is the first level at the ceiling
        assert_eq!(gov.level(), 4);
    }

    #[test]
    fn test_successes_reset_level() {
        let gov = governor();
        gov.report(transient());
        gov.report(transient());
        assert_eq!(gov.current_interval(), Duration::from_millis(400));

        gov.report(GovernorFeedback::Success);
        gov.report(GovernorFeedback::Success);
        assert_eq!(gov.level(), 2);

        gov.report(GovernorFeedback::Success);
        assert_eq!(gov.level(), 0);
        assert_eq!(gov.current_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_transient_breaks_success_run() {
        let gov = governor();
        gov.report(transient());
        gov.report(GovernorFeedback::Success);
        gov.report(GovernorFeedback::Success);
        gov.report(transient());
        gov.report(GovernorFeedback::Success);
        gov.report(GovernorFeedback::Success);
        assert_eq!(gov.level(), 2);
    }

    #[test]
    fn test_permanent_failure_counts_as_success() {
        let outcome = FetchOutcome::permanent("HTTP 404");
        assert_eq!(
            GovernorFeedback::from_outcome(&outcome),
            GovernorFeedback::Success
        );
    }

    #[test]
    fn test_restore_level_is_clamped() {
        let gov = governor();
        gov.restore_level(50);
        assert_eq!(gov.level(), 4);
        assert_eq!(gov.current_interval(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_grant_is_immediate() {
        let gov = governor();
        let start = Instant::now();
        gov.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grants_are_spaced() {
        let gov = governor();
        let start = Instant::now();
        for _ in 0..4 {
            gov.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_spacing() {
        let gov = Arc::new(governor());
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let gov = gov.clone();
                tokio::spawn(async move {
                    gov.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut grants = Vec::new();
        for handle in handles {
            grants.push(handle.await.unwrap());
        }
        grants.sort();

        for pair in grants.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_pushes_next_slot() {
        let gov = governor();
        gov.acquire().await;
        let start = Instant::now();

        gov.report(GovernorFeedback::Transient {
            retry_after: Some(Duration::from_secs(5)),
        });
        gov.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_widens_next_gap() {
        let gov = governor();
        gov.acquire().await;
        let start = Instant::now();

        gov.report(transient());
        gov.acquire().await;

        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
