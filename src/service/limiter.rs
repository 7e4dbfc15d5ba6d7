use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

use crate::config::LimiterConfig;

/// Event histories never grow past this many timestamps; the oldest entry
/// is evicted on overflow.
const HISTORY_CAP: usize = 1000;

/// Snapshot of the limiter's counters.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStats {
    pub current_rate: u32,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub total_requests: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub success_rate: f64,
}

#[derive(Debug)]
struct LimiterState {
    request_times: VecDeque<Instant>,
    success_times: VecDeque<Instant>,
    failure_times: VecDeque<Instant>,
    current_rate: u32,
    consecutive_failures: u32,
    consecutive_successes: u32,
    total_requests: u64,
    total_successes: u64,
    total_failures: u64,
}

fn push_bounded(history: &mut VecDeque<Instant>, at: Instant) {
    if history.len() == HISTORY_CAP {
        history.pop_front();
    }
    history.push_back(at);
}

/// Count timestamps newer than `cutoff`. `None` means the process is
/// younger than the window, so everything counts.
fn count_since(history: &VecDeque<Instant>, cutoff: Option<Instant>) -> usize {
    match cutoff {
        Some(cutoff) => history.iter().rev().take_while(|t| **t > cutoff).count(),
        None => history.len(),
    }
}

/// Sliding-window admission controller with feedback-driven rate tuning.
///
/// Every concurrent orchestration run shares one limiter. All state lives
/// behind a single lock; the lock is never held across a sleep, and
/// `acquire` re-checks the window after waking so concurrent waiters cannot
/// over-admit.
pub struct AdaptiveRateLimiter {
    config: LimiterConfig,
    window: Duration,
    state: Mutex<LimiterState>,
}

impl AdaptiveRateLimiter {
    pub fn new(config: LimiterConfig) -> Self {
        let window = Duration::from_secs(config.window_secs);
        let state = LimiterState {
            request_times: VecDeque::new(),
            success_times: VecDeque::new(),
            failure_times: VecDeque::new(),
            current_rate: config.initial_rate,
            consecutive_failures: 0,
            consecutive_successes: 0,
            total_requests: 0,
            total_successes: 0,
            total_failures: 0,
        };
        Self {
            config,
            window,
            state: Mutex::new(state),
        }
    }

    /// Block the calling task until a request may proceed, then record its
    /// admission timestamp.
    pub async fn acquire(&self) {
        let mut retuned = false;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                // Rate retuning happens once, at the start of the call
                if !retuned {
                    self.retune(&mut state, now);
                    retuned = true;
                }

                let cutoff = now.checked_sub(self.window);
                let in_window = count_since(&state.request_times, cutoff);
                if (in_window as u32) < state.current_rate {
                    push_bounded(&mut state.request_times, now);
                    state.total_requests += 1;
                    None
                } else {
                    let oldest = state
                        .request_times
                        .iter()
                        .find(|t| cutoff.map_or(true, |c| **t > c))
                        .copied()
                        .unwrap_or(now);
                    let base = self
                        .window
                        .saturating_sub(now.duration_since(oldest))
                        .as_secs_f64();
                    let mut wait = base + jitter(base);
                    if state.consecutive_failures > 0 {
                        wait *= backoff_value(&self.config, state.consecutive_failures);
                    }
                    Some(Duration::from_secs_f64(wait.max(0.001)))
                }
            };

            match wait {
                None => return,
                Some(duration) => {
                    tracing::debug!("rate limit reached, waiting {:?}", duration);
                    sleep(duration).await;
                }
            }
        }
    }

    /// Record a transport-level success and apply streak-based recovery.
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        push_bounded(&mut state.success_times, Instant::now());
        state.consecutive_successes += 1;
        state.consecutive_failures = 0;
        state.total_successes += 1;

        if state.consecutive_successes >= 3 {
            let raised = (state.current_rate as f64 / self.config.recovery_factor) as u32;
            let raised = raised.min(self.config.max_rate);
            if raised != state.current_rate {
                tracing::debug!(
                    "success streak of {}, raising rate {} -> {}",
                    state.consecutive_successes,
                    state.current_rate,
                    raised
                );
                state.current_rate = raised;
            }
        }
    }

    /// Record a transport-level failure and halve the rate once the
    /// failure streak crosses the configured threshold.
    pub async fn record_failure(&self) {
        let mut state = self.state.lock().await;
        push_bounded(&mut state.failure_times, Instant::now());
        state.consecutive_failures += 1;
        state.consecutive_successes = 0;
        state.total_failures += 1;

        if state.consecutive_failures >= self.config.max_consecutive_failures {
            let halved = (state.current_rate as f64 * 0.5).round() as u32;
            let halved = halved.max(self.config.min_rate);
            if halved != state.current_rate {
                tracing::warn!(
                    "{} consecutive failures, halving rate {} -> {}",
                    state.consecutive_failures,
                    state.current_rate,
                    halved
                );
                state.current_rate = halved;
            }
        }
    }

    /// Exponential backoff for the current failure streak, with jitter.
    /// Used by the retry path between attempts.
    pub async fn backoff_delay(&self) -> Duration {
        let streak = self.state.lock().await.consecutive_failures;
        Duration::from_secs_f64(backoff_value(&self.config, streak))
    }

    /// Snapshot of the counters. Takes the lock only long enough to copy.
    pub async fn stats(&self) -> LimiterStats {
        let state = self.state.lock().await;
        let success_rate = if state.total_requests > 0 {
            state.total_successes as f64 / state.total_requests as f64
        } else {
            0.0
        };
        LimiterStats {
            current_rate: state.current_rate,
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            total_requests: state.total_requests,
            total_successes: state.total_successes,
            total_failures: state.total_failures,
            success_rate,
        }
    }

    /// Adjust the rate from the trailing-window success ratio.
    fn retune(&self, state: &mut LimiterState, now: Instant) {
        let cutoff = now.checked_sub(self.window);
        let recent_requests = count_since(&state.request_times, cutoff);
        let recent_successes = count_since(&state.success_times, cutoff);
        let ratio = recent_successes as f64 / recent_requests.max(1) as f64;

        let adjusted = if ratio > 0.95 {
            (state.current_rate as f64 * 1.2) as u32
        } else if ratio > 0.80 {
            (state.current_rate as f64 * 1.1) as u32
        } else if ratio < 0.50 {
            (state.current_rate as f64 * 0.7) as u32
        } else {
            state.current_rate
        };
        let adjusted = adjusted.clamp(self.config.min_rate, self.config.max_rate);

        if adjusted != state.current_rate {
            tracing::debug!(
                "success ratio {:.2} over trailing window, rate {} -> {}",
                ratio,
                state.current_rate,
                adjusted
            );
            state.current_rate = adjusted;
        }
    }
}

fn backoff_value(config: &LimiterConfig, consecutive_failures: u32) -> f64 {
    let delay = config.backoff_factor.powi(consecutive_failures as i32);
    delay + jitter(delay)
}

/// Uniform jitter in `[0, 0.1 * base]`, desynchronizing concurrent waiters.
fn jitter(base: f64) -> f64 {
    if base <= 0.0 {
        return 0.0;
    }
    rand::thread_rng().gen_range(0.0..=0.1 * base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn limiter_config() -> LimiterConfig {
        Config::default().limiter
    }

    fn fixed_rate(rate: u32, window_secs: u64) -> LimiterConfig {
        LimiterConfig {
            initial_rate: rate,
            min_rate: rate,
            max_rate: rate,
            window_secs,
            ..limiter_config()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn admits_immediately_under_the_limit() {
        let limiter = AdaptiveRateLimiter::new(fixed_rate(3, 60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.stats().await.total_requests, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn window_admission_suspends_until_oldest_ages_out() {
        let window = Duration::from_secs(60);
        let limiter = AdaptiveRateLimiter::new(fixed_rate(3, 60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }

        // Fourth admission must wait for the first to leave the window
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= window, "admitted after only {:?}", elapsed);
        // Base wait plus at most 10% jitter, and one re-check loop
        assert!(elapsed <= window * 2, "waited implausibly long: {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn steady_state_never_overfills_a_window() {
        let limiter = AdaptiveRateLimiter::new(fixed_rate(2, 10));
        let mut admissions = Vec::new();
        for _ in 0..6 {
            limiter.acquire().await;
            admissions.push(Instant::now());
        }
        let window = Duration::from_secs(10);
        for (i, at) in admissions.iter().enumerate() {
            let in_window = admissions
                .iter()
                .filter(|t| **t > at.checked_sub(window).unwrap_or(*at) && *t <= at)
                .count();
            assert!(in_window <= 2, "window ending at admission {} holds {}", i, in_window);
        }
    }

    #[tokio::test]
    async fn rate_stays_within_bounds() {
        let limiter = AdaptiveRateLimiter::new(limiter_config());
        for round in 0..40 {
            if round % 3 == 0 {
                limiter.record_success().await;
            } else {
                limiter.record_failure().await;
            }
            let stats = limiter.stats().await;
            assert!((5..=50).contains(&stats.current_rate), "rate {}", stats.current_rate);
        }
        // Long streaks in both directions
        for _ in 0..20 {
            limiter.record_failure().await;
        }
        assert_eq!(limiter.stats().await.current_rate, 5);
        for _ in 0..20 {
            limiter.record_success().await;
        }
        assert_eq!(limiter.stats().await.current_rate, 50);
    }

    #[tokio::test]
    async fn failure_streak_halves_the_rate() {
        let config = LimiterConfig {
            initial_rate: 40,
            min_rate: 5,
            max_rate: 50,
            max_consecutive_failures: 5,
            ..limiter_config()
        };
        let limiter = AdaptiveRateLimiter::new(config);
        for _ in 0..4 {
            limiter.record_failure().await;
        }
        assert_eq!(limiter.stats().await.current_rate, 40);

        limiter.record_failure().await;
        assert_eq!(limiter.stats().await.current_rate, 20);

        // Streak keeps halving, floored at the minimum
        limiter.record_failure().await;
        assert_eq!(limiter.stats().await.current_rate, 10);
        limiter.record_failure().await;
        assert_eq!(limiter.stats().await.current_rate, 5);
        limiter.record_failure().await;
        assert_eq!(limiter.stats().await.current_rate, 5);
    }

    #[tokio::test]
    async fn success_streak_raises_the_rate() {
        let limiter = AdaptiveRateLimiter::new(limiter_config());
        limiter.record_success().await;
        limiter.record_success().await;
        assert_eq!(limiter.stats().await.current_rate, 30);

        // Third consecutive success divides by the recovery factor
        limiter.record_success().await;
        assert_eq!(limiter.stats().await.current_rate, 37);
    }

    #[tokio::test]
    async fn streak_counters_are_mutually_exclusive() {
        let limiter = AdaptiveRateLimiter::new(limiter_config());
        limiter.record_failure().await;
        limiter.record_failure().await;
        let stats = limiter.stats().await;
        assert_eq!(stats.consecutive_failures, 2);
        assert_eq!(stats.consecutive_successes, 0);

        limiter.record_success().await;
        let stats = limiter.stats().await;
        assert_eq!(stats.consecutive_failures, 0);
        assert_eq!(stats.consecutive_successes, 1);
        assert_eq!(stats.total_failures, 2);
        assert_eq!(stats.total_successes, 1);
    }

    #[tokio::test]
    async fn backoff_grows_with_the_failure_streak() {
        let limiter = AdaptiveRateLimiter::new(limiter_config());
        let calm = limiter.backoff_delay().await.as_secs_f64();
        assert!((1.0..=1.1).contains(&calm), "calm delay {}", calm);

        limiter.record_failure().await;
        limiter.record_failure().await;
        let stressed = limiter.backoff_delay().await.as_secs_f64();
        assert!((2.25..=2.475).contains(&stressed), "stressed delay {}", stressed);
    }

    #[tokio::test(start_paused = true)]
    async fn high_success_ratio_raises_rate_on_acquire() {
        let config = LimiterConfig {
            initial_rate: 30,
            min_rate: 5,
            max_rate: 50,
            ..limiter_config()
        };
        let limiter = AdaptiveRateLimiter::new(config);
        for _ in 0..5 {
            limiter.acquire().await;
            limiter.record_success().await;
        }
        // Perfect success ratio keeps multiplying by 1.2 on acquire while
        // the streak divides by the recovery factor; both roads end at the
        // ceiling
        limiter.acquire().await;
        assert_eq!(limiter.stats().await.current_rate, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_window_decays_rate_toward_minimum() {
        // No recent successes: ratio 0 < 0.5 cuts the rate on every acquire
        let config = LimiterConfig {
            initial_rate: 30,
            min_rate: 5,
            max_rate: 50,
            ..limiter_config()
        };
        let limiter = AdaptiveRateLimiter::new(config);
        limiter.acquire().await;
        assert_eq!(limiter.stats().await.current_rate, 21);
        limiter.acquire().await;
        assert_eq!(limiter.stats().await.current_rate, 14);
    }
}
