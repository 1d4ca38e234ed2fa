//! Backoff policies for destination sends and control-plane calls.
//!
//! Two independent policies live here on purpose: the pipeline send loop
//! retries without bound, while the control-plane client gives up after a
//! few attempts and relies on the next scheduled cycle.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff for pipeline destination sends.
///
/// `delay(n) = min(cap, base * 2^(n-1)) + U(0, jitter)` with 1-based `n`.
/// There is no attempt cap: a failing batch stays inflight until it sends
/// or the pipeline is removed.
#[derive(Debug, Clone, Copy)]
pub struct SendBackoff {
    pub base: Duration,
    pub cap: Duration,
    pub jitter: Duration,
}

impl Default for SendBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(10),
            jitter: Duration::from_millis(250),
        }
    }
}

impl SendBackoff {
    /// Delay before the given 1-based send attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1).min(31) - 1;
        let grown = self.base.as_secs_f64() * f64::from(2u32.saturating_pow(exp).min(1 << 30));
        let capped = grown.min(self.cap.as_secs_f64());
        let jitter = rand::thread_rng().gen_range(0.0..=self.jitter.as_secs_f64());
        Duration::from_secs_f64(capped + jitter)
    }
}

/// Bounded retry policy for control-plane calls.
///
/// Multiplicative jitter keeps a fleet of agents from re-registering in
/// lockstep after a control-plane restart.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fractional jitter, e.g. 0.1 for +/-10%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given 1-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1).min(31) - 1;
        let grown = self.base_delay.as_secs_f64() * f64::from(2u32.saturating_pow(exp).min(1 << 30));
        let capped = grown.min(self.max_delay.as_secs_f64());
        let factor = 1.0 + rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        Duration::from_secs_f64((capped * factor).max(0.0))
    }

    /// Sleep out the backoff for the given attempt.
    pub async fn sleep(&self, attempt: u32) {
        tokio::time::sleep(self.delay(attempt)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_backoff_grows_then_caps() {
        let backoff = SendBackoff::default();

        // Expected un-jittered delays: 0.5, 1, 2, 4, 8, 10, 10, ...
        let expected = [0.5, 1.0, 2.0, 4.0, 8.0, 10.0, 10.0];
        for (i, want) in expected.iter().enumerate() {
            let got = backoff.delay(i as u32 + 1).as_secs_f64();
            assert!(got >= *want, "attempt {}: {} < {}", i + 1, got, want);
            assert!(got <= *want + 0.25, "attempt {}: {} > {}", i + 1, got, want + 0.25);
        }
    }

    #[test]
    fn test_send_backoff_huge_attempt_stays_capped() {
        let backoff = SendBackoff::default();
        let got = backoff.delay(10_000).as_secs_f64();
        assert!(got <= 10.25);
    }

    #[test]
    fn test_retry_policy_bounds() {
        let policy = RetryPolicy::default();

        for attempt in 1..=8 {
            let base = 0.25 * 2f64.powi(attempt as i32 - 1);
            let capped = base.min(5.0);
            let got = policy.delay(attempt).as_secs_f64();
            assert!(got >= capped * 0.9 - 1e-9, "attempt {attempt}: {got}");
            assert!(got <= capped * 1.1 + 1e-9, "attempt {attempt}: {got}");
        }
    }
}
