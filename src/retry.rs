//! Caller-side retry with exponential backoff and jitter.
//!
//! Flows and the generation client never retry on their own. Callers that
//! want retries wrap a flow call in [`retry_with_backoff`], which re-runs it
//! while the error is [retryable](crate::FlowError::is_retryable).

use std::future::Future;
use std::time::Duration;

use crate::error::{FlowError, Result};

/// Configuration for caller-side retry with exponential backoff and jitter.
///
/// # Example
///
/// ```
/// use estate_ai::retry::BackoffConfig;
///
/// // No retry (default)
/// let none = BackoffConfig::none();
/// assert_eq!(none.max_retries, 0);
///
/// // A user is waiting on the result
/// let interactive = BackoffConfig::interactive();
/// assert_eq!(interactive.max_retries, 2);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Maximum number of retries after the first attempt. Default: 0.
    pub max_retries: u32,

    /// Initial delay before first retry.
    pub initial_delay: Duration,

    /// Multiplier applied to delay after each retry.
    /// Delay grows: initial, initial * multiplier, initial * multiplier^2, ...
    pub multiplier: f64,

    /// Maximum delay between retries.
    pub max_delay: Duration,

    /// Jitter strategy.
    pub jitter: JitterStrategy,

    /// Whether to honour a backend `Retry-After` hint (capped at `max_delay`).
    pub respect_retry_after: bool,

    /// Also retry malformed or schema-invalid replies. Generation is
    /// stochastic, so one more attempt often succeeds.
    pub retry_invalid_replies: bool,
}

/// Jitter strategy to prevent thundering herd on shared rate limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JitterStrategy {
    /// No jitter. Delay is exactly the calculated value.
    None,

    /// Full jitter: random value in `[0, calculated_delay]`.
    Full,

    /// Equal jitter: `calculated_delay/2 + random in [0, calculated_delay/2]`.
    Equal,
}

impl BackoffConfig {
    /// No retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::standard()
        }
    }

    /// 3 retries, 1s initial, 2x multiplier, 30s max, full jitter.
    pub fn standard() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: JitterStrategy::Full,
            respect_retry_after: true,
            retry_invalid_replies: true,
        }
    }

    /// Conservative retry for interactive use (user is waiting):
    /// 2 retries, 500ms initial, 5s max.
    pub fn interactive() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            multiplier: 1.5,
            max_delay: Duration::from_secs(5),
            jitter: JitterStrategy::Full,
            respect_retry_after: true,
            retry_invalid_replies: true,
        }
    }

    /// Calculate the delay for attempt N (0-indexed).
    ///
    /// The base delay is `initial_delay * multiplier^attempt`, capped at
    /// `max_delay`. Jitter is then applied according to the configured strategy.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = match self.jitter {
            JitterStrategy::None => capped,
            JitterStrategy::Full => fastrand::f64() * capped,
            JitterStrategy::Equal => capped / 2.0 + fastrand::f64() * (capped / 2.0),
        };

        // A negative multiplier flips the sign on odd attempts.
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(self.max_delay)
    }

    /// Whether `error` should be retried under this policy.
    pub fn should_retry(&self, error: &FlowError) -> bool {
        match error {
            FlowError::MalformedJson { .. } | FlowError::SchemaValidation { .. } => {
                self.retry_invalid_replies
            }
            other => other.is_retryable(),
        }
    }

    fn delay_after(&self, error: &FlowError, attempt: u32) -> Duration {
        match error {
            FlowError::Backend {
                retry_after: Some(hint),
                ..
            } if self.respect_retry_after => (*hint).min(self.max_delay),
            _ => self.delay_for_attempt(attempt),
        }
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::none()
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. Returns the last error in the latter two cases.
///
/// ```no_run
/// # async fn demo(client: estate_ai::GenerationClient, input: estate_ai::flows::price::PricePredictionInput)
/// #     -> estate_ai::Result<()> {
/// use estate_ai::flows::{run, price::PricePredictor};
/// use estate_ai::retry::{retry_with_backoff, BackoffConfig};
///
/// let out = retry_with_backoff(&BackoffConfig::interactive(), || {
///     run::<PricePredictor>(&client, &input)
/// })
/// .await?;
/// # let _ = out;
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<T, F, Fut>(config: &BackoffConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < config.max_retries && config.should_retry(&e) => {
                let delay = config.delay_after(&e, attempt);
                attempt += 1;
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::UseCase;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> BackoffConfig {
        BackoffConfig {
            max_retries,
            initial_delay: Duration::from_millis(1),
            multiplier: 1.0,
            max_delay: Duration::from_millis(5),
            jitter: JitterStrategy::None,
            respect_retry_after: true,
            retry_invalid_replies: true,
        }
    }

    #[test]
    fn test_backoff_delay_exponential() {
        let config = BackoffConfig {
            jitter: JitterStrategy::None,
            max_delay: Duration::from_secs(60),
            ..BackoffConfig::standard()
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn test_negative_multiplier_clamps_to_zero() {
        for jitter in [JitterStrategy::None, JitterStrategy::Full, JitterStrategy::Equal] {
            let config = BackoffConfig {
                multiplier: -2.0,
                jitter,
                ..BackoffConfig::standard()
            };
            assert_eq!(config.delay_for_attempt(1), Duration::ZERO);
            assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
            assert!(config.delay_for_attempt(2) <= config.max_delay);
        }
    }

    #[test]
    fn test_backoff_delay_capped_at_max() {
        let config = BackoffConfig {
            jitter: JitterStrategy::None,
            max_delay: Duration::from_secs(5),
            ..BackoffConfig::standard()
        };
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_jitter_full_in_range() {
        let config = BackoffConfig::standard();
        for _ in 0..100 {
            let d = config.delay_for_attempt(1);
            assert!(d <= Duration::from_secs(2), "delay {:?} > 2s", d);
        }
    }

    #[test]
    fn test_retry_after_hint_capped() {
        let config = fast(1);
        let err = FlowError::Backend {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(30)),
        };
        assert_eq!(config.delay_after(&err, 0), Duration::from_millis(5));
    }

    #[test]
    fn test_invalid_reply_retry_toggle() {
        let err = FlowError::MalformedJson {
            use_case: UseCase::Chatbot,
            reason: "eof".into(),
            raw: String::new(),
        };
        assert!(fast(1).should_retry(&err));
        let strict = BackoffConfig {
            retry_invalid_replies: false,
            ..fast(1)
        };
        assert!(!strict.should_retry(&err));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let attempts = AtomicU32::new(0);
        let result = retry_with_backoff(&fast(3), || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FlowError::Transport("reset".into()))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&fast(3), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(FlowError::Configuration("missing".into()))
        })
        .await;
        assert!(matches!(result, Err(FlowError::Configuration(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_exhausted_returns_last_error() {
        let attempts = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&fast(2), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(FlowError::Backend {
                status: 502,
                body: String::new(),
                retry_after: None,
            })
        })
        .await;
        assert!(matches!(result, Err(FlowError::Backend { status: 502, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_none_policy_never_retries() {
        let attempts = AtomicU32::new(0);
        let _: Result<()> = retry_with_backoff(&BackoffConfig::none(), || async {
            attempts.fetch_add(1, Ordering::SeqCst);
            Err(FlowError::Transport("reset".into()))
        })
        .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
