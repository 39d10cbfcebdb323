use std::fmt;
use std::time::Duration;

use rand::Rng;

/// Wait before the first retry, in seconds.
pub const BASE_DELAY_SECS: f64 = 1.0;
/// Growth factor applied to the wait after every failed attempt.
pub const BACKOFF_MULTIPLIER: f64 = 2.0;
/// Exclusive upper bound of the jitter added to the following wait.
pub const MAX_JITTER_SECS: f64 = 1.0 / 3.0;

/// Uniform jitter in `[0, MAX_JITTER_SECS)`.
pub fn random_jitter() -> f64 {
    rand::thread_rng().gen_range(0.0..MAX_JITTER_SECS)
}

/// Geometric backoff schedule for one exchange.
///
/// Jitter drawn after a wait inflates the next wait, never the current one.
pub struct Backoff {
    next_wait_secs: f64,
    jitter: Box<dyn FnMut() -> f64 + Send>,
}

impl Backoff {
    #[must_use]
    pub fn new() -> Self {
        Self::with_jitter(random_jitter)
    }

    #[must_use]
    pub fn with_jitter(jitter: impl FnMut() -> f64 + Send + 'static) -> Self {
        Self {
            next_wait_secs: BASE_DELAY_SECS,
            jitter: Box::new(jitter),
        }
    }

    /// Returns the wait before the next attempt and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let current = self.next_wait_secs;
        let jitter = (self.jitter)().clamp(0.0, MAX_JITTER_SECS);
        self.next_wait_secs = current * BACKOFF_MULTIPLIER + jitter;
        Duration::from_secs_f64(current)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("next_wait_secs", &self.next_wait_secs)
            .finish_non_exhaustive()
    }
}

/// Last error observed once the retry budget is spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Runs `attempt` up to `max_retries + 1` times, sleeping between failures.
///
/// `attempt` receives the 1-based attempt number. Returns the first success
/// together with the number of attempts it took.
pub fn retry_establish<T, E, F, S>(
    max_retries: u32,
    backoff: &mut Backoff,
    mut attempt: F,
    mut sleep: S,
) -> Result<(T, u32), RetryExhausted<E>>
where
    E: fmt::Display,
    F: FnMut(u32) -> Result<T, E>,
    S: FnMut(Duration),
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match attempt(attempts) {
            Ok(value) => return Ok((value, attempts)),
            Err(error) if attempts <= max_retries => {
                let delay = backoff.next_delay();
                tracing::debug!(
                    attempt = attempts,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "establishment failed; retrying"
                );
                sleep(delay);
            }
            Err(error) => {
                tracing::debug!(attempts, %error, "establishment retry budget exhausted");
                return Err(RetryExhausted {
                    attempts,
                    last_error: error,
                });
            }
        }
    }
}
