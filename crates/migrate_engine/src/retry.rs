use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use migrate_logging::migrate_warn;

/// Bounded retry budget: attempt count plus a doubling delay with a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Run `op` up to `schedule.max_attempts` times, sleeping between attempts.
///
/// `is_transient` decides whether a failure is worth another attempt;
/// permanent failures return immediately. The final error is the one from
/// the last attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(
    schedule: BackoffSchedule,
    mut op: F,
    is_transient: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut delay = schedule.initial_delay;
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < schedule.max_attempts && is_transient(&err) => {
                migrate_warn!(
                    "attempt {}/{} failed ({}), retrying in {:?}",
                    attempt,
                    schedule.max_attempts,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(schedule.max_delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
