//! Shared timed polling for long-running remote operations.

use std::future::Future;
use std::time::Duration;

use crate::error::{GenError, GenResult};

/// Poll `check` every `interval` until it yields `Some(value)`, failing with
/// [`GenError::Timeout`] once `timeout` elapses. `check` returning an error
/// aborts the wait immediately.
pub async fn wait_until<T, F, Fut>(
    interval: Duration,
    timeout: Duration,
    mut check: F,
) -> GenResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GenResult<Option<T>>>,
{
    let wait_loop = async {
        loop {
            if let Some(value) = check().await? {
                return Ok(value);
            }
            tokio::time::sleep(interval).await;
        }
    };

    match tokio::time::timeout(timeout, wait_loop).await {
        Ok(result) => result,
        Err(_) => Err(GenError::Timeout(timeout.as_secs())),
    }
}
