use std::time::Duration;

use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("delay cancelled")]
pub struct Cancelled;

/// Sleeps for `duration` unless `token` is cancelled first.
///
/// Only the awaiting task is suspended. An already-cancelled token returns
/// without sleeping.
pub async fn cancellable_sleep(
    duration: Duration,
    token: &CancellationToken,
) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        return Err(Cancelled);
    }

    tokio::select! {
        () = sleep(duration) => Ok(()),
        () = token.cancelled() => Err(Cancelled),
    }
}

pub(crate) fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
