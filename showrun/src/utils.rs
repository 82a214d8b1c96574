use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::errors::EngineError;

/// Sleep that honors the run's cancellation token. Every engine-side
/// suspension point goes through here so a cancelled run never resumes.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), EngineError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Scale a duration, keeping sub-millisecond precision.
pub(crate) fn fraction_of(duration: Duration, fraction: f64) -> Duration {
    duration.mul_f64(fraction.clamp(0.0, 1.0))
}
