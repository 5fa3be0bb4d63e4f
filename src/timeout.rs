//! Deadline guard for chain and backend reads
//!
//! A non-responsive node must never park a reconciliation forever. The guard
//! gives up waiting once the deadline passes and drops the inner future; the
//! request already on the wire is not cancelled and any late answer is lost.
//! Nothing here retries.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::error::ServiceError;

/// Deadline exceeded while waiting on a guarded call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Contract call timeout after {}ms", .0.as_millis())]
pub struct CallTimeout(pub Duration);

impl From<CallTimeout> for ServiceError {
    fn from(timeout: CallTimeout) -> Self {
        ServiceError::CallTimeout(timeout.0)
    }
}

/// Await `future`, or fail with [`CallTimeout`] once `deadline` elapses.
pub async fn with_timeout<F>(deadline: Duration, future: F) -> Result<F::Output, CallTimeout>
where
    F: Future,
{
    tokio::time::timeout(deadline, future)
        .await
        .map_err(|_| CallTimeout(deadline))
}

/// [`with_timeout`] for fallible calls, flattening both failures into
/// [`ServiceError`].
pub async fn guarded<F, T, E>(deadline: Duration, future: F) -> Result<T, ServiceError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ServiceError>,
{
    with_timeout(deadline, future).await?.map_err(Into::into)
}
