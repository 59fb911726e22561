//! Bounded waits on the ledger and the node
//!
//! Metadata and submit each make one outbound call, wrapped in
//! [`with_timeout`]. An expired wait becomes a retriable gateway error.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Per-collaborator limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Tip slot and protocol parameter lookups
    pub ledger: Duration,
    pub submit: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            ledger: Duration::from_secs(10),
            submit: Duration::from_secs(30),
        }
    }
}

impl TimeoutConfig {
    pub fn with_ledger(self, ledger: Duration) -> Self {
        Self { ledger, ..self }
    }

    pub fn with_submit(self, submit: Duration) -> Self {
        Self { submit, ..self }
    }
}

/// A collaborator call that did not answer in time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} did not complete within {limit:?}")]
pub struct TimeoutError {
    pub operation: String,
    pub limit: Duration,
}

/// Await `call`, giving up after `limit`
pub async fn with_timeout<T>(
    limit: Duration,
    operation: &str,
    call: impl Future<Output = T>,
) -> Result<T, TimeoutError> {
    tokio::time::timeout(limit, call).await.map_err(|_| {
        tracing::warn!(operation, ?limit, "collaborator call expired");
        TimeoutError {
            operation: operation.to_string(),
            limit,
        }
    })
}
