// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Error kinds surfaced to API clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    PermissionDenied(String),
    NotFound(String),
    InvalidInput(String),
    InvalidTransition(String),
    InvalidParent(String),
    Conflict(String),
    StorageUnavailable(String),
    TooLarge(String),
}

impl CoreError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::PermissionDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::InvalidInput(_) => 400,
            Self::InvalidTransition(_) => 409,
            Self::InvalidParent(_) => 409,
            Self::Conflict(_) => 409,
            Self::StorageUnavailable(_) => 503,
            Self::TooLarge(_) => 413,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::InvalidParent(_) => "INVALID_PARENT",
            Self::Conflict(_) => "CONFLICT",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::TooLarge(_) => "TOO_LARGE",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::PermissionDenied(m)
            | Self::NotFound(m)
            | Self::InvalidInput(m)
            | Self::InvalidTransition(m)
            | Self::InvalidParent(m)
            | Self::Conflict(m)
            | Self::StorageUnavailable(m)
            | Self::TooLarge(m) => m,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;

/// Bounded exponential backoff for transient storage faults.
///
/// The initial attempt plus up to 3 retries, backing off 100ms/400ms/1600ms
/// between them; exceeding the budget surfaces `StorageUnavailable`. Mirrors
/// the doubling-backoff loops in `crates/mux/src/broker/mux.rs`
/// (`RECONNECT_INITIAL`/`RECONNECT_MAX`).
pub async fn retry_with_backoff<T, E, F, Fut>(op_name: &str, mut f: F) -> CoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    const RETRY_DELAYS_MS: [u64; 3] = [100, 400, 1600];
    let mut last_err = String::new();
    for attempt in 0..=RETRY_DELAYS_MS.len() {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = e.to_string();
                if attempt == RETRY_DELAYS_MS.len() {
                    break;
                }
                tracing::warn!(op = op_name, attempt, error = %last_err, "transient storage error, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAYS_MS[attempt])).await;
            }
        }
    }
    Err(CoreError::StorageUnavailable(format!(
        "{op_name} failed after retry budget exhausted: {last_err}"
    )))
}
