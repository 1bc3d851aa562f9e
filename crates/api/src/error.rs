// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-level error type: wraps `CoreError` and adds the auth/transport
//! failures that only make sense at the HTTP boundary.
//!
//! Grounded on `crates/cli/src/error.rs`: a small enum with an
//! `IntoResponse`-shaped mapping to status codes, serialized as a single
//! JSON error object rather than a bespoke per-route shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kernelci_core::error::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    AuthRequired(String),
    AuthInvalid(String),
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Core(e) => StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::AuthRequired(_) | Self::AuthInvalid(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn code(&self) -> &str {
        match self {
            Self::Core(e) => e.code(),
            Self::AuthRequired(_) => "AUTH_REQUIRED",
            Self::AuthInvalid(_) => "AUTH_INVALID",
            Self::BadRequest(_) => "BAD_REQUEST",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Core(e) => e.message(),
            Self::AuthRequired(m) | Self::AuthInvalid(m) | Self::BadRequest(m) => m,
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self::Core(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.code(), message = self.message(), "request failed");
        } else {
            tracing::warn!(code = self.code(), message = self.message(), "request rejected");
        }
        (status, Json(ErrorBody { code: self.code(), message: self.message() })).into_response()
    }
}
