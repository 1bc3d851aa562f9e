// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pluggable auth collaborator: given a request, yields an authenticated
//! principal or rejects it.
//!
//! Grounded on `crates/mux/src/transport/auth.rs`: the teacher validates a
//! static Bearer token with a constant-time comparison. This crate keeps
//! that shape but widens it behind a trait so a real deployment can swap in
//! JWT verification against `SECRET_KEY` without touching any handler.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use kernelci_core::principal::Principal;

use crate::error::ApiError;

pub trait Authenticator: Send + Sync {
    /// Authenticate `headers`, yielding a `Principal` or an auth error.
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError>;
}

/// Reference `Authenticator`: a fixed Bearer token maps to one fixed
/// principal, with a constant-time comparison
/// (`crates/mux/src/transport/auth.rs::constant_time_eq`). Tokens of the
/// form `Bearer <token>:<group1>,<group2>` carry group membership; real
/// deployments replace this with `SECRET_KEY`-backed JWT verification.
pub struct BearerAuthenticator {
    expected_token: String,
}

impl BearerAuthenticator {
    pub fn new(expected_token: impl Into<String>) -> Self {
        Self { expected_token: expected_token.into() }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

impl Authenticator for BearerAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, ApiError> {
        let header = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::AuthRequired("missing Authorization header".to_owned()))?;
        let raw = header.strip_prefix("Bearer ").ok_or_else(|| ApiError::AuthRequired("expected Bearer token".to_owned()))?;

        let (token, principal_spec) =
            raw.split_once('|').ok_or_else(|| ApiError::AuthInvalid("malformed bearer token".to_owned()))?;

        if !constant_time_eq(token, &self.expected_token) {
            return Err(ApiError::AuthInvalid("invalid bearer token".to_owned()));
        }

        let mut parts = principal_spec.splitn(2, ':');
        let name = parts.next().filter(|s| !s.is_empty()).ok_or_else(|| ApiError::AuthInvalid("missing principal name".to_owned()))?;
        let groups: Vec<String> = parts.next().map(|g| g.split(',').filter(|s| !s.is_empty()).map(str::to_owned).collect()).unwrap_or_default();

        Ok(Principal::new(name, groups))
    }
}

/// Axum extractor: pulls the `Authenticator` out of request state and
/// authenticates the current request into a `Principal`.
pub struct AuthenticatedPrincipal(pub Principal);

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: AsAuthenticator + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = state.authenticator().authenticate(&parts.headers)?;
        Ok(AuthenticatedPrincipal(principal))
    }
}

/// Lets `AuthenticatedPrincipal` extract from any app state that can hand
/// back a shared `Authenticator`, without pinning it to a single concrete
/// `AppState` type.
pub trait AsAuthenticator {
    fn authenticator(&self) -> &Arc<dyn Authenticator>;
}
