// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthenticatedPrincipal;
use crate::cloudevents::envelope_to_cloudevent;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /listen/{id}: long-polls up to the configured wait budget, returning
/// a structured-mode CloudEvent on delivery or 204 on timeout.
pub async fn listen(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    AuthenticatedPrincipal(_principal): AuthenticatedPrincipal,
) -> Result<Response, ApiError> {
    state.registry.touch(id).await?;
    match state.delivery.listen(id, state.listen_wait_budget).await? {
        Some(envelope) => {
            let event = envelope_to_cloudevent(&envelope)?;
            Ok(event.into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}
