// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::{Path, State};
use axum::Json;
use cloudevents::Event;

use crate::auth::AuthenticatedPrincipal;
use crate::cloudevents::cloudevent_to_payload;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /publish/{channel}: appends the inbound CloudEvent to the durable
/// log, then wakes any parked listeners.
pub async fn publish(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(event): Json<Event>,
) -> Result<(), ApiError> {
    let (owner, payload) = cloudevent_to_payload(&event, &principal.name)?;
    let record = state.event_log.append(&channel, &owner, payload).await?;
    state.bus.publish(&channel, record.sequence_id).await;
    Ok(())
}
