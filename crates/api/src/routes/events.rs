// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::{Query, State};
use axum::Json;
use cloudevents::Event;
use kernelci_core::event_log::DEFAULT_READ_FORWARD;
use serde::Deserialize;

use crate::cloudevents::record_to_cloudevent;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub channel: String,
    #[serde(default)]
    pub from: u64,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /events: the raw, ordered replay of a channel's durable log as
/// CloudEvents, for clients that want catch-up without going through
/// `Subscribe`/`Listen`.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<EventsParams>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_READ_FORWARD);
    let records = state.event_log.read_forward(&params.channel, params.from, limit).await;
    let events = records.iter().map(record_to_cloudevent).collect::<Result<Vec<_>, _>>()?;
    Ok(Json(events))
}
