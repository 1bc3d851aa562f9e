// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SubscribeRequest {
    #[serde(default)]
    pub promiscuous: bool,
    #[serde(default)]
    pub subscriber_id: Option<String>,
}

#[derive(Serialize)]
pub struct SubscribeResponse {
    pub subscription_id: u64,
}

/// POST /subscribe/{channel}.
pub async fn subscribe(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let subscription_id = state.registry.subscribe(&channel, &principal, req.promiscuous, req.subscriber_id).await?;
    Ok(Json(SubscribeResponse { subscription_id }))
}

/// POST /unsubscribe/{id}.
pub async fn unsubscribe(State(state): State<AppState>, Path(id): Path<u64>) -> Result<(), ApiError> {
    state.registry.unsubscribe(id).await?;
    Ok(())
}
