// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::{Path, State};
use axum::Json;
use kernelci_core::node::{Node, NodeDraft, NodePatch};
use uuid::Uuid;

use crate::auth::AuthenticatedPrincipal;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /node.
pub async fn create(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(draft): Json<NodeDraft>,
) -> Result<Json<Node>, ApiError> {
    let node = state.store.create(draft, &principal).await?;
    state.event_log.append(crate::routes::NODE_CHANNEL, &principal.name, serde_json::json!({"op": "created", "id": node.id})).await?;
    notify(&state).await;
    Ok(Json(node))
}

/// GET /node/{id}.
pub async fn get(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Node>, ApiError> {
    Ok(Json(state.store.get(id).await?))
}

/// PUT /node/{id}.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(patch): Json<NodePatch>,
) -> Result<Json<Node>, ApiError> {
    let node = state.store.update(id, patch, &principal).await?;
    state.event_log.append(crate::routes::NODE_CHANNEL, &principal.name, serde_json::json!({"op": "updated", "id": node.id})).await?;
    notify(&state).await;
    Ok(Json(node))
}

async fn notify(state: &AppState) {
    let seq = state.event_log.max_sequence_id(crate::routes::NODE_CHANNEL).await;
    state.bus.publish(crate::routes::NODE_CHANNEL, seq).await;
}
