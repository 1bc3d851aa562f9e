// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use axum::extract::{Query, State};
use axum::Json;
use kernelci_core::query::Filter;
use kernelci_core::store::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use serde::Serialize;

use crate::error::ApiError;
use crate::state::AppState;

const RESERVED_PARAMS: &[&str] = &["limit", "offset"];

fn parse_filter(params: &[(String, String)]) -> Result<Filter, ApiError> {
    let clauses = params.iter().filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str())).cloned();
    Filter::parse(clauses).map_err(ApiError::from)
}

fn parse_paging(params: &[(String, String)]) -> (usize, usize) {
    let limit = params
        .iter()
        .find(|(k, _)| k == "limit")
        .and_then(|(_, v)| v.parse().ok())
        .unwrap_or(DEFAULT_QUERY_LIMIT);
    let offset = params.iter().find(|(k, _)| k == "offset").and_then(|(_, v)| v.parse().ok()).unwrap_or(0);
    (limit.min(MAX_QUERY_LIMIT), offset)
}

#[derive(Serialize)]
pub struct QueryResponse {
    pub items: Vec<kernelci_core::node::Node>,
    pub total: usize,
}

/// GET /nodes: arbitrary dotted-path query params, with reserved
/// `limit`/`offset` for paging.
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<QueryResponse>, ApiError> {
    let filter = parse_filter(&params)?;
    let (limit, offset) = parse_paging(&params);
    let page = state.store.query(&filter, limit, offset).await?;
    Ok(Json(QueryResponse { items: page.items, total: page.total }))
}

/// GET /count.
pub async fn count(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<usize>, ApiError> {
    let filter = parse_filter(&params)?;
    Ok(Json(state.store.count(&filter).await?))
}
