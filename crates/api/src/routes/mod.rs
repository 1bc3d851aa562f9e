// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod events;
pub mod listen;
pub mod node;
pub mod nodes;
pub mod publish;
pub mod subscribe;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Channel node mutations are published on.
pub const NODE_CHANNEL: &str = "node";

/// Build the full HTTP router: wires every route onto shared `AppState`
/// behind CORS and request tracing, mirroring
/// `crates/mux/src/transport/mod.rs`'s `Router::new().route(...).layer(...)`
/// composition.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/node", post(node::create))
        .route("/node/{id}", get(node::get).put(node::update))
        .route("/nodes", get(nodes::query))
        .route("/count", get(nodes::count))
        .route("/subscribe/{channel}", post(subscribe::subscribe))
        .route("/unsubscribe/{id}", post(subscribe::unsubscribe))
        .route("/listen/{id}", get(listen::listen))
        .route("/publish/{channel}", post(publish::publish))
        .route("/events", get(events::list))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
