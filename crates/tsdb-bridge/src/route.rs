//! Single-entry-point HTTP exposure of a [`BridgeHost`], gated behind the
//! `http` feature. One function builds the router, and there is exactly
//! one route rather than a dozen, since the bridge protocol is already its
//! own envelope-level dispatch.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};

use crate::envelope::{Request, Response};
use crate::host::BridgeHost;

pub fn build_router(host: Arc<BridgeHost>) -> Router {
    Router::new().route("/bridge", post(handle_bridge)).with_state(host)
}

async fn handle_bridge(State(host): State<Arc<BridgeHost>>, Json(request): Json<Request>) -> Json<Response> {
    Json(host.handle(request).await)
}
