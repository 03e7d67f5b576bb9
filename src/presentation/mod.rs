// Presentation layer - HTTP routes over the chart registry
pub mod app_state;
pub mod handlers;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    delete_chart, get_chart, health_check, list_charts, patch_chart, put_chart, render_chart,
    stream_chart,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// Compression is applied per response by the handlers, so no CompressionLayer here.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/charts", get(list_charts))
        .route("/charts/render", post(render_chart))
        .route("/charts/stream", post(stream_chart))
        .route(
            "/charts/:name",
            get(get_chart).put(put_chart).patch(patch_chart).delete(delete_chart),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
