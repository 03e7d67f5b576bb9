// HTTP request handlers
use crate::domain::chart_config::{ChartConfig, ChartType};
use crate::domain::error::{ChartError, ConfigurationError};
use crate::domain::patch::ChartConfigPatch;
use crate::infrastructure::chunked_json::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_response};
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;

type HandlerResult = Result<Response, ChartError>;

impl IntoResponse for ChartError {
    fn into_response(self) -> Response {
        let status = match &self {
            ChartError::Configuration(_) => StatusCode::BAD_REQUEST,
            ChartError::UnknownChart(_) => StatusCode::NOT_FOUND,
            ChartError::UnsupportedChartType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ChartError::Network(_) => StatusCode::BAD_GATEWAY,
            ChartError::Projection { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ChartError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = match &self {
            ChartError::Network(_) => json!({"error": self.to_string(), "noData": true}),
            _ => json!({"error": self.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

/// Decode a config or patch body. An unknown `type` is reported as unsupported
/// ahead of any other problem with the body.
fn decode_body<T: DeserializeOwned>(body: Value) -> Result<T, ChartError> {
    if let Some(chart_type) = body.get("type").and_then(Value::as_str) {
        chart_type.parse::<ChartType>()?;
    }
    serde_json::from_value(body).map_err(|e| ConfigurationError::Malformed(e.to_string()).into())
}

async fn respond<T: serde::Serialize>(
    status: StatusCode,
    data: &T,
    headers: &HeaderMap,
) -> Response {
    match json_response(status, data, accepts_brotli(headers)).await {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Render an ad-hoc chart config and wait for its projections
pub async fn render_chart(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> HandlerResult {
    let config: ChartConfig = decode_body(body)?;
    let gate = state.registry.gate();
    let snapshot = gate.run(state.renderer.render(&config)).await?;
    Ok(respond(StatusCode::OK, &snapshot, &headers).await)
}

/// Stream an ad-hoc chart as each of its queries lands
pub async fn stream_chart(
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> HandlerResult {
    let config: ChartConfig = decode_body(body)?;
    let admission = state.registry.gate().admit().await?;
    let rx = state.renderer.render_stream(&config, Some(admission))?;
    Ok(stream_from_receiver(rx, accepts_brotli(&headers)).into_response())
}

pub async fn list_charts(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let charts = state.registry.list().await;
    respond(StatusCode::OK, &charts, &headers).await
}

/// Store a chart config, replacing any previous one
pub async fn put_chart(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> HandlerResult {
    let config: ChartConfig = decode_body(body)?;
    let revision = state.registry.upsert(&name, config).await?;
    Ok(Json(json!({"name": name, "revision": revision})).into_response())
}

pub async fn patch_chart(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> HandlerResult {
    let patch: ChartConfigPatch = decode_body(body)?;
    let config = state.registry.patch(&name, patch).await?;
    Ok(Json(config.as_ref()).into_response())
}

/// Update a stored chart and return its fresh snapshot
pub async fn get_chart(
    Path(name): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    let snapshot = state.registry.update(&name).await?;
    Ok(respond(StatusCode::OK, snapshot.as_ref(), &headers).await)
}

pub async fn delete_chart(
    Path(name): Path<String>,
    State(state): State<Arc<AppState>>,
) -> HandlerResult {
    if state.registry.remove(&name).await {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ChartError::UnknownChart(name))
    }
}
