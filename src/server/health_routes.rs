use super::state::AppState;
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use strum_macros::{Display, EnumString, VariantNames};

#[derive(OpenApi)]
#[openapi(
paths(serve_health),
components(
schemas(HealthStatus, HealthStatusReport)
),
tags(
(name = "health", description = "Weather Proxy health")
)
)]
pub struct HealthApiDoc;

pub fn api() -> Router<AppState> {
    Router::new().route("/health", routing::get(serve_health))
}

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, VariantNames, ToSchema, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
#[serde(rename_all = "camelCase")]
pub enum HealthStatus {
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, ToSchema, Serialize, Deserialize)]
pub struct HealthStatusReport {
    pub status: HealthStatus,

    /// ISO 8601, UTC
    pub timestamp: String,
}

impl HealthStatusReport {
    pub fn at(status: HealthStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

#[utoipa::path(
get,
path = "/health",
context_path = "/api",
tag = "health",
responses(
(status = 200, description = "system up", body = HealthStatusReport),
)
)]
#[axum::debug_handler]
#[instrument(level = "trace")]
async fn serve_health() -> impl IntoResponse {
    Json(HealthStatusReport::at(HealthStatus::Ok, Utc::now()))
}
