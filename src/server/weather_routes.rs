use crate::lookup::{LookupError, WeatherLookup};
use crate::model::{Coordinates, WeatherQuery, WeatherReport};
use crate::server::api_result::ErrorReport;
use crate::server::state::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::{routing, Json, Router};

#[derive(OpenApi)]
#[openapi(
paths(serve_city_weather),
components(
schemas(WeatherReport, Coordinates, ErrorReport)
),
tags((name = "weather", description = "Current weather by city"))
)]
pub struct WeatherApiDoc;

pub fn api() -> Router<AppState> {
    Router::new().route("/weather", routing::get(serve_city_weather))
}

#[utoipa::path(
get,
path = "/weather",
context_path = "/api",
tag = "weather",
params(WeatherQuery),
responses(
(status = 200, description = "Current weather for the city", body = WeatherReport),
(status = 400, description = "city parameter missing or blank", body = ErrorReport),
(status = 404, description = "city not found", body = ErrorReport),
(status = 500, description = "server configuration or unexpected error", body = ErrorReport),
(status = 503, description = "weather service unreachable", body = ErrorReport),
)
)]
#[axum::debug_handler(state = AppState)]
#[instrument(level = "debug", skip(lookup))]
async fn serve_city_weather(
    query: Result<Query<WeatherQuery>, QueryRejection>, State(lookup): State<WeatherLookup>,
) -> Result<Json<WeatherReport>, LookupError> {
    let query = query.map(|Query(query)| query).unwrap_or_else(|rejection| {
        warn!(%rejection, "unreadable weather query, treating city as missing");
        WeatherQuery::default()
    });

    info!(city=?query.city, "received request for weather data");
    lookup.handle(&query).await.map(Json)
}
