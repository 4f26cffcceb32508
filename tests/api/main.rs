use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use claims::*;
use pretty_assertions::assert_eq;
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use url::Url;
use weather_proxy::lookup::WeatherLookup;
use weather_proxy::server::{self, AppState, RunParameters};
use weather_proxy::services::openweather::{OpenWeatherApi, OpenWeatherServices};
use weather_proxy::services::request_log::MemoryRequestLog;
use weather_proxy::HttpApiSettings;

type Calls = Arc<Mutex<Vec<(&'static str, HashMap<String, String>)>>>;

#[derive(Clone)]
struct StubOpenWeather {
    geocoding: (StatusCode, Value),
    current_weather: (StatusCode, Value),
    calls: Calls,
}

impl StubOpenWeather {
    fn new(geocoding: (StatusCode, Value), current_weather: (StatusCode, Value)) -> Self {
        Self { geocoding, current_weather, calls: Calls::default() }
    }

    fn calls(&self) -> Vec<(&'static str, HashMap<String, String>)> {
        self.calls.lock().unwrap().clone()
    }

    fn calls_to(&self, endpoint: &str) -> usize {
        self.calls().iter().filter(|(e, _)| *e == endpoint).count()
    }
}

async fn stub_geocoding(
    State(stub): State<StubOpenWeather>, Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    stub.calls.lock().unwrap().push(("geocoding", params));
    let (status, body) = stub.geocoding.clone();
    (status, Json(body))
}

async fn stub_current_weather(
    State(stub): State<StubOpenWeather>, Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    stub.calls.lock().unwrap().push(("current_weather", params));
    let (status, body) = stub.current_weather.clone();
    (status, Json(body))
}

async fn spawn_stub(stub: StubOpenWeather) -> SocketAddr {
    let app = Router::new()
        .route("/geo/1.0/direct", routing::get(stub_geocoding))
        .route("/data/2.5/weather", routing::get(stub_current_weather))
        .with_state(stub);

    let listener = assert_ok!(tokio::net::TcpListener::bind("127.0.0.1:0").await);
    let address = assert_ok!(listener.local_addr());
    tokio::spawn(async move { axum::serve(listener, app).await });
    address
}

struct TestApp {
    address: SocketAddr,
    request_log: MemoryRequestLog,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn(upstream: SocketAddr, api_key: Option<&str>) -> Self {
        let geocoding_url = assert_ok!(Url::parse(&format!("http://{upstream}/geo/1.0/direct")));
        let weather_url = assert_ok!(Url::parse(&format!("http://{upstream}/data/2.5/weather")));
        let openweather = assert_ok!(OpenWeatherApi::new(geocoding_url, weather_url, None));

        let request_log = MemoryRequestLog::new();
        let lookup = WeatherLookup::new(
            OpenWeatherServices::OpenWeather(openweather),
            api_key.map(|key| Secret::new(key.to_string())),
            Arc::new(request_log.clone()),
        );

        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0"));
        let address = assert_ok!(listener.local_addr());
        let params = RunParameters {
            http_api: HttpApiSettings {
                host: "127.0.0.1".to_string(),
                port: address.port(),
                timeout: None,
            },
        };
        assert_ok!(server::run_http_server(listener, AppState::from_lookup(lookup), &params).await);

        Self { address, request_log, client: reqwest::Client::new() }
    }

    async fn get(&self, path_and_query: &str) -> (u16, Value) {
        let response = assert_ok!(
            self.client.get(format!("http://{}{path_and_query}", self.address)).send().await
        );
        let status = response.status().as_u16();
        let body = assert_ok!(response.json::<Value>().await);
        (status, body)
    }

    fn logged(&self) -> Vec<(String, u16, String)> {
        self.request_log
            .entries()
            .into_iter()
            .map(|e| (e.city, e.status_code, e.message))
            .collect()
    }
}

fn london_match() -> Value {
    json!([{
        "name": "London",
        "local_names": { "en": "London" },
        "lat": 51.5074,
        "lon": -0.1278,
        "country": "GB",
        "state": "England"
    }])
}

fn overcast_london() -> Value {
    json!({
        "coord": { "lon": -0.1278, "lat": 51.5074 },
        "weather": [{ "id": 804, "main": "Clouds", "description": "overcast clouds", "icon": "04d" }],
        "main": { "temp": 15, "feels_like": 14, "temp_min": 13, "temp_max": 16, "pressure": 1012, "humidity": 70 },
        "wind": { "speed": 3.5, "deg": 240 },
        "clouds": { "all": 90 },
        "sys": { "country": "GB" },
        "name": "London"
    })
}

fn init_tracing() {
    once_cell::sync::Lazy::force(&weather_proxy::setup_tracing::TEST_TRACING);
}

#[tokio::test]
async fn test_london_weather_end_to_end() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 200);
    assert_eq!(
        body,
        json!({
            "city": "London",
            "country": "GB",
            "temperature": 15.0,
            "feelsLike": 14.0,
            "humidity": 70,
            "pressure": 1012,
            "weather": "Clouds",
            "description": "overcast clouds",
            "icon": "04d",
            "windSpeed": 3.5,
            "clouds": 90,
            "coordinates": { "lat": 51.5074, "lon": -0.1278 }
        })
    );

    let calls = stub.calls();
    assert_eq!(calls.len(), 2);
    let (endpoint, geocoding) = &calls[0];
    assert_eq!(*endpoint, "geocoding");
    assert_eq!(geocoding.get("q").map(String::as_str), Some("London"));
    assert_eq!(geocoding.get("limit").map(String::as_str), Some("1"));
    assert_eq!(geocoding.get("appid").map(String::as_str), Some("test-key"));

    let (endpoint, weather) = &calls[1];
    assert_eq!(*endpoint, "current_weather");
    assert_eq!(weather.get("lat").map(String::as_str), Some("51.5074"));
    assert_eq!(weather.get("lon").map(String::as_str), Some("-0.1278"));
    assert_eq!(weather.get("units").map(String::as_str), Some("metric"));

    assert_eq!(app.logged(), vec![("London".to_string(), 200, "Success".to_string())]);

    let (status, again) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 200);
    assert_eq!(again, body);
}

#[tokio::test]
async fn test_city_with_spaces_is_url_encoded() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    let (status, _) = app.get("/api/weather?city=New%20York%2C%20US").await;
    assert_eq!(status, 200);
    let calls = stub.calls();
    assert_eq!(calls[0].1.get("q").map(String::as_str), Some("New York, US"));
}

#[tokio::test]
async fn test_unknown_city_is_not_found() {
    init_tracing();
    let stub = StubOpenWeather::new((StatusCode::OK, json!([])), (StatusCode::OK, overcast_london()));
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=Zzzznotacity").await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "error": "City 'Zzzznotacity' not found" }));
    assert_eq!(stub.calls_to("current_weather"), 0);
    assert_eq!(
        app.logged(),
        vec![("Zzzznotacity".to_string(), 404, "City 'Zzzznotacity' not found".to_string())]
    );
}

#[tokio::test]
async fn test_null_geocoding_answer_is_not_found() {
    init_tracing();
    let stub = StubOpenWeather::new((StatusCode::OK, Value::Null), (StatusCode::OK, overcast_london()));
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=Atlantis").await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "error": "City 'Atlantis' not found" }));
    assert_eq!(stub.calls_to("current_weather"), 0);
    assert_eq!(
        app.logged(),
        vec![("Atlantis".to_string(), 404, "City 'Atlantis' not found".to_string())]
    );
}

#[tokio::test]
async fn test_missing_city_is_bad_request() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    for path in ["/api/weather", "/api/weather?city=", "/api/weather?city=%20%20"] {
        let (status, body) = app.get(path).await;
        assert_eq!(status, 400, "path: {path}");
        assert_eq!(body, json!({ "error": "City parameter is required" }));
    }

    assert_eq!(stub.calls_to("geocoding"), 0);
    assert_eq!(app.logged().len(), 3);
    assert_eq!(app.logged()[0].0, "N/A");
}

#[tokio::test]
async fn test_missing_api_key_is_configuration_error() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, None).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 500);
    assert_eq!(
        body,
        json!({ "error": "Server configuration error. Please contact administrator." })
    );
    assert!(stub.calls().is_empty());
    assert_eq!(
        app.logged(),
        vec![("London".to_string(), 500, "API key not configured".to_string())]
    );
}

#[tokio::test]
async fn test_rejected_api_key_is_hidden() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (
            StatusCode::UNAUTHORIZED,
            json!({ "cod": 401, "message": "Invalid API key. Please see https://openweathermap.org/faq#error401 for more info." }),
        ),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub).await, Some("stale-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "error": "Server configuration error - Invalid API key" }));
    assert_eq!(
        app.logged(),
        vec![("London".to_string(), 401, "Invalid API key".to_string())]
    );
}

#[tokio::test]
async fn test_weather_failure_status_is_forwarded() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::TOO_MANY_REQUESTS, json!({ "cod": 429, "message": "Your account is temporary blocked" })),
    );
    let app = TestApp::spawn(spawn_stub(stub).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 429);
    assert_eq!(body, json!({ "error": "Your account is temporary blocked" }));
    assert_eq!(
        app.logged(),
        vec![("London".to_string(), 429, "Your account is temporary blocked".to_string())]
    );
}

#[tokio::test]
async fn test_geocoding_failure_status_is_forwarded() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::TOO_MANY_REQUESTS, json!({ "cod": 429, "message": "Your account is temporary blocked" })),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 429);
    assert_eq!(body, json!({ "error": "Your account is temporary blocked" }));
    assert_eq!(stub.calls_to("current_weather"), 0);
    assert_eq!(
        app.logged(),
        vec![("London".to_string(), 429, "Your account is temporary blocked".to_string())]
    );
}

#[tokio::test]
async fn test_geocoding_failure_without_message_uses_fallback() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::BAD_GATEWAY, json!({ "cod": 502 })),
        (StatusCode::OK, overcast_london()),
    );
    let app = TestApp::spawn(spawn_stub(stub.clone()).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 502);
    assert_eq!(body, json!({ "error": "Unknown error from weather API" }));
    assert_eq!(stub.calls_to("current_weather"), 0);
    assert_eq!(
        app.logged(),
        vec![("London".to_string(), 502, "Unknown error from weather API".to_string())]
    );
}

#[tokio::test]
async fn test_weather_failure_without_message_uses_fallback() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::BAD_GATEWAY, json!({ "cod": 502 })),
    );
    let app = TestApp::spawn(spawn_stub(stub).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 502);
    assert_eq!(body, json!({ "error": "Unknown error from weather API" }));
}

#[tokio::test]
async fn test_unreachable_provider_is_service_unavailable() {
    init_tracing();
    let closed = {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0"));
        assert_ok!(listener.local_addr())
    };
    let app = TestApp::spawn(closed, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 503);
    assert_eq!(
        body,
        json!({ "error": "Unable to reach weather service. Please try again later." })
    );
    assert_eq!(
        app.logged(),
        vec![("London".to_string(), 503, "No response from weather API".to_string())]
    );
}

#[tokio::test]
async fn test_malformed_weather_payload_is_unexpected_error() {
    init_tracing();
    let stub = StubOpenWeather::new(
        (StatusCode::OK, london_match()),
        (StatusCode::OK, json!({ "name": "London", "weather": [] })),
    );
    let app = TestApp::spawn(spawn_stub(stub).await, Some("test-key")).await;

    let (status, body) = app.get("/api/weather?city=London").await;
    assert_eq!(status, 500);
    assert_eq!(body, json!({ "error": "An unexpected error occurred" }));

    let logged = app.logged();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].1, 500);
    assert!(logged[0].2.starts_with("malformed current_weather response"), "{:?}", logged[0]);
}

#[tokio::test]
async fn test_health_check() {
    init_tracing();
    let closed = {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0"));
        assert_ok!(listener.local_addr())
    };
    let app = TestApp::spawn(closed, None).await;

    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], json!("ok"));
    let timestamp = assert_some!(body["timestamp"].as_str());
    assert_ok!(chrono::DateTime::parse_from_rfc3339(timestamp));
    assert!(app.logged().is_empty());
}

#[tokio::test]
async fn test_unknown_route_falls_back() {
    init_tracing();
    let closed = {
        let listener = assert_ok!(TcpListener::bind("127.0.0.1:0"));
        assert_ok!(listener.local_addr())
    };
    let app = TestApp::spawn(closed, None).await;

    let response = assert_ok!(
        app.client.get(format!("http://{}/api/forecast", app.address)).send().await
    );
    assert_eq!(response.status().as_u16(), 404);
    let body = assert_ok!(response.text().await);
    assert_eq!(body, "No route found for /api/forecast");
}
