mod api_errors;
mod api_result;
mod health_routes;
mod state;
mod weather_routes;

pub use crate::server::api_errors::{ApiBootstrapError, ApiError};
pub use crate::server::api_result::ErrorReport;
pub use crate::server::health_routes::{HealthStatus, HealthStatusReport};
pub use crate::server::state::AppState;

use crate::server::api_result::HttpError;
use crate::settings::HttpApiSettings;
use crate::Settings;
use axum::extract::OriginalUri;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Router};
use std::fmt;
use std::net::TcpListener;
use std::time::Duration;
use tokio::signal;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::ServiceBuilderExt;
use utoipa::OpenApi;
use utoipa_swagger_ui::{SwaggerUi, Url as SwaggerUrl};

pub type HttpJoinHandle = JoinHandle<Result<(), ApiError>>;

pub struct Server {
    port: u16,
    server_handle: HttpJoinHandle,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server").field("port", &self.port).finish()
    }
}

impl Server {
    #[instrument(level = "debug", skip(settings), err)]
    pub async fn build(state: AppState, settings: &Settings) -> Result<Self, ApiError> {
        let address = settings.http_api.address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|err| ApiError::Bootstrap(err.into()))?;
        tracing::info!(
            "{:?} API listening on {address}: {listener:?}",
            std::env::current_exe()
        );
        let std_listener = listener.into_std().map_err(|err| ApiError::Bootstrap(err.into()))?;
        let port = std_listener
            .local_addr()
            .map_err(|err| ApiError::Bootstrap(err.into()))?
            .port();

        let run_params = RunParameters::from_settings(settings);
        let server_handle = run_http_server(std_listener, state, &run_params).await?;
        tracing::info!("Weather API endpoint: http://localhost:{port}/api/weather");
        Ok(Self { port, server_handle })
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), ApiError> {
        self.server_handle.await?
    }
}

#[derive(Debug, Clone)]
pub struct RunParameters {
    pub http_api: HttpApiSettings,
}

impl RunParameters {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { http_api: settings.http_api.clone() }
    }

    pub const fn timeout(&self) -> Option<Duration> {
        self.http_api.timeout
    }
}

#[derive(Copy, Clone)]
struct MyMakeRequestId;

impl tower_http::request_id::MakeRequestId for MyMakeRequestId {
    fn make_request_id<B>(
        &mut self, _request: &Request<B>,
    ) -> Option<tower_http::request_id::RequestId> {
        let request_id = HeaderValue::from_str(::cuid2::create_id().as_str()).ok()?;
        Some(tower_http::request_id::RequestId::new(request_id))
    }
}

/// Routes and middleware of the proxy, without binding a listener.
pub fn router(state: AppState, params: &RunParameters) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(axum::error_handling::HandleErrorLayer::new(
            handle_api_error,
        ))
        .option_layer(params.timeout().map(tower::timeout::TimeoutLayer::new))
        .compression()
        .trace_for_http()
        .set_x_request_id(MyMakeRequestId)
        .propagate_x_request_id()
        .layer(CorsLayer::permissive());

    let api_routes = Router::new()
        .merge(health_routes::api())
        .merge(weather_routes::api())
        .with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").urls(vec![
            (
                SwaggerUrl::with_primary("weather_api", "/api-doc/weather-openapi.json", true),
                weather_routes::WeatherApiDoc::openapi(),
            ),
            (
                SwaggerUrl::new("health_api", "/api-doc/health-openapi.json"),
                health_routes::HealthApiDoc::openapi(),
            ),
        ]))
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware_stack)
}

#[instrument(level = "debug", err)]
pub async fn run_http_server(
    listener: TcpListener, state: AppState, params: &RunParameters,
) -> Result<HttpJoinHandle, ApiError> {
    let app = router(state, params);

    listener.set_nonblocking(true)?;
    let listener_t = tokio::net::TcpListener::from_std(listener)?;
    let handle = tokio::spawn(async move {
        debug!(app_routes=?app, "starting API server...");
        let server = axum::serve(listener_t, app.into_make_service());
        let graceful = server.with_graceful_shutdown(shutdown_signal());
        graceful.await?;
        info!("{:?} API shutting down", std::env::current_exe());
        Ok(())
    });

    Ok(handle)
}

async fn fallback(OriginalUri(uri): OriginalUri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("No route found for {uri}"))
}

async fn handle_api_error(error: BoxError) -> Response {
    if error.is::<tower::timeout::error::Elapsed>() {
        HttpError::Timeout { error: ErrorReport::new(format!("REQUEST TIMEOUT: {error}")) }
            .into_response()
    } else {
        error!(%error, "unhandled middleware error");
        HttpError::Internal { error: ErrorReport::new("An unexpected error occurred") }
            .into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            },
            Err(error) => {
                error!(?error, "failed to install terminate signal handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("signal received, starting graceful shutdown");
}
