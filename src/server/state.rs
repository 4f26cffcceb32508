use crate::lookup::WeatherLookup;
use crate::server::api_errors::ApiBootstrapError;
use crate::services::openweather::{OpenWeatherApi, OpenWeatherServices};
use crate::services::request_log::{FileRequestLog, RequestLogRef, RequestLogWriter};
use crate::Settings;
use axum::extract::FromRef;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub weather_lookup: WeatherLookup,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish()
    }
}

impl FromRef<AppState> for WeatherLookup {
    fn from_ref(app: &AppState) -> Self {
        app.weather_lookup.clone()
    }
}

impl AppState {
    /// Wires the OpenWeather client and the file request log from settings. Must be called within
    /// a tokio runtime, since the request log writer task is spawned here. The returned writer
    /// should be finished once the server has stopped so queued entries reach the file.
    #[instrument(level = "debug", skip(settings), err)]
    pub async fn new(settings: &Settings) -> Result<(AppState, RequestLogWriter), ApiBootstrapError> {
        info!(?settings, "creating application state");

        let openweather = OpenWeatherApi::from_settings(&settings.openweather)?;
        let api_key = settings.openweather.api_key().cloned();
        if api_key.is_none() {
            warn!(
                "No OpenWeather API key configured; weather requests will fail until {} is set.",
                crate::CliOptions::env_api_key()
            );
        }

        let (request_log, writer) = FileRequestLog::spawn(settings.request_log.path.clone());
        info!(path=?request_log.path(), "requests are logged to file");
        let request_log: RequestLogRef = Arc::new(request_log);

        let weather_lookup =
            WeatherLookup::new(OpenWeatherServices::OpenWeather(openweather), api_key, request_log);

        Ok((Self::from_lookup(weather_lookup), writer))
    }

    pub fn from_lookup(weather_lookup: WeatherLookup) -> Self {
        Self { weather_lookup }
    }
}
