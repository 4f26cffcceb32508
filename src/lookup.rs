//! City weather lookup: validate, geocode, fetch, normalize, and translate failures into the
//! statuses and messages a client sees. Every lookup appends exactly one request log entry.

use crate::model::{self, GeoLocation, WeatherQuery, WeatherReport};
use crate::services::openweather::{
    CurrentWeatherApi, GeocodingApi, OpenWeatherServices, UpstreamError,
};
use crate::services::request_log::{LogEntry, RequestLogRef};
use axum::http::StatusCode;
use secrecy::Secret;
use std::fmt;
use thiserror::Error;

const MISSING_CITY: &str = "N/A";
const CONFIGURATION_ERROR: &str = "Server configuration error. Please contact administrator.";
const INVALID_API_KEY_ERROR: &str = "Server configuration error - Invalid API key";
const UNREACHABLE_ERROR: &str = "Unable to reach weather service. Please try again later.";
const UNEXPECTED_ERROR: &str = "An unexpected error occurred";
const UNKNOWN_UPSTREAM_ERROR: &str = "Unknown error from weather API";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("City parameter is required")]
    Validation,

    #[error("City '{city}' not found")]
    NotFound { city: String },

    #[error("API key not configured")]
    Configuration,

    #[error("Invalid API key")]
    UpstreamClient,

    #[error("{message}")]
    UpstreamServer { status: StatusCode, message: String },

    #[error("No response from weather API")]
    UpstreamUnreachable,

    #[error("{message}")]
    Internal { message: String },
}

impl LookupError {
    /// Status recorded in the request log.
    pub fn logged_status(&self) -> StatusCode {
        match self {
            Self::UpstreamClient => StatusCode::UNAUTHORIZED,
            _ => self.status(),
        }
    }

    /// Status answered to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::UpstreamServer { status, .. } => *status,
            Self::UpstreamUnreachable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Configuration | Self::UpstreamClient | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Message answered to the client. Only validation, not-found and the provider's own error
    /// message are passed through; everything else is generic.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation | Self::NotFound { .. } | Self::UpstreamServer { .. } => {
                self.to_string()
            },
            Self::Configuration => CONFIGURATION_ERROR.to_string(),
            Self::UpstreamClient => INVALID_API_KEY_ERROR.to_string(),
            Self::UpstreamUnreachable => UNREACHABLE_ERROR.to_string(),
            Self::Internal { .. } => UNEXPECTED_ERROR.to_string(),
        }
    }
}

impl From<UpstreamError> for LookupError {
    fn from(error: UpstreamError) -> Self {
        match error {
            UpstreamError::Status { status: 401, .. } => Self::UpstreamClient,
            UpstreamError::Status { status, message, .. } => match StatusCode::from_u16(status) {
                Ok(status) => Self::UpstreamServer {
                    status,
                    message: message.unwrap_or_else(|| UNKNOWN_UPSTREAM_ERROR.to_string()),
                },
                Err(_) => Self::Internal {
                    message: format!("weather API answered with invalid status {status}"),
                },
            },
            UpstreamError::Unreachable { .. } => Self::UpstreamUnreachable,
            error @ (UpstreamError::NotABaseUrl(_)
            | UpstreamError::HttpClient(_)
            | UpstreamError::LocalFault { .. }
            | UpstreamError::Malformed { .. }) => Self::Internal { message: error.to_string() },
        }
    }
}

/// Runs weather lookups against the providers and records each outcome.
#[derive(Clone)]
pub struct WeatherLookup {
    services: OpenWeatherServices,
    api_key: Option<Secret<String>>,
    request_log: RequestLogRef,
}

impl fmt::Debug for WeatherLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeatherLookup")
            .field("services", &self.services)
            .field("api_key_configured", &self.api_key.is_some())
            .field("request_log", &self.request_log)
            .finish()
    }
}

impl WeatherLookup {
    pub fn new(
        services: OpenWeatherServices, api_key: Option<Secret<String>>, request_log: RequestLogRef,
    ) -> Self {
        Self { services, api_key, request_log }
    }

    pub const fn is_api_key_configured(&self) -> bool {
        self.api_key.is_some()
    }

    #[instrument(level = "debug", skip(self), ret, err(level = "debug"))]
    pub async fn handle(&self, query: &WeatherQuery) -> Result<WeatherReport, LookupError> {
        let Some(city) = query.city() else {
            let logged_city =
                query.city.as_deref().filter(|city| !city.is_empty()).unwrap_or(MISSING_CITY);
            return Err(self.record_failure(logged_city, LookupError::Validation));
        };

        match self.lookup(city).await {
            Ok(report) => {
                self.request_log.append(LogEntry::new(city, StatusCode::OK.as_u16(), "Success"));
                Ok(report)
            },
            Err(error) => Err(self.record_failure(city, error)),
        }
    }

    async fn lookup(&self, city: &str) -> Result<WeatherReport, LookupError> {
        let api_key = self.api_key.as_ref().ok_or(LookupError::Configuration)?;

        let location: GeoLocation = self
            .services
            .resolve(city, api_key)
            .await?
            .ok_or_else(|| LookupError::NotFound { city: city.to_string() })?;

        let payload = self.services.current_weather(&location, api_key).await?;
        Ok(model::normalize(payload, &location))
    }

    fn record_failure(&self, city: &str, error: LookupError) -> LookupError {
        let status = error.logged_status();
        if status.is_server_error() {
            error!(%city, %status, %error, "weather lookup failed");
        } else {
            warn!(%city, %status, %error, "weather lookup rejected");
        }

        self.request_log.append(LogEntry::new(city, status.as_u16(), error.to_string()));
        error
    }
}
