pub use errors::{Endpoint, UpstreamError};

use crate::model::{GeoLocation, RawWeatherPayload};
use crate::settings::OpenWeatherSettings;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time;
use url::Url;

pub const DEFAULT_GEOCODING_URL: &str = "http://api.openweathermap.org/geo/1.0/direct";
pub const DEFAULT_CURRENT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

pub trait GeocodingApi: Send + Sync {
    /// Best match for `city`, or `None` when the provider knows no such place.
    async fn resolve(
        &self, city: &str, api_key: &Secret<String>,
    ) -> Result<Option<GeoLocation>, UpstreamError>;
}

pub trait CurrentWeatherApi: Send + Sync {
    async fn current_weather(
        &self, location: &GeoLocation, api_key: &Secret<String>,
    ) -> Result<RawWeatherPayload, UpstreamError>;
}

#[derive(Debug, Clone)]
pub enum OpenWeatherServices {
    OpenWeather(OpenWeatherApi),
    Canned(CannedWeatherServices),
}

impl GeocodingApi for OpenWeatherServices {
    async fn resolve(
        &self, city: &str, api_key: &Secret<String>,
    ) -> Result<Option<GeoLocation>, UpstreamError> {
        match self {
            Self::OpenWeather(svc) => svc.resolve(city, api_key).await,
            Self::Canned(svc) => svc.resolve(city, api_key).await,
        }
    }
}

impl CurrentWeatherApi for OpenWeatherServices {
    async fn current_weather(
        &self, location: &GeoLocation, api_key: &Secret<String>,
    ) -> Result<RawWeatherPayload, UpstreamError> {
        match self {
            Self::OpenWeather(svc) => svc.current_weather(location, api_key).await,
            Self::Canned(svc) => svc.current_weather(location, api_key).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenWeatherApi {
    client: Client,
    geocoding_url: Url,
    current_weather_url: Url,
}

impl OpenWeatherApi {
    pub fn new(
        geocoding_url: Url, current_weather_url: Url, request_timeout: Option<time::Duration>,
    ) -> Result<Self, UpstreamError> {
        for url in [&geocoding_url, &current_weather_url] {
            if url.cannot_be_a_base() {
                return Err(UpstreamError::NotABaseUrl(url.clone()));
            }
        }

        let client = Self::make_http_client(request_timeout)?;
        Ok(Self { client, geocoding_url, current_weather_url })
    }

    pub fn from_settings(settings: &OpenWeatherSettings) -> Result<Self, UpstreamError> {
        Self::new(
            settings.geocoding_url.clone(),
            settings.current_weather_url.clone(),
            settings.request_timeout,
        )
    }

    fn make_http_client(request_timeout: Option<time::Duration>) -> Result<Client, UpstreamError> {
        let builder = Client::builder()
            .pool_idle_timeout(time::Duration::from_secs(60))
            .pool_max_idle_per_host(5);

        let builder = match request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        };

        builder
            .build()
            .map_err(|error| UpstreamError::HttpClient(error.to_string()))
    }

    async fn fetch_json<T: DeserializeOwned>(
        &self, endpoint: Endpoint, url: Url,
    ) -> Result<T, UpstreamError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|error| UpstreamError::from_transport(endpoint, error))?;
        log_response(endpoint, &response);

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| UpstreamError::from_transport(endpoint, error))?;

        if !status.is_success() {
            return Err(UpstreamError::from_status(endpoint, status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|error| UpstreamError::Malformed {
            endpoint,
            message: error.to_string(),
        })
    }
}

impl GeocodingApi for OpenWeatherApi {
    #[instrument(level = "debug", skip(self, api_key), err)]
    async fn resolve(
        &self, city: &str, api_key: &Secret<String>,
    ) -> Result<Option<GeoLocation>, UpstreamError> {
        let mut url = self.geocoding_url.clone();
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("limit", "1")
            .append_pair("appid", api_key.expose_secret());

        // a `null` body is answered like an empty match list
        let matches: Option<Vec<OwGeocodingMatch>> =
            self.fetch_json(Endpoint::Geocoding, url).await?;
        let Some(best) = matches.into_iter().flatten().next() else {
            return Ok(None);
        };

        let country = best.country.unwrap_or_default();
        let location = GeoLocation::new(best.lat, best.lon, best.name, country).map_err(|error| {
            UpstreamError::Malformed { endpoint: Endpoint::Geocoding, message: error.to_string() }
        })?;
        debug!(%location, "resolved {city}");
        Ok(Some(location))
    }
}

impl CurrentWeatherApi for OpenWeatherApi {
    #[instrument(level = "debug", skip(self, location, api_key), fields(%location), err)]
    async fn current_weather(
        &self, location: &GeoLocation, api_key: &Secret<String>,
    ) -> Result<RawWeatherPayload, UpstreamError> {
        let mut url = self.current_weather_url.clone();
        url.query_pairs_mut()
            .append_pair("lat", &location.latitude().to_string())
            .append_pair("lon", &location.longitude().to_string())
            .append_pair("appid", api_key.expose_secret())
            .append_pair("units", "metric");

        let current: OwCurrentWeather = self.fetch_json(Endpoint::CurrentWeather, url).await?;
        current.into_payload().map_err(|message| UpstreamError::Malformed {
            endpoint: Endpoint::CurrentWeather,
            message,
        })
    }
}

fn log_response(endpoint: Endpoint, response: &Response) {
    let status = response.status();
    if status.is_success() || status.is_informational() {
        debug!(%endpoint, ?status, "OpenWeather responded");
    } else if status.is_server_error() {
        error!(%endpoint, ?status, "OpenWeather responded with a server error");
    } else {
        warn!(%endpoint, ?status, "OpenWeather rejected the request");
    }
}

#[derive(Debug, Deserialize)]
struct OwGeocodingMatch {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentWeather {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    sys: Option<OwSys>,
    main: OwMain,
    weather: Vec<OwCondition>,
    wind: OwWind,
    clouds: OwClouds,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    humidity: u8,
    pressure: i32,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: u8,
}

impl OwCurrentWeather {
    fn into_payload(self) -> Result<RawWeatherPayload, String> {
        let Some(primary) = self.weather.into_iter().next() else {
            return Err("no weather condition reported".to_string());
        };

        if 100 < self.main.humidity {
            return Err(format!("humidity {}% is out of range", self.main.humidity));
        }

        if 100 < self.clouds.all {
            return Err(format!("cloud coverage {}% is out of range", self.clouds.all));
        }

        Ok(RawWeatherPayload {
            name: self.name.filter(|name| !name.is_empty()),
            country: self.sys.and_then(|sys| sys.country).filter(|c| !c.is_empty()),
            temperature: self.main.temp,
            feels_like: self.main.feels_like,
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            condition: primary.main,
            description: primary.description,
            icon: primary.icon,
            wind_speed: self.wind.speed,
            clouds: self.clouds.all,
        })
    }
}

/// Fixed provider answers, with call counters, standing in for OpenWeather.
#[derive(Debug, Clone)]
pub struct CannedWeatherServices {
    geocoding: Result<Option<GeoLocation>, UpstreamError>,
    current_weather: Result<RawWeatherPayload, UpstreamError>,
    geocoding_calls: Arc<AtomicUsize>,
    current_weather_calls: Arc<AtomicUsize>,
}

impl CannedWeatherServices {
    pub fn new(
        geocoding: Result<Option<GeoLocation>, UpstreamError>,
        current_weather: Result<RawWeatherPayload, UpstreamError>,
    ) -> Self {
        Self {
            geocoding,
            current_weather,
            geocoding_calls: Arc::default(),
            current_weather_calls: Arc::default(),
        }
    }

    /// Overcast London.
    pub fn happy_path() -> Self {
        let london = GeoLocation::new(51.5074, -0.1278, "London", "GB");
        let payload = RawWeatherPayload {
            name: Some("London".to_string()),
            country: Some("GB".to_string()),
            temperature: 15.0,
            feels_like: 14.0,
            humidity: 70,
            pressure: 1012,
            condition: "Clouds".to_string(),
            description: "overcast clouds".to_string(),
            icon: "04d".to_string(),
            wind_speed: 3.5,
            clouds: 90,
        };

        let geocoding = london.map(Some).map_err(|error| UpstreamError::Malformed {
            endpoint: Endpoint::Geocoding,
            message: error.to_string(),
        });
        Self::new(geocoding, Ok(payload))
    }

    pub fn geocoding_calls(&self) -> usize {
        self.geocoding_calls.load(Ordering::SeqCst)
    }

    pub fn current_weather_calls(&self) -> usize {
        self.current_weather_calls.load(Ordering::SeqCst)
    }
}

impl GeocodingApi for CannedWeatherServices {
    async fn resolve(
        &self, _city: &str, _api_key: &Secret<String>,
    ) -> Result<Option<GeoLocation>, UpstreamError> {
        self.geocoding_calls.fetch_add(1, Ordering::SeqCst);
        self.geocoding.clone()
    }
}

impl CurrentWeatherApi for CannedWeatherServices {
    async fn current_weather(
        &self, _location: &GeoLocation, _api_key: &Secret<String>,
    ) -> Result<RawWeatherPayload, UpstreamError> {
        self.current_weather_calls.fetch_add(1, Ordering::SeqCst);
        self.current_weather.clone()
    }
}

mod errors {
    use strum_macros::Display;
    use thiserror::Error;
    use url::Url;

    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
    #[strum(serialize_all = "snake_case")]
    pub enum Endpoint {
        Geocoding,
        CurrentWeather,
    }

    /// Failure calling an OpenWeather endpoint. Messages never carry the API key.
    #[derive(Debug, Clone, PartialEq, Error)]
    pub enum UpstreamError {
        #[error("supplied OpenWeather url is not a base url to query: {0}")]
        NotABaseUrl(Url),

        #[error("failed to build OpenWeather HTTP client: {0}")]
        HttpClient(String),

        #[error("{endpoint} responded with status {status}: {}", .message.as_deref().unwrap_or("<no message>"))]
        Status { endpoint: Endpoint, status: u16, message: Option<String> },

        #[error("no response from {endpoint}: {message}")]
        Unreachable { endpoint: Endpoint, message: String },

        #[error("failed to prepare {endpoint} request: {message}")]
        LocalFault { endpoint: Endpoint, message: String },

        #[error("malformed {endpoint} response: {message}")]
        Malformed { endpoint: Endpoint, message: String },
    }

    impl UpstreamError {
        pub(super) fn from_transport(endpoint: Endpoint, error: reqwest::Error) -> Self {
            let is_builder = error.is_builder();
            let message = error.without_url().to_string();
            if is_builder {
                Self::LocalFault { endpoint, message }
            } else {
                Self::Unreachable { endpoint, message }
            }
        }

        /// Pulls the provider's `message` field out of an error body, when there is one.
        pub(super) fn from_status(endpoint: Endpoint, status: u16, body: &str) -> Self {
            let message = serde_json::from_str::<serde_json::Value>(body)
                .ok()
                .and_then(|body| body.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .filter(|message| !message.is_empty());

            Self::Status { endpoint, status, message }
        }
    }
}
