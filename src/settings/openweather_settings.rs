use secrecy::{ExposeSecret, Secret};
use serde_with::serde_as;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct OpenWeatherSettings {
    #[serde(default)]
    pub api_key: Option<Secret<String>>,

    pub geocoding_url: Url,

    pub current_weather_url: Url,

    /// Outbound request timeout; transport default when absent.
    #[serde(alias = "request_timeout_secs")]
    #[serde_as(as = "Option<serde_with::DurationSeconds<u64>>")]
    pub request_timeout: Option<Duration>,
}

impl OpenWeatherSettings {
    /// The configured API key, treating a blank value as absent.
    pub fn api_key(&self) -> Option<&Secret<String>> {
        self.api_key.as_ref().filter(|key| !key.expose_secret().trim().is_empty())
    }
}

impl PartialEq for OpenWeatherSettings {
    fn eq(&self, other: &Self) -> bool {
        let key = |settings: &Self| settings.api_key().map(|key| key.expose_secret().clone());
        key(self) == key(other)
            && self.geocoding_url == other.geocoding_url
            && self.current_weather_url == other.current_weather_url
            && self.request_timeout == other.request_timeout
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RequestLogSettings {
    pub path: PathBuf,
}
