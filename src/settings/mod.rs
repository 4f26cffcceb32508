mod cli_options;
mod http_api_settings;
mod openweather_settings;

pub use cli_options::CliOptions;
pub use http_api_settings::HttpApiSettings;
pub use openweather_settings::{OpenWeatherSettings, RequestLogSettings};

use crate::services::openweather::{DEFAULT_CURRENT_WEATHER_URL, DEFAULT_GEOCODING_URL};
use config::{Config, Environment, File};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_REQUEST_LOG_PATH: &str = "logs/api-requests.log";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub http_api: HttpApiSettings,
    pub openweather: OpenWeatherSettings,
    pub request_log: RequestLogSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid {var} value {value:?}: {source}")]
    Port {
        var: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },
}

impl Settings {
    /// Layers, lowest precedence first: built-in defaults, the configuration file, the secrets
    /// file, `APP__`-prefixed environment variables, `PORT` / `OPENWEATHER_API_KEY`, and CLI
    /// overrides.
    #[instrument(level = "debug", err)]
    pub fn load(options: &CliOptions) -> Result<Self, SettingsError> {
        let mut builder = Config::builder()
            .set_default("http_api.host", "0.0.0.0")?
            .set_default("http_api.port", i64::from(DEFAULT_PORT))?
            .set_default("openweather.geocoding_url", DEFAULT_GEOCODING_URL)?
            .set_default("openweather.current_weather_url", DEFAULT_CURRENT_WEATHER_URL)?
            .set_default("request_log.path", DEFAULT_REQUEST_LOG_PATH)?;

        builder = match options.config.as_deref() {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => builder
                .add_source(File::from(Path::new(cli_options::DEFAULT_CONFIG_PATH)).required(false)),
        };

        if let Some(secrets) = options.secrets.as_deref() {
            builder = builder.add_source(File::from(secrets).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(CliOptions::env_prefix())
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let env_port = std::env::var(CliOptions::env_port())
            .ok()
            .filter(|port| !port.trim().is_empty())
            .map(|port| {
                port.trim().parse::<u16>().map_err(|source| SettingsError::Port {
                    var: CliOptions::env_port(),
                    value: port,
                    source,
                })
            })
            .transpose()?;
        let port = options.port.or(env_port);

        let api_key = std::env::var(CliOptions::env_api_key())
            .ok()
            .filter(|key| !key.trim().is_empty());

        let settings = builder
            .set_override_option("http_api.port", port.map(i64::from))?
            .set_override_option("openweather.api_key", api_key)?
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}
