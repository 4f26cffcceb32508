use std::fmt;
use thiserror::Error;

/// Raw query parameters accepted by `GET /api/weather`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WeatherQuery {
    /// free-text city name, e.g. "London" or "Paris, FR"
    pub city: Option<String>,
}

impl WeatherQuery {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: Some(city.into()) }
    }

    /// The trimmed city, or `None` when the parameter is missing or blank.
    pub fn city(&self) -> Option<&str> {
        self.city.as_deref().map(str::trim).filter(|city| !city.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// Best-match coordinates for a city, as resolved by the geocoding provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoLocation {
    latitude: f64,
    longitude: f64,
    resolved_name: String,
    country_code: String,
}

impl GeoLocation {
    pub fn new(
        latitude: f64, longitude: f64, resolved_name: impl Into<String>,
        country_code: impl Into<String>,
    ) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::Latitude(latitude));
        }

        if !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::Longitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
            resolved_name: resolved_name.into(),
            country_code: country_code.into(),
        })
    }

    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn resolved_name(&self) -> &str {
        self.resolved_name.as_str()
    }

    pub fn country_code(&self) -> &str {
        self.country_code.as_str()
    }
}

impl fmt::Display for GeoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} ({}, {})",
            self.resolved_name, self.country_code, self.latitude, self.longitude
        )
    }
}
