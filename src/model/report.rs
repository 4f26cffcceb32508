use super::GeoLocation;

/// Current conditions as reported by the weather provider, before normalization.
///
/// Only constructed from a provider response that carries every field the report needs, so
/// normalizing one never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWeatherPayload {
    pub name: Option<String>,
    pub country: Option<String>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: i32,
    pub condition: String,
    pub description: String,
    pub icon: String,
    pub wind_speed: f64,
    pub clouds: u8,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Normalized current weather returned by `GET /api/weather`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WeatherReport {
    pub city: String,
    pub country: String,

    /// degrees Celsius
    #[serde(rename = "temperature")]
    pub temperature_c: f64,

    /// degrees Celsius
    #[serde(rename = "feelsLike")]
    pub feels_like_c: f64,

    /// relative humidity percentage
    #[serde(rename = "humidity")]
    pub humidity_pct: u8,

    #[serde(rename = "pressure")]
    pub pressure_hpa: i32,

    /// primary condition group, e.g. "Clouds"
    #[serde(rename = "weather")]
    pub condition: String,

    pub description: String,

    #[serde(rename = "icon")]
    pub icon_code: String,

    /// metres per second
    #[serde(rename = "windSpeed")]
    pub wind_speed_ms: f64,

    /// cloud coverage percentage
    #[serde(rename = "clouds")]
    pub clouds_pct: u8,

    pub coordinates: Coordinates,
}

/// Reshape a provider payload into a [`WeatherReport`].
///
/// City and country come from the geocoding match, falling back to the weather provider's own
/// guess when the match left them empty.
pub fn normalize(payload: RawWeatherPayload, location: &GeoLocation) -> WeatherReport {
    let prefer_resolved = |resolved: &str, fallback: Option<String>| {
        if resolved.is_empty() {
            fallback.unwrap_or_default()
        } else {
            resolved.to_string()
        }
    };

    WeatherReport {
        city: prefer_resolved(location.resolved_name(), payload.name),
        country: prefer_resolved(location.country_code(), payload.country),
        temperature_c: payload.temperature,
        feels_like_c: payload.feels_like,
        humidity_pct: payload.humidity,
        pressure_hpa: payload.pressure,
        condition: payload.condition,
        description: payload.description,
        icon_code: payload.icon,
        wind_speed_ms: payload.wind_speed,
        clouds_pct: payload.clouds,
        coordinates: Coordinates { lat: location.latitude(), lon: location.longitude() },
    }
}
