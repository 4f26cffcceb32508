mod location;
mod report;

pub use location::{GeoLocation, LocationError, WeatherQuery};
pub use report::{normalize, Coordinates, RawWeatherPayload, WeatherReport};
