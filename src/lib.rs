#[macro_use]
extern crate serde;

#[macro_use]
extern crate tracing;

#[macro_use]
extern crate utoipa;

pub mod lookup;
pub mod model;
pub mod server;
pub mod services;
mod settings;
pub mod setup_tracing;

pub use settings::{
    CliOptions, HttpApiSettings, OpenWeatherSettings, RequestLogSettings, Settings, SettingsError,
};
