use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Default, Clone, Parser, PartialEq, Eq)]
#[clap(author, version, about)]
pub struct CliOptions {
    /// Explicit configuration to load, bypassing the default `./resources/application.yaml`.
    /// Secrets, environment variables, and explicit overrides are still applied on top.
    #[clap(short, long, value_name = "PATH_TO_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// specify path to secrets configuration file (e.g., holding `openweather.api_key`)
    #[clap(long, value_name = "PATH_TO_SECRETS_FILE")]
    pub secrets: Option<PathBuf>,

    /// Override the HTTP listen port, taking precedence over the `PORT` environment variable.
    #[clap(short, long)]
    pub port: Option<u16>,
}

pub(crate) const DEFAULT_CONFIG_PATH: &str = "./resources/application.yaml";

impl CliOptions {
    pub const fn env_port() -> &'static str {
        "PORT"
    }

    pub const fn env_api_key() -> &'static str {
        "OPENWEATHER_API_KEY"
    }

    pub const fn env_prefix() -> &'static str {
        "APP"
    }
}
