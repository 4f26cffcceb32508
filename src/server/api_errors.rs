use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("failed to bootstrap server API: {0}")]
    Bootstrap(#[from] ApiBootstrapError),

    #[error("failed joining with thread: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ApiBootstrapError {
    #[error("failed to set up OpenWeather services: {0}")]
    OpenWeather(#[from] crate::services::openweather::UpstreamError),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}
