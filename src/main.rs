use clap::Parser;
use weather_proxy::server::{self, AppState};
use weather_proxy::services::request_log::DEFAULT_FLUSH_GRACE;
use weather_proxy::CliOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = weather_proxy::setup_tracing::get_tracing_subscriber("info");
    weather_proxy::setup_tracing::init_subscriber(subscriber);

    let options = CliOptions::parse();
    let settings = load_settings(&options);
    tracing::info!("settings = {settings:?}");
    let settings = settings?;

    let (app_state, request_log_writer) = AppState::new(&settings).await?;

    let server = server::Server::build(app_state, &settings).await?;
    tracing::info!(?server, "starting server...");
    let stopped = server.run_until_stopped().await;

    // the server has released its request log handles; drain what is still queued
    request_log_writer.finish(DEFAULT_FLUSH_GRACE).await;
    stopped.map_err(|err| err.into())
}

#[tracing::instrument(level = "debug", ret, err)]
fn load_settings(options: &CliOptions) -> anyhow::Result<weather_proxy::Settings> {
    if options.config.is_none() {
        tracing::info!("No explicit configuration provided; using defaults and environment.");
    }

    weather_proxy::Settings::load(options).map_err(|err| err.into())
}
