use std::process::ExitCode;

use checkin_rs::{AppConfig, ConfigSource, Orchestrator, deliver_all, sinks_from_config};
use env_logger::Env;

const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let source = ConfigSource::from_env();
    let config = AppConfig::load(&source);

    let default_level = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| {
            config
                .as_ref()
                .ok()
                .and_then(|config| config.global.log_level.clone())
        })
        .unwrap_or_else(|| "info".to_string());
    env_logger::init_from_env(Env::default().filter_or(LOG_LEVEL_ENV, default_level));

    let config = match config {
        Ok(config) => config,
        Err(err) => {
            log::error!("failed to load configuration from {source}: {err}");
            return ExitCode::FAILURE;
        }
    };
    log::info!("loaded configuration from {source}");

    log::info!("checkin-rs {} starting, {} site(s) configured", checkin_rs::VERSION, config.sites.len());

    let orchestrator = Orchestrator::new(config.global.clone());
    let results = orchestrator.run(&config.sites).await;

    let sinks = sinks_from_config(&config.notification);
    deliver_all(&sinks, &results).await;

    ExitCode::SUCCESS
}
