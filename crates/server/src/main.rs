mod bootstrap;
mod health;

use anyhow::Result;
use paygate_core::config::{AppConfig, LoadOptions, LogFormat};
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            init_logging("info", LogFormat::Compact);
            tracing::error!(
                event_name = "system.bootstrap.config_invalid",
                correlation_id = "bootstrap",
                error = %error,
                "refusing to start with invalid configuration"
            );
            return Err(error.into());
        }
    };
    init_logging(&config.logging.level, config.logging.format);

    let app = bootstrap::bootstrap_with_config(config)?;

    if app.config.server.health_enabled {
        health::spawn(
            &app.config.server.bind_address,
            app.config.server.health_check_port,
            health::HealthState::new(app.store.clone(), app.sessions.clone()),
        )
        .await?;
    }

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        "paygate-server polling for updates"
    );
    app.runner.run_until(wait_for_shutdown()).await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "paygate-server stopped"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "ctrl-c handler unavailable; running until the stream ends");
        std::future::pending::<()>().await;
    }
}
