use std::sync::Arc;
use std::time::Duration;

use paygate_core::audit::TracingAuditSink;
use paygate_core::config::{AppConfig, ConfigError};
use paygate_core::{ApprovalStore, InMemoryApprovalStore};
use paygate_telegram::bot::{build_bot, TelegramGateway, TelegramTransport};
use paygate_telegram::gateway::Gateway;
use paygate_telegram::polling::{TransportError, UpdateTransport};
use paygate_telegram::session::SessionRegistry;
use paygate_telegram::{
    conversation_dispatcher, DialogService, DialogSettings, PollingRunner, ReconnectPolicy,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<dyn ApprovalStore>,
    pub sessions: Arc<SessionRegistry>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("telegram client setup failed: {0}")]
    Transport(#[from] TransportError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let bot = build_bot(&config.telegram.bot_token, config.polling.timeout_secs)?;
    let transport = Arc::new(TelegramTransport::new(bot.clone(), config.polling.timeout_secs));
    let gateway = Arc::new(TelegramGateway::new(bot));
    assemble(config, transport, gateway)
}

/// Wires the store, dialog service and runner around the given transport and gateway.
pub fn assemble(
    config: AppConfig,
    transport: Arc<dyn UpdateTransport>,
    gateway: Arc<dyn Gateway>,
) -> Result<Application, BootstrapError> {
    let admin = config.admin.required_identity()?;
    let store: Arc<dyn ApprovalStore> = Arc::new(InMemoryApprovalStore::new());
    let dialog = Arc::new(DialogService::new(
        DialogSettings { admin, owner_handle: config.admin.owner_handle.clone() },
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::new(TracingAuditSink),
    ));
    let sessions = dialog.sessions();

    let runner = PollingRunner::new(
        transport,
        conversation_dispatcher(dialog),
        ReconnectPolicy {
            max_retries: config.polling.max_retries,
            base_delay_ms: config.polling.base_delay_ms,
            max_delay_ms: config.polling.max_delay_ms,
        },
    )
    .with_shutdown_grace(Duration::from_secs(config.server.graceful_shutdown_secs))
    .with_failure_notices(gateway);

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        admin = admin.0,
        "application assembled"
    );

    Ok(Application { config, store, sessions, runner })
}
