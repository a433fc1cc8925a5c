use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use telegram_bridge::config::{self, Config};
use telegram_bridge::{bot, diagnostics};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    diagnostics::init("telegram-bot");
    diagnostics::exit_code(run().await)
}

async fn run() -> Result<()> {
    let config_path = config::path_from_args();
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Socket: {}", config.socket.path.display());
    info!("  Channel: {}", config.bridge.channel);
    info!("  Allowed users: {:?}", config.telegram.allowed_user_ids);

    bot::run(&config).await
}
