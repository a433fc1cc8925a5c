use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use telegram_bridge::config::{self, Config};
use telegram_bridge::pipeline::Pipeline;
use telegram_bridge::router::{Role, Router};
use telegram_bridge::{broker, diagnostics};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    diagnostics::init("telegram-out");
    diagnostics::exit_code(run().await)
}

async fn run() -> Result<()> {
    let config_path = config::path_from_args();
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    let mut pipeline = Pipeline::new(Router::new(Role::Outbound), tokio::io::stdout());

    let Some(broker_config) = config.broker() else {
        pipeline.run(tokio::io::stdin()).await?;
        return Ok(());
    };

    let log = broker::connect(broker_config).await?;
    let messages = log.subscribe(&broker_config.outbound_topic).await?;
    info!("Consuming envelopes from topic {}", broker_config.outbound_topic);

    tokio::select! {
        result = pipeline.run_messages(messages) => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    log.disconnect().await?;
    Ok(())
}
