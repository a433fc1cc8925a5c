use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use telegram_bridge::config::{self, Config};
use telegram_bridge::pipeline::Pipeline;
use telegram_bridge::router::{Role, Router};
use telegram_bridge::{broker, diagnostics};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    diagnostics::init("telegram-in");
    diagnostics::exit_code(run().await)
}

async fn run() -> Result<()> {
    let config_path = config::path_from_args();
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    let mut pipeline = Pipeline::new(Router::new(Role::Inbound), tokio::io::stdout());

    let Some(broker_config) = config.broker() else {
        pipeline.run(tokio::io::stdin()).await?;
        return Ok(());
    };

    let log = broker::connect(broker_config).await?;
    info!("Publishing envelopes to topic {}", broker_config.inbound_topic);
    let mut pipeline = pipeline.with_publisher(log.clone(), &broker_config.inbound_topic);
    let result = pipeline.run(tokio::io::stdin()).await;
    log.disconnect().await?;
    Ok(result?)
}
