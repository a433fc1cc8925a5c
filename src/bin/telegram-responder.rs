use std::process::ExitCode;

use anyhow::{Context, Result};

use telegram_bridge::config::{self, Config};
use telegram_bridge::diagnostics;
use telegram_bridge::pipeline::Pipeline;
use telegram_bridge::router::Router;
use telegram_bridge::socket::ReplyClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    diagnostics::init("telegram-responder");
    diagnostics::exit_code(run().await)
}

async fn run() -> Result<()> {
    let config_path = config::path_from_args();
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    let mut pipeline = Pipeline::new(Router::responder(&config.bridge.channel), tokio::io::stdout())
        .with_reply_client(ReplyClient::new(&config.socket.path));
    pipeline.run(tokio::io::stdin()).await?;
    Ok(())
}
