use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use voicelink::{Config, CpalDevices, SessionController};

#[derive(Parser)]
#[command(name = "voicelink", about = "Realtime voice assistant session")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/voicelink")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!("Endpoint: {}", cfg.remote.url);

    let transport = Arc::new(cfg.transport()?);
    let mut controller =
        SessionController::new(cfg.session_config(), transport, Arc::new(CpalDevices));

    controller.start().await?;
    info!("Session live. Speak into the microphone; Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;

    controller.stop().await;

    for line in controller.transcript() {
        println!("[{}] {:?}: {}", line.timestamp.format("%H:%M:%S"), line.role, line.text);
    }

    Ok(())
}
