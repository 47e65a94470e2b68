use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use meteo_shorts::config::Config;
use meteo_shorts::web::{self, AppState};
use meteo_shorts::{init, tts};

/// Weather video server: table, batch trigger and studio form.
#[derive(Parser, Debug)]
#[command(name = "meteo-shorts", version)]
struct Args {
    /// Overrides `server.host` from the config file.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port` from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("meteo_shorts=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load_or_default().await?;

    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg().await {
        warn!("FFmpeg not found in PATH. Video generation will fail until it is installed.");
    }

    let host = args.host.unwrap_or_else(|| cfg.server.host.clone());
    let port = args.port.unwrap_or(cfg.server.port);

    let synthesizer = tts::synthesizer_from_config(&cfg.tts)?;
    info!("Narration provider: {}", synthesizer.name());
    let state = AppState {
        cfg: Arc::new(cfg),
        tts: Arc::from(synthesizer),
    };

    web::serve(state, &host, port).await
}
