use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use meteo_shorts::config::Config;
use meteo_shorts::csv_input::parse_weather_csv;
use meteo_shorts::db::{self, SeedOutcome};
use meteo_shorts::locale::Locale;
use meteo_shorts::renderer::{self, RenderRequest};
use meteo_shorts::style::{StyleInput, StyleParameters};
use meteo_shorts::{MeteoError, batch, init, tts};

#[derive(Parser, Debug)]
#[command(name = "meteo-cli", version, about = "Weather video tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates the weather table and seeds it when empty.
    InitDb,
    /// Renders the Arabic city-card video from the weather table.
    Batch,
    /// Renders a narrated video from a CSV file.
    Render {
        /// CSV with Ville/Condition/Max/Min columns.
        #[arg(long)]
        csv: PathBuf,
        /// Background video (.mp4) or image (.jpg, .jpeg, .png).
        #[arg(long)]
        background: PathBuf,
        #[arg(long, default_value = "fr")]
        locale: Locale,
        #[arg(long)]
        font: Option<String>,
        /// Hex color, with or without the leading '#'.
        #[arg(long)]
        color: Option<String>,
        #[arg(long)]
        font_size: Option<String>,
        /// Seconds per city.
        #[arg(long)]
        duration: Option<String>,
        /// fadein, slide or none.
        #[arg(long)]
        animation: Option<String>,
        /// fondu or aucune.
        #[arg(long)]
        transition: Option<String>,
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

async fn run(cli: Cli, cfg: &Config) -> Result<()> {
    match cli.command {
        Command::InitDb => {
            let path = cfg.database_path.clone();
            let outcome = tokio::task::spawn_blocking(move || db::provision(&path))
                .await
                .context("Database task failed")??;
            match outcome {
                SeedOutcome::Inserted(n) => println!("Données insérées avec succès ({} lignes).", n),
                SeedOutcome::AlreadyPresent(n) => println!("Les données existent déjà ({} lignes).", n),
            }
        }
        Command::Batch => {
            let report = batch::run_batch(cfg).await.map_err(user_facing)?;
            for line in &report.diagnostics {
                eprintln!("{}", line);
            }
            println!("Vidéo créée avec succès : {}", report.output.display());
        }
        Command::Render {
            csv,
            background,
            locale,
            font,
            color,
            font_size,
            duration,
            animation,
            transition,
            output,
        } => {
            let data = tokio::fs::read(&csv)
                .await
                .with_context(|| format!("Failed to read {}", csv.display()))?;
            let records = parse_weather_csv(&data).map_err(user_facing)?;
            let style = StyleParameters::from_input(&StyleInput {
                font: font.as_deref(),
                color: color.as_deref(),
                font_size: font_size.as_deref(),
                segment_seconds: duration.as_deref(),
                animation: animation.as_deref(),
                transition: transition.as_deref(),
            });
            let output = output.unwrap_or_else(|| {
                cfg.output_dir
                    .join(format!("meteo_{}.mp4", uuid::Uuid::new_v4().simple()))
            });

            let synthesizer = tts::synthesizer_from_config(&cfg.tts)?;
            let req = RenderRequest {
                records: &records,
                locale,
                style: &style,
                background: &background,
            };
            let report = renderer::generate_video(cfg, synthesizer.as_ref(), &req, &output)
                .await
                .map_err(user_facing)?;
            for line in &report.warnings {
                eprintln!("{}", line);
            }
            println!(
                "Vidéo générée avec succès : {} ({} villes, {:.1}s)",
                report.output.display(),
                report.segments,
                report.duration
            );
        }
    }
    Ok(())
}

fn user_facing(err: MeteoError) -> anyhow::Error {
    match err {
        MeteoError::Render(inner) => inner,
        other => anyhow::anyhow!(other.user_message()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meteo_shorts=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = Config::load_or_default().await?;
    init::ensure_directories(&cfg).await?;
    if !init::check_ffmpeg().await {
        eprintln!("[WARNING] FFmpeg not found in PATH. Please install FFmpeg.");
    }

    run(cli, &cfg).await
}
