use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use meteo_shorts::config::Config;
use meteo_shorts::csv_input::parse_weather_csv;
use meteo_shorts::locale::{Locale, weather_texts};
use meteo_shorts::renderer::{RenderRequest, generate_video};
use meteo_shorts::style::StyleParameters;
use meteo_shorts::tts::SpeechSynthesizer;
use meteo_shorts::{MeteoError, batch, db};

#[derive(Default)]
struct CountingTts {
    calls: AtomicUsize,
}

#[async_trait]
impl SpeechSynthesizer for CountingTts {
    async fn synthesize(&self, _text: &str, _locale: Locale, _out: &Path) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(false)
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

fn temp_config(dir: &Path) -> Config {
    let mut cfg = Config::default();
    cfg.database_path = dir.join("meteo.db");
    cfg.output_dir = dir.join("output");
    cfg.batch.output_path = dir.join("static/meteo_video.mp4");
    cfg
}

#[tokio::test]
async fn empty_table_reports_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = temp_config(dir.path());
    db::WeatherStore::open(&cfg.database_path)
        .unwrap()
        .init_schema()
        .unwrap();

    let err = batch::run_batch(&cfg).await.unwrap_err();
    assert!(matches!(err, MeteoError::NoData));
    assert_eq!(err.user_message(), "Aucune donnée météo disponible.");
    assert!(!cfg.batch.output_path.exists());
}

#[tokio::test]
async fn seeded_table_still_needs_the_font() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = temp_config(dir.path());
    cfg.batch.font_path = dir.path().join("missing.ttf");
    db::provision(&cfg.database_path).unwrap();

    let err = batch::run_batch(&cfg).await.unwrap_err();
    assert!(matches!(err, MeteoError::FontNotFound(ref p) if p == &cfg.batch.font_path));
}

#[tokio::test]
async fn seeded_rows_cover_every_default_city() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = temp_config(dir.path());
    db::provision(&cfg.database_path).unwrap();

    let rows = db::fetch_weather_rows(&cfg.database_path);
    let plan = batch::plan_batch(&rows, &cfg.batch.cities).unwrap();
    assert_eq!(plan.steps.len(), 4);
    assert_eq!(plan.steps[3].len(), 4);
    assert!(plan.diagnostics.is_empty());
}

#[tokio::test]
async fn csv_to_render_rejects_missing_background_before_narration() {
    let records = parse_weather_csv(b"ville,condition,max,min\nParis,nuageux,20,10\n").unwrap();
    let (voice, _) = weather_texts(&records, Locale::Fr);
    assert!(voice.starts_with("Prévisions météo pour Paris."));

    let tts = CountingTts::default();
    let style = StyleParameters::default();
    let background = PathBuf::from("/nonexistent/background.mp4");
    let req = RenderRequest {
        records: &records,
        locale: Locale::Fr,
        style: &style,
        background: &background,
    };
    let dir = tempfile::tempdir().unwrap();
    let err = generate_video(&Config::default(), &tts, &req, &dir.path().join("out.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, MeteoError::BackgroundNotFound(_)));
    assert_eq!(tts.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unsupported_background_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let background = dir.path().join("fond.gif");
    std::fs::write(&background, b"GIF89a").unwrap();
    let records = parse_weather_csv(b"Ville,Condition,Max,Min\nNice,soleil,25,15\n").unwrap();
    let style = StyleParameters::default();
    let req = RenderRequest {
        records: &records,
        locale: Locale::Fr,
        style: &style,
        background: &background,
    };
    let tts = CountingTts::default();
    let err = generate_video(&Config::default(), &tts, &req, &dir.path().join("out.mp4"))
        .await
        .unwrap_err();
    assert!(matches!(err, MeteoError::UnsupportedBackground(ref e) if e == "gif"));
}
