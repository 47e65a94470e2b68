use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::caption::{self, LINE_HEIGHT_EM};
use crate::config::{BatchConfig, CityPosition, Config};
use crate::error::{MeteoError, MeteoResult};
use crate::ffmpeg::{self, DrawText, FontSpec};
use crate::locale;
use crate::renderer::{BackgroundKind, background_input};
use crate::weather::StoredWeather;
use crate::{db, logi, logok, logw};

const CARD_PADDING: u32 = 8;
const CARD_BOX: &str = "black@0.6";

#[derive(Debug, Clone, PartialEq)]
pub struct CityCard {
    pub position: CityPosition,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BatchPlan {
    /// `steps[k]` holds the cards visible in the (k+1)-th clip.
    pub steps: Vec<Vec<CityCard>>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub output: PathBuf,
    pub steps: usize,
    pub diagnostics: Vec<String>,
}

/// Builds the increasing sequence of card sets. A city with no row is left
/// out of every step with one diagnostic; the first row wins when a city
/// appears more than once.
pub fn plan_batch(rows: &[StoredWeather], cities: &[CityPosition]) -> MeteoResult<BatchPlan> {
    if rows.is_empty() {
        return Err(MeteoError::NoData);
    }

    let mut diagnostics = Vec::new();
    let cards: Vec<Option<CityCard>> = cities
        .iter()
        .map(|pos| match rows.iter().find(|r| r.city == pos.name) {
            Some(row) => Some(CityCard {
                position: pos.clone(),
                lines: locale::arabic_card_lines(row),
            }),
            None => {
                let msg = format!("Aucune donnée trouvée pour la ville : {}", pos.name);
                logw(&msg);
                diagnostics.push(msg);
                None
            }
        })
        .collect();

    let steps = (1..=cards.len())
        .map(|step| cards[..step].iter().flatten().cloned().collect())
        .collect();

    Ok(BatchPlan { steps, diagnostics })
}

/// drawbox plus one drawtext per line for a card whose lines were written to
/// `line_files`.
pub fn card_overlays(card: &CityCard, line_files: &[PathBuf], font: &Path, batch: &BatchConfig) -> Vec<String> {
    let line_h = (batch.font_size as f64 * LINE_HEIGHT_EM).round() as u32;
    let box_h = CARD_PADDING * 2 + line_h * line_files.len() as u32;
    let (x, y) = (card.position.x, card.position.y);

    let mut filters = vec![format!(
        "drawbox=x={}:y={}:w={}:h={}:color={}:t=fill",
        x, y, batch.card_width, box_h, CARD_BOX
    )];
    for (idx, file) in line_files.iter().enumerate() {
        filters.push(
            DrawText {
                textfile: file,
                font: FontSpec::File(font),
                size: batch.font_size,
                color: "white".to_string(),
                x: format!("{}+({}-text_w)/2", x, batch.card_width),
                y: format!("{}", y + CARD_PADDING + idx as u32 * line_h),
                alpha: None,
                shaping: false,
            }
            .to_filter(),
        );
    }
    filters
}

pub fn step_args(
    cfg: &Config,
    overlays: &[String],
    out: &Path,
) -> Vec<String> {
    let batch = &cfg.batch;
    let mut args = background_input(&batch.background_video, BackgroundKind::Video, batch.segment_seconds);
    let mut chain = vec![
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        format!("fps={}", cfg.encoder.fps),
        "format=yuv420p".to_string(),
    ];
    chain.extend(overlays.iter().cloned());
    args.push("-filter_complex".to_string());
    args.push(format!("[0:v]{}[v]", chain.join(",")));
    args.push("-map".to_string());
    args.push("[v]".to_string());
    args.extend(ffmpeg::video_encode_args(&cfg.encoder));
    args.push("-an".to_string());
    args.push("-t".to_string());
    args.push(format!("{:.3}", batch.segment_seconds));
    args.push(out.display().to_string());
    args
}

/// Fetches the table and renders it. An empty table stops here with
/// [`MeteoError::NoData`] before any asset is touched.
pub async fn run_batch(cfg: &Config) -> MeteoResult<BatchReport> {
    let db_path = cfg.database_path.clone();
    let rows = tokio::task::spawn_blocking(move || db::fetch_weather_rows(&db_path))
        .await
        .context("Database task failed")?;
    render_batch(cfg, &rows).await
}

pub async fn render_batch(cfg: &Config, rows: &[StoredWeather]) -> MeteoResult<BatchReport> {
    if rows.is_empty() {
        return Err(MeteoError::NoData);
    }
    let batch = &cfg.batch;
    if fs::metadata(&batch.font_path).await.is_err() {
        return Err(MeteoError::FontNotFound(batch.font_path.clone()));
    }
    if fs::metadata(&batch.background_video).await.is_err() {
        return Err(MeteoError::BackgroundNotFound(batch.background_video.clone()));
    }

    let plan = plan_batch(rows, &batch.cities)?;
    if plan.steps.is_empty() {
        return Err(MeteoError::NoClips);
    }

    let workdir = tempfile::Builder::new()
        .prefix("meteo_batch_")
        .tempdir()
        .context("Failed to create scratch directory")?;
    let work = workdir.path();

    let mut clips = Vec::with_capacity(plan.steps.len());
    for (step, cards) in plan.steps.iter().enumerate() {
        let mut overlays = Vec::new();
        for (idx, card) in cards.iter().enumerate() {
            let files =
                caption::write_line_files(work, &format!("step{}_card{}", step, idx), &card.lines).await?;
            overlays.extend(card_overlays(card, &files, &batch.font_path, batch));
        }

        let clip = work.join(format!("step_{}.mp4", step));
        logi(format!(
            "Building clip {}/{} with {} cities -> {}",
            step + 1,
            plan.steps.len(),
            cards.len(),
            clip.display()
        ));
        if !ffmpeg::ffmpeg_run(step_args(cfg, &overlays, &clip), &clip).await? {
            return Err(anyhow::anyhow!("clip {} was not written", step + 1).into());
        }
        clips.push(clip);
    }

    let list = work.join("concat_list.txt");
    ffmpeg::write_concat_list(&list, &clips).await?;
    if let Some(parent) = batch.output_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    if !ffmpeg::ffmpeg_concat_videos(&list, &batch.output_path, &cfg.encoder).await? {
        return Err(MeteoError::NoClips);
    }
    logok(format!("Vidéo créée avec succès : {}", batch.output_path.display()));

    let mut diagnostics = plan.diagnostics;
    if let Err(err) = workdir.close() {
        let msg = format!("Scratch cleanup deferred: {err}");
        logw(&msg);
        diagnostics.push(msg);
    }

    Ok(BatchReport {
        output: batch.output_path.clone(),
        steps: clips.len(),
        diagnostics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, city: &str, min: i64, max: i64) -> StoredWeather {
        StoredWeather {
            id,
            city: city.to_string(),
            temp_min: min,
            temp_max: max,
            icon: Some("☀️".to_string()),
        }
    }

    #[test]
    fn steps_grow_one_city_at_a_time() {
        let cities = BatchConfig::default().cities;
        let rows: Vec<_> = cities
            .iter()
            .enumerate()
            .map(|(i, c)| row(i as i64, &c.name, 10, 20))
            .collect();
        let plan = plan_batch(&rows, &cities).unwrap();
        let sizes: Vec<_> = plan.steps.iter().map(Vec::len).collect();
        assert_eq!(sizes, [1, 2, 3, 4]);
        assert!(plan.diagnostics.is_empty());
        assert_eq!(plan.steps[3][2].position, cities[2]);
    }

    #[test]
    fn absent_city_is_skipped_with_diagnostic() {
        let cities = BatchConfig::default().cities;
        let rows = vec![
            row(1, &cities[0].name, 29, 41),
            row(2, &cities[2].name, 25, 41),
            row(3, &cities[3].name, 26, 43),
        ];
        let plan = plan_batch(&rows, &cities).unwrap();
        let sizes: Vec<_> = plan.steps.iter().map(Vec::len).collect();
        assert_eq!(sizes, [1, 1, 2, 3]);
        assert_eq!(plan.diagnostics.len(), 1);
        assert!(plan.diagnostics[0].ends_with(&cities[1].name));
    }

    #[test]
    fn first_row_wins_for_repeated_city() {
        let cities = vec![CityPosition {
            name: "تونس".into(),
            x: 300,
            y: 100,
        }];
        let rows = vec![row(1, "تونس", 19, 28), row(2, "تونس", 19, 29)];
        let plan = plan_batch(&rows, &cities).unwrap();
        assert!(plan.steps[0][0].lines[2].contains("28"));
    }

    #[test]
    fn empty_rows_are_no_data() {
        let cities = BatchConfig::default().cities;
        assert!(matches!(plan_batch(&[], &cities), Err(MeteoError::NoData)));
    }

    #[test]
    fn card_box_and_centred_lines() {
        let batch = BatchConfig::default();
        let card = CityCard {
            position: batch.cities[0].clone(),
            lines: vec!["a".into(), "b".into()],
        };
        let files = vec![PathBuf::from("/w/0.txt"), PathBuf::from("/w/1.txt")];
        let filters = card_overlays(&card, &files, Path::new("/f/Amiri.ttf"), &batch);
        // 24px font -> 30px lines, 8px padding
        assert_eq!(filters[0], "drawbox=x=100:y=100:w=220:h=76:color=black@0.6:t=fill");
        assert!(filters[1].contains(":x='100+(220-text_w)/2':y='108'"));
        assert!(filters[2].contains(":y='138'"));
        assert!(filters[2].ends_with("text_shaping=0"));
    }

    #[test]
    fn step_args_cut_five_seconds() {
        let cfg = Config::default();
        let args = step_args(&cfg, &[], Path::new("step_0.mp4"));
        assert_eq!(
            &args[..6],
            ["-stream_loop", "-1", "-t", "5.000", "-i", "static/nuage.mp4"]
        );
        assert!(args.contains(&"medium".to_string()));
        assert!(args.contains(&"4".to_string()));
    }

    #[tokio::test]
    async fn empty_rows_stop_before_assets() {
        let mut cfg = Config::default();
        cfg.batch.font_path = PathBuf::from("/nonexistent/font.ttf");
        let err = render_batch(&cfg, &[]).await.unwrap_err();
        assert!(matches!(err, MeteoError::NoData));
    }

    #[tokio::test]
    async fn missing_font_is_reported() {
        let mut cfg = Config::default();
        cfg.batch.font_path = PathBuf::from("/nonexistent/font.ttf");
        let err = render_batch(&cfg, &[row(1, "تونس", 1, 2)]).await.unwrap_err();
        assert!(matches!(err, MeteoError::FontNotFound(_)));
    }
}
