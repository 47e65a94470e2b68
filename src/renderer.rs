use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::bidi;
use crate::caption::{self, LINE_HEIGHT_EM};
use crate::config::{Config, EncoderConfig};
use crate::error::{MeteoError, MeteoResult};
use crate::ffmpeg::{self, DrawText, FontSpec};
use crate::locale::{self, Locale};
use crate::style::{EFFECT_SECONDS, StyleParameters, TextAnimation, Transition};
use crate::tts::SpeechSynthesizer;
use crate::weather::WeatherRecord;
use crate::{logi, logok, logw};

/// Share of the canvas width a caption may occupy.
const CAPTION_WIDTH_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundKind {
    Video,
    Image,
}

impl BackgroundKind {
    pub fn from_path(path: &Path) -> MeteoResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp4" => Ok(Self::Video),
            "jpg" | "jpeg" | "png" => Ok(Self::Image),
            _ => Err(MeteoError::UnsupportedBackground(ext)),
        }
    }
}

pub struct RenderRequest<'a> {
    pub records: &'a [WeatherRecord],
    pub locale: Locale,
    pub style: &'a StyleParameters,
    pub background: &'a Path,
}

#[derive(Debug, Clone)]
pub struct RenderReport {
    pub output: PathBuf,
    pub segments: usize,
    pub duration: f64,
    pub warnings: Vec<String>,
}

/// Drawtext filters for one caption whose lines were written to `line_files`.
pub fn caption_overlays(
    line_files: &[PathBuf],
    font: &FontSpec<'_>,
    style: &StyleParameters,
    shaping: bool,
) -> Vec<String> {
    let line_h = (style.font_size as f64 * LINE_HEIGHT_EM).round() as u32;
    let block_h = line_h * line_files.len() as u32;
    let x = match style.animation {
        TextAnimation::Slide => format!(
            "w*(1-t/{})+(w*{}-text_w)/2",
            style.segment_seconds, CAPTION_WIDTH_RATIO
        ),
        TextAnimation::FadeIn | TextAnimation::None => "(w-text_w)/2".to_string(),
    };
    let alpha = match style.animation {
        TextAnimation::FadeIn => Some(format!("min(t/{},1)", EFFECT_SECONDS)),
        _ => None,
    };

    line_files
        .iter()
        .enumerate()
        .map(|(idx, file)| {
            DrawText {
                textfile: file,
                font: font.clone(),
                size: style.font_size,
                color: format!("0x{}", style.color),
                x: x.clone(),
                y: format!("(h-{})/2+{}", block_h, idx as u32 * line_h),
                alpha: alpha.clone(),
                shaping,
            }
            .to_filter()
        })
        .collect()
}

/// Input arguments reading `duration` seconds of background from t=0. Videos
/// loop when shorter; images are held.
pub fn background_input(background: &Path, kind: BackgroundKind, duration: f64) -> Vec<String> {
    let mut args = match kind {
        BackgroundKind::Video => vec!["-stream_loop".to_string(), "-1".to_string()],
        BackgroundKind::Image => vec!["-loop".to_string(), "1".to_string()],
    };
    args.push("-t".to_string());
    args.push(format!("{:.3}", duration));
    args.push("-i".to_string());
    args.push(background.display().to_string());
    args
}

/// ffmpeg arguments for one segment: `duration` seconds of background from
/// t=0 (looped when shorter), scaled to `canvas`, with `overlays` on top.
pub fn segment_args(
    background: &Path,
    kind: BackgroundKind,
    duration: f64,
    canvas: (u32, u32),
    overlays: &[String],
    enc: &EncoderConfig,
    out: &Path,
) -> Vec<String> {
    let mut args = background_input(background, kind, duration);

    let mut chain = vec![
        format!("scale={}:{}", canvas.0, canvas.1),
        "setsar=1".to_string(),
        format!("fps={}", enc.fps),
        "format=yuv420p".to_string(),
    ];
    chain.extend(overlays.iter().cloned());
    args.push("-filter_complex".to_string());
    args.push(format!("[0:v]{}[v]", chain.join(",")));
    args.push("-map".to_string());
    args.push("[v]".to_string());
    args.extend(ffmpeg::video_encode_args(enc));
    args.push("-an".to_string());
    args.push("-t".to_string());
    args.push(format!("{:.3}", duration));
    args.push(out.display().to_string());
    args
}

fn font_for<'a>(cfg: &'a Config, style: &'a StyleParameters) -> FontSpec<'a> {
    match cfg.font_file(&style.font) {
        Some(path) if path.exists() => FontSpec::File(path),
        _ => FontSpec::Family(&style.font),
    }
}

/// Renders the request to `output`. Intermediates live in a scratch directory
/// that is removed on every exit path.
pub async fn generate_video(
    cfg: &Config,
    tts: &dyn SpeechSynthesizer,
    req: &RenderRequest<'_>,
    output: &Path,
) -> MeteoResult<RenderReport> {
    if req.records.is_empty() {
        return Err(MeteoError::NoRecords);
    }
    if fs::metadata(req.background).await.is_err() {
        return Err(MeteoError::BackgroundNotFound(req.background.to_path_buf()));
    }
    let kind = BackgroundKind::from_path(req.background)?;

    let workdir = tempfile::Builder::new()
        .prefix("meteo_")
        .tempdir()
        .context("Failed to create scratch directory")?;
    let mut report = render_in(cfg, tts, req, kind, workdir.path(), output).await?;
    if let Err(err) = workdir.close() {
        let msg = format!(
            "Les fichiers temporaires sont encore verrouillés ({err}); ils seront supprimés plus tard."
        );
        logw(&msg);
        report.warnings.push(msg);
    }
    Ok(report)
}

async fn render_in(
    cfg: &Config,
    tts: &dyn SpeechSynthesizer,
    req: &RenderRequest<'_>,
    kind: BackgroundKind,
    work: &Path,
    output: &Path,
) -> MeteoResult<RenderReport> {
    let style = req.style;
    let enc = &cfg.encoder;
    let (voice_text, display_texts) = locale::weather_texts(req.records, req.locale);

    let narration = work.join("narration.mp3");
    logi(format!(
        "Synthesizing narration ({} chars, {}, via {})",
        voice_text.chars().count(),
        req.locale,
        tts.name()
    ));
    if !tts.synthesize(&voice_text, req.locale, &narration).await? {
        return Err(anyhow::anyhow!("speech synthesis produced no audio").into());
    }

    let (bw, bh) = ffmpeg::ffprobe_video_dimensions(req.background).await?;
    let canvas = ffmpeg::scaled_canvas(bw, bh, enc.canvas_height);
    let caption_px = (canvas.0 as f64 * CAPTION_WIDTH_RATIO) as u32;
    let per_line = caption::glyphs_per_line(caption_px, style.font_size);
    let font = font_for(cfg, style);
    let pre_shaped = req.locale == Locale::Ar;
    logi(format!(
        "Canvas {}x{} from {}x{} background; {} glyphs per caption line",
        canvas.0, canvas.1, bw, bh, per_line
    ));

    let duration = style.duration();
    let mut segments = Vec::with_capacity(display_texts.len());
    for (idx, text) in display_texts.iter().enumerate() {
        let mut lines = caption::wrap_caption(text, per_line);
        if pre_shaped {
            lines = lines.iter().map(|l| bidi::shape_for_display(l)).collect();
        }
        let files = caption::write_line_files(work, &format!("caption_{}", idx), &lines).await?;
        let overlays = caption_overlays(&files, &font, style, !pre_shaped);

        let seg = work.join(format!("segment_{}.mp4", idx));
        let args = segment_args(req.background, kind, duration, canvas, &overlays, enc, &seg);
        logi(format!(
            "Building segment {}/{} ({}) -> {}",
            idx + 1,
            display_texts.len(),
            req.records[idx].city,
            seg.display()
        ));
        if !ffmpeg::ffmpeg_run(args, &seg).await? {
            return Err(anyhow::anyhow!("segment {} was not written", idx + 1).into());
        }
        segments.push(seg);
    }

    let joined = work.join("joined.mp4");
    let durations = vec![duration; segments.len()];
    let total = if style.transition == Transition::Crossfade && segments.len() > 1 {
        if !ffmpeg::ffmpeg_xfade_videos(&segments, &durations, EFFECT_SECONDS, &joined, enc).await? {
            return Err(MeteoError::NoClips);
        }
        ffmpeg::xfade_total(&durations, EFFECT_SECONDS)
    } else {
        let list = work.join("concat_list.txt");
        ffmpeg::write_concat_list(&list, &segments).await?;
        if !ffmpeg::ffmpeg_concat_videos(&list, &joined, enc).await? {
            return Err(MeteoError::NoClips);
        }
        durations.iter().sum()
    };
    logok(format!("Joined {} segments ({:.2}s)", segments.len(), total));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    if !ffmpeg::ffmpeg_mux_narration(&joined, &narration, output).await? {
        return Err(anyhow::anyhow!("final video was not written").into());
    }
    logok(format!("Wrote output: {}", output.display()));

    Ok(RenderReport {
        output: output.to_path_buf(),
        segments: segments.len(),
        duration: total,
        warnings: Vec::new(),
    })
}
