use crate::caption::escape_filter_path;
use crate::config::EncoderConfig;
use crate::logi;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::process::Command;

const STDERR_TAIL: usize = 800;

pub(crate) async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let output = cmd
        .output()
        .await
        .with_context(|| format!("Command execution failed: {}", args[0]))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .chars()
            .rev()
            .take(STDERR_TAIL)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        return Err(anyhow::anyhow!(
            "{} failed ({}): {}",
            args[0],
            output.status,
            tail.trim()
        ));
    }

    Ok(())
}

fn base_args() -> Vec<String> {
    ["ffmpeg", "-y", "-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// H.264 output settings shared by every render.
pub fn video_encode_args(enc: &EncoderConfig) -> Vec<String> {
    vec![
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        enc.preset.clone(),
        "-crf".to_string(),
        enc.crf.to_string(),
        "-r".to_string(),
        enc.fps.to_string(),
        "-threads".to_string(),
        enc.threads.to_string(),
    ]
}

pub async fn ffprobe_video_dimensions(path: &Path) -> Result<(i32, i32)> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=s=x:p=0",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe execution failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed on {}", path.display()));
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| anyhow::anyhow!("Invalid dimensions for {}", path.display()))
}

fn parse_dimensions(text: &str) -> Option<(i32, i32)> {
    let mut parts = text.trim().split('x');
    let w = parts.next()?.trim().parse::<i32>().ok()?;
    let h = parts.next()?.trim().parse::<i32>().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

/// Canvas for a background of `w`x`h` scaled to `height`, width kept
/// proportional and rounded to an even number for yuv420p.
pub fn scaled_canvas(w: i32, h: i32, height: u32) -> (u32, u32) {
    let height = height & !1;
    let width = ((w as f64) * (height as f64) / (h.max(1) as f64)).round() as u32;
    ((width & !1).max(2), height)
}

#[derive(Debug, Clone)]
pub enum FontSpec<'a> {
    File(&'a Path),
    Family(&'a str),
}

/// One drawtext overlay. Positions and alpha are ffmpeg expressions.
#[derive(Debug, Clone)]
pub struct DrawText<'a> {
    pub textfile: &'a Path,
    pub font: FontSpec<'a>,
    pub size: u32,
    pub color: String,
    pub x: String,
    pub y: String,
    pub alpha: Option<String>,
    /// Off when the text has already been reshaped into visual order.
    pub shaping: bool,
}

impl DrawText<'_> {
    pub fn to_filter(&self) -> String {
        let font = match &self.font {
            FontSpec::File(path) => format!("fontfile={}", escape_filter_path(path)),
            FontSpec::Family(name) => format!("font='{}'", name.replace('\'', "")),
        };
        let mut filter = format!(
            "drawtext=textfile={}:{}:fontsize={}:fontcolor={}:x='{}':y='{}':expansion=none",
            escape_filter_path(self.textfile),
            font,
            self.size,
            self.color,
            self.x,
            self.y
        );
        if let Some(alpha) = &self.alpha {
            filter.push_str(&format!(":alpha='{}'", alpha));
        }
        if !self.shaping {
            filter.push_str(":text_shaping=0");
        }
        filter
    }
}

/// Filter graph that joins `durations.len()` inputs with `fade` xfades of
/// `overlap` seconds. Returns the graph and its output label.
pub fn xfade_graph(durations: &[f64], overlap: f64) -> (String, String) {
    if durations.len() < 2 {
        return ("[0:v]null[vout]".to_string(), "[vout]".to_string());
    }

    let mut parts = Vec::with_capacity(durations.len() - 1);
    let mut prev = "[0:v]".to_string();
    let mut timeline = durations[0];
    for (idx, dur) in durations.iter().enumerate().skip(1) {
        let offset = (timeline - overlap).max(0.0);
        let out = if idx == durations.len() - 1 {
            "[vout]".to_string()
        } else {
            format!("[x{}]", idx)
        };
        parts.push(format!(
            "{}[{}:v]xfade=transition=fade:duration={:.3}:offset={:.3}{}",
            prev, idx, overlap, offset, out
        ));
        timeline = offset + dur;
        prev = out;
    }
    (parts.join(";"), prev)
}

/// Total length of segments joined by [`xfade_graph`].
pub fn xfade_total(durations: &[f64], overlap: f64) -> f64 {
    let sum: f64 = durations.iter().sum();
    sum - overlap * durations.len().saturating_sub(1) as f64
}

pub async fn write_concat_list(list_txt: &Path, files: &[PathBuf]) -> Result<()> {
    let mut body = String::new();
    for file in files {
        let name = file.display().to_string().replace('\'', "'\\''");
        body.push_str(&format!("file '{}'\n", name));
    }
    fs::write(list_txt, body)
        .await
        .with_context(|| format!("Failed to write {}", list_txt.display()))
}

pub async fn ffmpeg_concat_videos(
    list_txt: &Path,
    out_mp4: &Path,
    enc: &EncoderConfig,
) -> Result<bool> {
    let mut args = base_args();
    args.extend(
        ["-f", "concat", "-safe", "0", "-i"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(list_txt.display().to_string());
    args.extend(video_encode_args(enc));
    args.extend(
        ["-an", "-movflags", "+faststart"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(out_mp4.display().to_string());
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_xfade_videos(
    inputs: &[PathBuf],
    durations: &[f64],
    overlap: f64,
    out_mp4: &Path,
    enc: &EncoderConfig,
) -> Result<bool> {
    let (graph, label) = xfade_graph(durations, overlap);
    let mut args = base_args();
    for input in inputs {
        args.push("-i".to_string());
        args.push(input.display().to_string());
    }
    args.push("-filter_complex".to_string());
    args.push(graph);
    args.push("-map".to_string());
    args.push(label);
    args.extend(video_encode_args(enc));
    args.extend(
        ["-an", "-movflags", "+faststart"]
            .iter()
            .map(|s| s.to_string()),
    );
    args.push(out_mp4.display().to_string());

    logi(format!(
        "Crossfading {} segments ({:.2}s total)",
        inputs.len(),
        xfade_total(durations, overlap)
    ));
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

/// Adds the narration track; silence pads a short narration and a long one is
/// cut at the end of the picture.
pub async fn ffmpeg_mux_narration(video_in: &Path, audio_in: &Path, video_out: &Path) -> Result<bool> {
    let mut args = base_args();
    args.extend([
        "-i".to_string(),
        video_in.display().to_string(),
        "-i".to_string(),
        audio_in.display().to_string(),
        "-filter_complex".to_string(),
        "[1:a]apad[a]".to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[a]".to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(video_out.exists())
}

/// Runs a prepared ffmpeg argument list (without the leading program name
/// and global flags) and reports whether `out` was produced.
pub async fn ffmpeg_run(args: Vec<String>, out: &Path) -> Result<bool> {
    let mut full = base_args();
    full.extend(args);
    run_cmd(&full).await?;
    Ok(out.exists())
}
