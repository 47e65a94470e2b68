use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::Config;
use crate::logi;

/// Directories the server and the batch job write into.
pub fn required_dirs(cfg: &Config) -> Vec<PathBuf> {
    let mut dirs = vec![cfg.output_dir.clone()];
    if let Some(parent) = cfg.batch.output_path.parent() {
        if !parent.as_os_str().is_empty() {
            dirs.push(parent.to_path_buf());
        }
    }
    if let Some(parent) = cfg.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            dirs.push(parent.to_path_buf());
        }
    }
    dirs.dedup();
    dirs
}

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in required_dirs(cfg) {
        if !Path::new(&dir).exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            logi(format!("Created directory: {}", dir.display()));
        }
    }
    Ok(())
}

pub async fn check_ffmpeg() -> bool {
    for tool in ["ffmpeg", "ffprobe"] {
        let ok = match tokio::process::Command::new(tool).arg("-version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        };
        if !ok {
            return false;
        }
    }
    true
}
