use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::logw;

pub const CONFIG_ENV: &str = "METEO_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub output_dir: PathBuf,
    pub server: ServerConfig,
    pub encoder: EncoderConfig,
    pub batch: BatchConfig,
    pub tts: TtsConfig,
    /// Font family name -> font file. Families without an entry are resolved
    /// by fontconfig inside ffmpeg.
    pub fonts: BTreeMap<String, PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("meteo.db"),
            output_dir: PathBuf::from("output"),
            server: ServerConfig::default(),
            encoder: EncoderConfig::default(),
            batch: BatchConfig::default(),
            tts: TtsConfig::default(),
            fonts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub fps: u32,
    pub threads: u32,
    pub preset: String,
    pub crf: u8,
    pub canvas_height: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            fps: 24,
            threads: 4,
            preset: "medium".to_string(),
            crf: 22,
            canvas_height: 720,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityPosition {
    pub name: String,
    pub x: u32,
    pub y: u32,
}

impl CityPosition {
    fn new(name: &str, x: u32, y: u32) -> Self {
        Self {
            name: name.to_string(),
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub background_video: PathBuf,
    pub font_path: PathBuf,
    pub output_path: PathBuf,
    pub font_size: u32,
    pub segment_seconds: f64,
    pub card_width: u32,
    pub cities: Vec<CityPosition>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            background_video: PathBuf::from("static/nuage.mp4"),
            font_path: PathBuf::from("static/fonts/Amiri-Regular.ttf"),
            output_path: PathBuf::from("static/meteo_video.mp4"),
            font_size: 24,
            segment_seconds: 5.0,
            card_width: 220,
            cities: vec![
                CityPosition::new("القيروان", 100, 100),
                CityPosition::new("تونس", 300, 100),
                CityPosition::new("نابل", 500, 100),
                CityPosition::new("زغوان", 700, 100),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    #[default]
    Google,
    ElevenLabs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    pub provider: TtsProvider,
    #[serde(rename = "elevenlabs_api_key")]
    pub elevenlabs_key: String,
    pub eleven_voice_id: String,
    pub eleven_model_id: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProvider::Google,
            elevenlabs_key: String::new(),
            eleven_voice_id: default_voice_id(),
            eleven_model_id: default_model_id(),
        }
    }
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid config: {}", path.as_ref().display()))
    }

    /// Loads the file named by `METEO_CONFIG` (or `config.json`), falling back
    /// to defaults when it does not exist.
    pub async fn load_or_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        if fs::metadata(&path).await.is_err() {
            logw(format!("{} not found; using built-in defaults", path));
            return Ok(Self::default());
        }
        Self::load(&path).await
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tts.provider == TtsProvider::ElevenLabs && self.tts.elevenlabs_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing");
        }
        if self.encoder.canvas_height < 2 {
            anyhow::bail!("config.json: encoder.canvas_height must be at least 2");
        }
        if self.batch.segment_seconds <= 0.0 {
            anyhow::bail!("config.json: batch.segment_seconds must be positive");
        }
        Ok(())
    }

    pub fn font_file(&self, family: &str) -> Option<&Path> {
        self.fonts.get(family).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_yields_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.encoder.fps, 24);
        assert_eq!(cfg.batch.cities.len(), 4);
        assert_eq!(cfg.batch.cities[1], CityPosition::new("تونس", 300, 100));
        assert_eq!(cfg.tts.provider, TtsProvider::Google);
    }

    #[test]
    fn elevenlabs_requires_key() {
        let err = Config::from_json(r#"{"tts": {"provider": "elevenlabs"}}"#).unwrap_err();
        assert!(err.to_string().contains("elevenlabs_api_key"));

        let cfg = Config::from_json(
            r#"{"tts": {"provider": "elevenlabs", "elevenlabs_api_key": "k"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.tts.eleven_model_id, "eleven_multilingual_v2");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = Config::from_json(r#"{"server": {"port": 8080}, "fonts": {"Arial": "fonts/arial.ttf"}}"#)
            .unwrap();
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.font_file("Arial"), Some(Path::new("fonts/arial.ttf")));
        assert_eq!(cfg.font_file("Verdana"), None);
    }

    #[tokio::test]
    async fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"database_path": "x.db"}"#).await.unwrap();
        let cfg = Config::load(&path).await.unwrap();
        assert_eq!(cfg.database_path, PathBuf::from("x.db"));
    }
}
