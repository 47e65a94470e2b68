use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::api::{elevenlabs, google_tts};
use crate::config::{TtsConfig, TtsProvider};
use crate::locale::Locale;

/// Turns narration text into an MP3 file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns `Ok(false)` when the service answered but produced no audio.
    async fn synthesize(&self, text: &str, locale: Locale, out_mp3: &Path) -> Result<bool>;

    fn name(&self) -> &'static str;
}

pub struct GoogleTts {
    client: reqwest::Client,
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, locale: Locale, out_mp3: &Path) -> Result<bool> {
        google_tts::google_tts_to_mp3(&self.client, text, locale.code(), out_mp3).await
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

pub struct ElevenLabsTts {
    client: reqwest::Client,
    cfg: TtsConfig,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsTts {
    async fn synthesize(&self, text: &str, locale: Locale, out_mp3: &Path) -> Result<bool> {
        elevenlabs::elevenlabs_tts_to_mp3(&self.client, &self.cfg, text, locale.code(), out_mp3)
            .await
    }

    fn name(&self) -> &'static str {
        "elevenlabs"
    }
}

pub fn synthesizer_from_config(cfg: &TtsConfig) -> Result<Box<dyn SpeechSynthesizer>> {
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    Ok(match cfg.provider {
        TtsProvider::Google => Box::new(GoogleTts { client }),
        TtsProvider::ElevenLabs => Box::new(ElevenLabsTts {
            client,
            cfg: cfg.clone(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_selection() {
        let google = synthesizer_from_config(&TtsConfig::default()).unwrap();
        assert_eq!(google.name(), "google");

        let cfg = TtsConfig {
            provider: TtsProvider::ElevenLabs,
            elevenlabs_key: "key".into(),
            ..TtsConfig::default()
        };
        assert_eq!(synthesizer_from_config(&cfg).unwrap().name(), "elevenlabs");
    }
}
