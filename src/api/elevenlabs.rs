use crate::config::TtsConfig;
use crate::logw;
use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const API_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

fn speech_url(cfg: &TtsConfig) -> String {
    format!("{}/{}?output_format=mp3_44100_128", API_BASE, cfg.eleven_voice_id)
}

/// The multilingual model picks the voice language from `language_code`
/// (ISO 639-1) instead of guessing it from the script.
fn speech_body(cfg: &TtsConfig, text: &str, language: &str) -> serde_json::Value {
    serde_json::json!({
        "text": text,
        "model_id": cfg.eleven_model_id,
        "language_code": language,
    })
}

pub async fn elevenlabs_tts_to_mp3(
    client: &Client,
    cfg: &TtsConfig,
    text: &str,
    language: &str,
    out_mp3_path: &Path,
) -> Result<bool> {
    if text.trim().is_empty() {
        logw("ElevenLabs TTS skipped: empty narration");
        return Ok(false);
    }

    let resp = client
        .post(speech_url(cfg))
        .header("xi-api-key", &cfg.elevenlabs_key)
        .json(&speech_body(cfg, text, language))
        .timeout(REQUEST_TIMEOUT)
        .send()
        .await
        .context("ElevenLabs request failed")?;

    let status = resp.status();
    if !status.is_success() {
        let detail = resp.text().await.unwrap_or_default();
        logw(format!(
            "ElevenLabs TTS failed HTTP {}: {}",
            status.as_u16(),
            detail.chars().take(200).collect::<String>()
        ));
        return Ok(false);
    }

    let audio = resp.bytes().await.context("ElevenLabs response read failed")?;
    if audio.is_empty() {
        logw("ElevenLabs TTS returned an empty body");
        return Ok(false);
    }
    fs::write(out_mp3_path, &audio)
        .await
        .with_context(|| format!("Failed to write {}", out_mp3_path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_voice_model_and_language() {
        let cfg = TtsConfig {
            eleven_voice_id: "voice123".into(),
            ..TtsConfig::default()
        };
        assert_eq!(
            speech_url(&cfg),
            "https://api.elevenlabs.io/v1/text-to-speech/voice123?output_format=mp3_44100_128"
        );
        let body = speech_body(&cfg, "Bonjour", "fr");
        assert_eq!(body["language_code"], "fr");
        assert_eq!(body["model_id"], "eleven_multilingual_v2");
        assert_eq!(body["text"], "Bonjour");
    }

    #[tokio::test]
    async fn blank_text_makes_no_request() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("n.mp3");
        let ok = elevenlabs_tts_to_mp3(&Client::new(), &TtsConfig::default(), "  ", "fr", &out)
            .await
            .unwrap();
        assert!(!ok);
        assert!(!out.exists());
    }
}
