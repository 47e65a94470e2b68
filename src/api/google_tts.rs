use crate::logw;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

const TTS_URL: &str = "https://translate.google.com/translate_tts";
const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";

/// The endpoint refuses longer queries.
pub const MAX_CHUNK_CHARS: usize = 100;

/// A sentence ends at punctuation followed by whitespace or end of text, so
/// decimal points such as "37.5" stay inside their sentence.
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:[^.!?;:،؛؟\n]|[.!?;:،؛؟][^\s.!?;:،؛؟])+[.!?;:،؛؟]*")
        .expect("valid sentence regex")
});

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn split_long(piece: &str, max: usize, out: &mut Vec<String>) {
    let mut current = String::new();
    for word in piece.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > max {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            let rest = word.split_off(max);
            out.push(word.into_iter().collect());
            word = rest;
        }
        if word.is_empty() {
            continue;
        }
        let extra = if current.is_empty() { word.len() } else { word.len() + 1 };
        if char_len(&current) + extra > max {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.extend(word.iter());
    }
    if !current.is_empty() {
        out.push(current);
    }
}

/// Splits narration into request-sized chunks, preferring sentence and clause
/// boundaries, then word boundaries. Adjacent short sentences are merged.
pub fn split_for_tts(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut pieces = Vec::new();
    for m in SENTENCE_RE.find_iter(text) {
        let sentence = m.as_str().trim();
        if sentence.is_empty() {
            continue;
        }
        if char_len(sentence) > max {
            split_long(sentence, max, &mut pieces);
        } else {
            pieces.push(sentence.to_string());
        }
    }

    let mut chunks: Vec<String> = Vec::new();
    for piece in pieces {
        match chunks.last_mut() {
            Some(last) if char_len(last) + 1 + char_len(&piece) <= max => {
                last.push(' ');
                last.push_str(&piece);
            }
            _ => chunks.push(piece),
        }
    }
    chunks
}

pub async fn google_tts_to_mp3(
    client: &Client,
    text: &str,
    language: &str,
    out_mp3_path: &Path,
) -> Result<bool> {
    let chunks = split_for_tts(text, MAX_CHUNK_CHARS);
    if chunks.is_empty() {
        logw("Nothing to synthesize");
        return Ok(false);
    }

    if let Some(parent) = out_mp3_path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create dir {}", parent.display()))?;
    }
    let mut out = fs::File::create(out_mp3_path)
        .await
        .with_context(|| format!("Failed to create {}", out_mp3_path.display()))?;

    let total = chunks.len().to_string();
    for (idx, chunk) in chunks.iter().enumerate() {
        let idx_s = idx.to_string();
        let len_s = char_len(chunk).to_string();
        let resp = client
            .get(TTS_URL)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", language),
                ("q", chunk.as_str()),
                ("total", total.as_str()),
                ("idx", idx_s.as_str()),
                ("textlen", len_s.as_str()),
            ])
            .timeout(std::time::Duration::from_secs(60))
            .send()
            .await
            .context("TTS request failed")?;

        if !resp.status().is_success() {
            logw(format!(
                "TTS chunk {}/{} failed HTTP {}",
                idx + 1,
                chunks.len(),
                resp.status().as_u16()
            ));
            return Ok(false);
        }

        let bytes = resp.bytes().await.context("TTS response read failed")?;
        out.write_all(&bytes).await?;
    }
    out.flush().await?;

    Ok(fs::metadata(out_mp3_path).await.is_ok())
}
