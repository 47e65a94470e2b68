pub mod api;
pub mod batch;
pub mod bidi;
pub mod caption;
pub mod config;
pub mod csv_input;
pub mod db;
pub mod error;
pub mod ffmpeg;
pub mod init;
pub mod locale;
pub mod renderer;
pub mod style;
pub mod tts;
pub mod weather;
pub mod web;

pub use error::{MeteoError, MeteoResult};

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!(target: "meteo_shorts", "[{}] {}", tag, message),
        _ => tracing::info!(target: "meteo_shorts", "[{}] {}", tag, message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
