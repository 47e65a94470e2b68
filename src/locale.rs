use std::fmt;
use std::str::FromStr;

use crate::bidi;
use crate::weather::{StoredWeather, WeatherRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Locale {
    #[default]
    Fr,
    Ar,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::Fr, Locale::Ar];

    /// Language code passed to the speech engine.
    pub fn code(self) -> &'static str {
        match self {
            Self::Fr => "fr",
            Self::Ar => "ar",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Fr => "Français",
            Self::Ar => "Arabe",
        }
    }

    pub fn narration(self, r: &WeatherRecord) -> String {
        match self {
            Self::Fr => format!(
                "Prévisions météo pour {}. Temps {}, maximum {} degrés, minimum {} degrés.",
                r.city, r.condition, r.max, r.min
            ),
            Self::Ar => format!(
                "توقعات الطقس لمدينة {}. الطقس {}, درجة الحرارة العظمى {}، والصغرى {}.",
                r.city, r.condition, r.max, r.min
            ),
        }
    }

    pub fn display(self, r: &WeatherRecord) -> String {
        match self {
            Self::Fr => format!(
                "{} - {}\nMax: {}°C | Min: {}°C",
                r.city, r.condition, r.max, r.min
            ),
            Self::Ar => format!(
                "{} - {}\nالعظمى: {}°C | الصغرى: {}°C",
                r.city, r.condition, r.max, r.min
            ),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fr" => Ok(Self::Fr),
            "ar" => Ok(Self::Ar),
            other => Err(format!("unknown locale: {other}")),
        }
    }
}

/// Narration for a whole run (one utterance) and one display text per record.
pub fn weather_texts(records: &[WeatherRecord], locale: Locale) -> (String, Vec<String>) {
    let voice = records
        .iter()
        .map(|r| locale.narration(r))
        .collect::<Vec<_>>()
        .join("\n");
    let display = records.iter().map(|r| locale.display(r)).collect();
    (voice, display)
}

/// Lines of a batch city card, each shaped for right-to-left display.
pub fn arabic_card_lines(row: &StoredWeather) -> Vec<String> {
    [
        format!("المدينة: {}", row.city),
        format!("↓ {}°C", row.temp_min),
        format!("↑ {}°C", row.temp_max),
        row.icon_text().to_string(),
    ]
    .iter()
    .map(|line| bidi::shape_for_display(line))
    .collect()
}
