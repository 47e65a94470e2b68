use std::fmt;

pub const MIN_TEMPERATURE: f64 = -100.0;
pub const MAX_TEMPERATURE: f64 = 100.0;
pub const MAX_MANUAL_ROWS: usize = 10;

/// A temperature that parsed as a number within [-100, 100]. Keeps the text
/// as typed so templates print "20" rather than "20.0".
#[derive(Debug, Clone, PartialEq)]
pub struct Temperature {
    text: String,
}

impl Temperature {
    pub fn parse(input: &str) -> Option<Self> {
        let text = input.trim();
        let value = text.parse::<f64>().ok()?;
        if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
            return None;
        }
        Some(Self {
            text: text.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl From<i64> for Temperature {
    fn from(value: i64) -> Self {
        Self {
            text: value.to_string(),
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

pub fn validate_temperature(input: &str) -> bool {
    Temperature::parse(input).is_some()
}

/// Collapses control characters and line breaks into single spaces and trims,
/// so a field cannot add lines or escape sequences to rendered text.
pub fn sanitize_field(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.chars() {
        if ch.is_control() || ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub city: String,
    pub condition: String,
    pub max: Temperature,
    pub min: Temperature,
}

impl WeatherRecord {
    pub fn new(city: &str, condition: &str, max: Temperature, min: Temperature) -> Self {
        Self {
            city: sanitize_field(city),
            condition: sanitize_field(condition),
            max,
            min,
        }
    }
}

/// One row of the manual entry form, as submitted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualRow {
    pub city: String,
    pub condition: String,
    pub max: String,
    pub min: String,
}

impl ManualRow {
    fn is_complete(&self) -> bool {
        [&self.city, &self.condition, &self.max, &self.min]
            .iter()
            .all(|field| !sanitize_field(field).is_empty())
    }
}

#[derive(Debug, Default)]
pub struct ManualIntake {
    pub records: Vec<WeatherRecord>,
    pub warnings: Vec<String>,
}

/// Keeps complete rows whose temperatures validate. Partial rows are dropped
/// silently; complete rows with bad temperatures are dropped with a warning.
pub fn collect_manual_rows(rows: &[ManualRow]) -> ManualIntake {
    let mut intake = ManualIntake::default();
    for row in rows.iter().take(MAX_MANUAL_ROWS) {
        if !row.is_complete() {
            continue;
        }
        match (Temperature::parse(&row.max), Temperature::parse(&row.min)) {
            (Some(max), Some(min)) => {
                intake
                    .records
                    .push(WeatherRecord::new(&row.city, &row.condition, max, min));
            }
            _ => intake.warnings.push(format!(
                "Les températures pour {} doivent être des nombres valides entre -100 et 100.",
                sanitize_field(&row.city)
            )),
        }
    }
    intake
}

/// A row of the `donnees_meteo` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredWeather {
    pub id: i64,
    pub city: String,
    pub temp_min: i64,
    pub temp_max: i64,
    pub icon: Option<String>,
}

impl StoredWeather {
    pub fn icon_text(&self) -> &str {
        self.icon.as_deref().unwrap_or("")
    }
}
