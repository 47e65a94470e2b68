use crate::error::{MeteoError, MeteoResult};
use crate::weather::{Temperature, WeatherRecord};

/// Required columns with their accepted header spellings.
const REQUIRED_COLUMNS: [(&str, &[&str]); 4] = [
    ("Ville", &["ville", "city"]),
    ("Condition", &["condition"]),
    ("Max", &["max"]),
    ("Min", &["min"]),
];

fn locate_columns(headers: &csv::StringRecord) -> MeteoResult<[usize; 4]> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();

    let mut found = [0usize; 4];
    let mut missing = Vec::new();
    for (slot, (name, aliases)) in REQUIRED_COLUMNS.iter().enumerate() {
        match normalized.iter().position(|h| aliases.contains(&h.as_str())) {
            Some(idx) => found[slot] = idx,
            None => missing.push(name.to_string()),
        }
    }

    if missing.is_empty() {
        Ok(found)
    } else {
        Err(MeteoError::MissingColumns(missing))
    }
}

/// Parses an uploaded CSV. Headers are checked before any record is read, and
/// a single bad row rejects the whole file.
pub fn parse_weather_csv(data: &[u8]) -> MeteoResult<Vec<WeatherRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let [city, condition, max, min] = locate_columns(reader.headers()?)?;

    let mut records = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let (Some(max_t), Some(min_t)) = (Temperature::parse(field(max)), Temperature::parse(field(min)))
        else {
            return Err(MeteoError::InvalidTemperature { row: idx + 1 });
        };
        let weather = WeatherRecord::new(field(city), field(condition), max_t, min_t);
        if weather.city.is_empty() || weather.condition.is_empty() {
            return Err(MeteoError::EmptyField { row: idx + 1 });
        }
        records.push(weather);
    }

    if records.is_empty() {
        return Err(MeteoError::NoRecords);
    }
    Ok(records)
}
