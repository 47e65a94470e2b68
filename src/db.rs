use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, params};
use std::path::Path;

use crate::logw;
use crate::weather::StoredWeather;

const SAMPLE_ROWS: [(&str, i64, i64, &str); 5] = [
    ("القيروان", 29, 41, "☀️"),
    ("تونس", 19, 28, "☁️🌧️"),
    ("نابل", 25, 41, "☀️"),
    ("زغوان", 26, 43, "⚪"),
    ("تونس", 19, 29, "🌬️"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Inserted(usize),
    AlreadyPresent(i64),
}

pub struct WeatherStore {
    conn: Connection,
}

impl WeatherStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self { conn })
    }

    /// Opens a database that must already exist; never creates the file.
    pub fn open_existing(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database {}", path.display()))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS donnees_meteo (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ville TEXT NOT NULL,
                temp_min INTEGER NOT NULL,
                temp_max INTEGER NOT NULL,
                icone TEXT
            )",
            (),
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM donnees_meteo", [], |row| row.get(0))?)
    }

    /// Inserts the sample rows only when the table is empty.
    pub fn seed_if_empty(&mut self) -> Result<SeedOutcome> {
        let count = self.count()?;
        if count > 0 {
            return Ok(SeedOutcome::AlreadyPresent(count));
        }

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO donnees_meteo (ville, temp_min, temp_max, icone) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (city, min, max, icon) in SAMPLE_ROWS {
                stmt.execute(params![city, min, max, icon])?;
            }
        }
        tx.commit()?;
        Ok(SeedOutcome::Inserted(SAMPLE_ROWS.len()))
    }

    pub fn fetch_all(&self) -> Result<Vec<StoredWeather>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, ville, temp_min, temp_max, icone FROM donnees_meteo ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredWeather {
                id: row.get(0)?,
                city: row.get(1)?,
                temp_min: row.get(2)?,
                temp_max: row.get(3)?,
                icon: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

/// Provisions the table at `path` and seeds it when empty.
pub fn provision(path: &Path) -> Result<SeedOutcome> {
    let mut store = WeatherStore::open(path)?;
    store.init_schema()?;
    store.seed_if_empty()
}

/// Reads every row, logging and returning an empty list when the database
/// cannot be opened or queried.
pub fn fetch_weather_rows(path: &Path) -> Vec<StoredWeather> {
    match WeatherStore::open_existing(path).and_then(|store| store.fetch_all()) {
        Ok(rows) => rows,
        Err(err) => {
            logw(format!("Database unavailable ({}): {:#}", path.display(), err));
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_only_when_empty() {
        let mut store = WeatherStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        assert_eq!(store.seed_if_empty().unwrap(), SeedOutcome::Inserted(5));
        assert_eq!(store.seed_if_empty().unwrap(), SeedOutcome::AlreadyPresent(5));
        assert_eq!(store.count().unwrap(), 5);
    }

    #[test]
    fn rows_come_back_in_insert_order() {
        let mut store = WeatherStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store.seed_if_empty().unwrap();
        let rows = store.fetch_all().unwrap();
        assert_eq!(rows[0].city, "القيروان");
        assert_eq!((rows[1].temp_min, rows[1].temp_max), (19, 28));
        assert_eq!(rows[4].icon.as_deref(), Some("🌬️"));
    }

    #[test]
    fn null_icon_reads_as_none() {
        let store = WeatherStore::open_in_memory().unwrap();
        store.init_schema().unwrap();
        store
            .conn
            .execute(
                "INSERT INTO donnees_meteo (ville, temp_min, temp_max) VALUES (?1, ?2, ?3)",
                params!["نابل", 20, 30],
            )
            .unwrap();
        let rows = store.fetch_all().unwrap();
        assert_eq!(rows[0].id, store.conn.last_insert_rowid());
        assert_eq!(rows[0].icon, None);
        assert_eq!(rows[0].icon_text(), "");
    }

    #[test]
    fn provision_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meteo.db");
        assert_eq!(provision(&path).unwrap(), SeedOutcome::Inserted(5));
        assert_eq!(provision(&path).unwrap(), SeedOutcome::AlreadyPresent(5));
        assert_eq!(fetch_weather_rows(&path).len(), 5);
    }

    #[test]
    fn missing_database_degrades_to_empty_without_creating_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(fetch_weather_rows(&path).is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn missing_table_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.db");
        WeatherStore::open(&path).unwrap();
        assert!(fetch_weather_rows(&path).is_empty());
    }
}
