use std::path::PathBuf;
use thiserror::Error;

pub type MeteoResult<T> = Result<T, MeteoError>;

/// Failures that end a single generation request. `Display` is the log
/// line; the page shows [`MeteoError::user_message`].
#[derive(Debug, Error)]
pub enum MeteoError {
    #[error("CSV is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("CSV could not be read: {0}")]
    Csv(#[from] csv::Error),

    #[error("temperatures must be numbers between -100 and 100 (row {row})")]
    InvalidTemperature { row: usize },

    #[error("city and condition must not be empty (row {row})")]
    EmptyField { row: usize },

    #[error("no valid weather records")]
    NoRecords,

    #[error("no background asset provided")]
    MissingBackground,

    #[error("background not found: {}", .0.display())]
    BackgroundNotFound(PathBuf),

    #[error("unsupported background type: {0}")]
    UnsupportedBackground(String),

    #[error("font not found: {}", .0.display())]
    FontNotFound(PathBuf),

    #[error("no weather data available")]
    NoData,

    #[error("no video clips were created")]
    NoClips,

    #[error(transparent)]
    Render(#[from] anyhow::Error),
}

impl MeteoError {
    /// French message shown on the page for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingColumns(_) => {
                "Le fichier CSV doit contenir les colonnes : Ville, Condition, Max, Min".to_string()
            }
            Self::Csv(e) => format!("Erreur lors de la lecture du fichier CSV : {e}"),
            Self::InvalidTemperature { .. } => {
                "Les températures doivent être des nombres valides entre -100 et 100.".to_string()
            }
            Self::EmptyField { row } => {
                format!("La ville et la condition sont obligatoires (ligne {row}).")
            }
            Self::NoRecords => "Veuillez entrer des données météo valides.".to_string(),
            Self::MissingBackground => "Veuillez uploader un fichier de fond.".to_string(),
            Self::BackgroundNotFound(path) => {
                format!("La vidéo de fond '{}' n'existe pas.", path.display())
            }
            Self::UnsupportedBackground(ext) => {
                format!("Type de fond non supporté : {ext} (mp4, jpg ou png attendu)")
            }
            Self::FontNotFound(path) => format!("La police '{}' n'existe pas.", path.display()),
            Self::NoData => "Aucune donnée météo disponible.".to_string(),
            Self::NoClips => "Aucun clip vidéo n'a été créé.".to_string(),
            Self::Render(e) => format!("Erreur lors de la génération de la vidéo : {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_names() {
        let err = MeteoError::MissingColumns(vec!["Max".into(), "Min".into()]);
        assert_eq!(err.to_string(), "CSV is missing required columns: Max, Min");
        assert!(err.user_message().contains("Ville, Condition, Max, Min"));
    }

    #[test]
    fn render_errors_keep_their_context() {
        let err = MeteoError::from(anyhow::anyhow!("ffmpeg exited with 1"));
        assert_eq!(err.to_string(), "ffmpeg exited with 1");
        assert!(err.user_message().ends_with("ffmpeg exited with 1"));
    }
}
