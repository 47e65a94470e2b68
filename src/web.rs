use anyhow::Context;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::batch;
use crate::config::Config;
use crate::csv_input::parse_weather_csv;
use crate::db;
use crate::error::{MeteoError, MeteoResult};
use crate::locale::Locale;
use crate::renderer::{self, BackgroundKind, RenderRequest};
use crate::style::{FONTS, StyleInput, StyleParameters};
use crate::tts::SpeechSynthesizer;
use crate::weather::{MAX_MANUAL_ROWS, ManualRow, StoredWeather, WeatherRecord, collect_manual_rows};

const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;
const DOWNLOAD_NAME: &str = "video_meteo.mp4";

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub tts: Arc<dyn SpeechSynthesizer>,
}

pub fn router(state: AppState) -> Router {
    let videos = ServeDir::new(&state.cfg.output_dir);
    let statics = ServeDir::new(static_dir(&state.cfg));

    Router::new()
        .route("/", get(index))
        .route("/generer_video", get(generate_batch))
        .route("/studio", get(studio_form))
        .route(
            "/studio/render",
            post(studio_render).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .nest_service("/videos", videos)
        .nest_service("/static", statics)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Serving on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("Server stopped")
}

fn static_dir(cfg: &Config) -> PathBuf {
    cfg.batch
        .output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"fr\">\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn banner(class: &str, message: &str) -> String {
    format!("<p class=\"{}\">{}</p>\n", class, escape_html(message))
}

async fn load_rows(cfg: &Config) -> Vec<StoredWeather> {
    let path = cfg.database_path.clone();
    match tokio::task::spawn_blocking(move || db::fetch_weather_rows(&path)).await {
        Ok(rows) => rows,
        Err(err) => {
            error!("Database task failed: {}", err);
            Vec::new()
        }
    }
}

pub fn render_index(cfg: &Config, rows: &[StoredWeather], error: Option<&str>) -> String {
    let mut body = String::from("<h1>Météo</h1>\n");
    if let Some(message) = error {
        body.push_str(&banner("error", message));
    }

    if rows.is_empty() {
        body.push_str("<p>Aucune donnée météo.</p>\n");
    } else {
        body.push_str("<table>\n<tr><th>Ville</th><th>Min</th><th>Max</th><th>Icône</th></tr>\n");
        for row in rows {
            body.push_str(&format!(
                "<tr><td>{}</td><td>{}°C</td><td>{}°C</td><td>{}</td></tr>\n",
                escape_html(&row.city),
                row.temp_min,
                row.temp_max,
                escape_html(row.icon_text())
            ));
        }
        body.push_str("</table>\n");
    }

    body.push_str("<p><a href=\"/generer_video\">Générer la vidéo</a> | <a href=\"/studio\">Studio</a></p>\n");
    if cfg.batch.output_path.exists() {
        if let Some(name) = cfg.batch.output_path.file_name().and_then(|n| n.to_str()) {
            let url = format!("/static/{}", escape_html(name));
            body.push_str(&format!(
                "<video controls src=\"{url}\" width=\"640\"></video>\n<p><a href=\"{url}\" download>Télécharger</a></p>\n"
            ));
        }
    }
    page("Météo", &body)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let rows = load_rows(&state.cfg).await;
    Html(render_index(&state.cfg, &rows, None))
}

async fn generate_batch(State(state): State<AppState>) -> Response {
    match batch::run_batch(&state.cfg).await {
        Ok(report) => {
            info!(
                "Batch video written to {} ({} clips, {} skipped)",
                report.output.display(),
                report.steps,
                report.diagnostics.len()
            );
            Redirect::to("/").into_response()
        }
        Err(err) => {
            error!("Batch generation failed: {}", err);
            let rows = load_rows(&state.cfg).await;
            Html(render_index(&state.cfg, &rows, Some(&err.user_message()))).into_response()
        }
    }
}

pub fn render_studio(errors: &[String]) -> String {
    let mut body = String::from("<h1>Générateur de Vidéo Météo Multilingue</h1>\n");
    for message in errors {
        body.push_str(&banner("error", message));
    }

    body.push_str("<form method=\"post\" action=\"/studio/render\" enctype=\"multipart/form-data\">\n");
    body.push_str("<fieldset><legend>Paramètres</legend>\n<label>Langue de la voix <select name=\"locale\">");
    for locale in Locale::ALL {
        body.push_str(&format!("<option value=\"{}\">{}</option>", locale.code(), locale.label()));
    }
    body.push_str("</select></label>\n<label>Police <select name=\"font\">");
    for font in FONTS {
        body.push_str(&format!("<option>{}</option>", font));
    }
    body.push_str(concat!(
        "</select></label>\n",
        "<label>Couleur du texte <input type=\"color\" name=\"color\" value=\"#FFFFFF\"></label>\n",
        "<label>Taille de la police <input type=\"range\" name=\"font_size\" min=\"30\" max=\"100\" value=\"50\"></label>\n",
        "<label>Durée par ville (s) <input type=\"range\" name=\"duration\" min=\"3\" max=\"15\" value=\"6\"></label>\n",
        "<label>Animation du texte <select name=\"animation\"><option>fadein</option><option>slide</option><option>none</option></select></label>\n",
        "<label>Transition entre villes <select name=\"transition\"><option>fondu</option><option>aucune</option></select></label>\n",
        "</fieldset>\n",
        "<fieldset><legend>Données météo</legend>\n",
        "<label><input type=\"radio\" name=\"mode\" value=\"csv\" checked> Fichier CSV</label>\n",
        "<label><input type=\"radio\" name=\"mode\" value=\"manual\"> Saisie manuelle</label>\n",
        "<p><input type=\"file\" name=\"csv\" accept=\".csv\"></p>\n",
        "<table><tr><th>Ville</th><th>Condition</th><th>Max (°C)</th><th>Min (°C)</th></tr>\n",
    ));
    for i in 0..MAX_MANUAL_ROWS {
        body.push_str(&format!(
            "<tr><td><input name=\"ville_{i}\"></td><td><input name=\"condition_{i}\"></td>\
             <td><input name=\"max_{i}\"></td><td><input name=\"min_{i}\"></td></tr>\n"
        ));
    }
    body.push_str(concat!(
        "</table></fieldset>\n",
        "<fieldset><legend>Fond de la vidéo</legend>\n",
        "<input type=\"file\" name=\"background\" accept=\".mp4,.jpg,.jpeg,.png\"></fieldset>\n",
        "<button type=\"submit\">Générer la vidéo</button>\n</form>\n",
    ));
    page("Générateur de Vidéo Météo", &body)
}

async fn studio_form() -> Html<String> {
    Html(render_studio(&[]))
}

/// A submitted studio form.
#[derive(Debug, Default)]
pub struct StudioForm {
    pub fields: HashMap<String, String>,
    pub csv: Option<Vec<u8>>,
    pub background: Option<(String, Vec<u8>)>,
}

impl StudioForm {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn style(&self) -> StyleParameters {
        StyleParameters::from_input(&StyleInput {
            font: self.field("font"),
            color: self.field("color"),
            font_size: self.field("font_size"),
            segment_seconds: self.field("duration"),
            animation: self.field("animation"),
            transition: self.field("transition"),
        })
    }

    pub fn locale(&self) -> Locale {
        self.field("locale").and_then(|l| l.parse().ok()).unwrap_or_default()
    }

    fn manual_rows(&self) -> Vec<ManualRow> {
        let get = |key: String| self.fields.get(&key).cloned().unwrap_or_default();
        (0..MAX_MANUAL_ROWS)
            .map(|i| ManualRow {
                city: get(format!("ville_{i}")),
                condition: get(format!("condition_{i}")),
                max: get(format!("max_{i}")),
                min: get(format!("min_{i}")),
            })
            .collect()
    }

    /// Weather records from whichever source the form selected, plus
    /// warnings about dropped manual rows.
    pub fn records(&self) -> MeteoResult<(Vec<WeatherRecord>, Vec<String>)> {
        let (records, warnings) = if self.field("mode") == Some("manual") {
            let intake = collect_manual_rows(&self.manual_rows());
            (intake.records, intake.warnings)
        } else {
            match self.csv.as_deref() {
                Some(data) if !data.is_empty() => (parse_weather_csv(data)?, Vec::new()),
                _ => (Vec::new(), Vec::new()),
            }
        };
        if records.is_empty() {
            return Err(MeteoError::NoRecords);
        }
        Ok((records, warnings))
    }
}

async fn read_form(mut multipart: Multipart) -> anyhow::Result<StudioForm> {
    let mut form = StudioForm::default();
    while let Some(field) = multipart.next_field().await.context("Malformed form data")? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csv" => {
                let data = field.bytes().await.context("Failed to read CSV upload")?;
                form.csv = Some(data.to_vec());
            }
            "background" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.context("Failed to read background upload")?;
                if !file_name.is_empty() && !data.is_empty() {
                    form.background = Some((file_name, data.to_vec()));
                }
            }
            _ => {
                let value = field.text().await.context("Failed to read form field")?;
                form.fields.insert(name, value);
            }
        }
    }
    Ok(form)
}

fn render_result(url: &str, warnings: &[String]) -> String {
    let mut body = String::from("<h1>Vidéo générée avec succès !</h1>\n");
    for message in warnings {
        body.push_str(&banner("warning", message));
    }
    let url = escape_html(url);
    body.push_str(&format!(
        "<video controls src=\"{url}\" width=\"720\"></video>\n\
         <p><a href=\"{url}\" download=\"{DOWNLOAD_NAME}\">Télécharger la vidéo</a></p>\n\
         <p><a href=\"/studio\">Nouvelle vidéo</a></p>\n"
    ));
    page("Vidéo météo", &body)
}

async fn run_studio(state: &AppState, form: StudioForm) -> MeteoResult<String> {
    let (records, mut warnings) = form.records()?;
    let (file_name, data) = form.background.as_ref().ok_or(MeteoError::MissingBackground)?;
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let upload_name = format!("background.{}", ext);
    BackgroundKind::from_path(Path::new(&upload_name))?;

    let uploads = tempfile::Builder::new()
        .prefix("meteo_upload_")
        .tempdir()
        .context("Failed to create upload directory")?;
    let background = uploads.path().join(&upload_name);
    tokio::fs::write(&background, data)
        .await
        .context("Failed to store background upload")?;

    let output_name = format!("meteo_{}.mp4", uuid::Uuid::new_v4().simple());
    let output = state.cfg.output_dir.join(&output_name);
    let style = form.style();
    let req = RenderRequest {
        records: &records,
        locale: form.locale(),
        style: &style,
        background: &background,
    };
    let report = renderer::generate_video(&state.cfg, state.tts.as_ref(), &req, &output).await?;
    warnings.extend(report.warnings);

    Ok(render_result(&format!("/videos/{}", output_name), &warnings))
}

async fn studio_render(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(err) => {
            error!("Studio form rejected: {:#}", err);
            return (StatusCode::BAD_REQUEST, Html(render_studio(&[err.to_string()]))).into_response();
        }
    };

    match run_studio(&state, form).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!("Studio render failed: {}", err);
            let status = match err {
                MeteoError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            (status, Html(render_studio(&[err.user_message()]))).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn state_with(cfg: Config) -> AppState {
        let tts = crate::tts::synthesizer_from_config(&cfg.tts).unwrap();
        AppState {
            cfg: Arc::new(cfg),
            tts: Arc::from(tts),
        }
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>\"Nice\" & 'co'</b>"), "&lt;b&gt;&quot;Nice&quot; &amp; &#39;co&#39;&lt;/b&gt;");
    }

    #[test]
    fn index_lists_rows_escaped() {
        let rows = vec![StoredWeather {
            id: 1,
            city: "<Tunis>".into(),
            temp_min: 19,
            temp_max: 28,
            icon: None,
        }];
        let html = render_index(&Config::default(), &rows, Some("Erreur & co"));
        assert!(html.contains("<td>&lt;Tunis&gt;</td><td>19°C</td><td>28°C</td>"));
        assert!(html.contains("<p class=\"error\">Erreur &amp; co</p>"));
    }

    #[test]
    fn manual_form_builds_records() {
        let mut form = StudioForm::default();
        for (k, v) in [
            ("mode", "manual"),
            ("ville_0", "Paris"),
            ("condition_0", "nuageux"),
            ("max_0", "20"),
            ("min_0", "10"),
            ("ville_1", "Lyon"),
        ] {
            form.fields.insert(k.to_string(), v.to_string());
        }
        let (records, warnings) = form.records().unwrap();
        assert_eq!(records.len(), 1);
        assert!(warnings.is_empty());
        assert_eq!(form.locale(), Locale::Fr);
    }

    #[test]
    fn csv_mode_without_upload_has_no_records() {
        let form = StudioForm::default();
        assert!(matches!(form.records(), Err(MeteoError::NoRecords)));
    }

    #[tokio::test]
    async fn missing_background_is_rejected() {
        let mut form = StudioForm::default();
        form.csv = Some(b"Ville,Condition,Max,Min\nParis,nuageux,20,10\n".to_vec());
        let state = state_with(Config::default());
        let err = run_studio(&state, form).await.unwrap_err();
        assert!(matches!(err, MeteoError::MissingBackground));
    }

    #[tokio::test]
    async fn index_route_survives_missing_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.database_path = dir.path().join("absent.db");
        let app = router(state_with(cfg));
        let resp = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Aucune donnée météo."));
    }

    #[tokio::test]
    async fn batch_route_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.database_path = dir.path().join("meteo.db");
        let store = db::WeatherStore::open(&cfg.database_path).unwrap();
        store.init_schema().unwrap();
        drop(store);

        let app = router(state_with(cfg));
        let resp = app
            .oneshot(Request::builder().uri("/generer_video").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("Aucune donnée météo disponible."));
    }

    #[tokio::test]
    async fn studio_form_is_served() {
        let app = router(state_with(Config::default()));
        let resp = app
            .oneshot(Request::builder().uri("/studio").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let html = body_text(resp).await;
        assert!(html.contains("name=\"ville_9\""));
        assert!(!html.contains("name=\"ville_10\""));
        assert!(html.contains("<option value=\"ar\">Arabe</option>"));
    }
}
