//! Caption layout for drawtext overlays.
//!
//! drawtext neither wraps nor centres multi-line text, so captions are split
//! into lines here and each line becomes its own overlay. Text reaches ffmpeg
//! through `textfile=` so nothing in a city or condition name is ever parsed
//! as filter syntax.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Average advance of a glyph relative to the font size.
const GLYPH_WIDTH_EM: f64 = 0.55;
pub const LINE_HEIGHT_EM: f64 = 1.25;

/// How many glyphs fit on a line of `width_px` at `font_size`.
pub fn glyphs_per_line(width_px: u32, font_size: u32) -> usize {
    let per_glyph = (font_size.max(1) as f64) * GLYPH_WIDTH_EM;
    ((width_px as f64 / per_glyph).floor() as usize).max(1)
}

/// Word-wraps each paragraph of `text` to at most `max_glyphs` per line.
/// Words longer than a line are split.
pub fn wrap_caption(text: &str, max_glyphs: usize) -> Vec<String> {
    let max_glyphs = max_glyphs.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_glyphs {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_glyphs);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            if word.is_empty() {
                continue;
            }

            let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
            if needed > max_glyphs {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        if current_len > 0 || paragraph.trim().is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Escapes a path for use as an unquoted option value inside a filtergraph.
/// ffmpeg unescapes twice, once for the graph and once for the filter's
/// options, so each level gets its own pass.
pub fn escape_filter_path(path: &Path) -> String {
    let value = path.display().to_string().replace('\\', "/");
    let option = escape_chars(&value, &['\\', '\'', ':']);
    escape_chars(&option, &['\\', '\'', '[', ']', ',', ';'])
}

fn escape_chars(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if special.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Writes each line to `dir/{stem}_{n}.txt` and returns the paths in order.
pub async fn write_line_files(dir: &Path, stem: &str, lines: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let path = dir.join(format!("{}_{}.txt", stem, idx));
        fs::write(&path, line.as_bytes())
            .await
            .with_context(|| format!("Failed to write caption {}", path.display()))?;
        paths.push(path);
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_scales_with_font() {
        assert_eq!(glyphs_per_line(1024, 50), 37);
        assert_eq!(glyphs_per_line(10, 100), 1);
    }

    #[test]
    fn wraps_on_words_and_keeps_paragraphs() {
        let lines = wrap_caption("Paris - nuageux\nMax: 20°C | Min: 10°C", 12);
        assert_eq!(
            lines,
            ["Paris -", "nuageux", "Max: 20°C |", "Min: 10°C"]
        );
    }

    #[test]
    fn splits_overlong_words() {
        let lines = wrap_caption("Saint-Rémy-de-Provence x", 8);
        assert_eq!(lines, ["Saint-Ré", "my-de-Pr", "ovence x"]);
    }

    #[test]
    fn blank_paragraph_kept_as_blank_line() {
        assert_eq!(wrap_caption("a\n\nb", 10), ["a", "", "b"]);
    }

    #[test]
    fn escapes_for_graph_and_option_levels() {
        assert_eq!(escape_filter_path(Path::new("/tmp/seg_0.txt")), "/tmp/seg_0.txt");
        // C: becomes C\: for the option parser, then C\\: for the graph parser
        assert_eq!(escape_filter_path(Path::new("C:\\fonts\\a.ttf")), r"C\\:/fonts/a.ttf");
        // a quote needs three backslashes
        assert_eq!(escape_filter_path(Path::new("/f/l'eau.ttf")), r"/f/l\\\'eau.ttf");
        assert_eq!(escape_filter_path(Path::new("/f/a,b[1].ttf")), r"/f/a\,b\[1\].ttf");
    }

    #[test]
    fn escaped_path_survives_two_unescape_passes() {
        fn unescape(s: &str) -> String {
            let mut out = String::new();
            let mut chars = s.chars();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => out.extend(chars.next()),
                    _ => out.push(c),
                }
            }
            out
        }
        let raw = "/srv/l'été: [v1], final;.ttf";
        let twice = unescape(&unescape(&escape_filter_path(Path::new(raw))));
        assert_eq!(twice, raw);
    }

    #[tokio::test]
    async fn line_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let lines = vec!["un".to_string(), "deux".to_string()];
        let paths = write_line_files(dir.path(), "seg0", &lines).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(tokio::fs::read_to_string(&paths[1]).await.unwrap(), "deux");
    }
}
