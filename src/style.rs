use std::str::FromStr;

pub const FONTS: [&str; 4] = ["Arial", "Courier", "Times New Roman", "Verdana"];
pub const FONT_SIZE_RANGE: (u32, u32) = (30, 100);
pub const DURATION_RANGE: (u32, u32) = (3, 15);

/// Length in seconds of the fade-in and of the crossfade between segments.
pub const EFFECT_SECONDS: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAnimation {
    #[default]
    FadeIn,
    Slide,
    None,
}

impl FromStr for TextAnimation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fadein" => Ok(Self::FadeIn),
            "slide" => Ok(Self::Slide),
            "none" => Ok(Self::None),
            other => Err(format!("unknown animation: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transition {
    #[default]
    Crossfade,
    Cut,
}

impl FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fondu" | "crossfade" => Ok(Self::Crossfade),
            "aucune" | "none" => Ok(Self::Cut),
            other => Err(format!("unknown transition: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleParameters {
    pub font: String,
    /// `RRGGBB`, without the leading '#'.
    pub color: String,
    pub font_size: u32,
    pub segment_seconds: u32,
    pub animation: TextAnimation,
    pub transition: Transition,
}

impl Default for StyleParameters {
    fn default() -> Self {
        Self {
            font: FONTS[0].to_string(),
            color: "FFFFFF".to_string(),
            font_size: 50,
            segment_seconds: 6,
            animation: TextAnimation::FadeIn,
            transition: Transition::Crossfade,
        }
    }
}

/// Raw style fields as they arrive from a form or the command line.
#[derive(Debug, Clone, Default)]
pub struct StyleInput<'a> {
    pub font: Option<&'a str>,
    pub color: Option<&'a str>,
    pub font_size: Option<&'a str>,
    pub segment_seconds: Option<&'a str>,
    pub animation: Option<&'a str>,
    pub transition: Option<&'a str>,
}

fn parse_color(input: &str) -> Option<String> {
    let hex = input.trim().trim_start_matches('#');
    (hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit())).then(|| hex.to_ascii_uppercase())
}

fn clamp_field(input: Option<&str>, (lo, hi): (u32, u32), default: u32) -> u32 {
    input
        .and_then(|v| v.trim().parse::<u32>().ok())
        .map(|v| v.clamp(lo, hi))
        .unwrap_or(default)
}

impl StyleParameters {
    /// Builds parameters from loose input: unknown values fall back to the
    /// defaults and numbers are clamped to the widget ranges.
    pub fn from_input(input: &StyleInput<'_>) -> Self {
        let d = Self::default();
        Self {
            font: input
                .font
                .and_then(|f| FONTS.iter().find(|known| known.eq_ignore_ascii_case(f.trim())))
                .map(|f| f.to_string())
                .unwrap_or(d.font),
            color: input.color.and_then(parse_color).unwrap_or(d.color),
            font_size: clamp_field(input.font_size, FONT_SIZE_RANGE, d.font_size),
            segment_seconds: clamp_field(input.segment_seconds, DURATION_RANGE, d.segment_seconds),
            animation: input
                .animation
                .and_then(|a| a.parse().ok())
                .unwrap_or(d.animation),
            transition: input
                .transition
                .and_then(|t| t.parse().ok())
                .unwrap_or(d.transition),
        }
    }

    pub fn duration(&self) -> f64 {
        self.segment_seconds as f64
    }
}
