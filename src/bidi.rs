//! Arabic text preparation for renderers that lay glyphs out left to right
//! without shaping: letters are replaced by their contextual presentation
//! forms, then each line is reordered into visual order.

use ar_reshaper::ArabicReshaper;
use unicode_bidi::BidiInfo;

fn has_rtl(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF)
    })
}

/// Visual-order rendition of one logical line. Text without right-to-left
/// characters is returned untouched.
pub fn shape_for_display(line: &str) -> String {
    if !has_rtl(line) {
        return line.to_string();
    }

    let reshaped = ArabicReshaper::default().reshape(line);
    let info = BidiInfo::new(&reshaped, None);
    let mut out = String::with_capacity(reshaped.len());
    for para in &info.paragraphs {
        out.push_str(&info.reorder_line(para, para.range.clone()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin_is_untouched() {
        assert_eq!(shape_for_display("Paris 20°C"), "Paris 20°C");
        assert_eq!(shape_for_display(""), "");
    }

    #[test]
    fn arabic_word_is_shaped_and_reversed() {
        // teh initial, waw final, noon initial, seen final; shown right to left
        assert_eq!(
            shape_for_display("تونس"),
            "\u{FEB2}\u{FEE7}\u{FEEE}\u{FE97}"
        );
    }

    #[test]
    fn symbols_next_to_arabic_stay_on_their_line() {
        assert_eq!(shape_for_display("↓ 19°C"), "↓ 19°C");
        let shaped = shape_for_display("المدينة: تونس");
        assert!(!shaped.contains("تونس"));
        assert!(!shaped.contains('\n'));
    }
}
