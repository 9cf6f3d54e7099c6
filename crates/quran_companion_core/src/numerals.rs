//! crates/quran_companion_core/src/numerals.rs
//!
//! Display locale and digit substitution for Arabic-mode labels.

const EASTERN_ARABIC_DIGITS: [char; 10] = ['٠', '١', '٢', '٣', '٤', '٥', '٦', '٧', '٨', '٩'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    English,
    Arabic,
}

impl Locale {
    /// Parses a language tag such as `en`, `ar` or `ar-SA`. Unknown tags are `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag.split(['-', '_']).next().unwrap_or_default();
        match primary.to_ascii_lowercase().as_str() {
            "en" => Some(Locale::English),
            "ar" => Some(Locale::Arabic),
            _ => None,
        }
    }
}

/// Replaces every ASCII digit with its Eastern Arabic glyph. Other characters pass through.
pub fn to_eastern_arabic(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => EASTERN_ARABIC_DIGITS[d as usize],
            _ => c,
        })
        .collect()
}

/// Formats a number in the digits of `locale`.
pub fn localize_number(value: u32, locale: Locale) -> String {
    let digits = value.to_string();
    match locale {
        Locale::English => digits,
        Locale::Arabic => to_eastern_arabic(&digits),
    }
}
