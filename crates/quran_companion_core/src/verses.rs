//! crates/quran_companion_core/src/verses.rs
//!
//! Per-surah verse counts of the canonical text and address validation.

use crate::domain::VerseKey;

pub const SURAH_COUNT: u16 = 114;

/// Number of verses in the canonical text.
pub const TOTAL_AYAHS: usize = 6236;

const AYAH_COUNTS: [u16; SURAH_COUNT as usize] = [
    7, 286, 200, 176, 120, 165, 206, 75, 129, 109, 123, 111, 43, 52, 99, 128, 111, 110, 98, 135,
    112, 78, 118, 64, 77, 227, 93, 88, 69, 60, 34, 30, 73, 54, 45, 83, 182, 88, 75, 85, 54, 53,
    89, 59, 37, 35, 38, 29, 18, 45, 60, 49, 62, 55, 78, 96, 29, 22, 24, 13, 14, 11, 11, 18, 12,
    12, 30, 52, 52, 44, 28, 28, 20, 56, 40, 31, 50, 40, 46, 42, 29, 19, 36, 25, 22, 17, 19, 26,
    30, 20, 15, 21, 11, 8, 8, 19, 5, 8, 8, 11, 11, 8, 3, 9, 5, 4, 7, 3, 6, 3, 5, 4, 5, 6,
];

/// Verse count of `surah`, or `None` outside 1..=114.
pub fn ayah_count(surah: u16) -> Option<u16> {
    let index = usize::from(surah).checked_sub(1)?;
    AYAH_COUNTS.get(index).copied()
}

/// True when the address names a verse that exists in the canonical text.
pub fn is_valid(verse: VerseKey) -> bool {
    verse.ayah >= 1 && ayah_count(verse.surah).is_some_and(|count| verse.ayah <= count)
}

/// Every canonical verse address in reading order.
pub fn all_verses() -> impl Iterator<Item = VerseKey> {
    (1..=SURAH_COUNT).flat_map(|surah| {
        let count = ayah_count(surah).unwrap_or(0);
        (1..=count).map(move |ayah| VerseKey::new(surah, ayah))
    })
}
