//! crates/quran_companion_core/src/juz.rs
//!
//! Juz boundary table and the verse-to-Juz resolvers.
//!
//! Two precisions coexist: [`resolve_juz`] is exact per verse, while
//! [`juz_for_surah`] only records the Juz of a surah's opening verse and is
//! meant for quick labels.

use crate::domain::{JuzBoundary, JuzMarker, VerseKey};
use crate::numerals::{localize_number, Locale};

pub const JUZ_COUNT: u8 = 30;

const fn boundary(juz: u8, start: (u16, u16), end: (u16, u16)) -> JuzBoundary {
    JuzBoundary {
        juz,
        start: VerseKey::new(start.0, start.1),
        end: VerseKey::new(end.0, end.1),
    }
}

pub const JUZ_BOUNDARIES: [JuzBoundary; JUZ_COUNT as usize] = [
    boundary(1, (1, 1), (2, 141)),
    boundary(2, (2, 142), (2, 252)),
    boundary(3, (2, 253), (3, 92)),
    boundary(4, (3, 93), (4, 23)),
    boundary(5, (4, 24), (4, 147)),
    boundary(6, (4, 148), (5, 81)),
    boundary(7, (5, 82), (6, 110)),
    boundary(8, (6, 111), (7, 87)),
    boundary(9, (7, 88), (8, 40)),
    boundary(10, (8, 41), (9, 92)),
    boundary(11, (9, 93), (11, 5)),
    boundary(12, (11, 6), (12, 52)),
    boundary(13, (12, 53), (14, 52)),
    boundary(14, (15, 1), (16, 128)),
    boundary(15, (17, 1), (18, 74)),
    boundary(16, (18, 75), (20, 135)),
    boundary(17, (21, 1), (22, 78)),
    boundary(18, (23, 1), (25, 20)),
    boundary(19, (25, 21), (27, 55)),
    boundary(20, (27, 56), (29, 45)),
    boundary(21, (29, 46), (33, 30)),
    boundary(22, (33, 31), (36, 27)),
    boundary(23, (36, 28), (39, 31)),
    boundary(24, (39, 32), (41, 46)),
    boundary(25, (41, 47), (45, 37)),
    boundary(26, (46, 1), (51, 30)),
    boundary(27, (51, 31), (57, 29)),
    boundary(28, (58, 1), (66, 12)),
    boundary(29, (67, 1), (77, 50)),
    boundary(30, (78, 1), (114, 6)),
];

// Juz of each surah's opening verse, indexed by surah number - 1.
const SURAH_OPENING_JUZ: [u8; 114] = [
    1, 1, 3, 4, 6, 7, 8, 9, 10, 11, 11, 12, 13, 13, 14, 14, 15, 15, 16, 16, 17, 17, 18, 18, 18, 19,
    19, 20, 20, 21, 21, 21, 21, 22, 22, 22, 23, 23, 23, 24, 24, 25, 25, 25, 25, 26, 26, 26, 26, 26,
    26, 27, 27, 27, 27, 27, 27, 28, 28, 28, 28, 28, 28, 28, 28, 28, 29, 29, 29, 29, 29, 29, 29, 29,
    29, 29, 29, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
];

/// Outcome of an exact Juz lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JuzLookup {
    Found(u8),
    /// No boundary record contains the address. Never produced for a canonical verse.
    NotFound,
}

impl JuzLookup {
    pub fn juz(self) -> Option<u8> {
        match self {
            JuzLookup::Found(juz) => Some(juz),
            JuzLookup::NotFound => None,
        }
    }
}

/// Exact Juz of a verse address.
///
/// Callers are expected to pass a verse that exists; ayah numbers are not
/// checked against per-surah counts, so an overflowing ayah may land in the
/// following record's range.
pub fn resolve_juz(surah: u16, ayah: u16) -> JuzLookup {
    let verse = VerseKey::new(surah, ayah);
    JUZ_BOUNDARIES
        .iter()
        .find(|record| record.contains(verse))
        .map_or(JuzLookup::NotFound, |record| JuzLookup::Found(record.juz))
}

/// Legacy display variant: falls back to Juz 1 when nothing matches.
pub fn resolve_juz_or_first(surah: u16, ayah: u16) -> u8 {
    resolve_juz(surah, ayah).juz().unwrap_or(1)
}

/// Verses inside `surah` (other than ayah 1) where a new Juz begins, ascending by ayah.
pub fn find_intra_surah_boundaries(surah: u16) -> Vec<JuzMarker> {
    let mut markers: Vec<JuzMarker> = JUZ_BOUNDARIES
        .iter()
        .filter(|record| record.start.surah == surah && record.start.ayah > 1)
        .map(|record| JuzMarker {
            ayah: record.start.ayah,
            juz_ending: record.juz - 1,
            juz_starting: record.juz,
        })
        .collect();
    markers.sort_by_key(|marker| marker.ayah);
    markers
}

/// Coarse Juz of a surah: the one containing its opening verse.
pub fn juz_for_surah(surah: u16) -> Option<u8> {
    let index = usize::from(surah).checked_sub(1)?;
    SURAH_OPENING_JUZ.get(index).copied()
}

/// Boundary record for a Juz number, if it exists.
pub fn boundary_for(juz: u8) -> Option<&'static JuzBoundary> {
    JUZ_BOUNDARIES.get(usize::from(juz).checked_sub(1)?)
}

/// "Juz N" / "الجزء N" in the digits of the locale.
pub fn juz_label(juz: u8, locale: Locale) -> String {
    let number = localize_number(u32::from(juz), locale);
    match locale {
        Locale::English => format!("Juz {}", number),
        Locale::Arabic => format!("الجزء {}", number),
    }
}
