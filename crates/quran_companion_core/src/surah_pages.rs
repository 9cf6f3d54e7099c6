//! crates/quran_companion_core/src/surah_pages.rs
//!
//! Printed page span of every surah in the 604-page Madani edition.
//!
//! Consecutive ranges never go backwards and share at most one page, when a
//! surah opens on the page where the previous one closes.

use crate::domain::SurahPageRange;
use crate::numerals::{localize_number, Locale};

pub const PAGE_COUNT: u16 = 604;

const fn range(start: u16, end: u16) -> SurahPageRange {
    SurahPageRange { start, end }
}

const SURAH_PAGES: [SurahPageRange; 114] = [
    range(1, 1), range(2, 49), range(50, 76), range(77, 106), range(106, 127), range(128, 150),
    range(151, 176), range(177, 186), range(187, 207), range(208, 221), range(221, 235), range(235, 248),
    range(249, 255), range(255, 261), range(262, 267), range(267, 281), range(282, 293), range(293, 304),
    range(305, 312), range(312, 321), range(322, 331), range(332, 341), range(342, 349), range(350, 359),
    range(359, 366), range(367, 376), range(377, 385), range(385, 396), range(396, 404), range(404, 410),
    range(411, 414), range(415, 417), range(418, 427), range(428, 434), range(434, 440), range(440, 445),
    range(446, 452), range(453, 458), range(458, 467), range(467, 476), range(477, 482), range(483, 489),
    range(489, 495), range(496, 498), range(499, 502), range(502, 506), range(507, 510), range(511, 515),
    range(515, 517), range(518, 520), range(520, 523), range(523, 525), range(526, 528), range(528, 531),
    range(531, 534), range(534, 537), range(537, 541), range(542, 545), range(545, 548), range(549, 551),
    range(551, 552), range(553, 554), range(554, 555), range(556, 557), range(558, 559), range(560, 561),
    range(562, 564), range(564, 566), range(566, 568), range(568, 570), range(570, 571), range(572, 573),
    range(574, 575), range(575, 577), range(577, 578), range(578, 580), range(580, 581), range(582, 583),
    range(583, 584), range(585, 585), range(586, 586), range(587, 587), range(587, 589), range(589, 589),
    range(590, 590), range(591, 591), range(591, 592), range(592, 592), range(593, 594), range(594, 594),
    range(595, 595), range(595, 596), range(596, 596), range(596, 596), range(597, 597), range(597, 597),
    range(598, 598), range(598, 599), range(599, 599), range(599, 600), range(600, 600), range(600, 600),
    range(601, 601), range(601, 601), range(601, 601), range(602, 602), range(602, 602), range(602, 602),
    range(603, 603), range(603, 603), range(603, 603), range(604, 604), range(604, 604), range(604, 604),
];

/// Page span of `surah`, or `None` outside 1..=114.
pub fn page_range_for_surah(surah: u16) -> Option<SurahPageRange> {
    let index = usize::from(surah).checked_sub(1)?;
    SURAH_PAGES.get(index).copied()
}

/// Localized label for a page span: "Page N" / "Pages N-M" or the Arabic equivalents.
pub fn format_page_range(range: SurahPageRange, locale: Locale) -> String {
    let start = localize_number(u32::from(range.start), locale);
    if range.is_single_page() {
        match locale {
            Locale::English => format!("Page {}", start),
            Locale::Arabic => format!("صفحة {}", start),
        }
    } else {
        let end = localize_number(u32::from(range.end), locale);
        match locale {
            Locale::English => format!("Pages {}-{}", start, end),
            Locale::Arabic => format!("صفحات {}-{}", start, end),
        }
    }
}

/// Label for a surah, or `None` when it has no table entry.
pub fn page_label(surah: u16, locale: Locale) -> Option<String> {
    page_range_for_surah(surah).map(|range| format_page_range(range, locale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_surahs_render_as_documented() {
        assert_eq!(page_label(1, Locale::English).as_deref(), Some("Page 1"));
        assert_eq!(page_label(1, Locale::Arabic).as_deref(), Some("صفحة ١"));
        assert_eq!(page_label(2, Locale::English).as_deref(), Some("Pages 2-49"));
        assert_eq!(page_label(2, Locale::Arabic).as_deref(), Some("صفحات ٢-٤٩"));
    }

    #[test]
    fn unknown_surahs_have_no_label() {
        assert_eq!(page_range_for_surah(0), None);
        assert_eq!(page_label(115, Locale::English), None);
    }

    #[test]
    fn ranges_are_ordered_and_overlap_by_at_most_one_page() {
        assert_eq!(SURAH_PAGES[0].start, 1);
        assert_eq!(SURAH_PAGES[113].end, PAGE_COUNT);
        for (i, pair) in SURAH_PAGES.windows(2).enumerate() {
            let (current, next) = (pair[0], pair[1]);
            assert!(current.start <= current.end, "surah {}", i + 1);
            assert!(next.start >= current.end, "surah {} -> {}", i + 1, i + 2);
            assert!(next.start - current.end <= 1, "surah {} -> {}", i + 1, i + 2);
        }
    }

    #[test]
    fn labels_use_only_the_locale_digits() {
        for surah in 1..=114u16 {
            let english = page_label(surah, Locale::English).unwrap_or_default();
            let arabic = page_label(surah, Locale::Arabic).unwrap_or_default();
            assert!(english.chars().filter(|c| c.is_numeric()).all(|c| c.is_ascii_digit()));
            assert!(arabic.chars().filter(|c| c.is_numeric()).all(|c| ('٠'..='٩').contains(&c)));
            let span = page_range_for_surah(surah).unwrap_or(range(0, 0));
            assert_eq!(english.contains('-'), !span.is_single_page());
            assert_eq!(arabic.contains('-'), !span.is_single_page());
        }
    }
}
