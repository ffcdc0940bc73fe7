//! Publication year heuristics for lot titles and descriptions.
//!
//! Strategy, in order:
//! - blank out range expressions ("до 1990", "1890-", "-1910", "от 1880")
//! - look for a year in context ("в 1887", "1887 г.", "1887г.")
//! - fall back to the first bare four-digit number in 1500..=2019
//!
//! The fallback ceiling is deliberately conservative: lots are antiquarian
//! books, and a bare modern-looking number is more often a price or an
//! article code than a publication year.

use chrono::{Datelike, Utc};
use regex::Regex;
use std::sync::LazyLock;

/// Earliest year accepted by any strategy.
pub const MIN_YEAR: i32 = 1500;
/// Ceiling for contextless four-digit numbers.
pub const FALLBACK_MAX_YEAR: i32 = 2019;

/// Range expressions that describe bounds, not the publication year.
static EXCLUSION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(?:до|before)\s+\d{4}").unwrap(),
        Regex::new(r"(?i)\b(?:от|from)\s+\d{4}").unwrap(),
        Regex::new(r"\d{4}-").unwrap(),
        Regex::new(r"-\d{4}").unwrap(),
    ]
});

/// Year-in-context patterns, highest priority first.
static CONTEXT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\bв\s+(\d{4})\b").unwrap(),
        Regex::new(r"\b(\d{4})\s+г\.").unwrap(),
        Regex::new(r"\b(\d{4})г\.").unwrap(),
    ]
});

static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4})\b").unwrap());

/// Extract a plausible publication year, using the current year as the
/// ceiling for context matches.
pub fn extract_year(text: &str) -> Option<i32> {
    extract_year_at(text, Utc::now().year())
}

/// Same as [`extract_year`] with an explicit current year.
pub fn extract_year_at(text: &str, current_year: i32) -> Option<i32> {
    if text.trim().is_empty() {
        return None;
    }

    let cleaned = strip_exclusions(text);

    for pattern in CONTEXT_PATTERNS.iter() {
        let found = pattern
            .captures_iter(&cleaned)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .find(|year| (MIN_YEAR..=current_year).contains(year));
        if found.is_some() {
            return found;
        }
    }

    BARE_YEAR
        .captures_iter(&cleaned)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
        .find(|year| (MIN_YEAR..=FALLBACK_MAX_YEAR).contains(year))
}

/// Blank every exclusion match, all matched against the original text so
/// that "1890-1895" loses both years.
fn strip_exclusions(text: &str) -> String {
    let mut masked = vec![false; text.len()];
    for pattern in EXCLUSION_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            masked[m.range()].iter_mut().for_each(|b| *b = true);
        }
    }
    text.char_indices()
        .map(|(i, c)| if masked[i] { ' ' } else { c })
        .collect()
}

/// Description first, then the title.
pub fn extract_year_from_lot(description: &str, title: &str) -> Option<i32> {
    extract_year(description).or_else(|| extract_year(title))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_year_in_text() {
        assert_eq!(extract_year("Издание 1887 года"), Some(1887));
    }

    #[test]
    fn excluded_range_yields_nothing() {
        assert_eq!(extract_year("до 1990"), None);
        assert_eq!(extract_year("before 1850"), None);
        assert_eq!(extract_year("от 1880"), None);
    }

    #[test]
    fn spaced_dashes_keep_first_year() {
        assert_eq!(extract_year("I - 1907; II - 1903"), Some(1907));
    }

    #[test]
    fn joined_ranges_are_dropped() {
        assert_eq!(extract_year("Журнал 1890-1895, том 3"), None);
        assert_eq!(extract_year("Журнал 1890-1895, переплет 1901"), Some(1901));
    }

    #[test]
    fn context_beats_earlier_bare_number() {
        assert_eq!(extract_year("Тираж 1600 экз. Отпечатано в 1911"), Some(1911));
        assert_eq!(extract_year("Лот 1550, СПб., 1899 г."), Some(1899));
        assert_eq!(extract_year("№ 1700; М., 1923г."), Some(1923));
    }

    #[test]
    fn context_priority_order() {
        // "в YYYY" outranks "YYYY г." regardless of position
        assert_eq!(extract_year("1880 г. переиздано в 1902"), Some(1902));
    }

    #[test]
    fn context_allows_recent_years_fallback_does_not() {
        assert_eq!(extract_year_at("переиздано в 2021", 2024), Some(2021));
        assert_eq!(extract_year_at("каталог 2021", 2024), None);
        assert_eq!(extract_year_at("выпущено в 2030", 2024), None);
    }

    #[test]
    fn out_of_range_numbers_are_skipped() {
        assert_eq!(extract_year("Артикул 1234, издание 1812"), Some(1812));
        assert_eq!(extract_year("нет года"), None);
        assert_eq!(extract_year(""), None);
    }

    #[test]
    fn description_before_title() {
        assert_eq!(extract_year_from_lot("Издано в 1905", "Сказки 1890"), Some(1905));
        assert_eq!(extract_year_from_lot("Хорошее состояние", "Сказки 1890"), Some(1890));
        assert_eq!(extract_year_from_lot("", ""), None);
    }
}
