//! Search query and date window construction.

use chrono::{Duration, NaiveDate};

/// Creation-date window for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    /// `[today - n days, today]`.
    DaysBack(u32),
    /// Explicit inclusive range.
    Range { start: NaiveDate, end: NaiveDate },
}

impl DateWindow {
    /// Resolves the window against `today`, returning `(start, end)` with `start <= end`.
    #[must_use]
    pub fn resolve(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::DaysBack(days) => (today - Duration::days(i64::from(days)), today),
            Self::Range { start, end } if start <= end => (start, end),
            Self::Range { start, end } => (end, start),
        }
    }
}

/// Builds the E-utilities term: an OR over quoted keywords ANDed with a
/// `[Date - Create]` range.
///
/// Returns `None` when no usable keyword remains.
#[must_use]
pub fn build_search_term(keywords: &[String], start: NaiveDate, end: NaiveDate) -> Option<String> {
    let clauses: Vec<String> = keywords
        .iter()
        .map(|keyword| keyword.replace('"', "").trim().to_string())
        .filter(|keyword| !keyword.is_empty())
        .map(|keyword| format!("\"{keyword}\""))
        .collect();
    if clauses.is_empty() {
        return None;
    }

    Some(format!(
        "({}) AND {}:{}[Date - Create]",
        clauses.join(" OR "),
        start.format("%Y/%m/%d"),
        end.format("%Y/%m/%d")
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_back_window() {
        let (start, end) = DateWindow::DaysBack(7).resolve(date(2024, 3, 8));
        assert_eq!(start, date(2024, 3, 1));
        assert_eq!(end, date(2024, 3, 8));
    }

    #[test]
    fn test_reversed_range_is_normalized() {
        let window = DateWindow::Range {
            start: date(2024, 2, 1),
            end: date(2024, 1, 1),
        };
        assert_eq!(window.resolve(date(2030, 1, 1)), (date(2024, 1, 1), date(2024, 2, 1)));
    }

    #[test]
    fn test_build_search_term_format() {
        let keywords = vec!["mild cognitive impairment".to_string(), "MCI".to_string()];
        let term = build_search_term(&keywords, date(2024, 1, 1), date(2024, 1, 2)).unwrap();
        assert_eq!(
            term,
            "(\"mild cognitive impairment\" OR \"MCI\") AND 2024/01/01:2024/01/02[Date - Create]"
        );
    }

    #[test]
    fn test_build_search_term_strips_quotes_and_blanks() {
        let keywords = vec!["  ".to_string(), "say \"hi\"".to_string()];
        let term = build_search_term(&keywords, date(2024, 1, 1), date(2024, 1, 1)).unwrap();
        assert!(term.starts_with("(\"say hi\")"));
    }

    #[test]
    fn test_build_search_term_empty_keywords() {
        assert!(build_search_term(&[], date(2024, 1, 1), date(2024, 1, 1)).is_none());
    }
}
