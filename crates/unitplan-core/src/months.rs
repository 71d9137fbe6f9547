//! Month normalisation for school-year unit plans.
//!
//! Converts the model's month list, or failing that the free-text period
//! phrase, into an ordered, deduplicated set of canonical months.
//!
//! # School-year conventions
//!
//! - The year runs April to March: 4月, 5月, ..., 12月, 1月, 2月, 3月
//! - Ranges expand along that cycle, so "11〜2月" covers the year boundary
//! - "通年" (year-round) means all twelve months
//! - Month numbers are whole digit runs; "13" is invalid, not "1" or "3"

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Calendar month numbers in school-year order.
pub const SCHOOL_YEAR: [u8; 12] = [4, 5, 6, 7, 8, 9, 10, 11, 12, 1, 2, 3];

/// Canonical month labels in school-year order. Also the table column order.
pub const MONTH_LABELS: [&str; 12] = [
    "4月", "5月", "6月", "7月", "8月", "9月", "10月", "11月", "12月", "1月", "2月", "3月",
];

const YEAR_ROUND: &str = "通年";

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*月?").expect("valid regex"));
static MONTH_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)\s*月").expect("valid regex"));
static MONTH_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\s*月?\s*[~〜～\-－‐–]\s*([0-9]+)\s*月?").expect("valid regex")
});

/// A calendar month, 1 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Month(u8);

impl Month {
    pub fn new(number: u32) -> Option<Self> {
        (1..=12).contains(&number).then_some(Self(number as u8))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// Position in the school year: April is 0, March is 11.
    pub fn school_index(self) -> usize {
        ((self.0 + 8) % 12) as usize
    }

    pub fn label(self) -> &'static str {
        MONTH_LABELS[self.school_index()]
    }

    /// All twelve months in school-year order.
    pub fn school_year() -> impl Iterator<Item = Month> {
        SCHOOL_YEAR.iter().map(|&n| Month(n))
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolve the months an item is taught in.
///
/// Resolution order, first non-empty result wins:
///
/// 1. `months`: each element is read as a single month label; unreadable
///    elements are dropped
/// 2. `N月` mentions in `period` that are not part of any range expression
/// 3. The first range expression in `period`, expanded along the school year
///    (an invalid endpoint yields nothing)
/// 4. "通年" in `period` → all twelve months
///
/// Otherwise the result is empty. Duplicates keep their first position.
pub fn normalize_months(months: &[String], period: &str) -> Vec<Month> {
    if !months.is_empty() {
        let picked = dedup(months.iter().filter_map(|m| parse_month_label(m)));
        if !picked.is_empty() {
            return picked;
        }
    }

    let text = fold_digits(period);
    let range = MONTH_RANGE.captures(&text);
    let range_spans: Vec<Range<usize>> =
        MONTH_RANGE.find_iter(&text).map(|m| m.range()).collect();

    let standalone = dedup(
        MONTH_MENTION
            .captures_iter(&text)
            .filter(|caps| {
                caps.get(0)
                    .is_some_and(|m| !range_spans.iter().any(|r| overlaps(&m.range(), r)))
            })
            .filter_map(|caps| caps.get(1).and_then(|m| parse_number(m.as_str()))),
    );
    if !standalone.is_empty() {
        return standalone;
    }

    if let Some(caps) = range {
        let start = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        let end = caps.get(2).and_then(|m| m.as_str().parse::<u32>().ok());
        return match (start, end) {
            (Some(start), Some(end)) => expand_range(start, end),
            _ => Vec::new(),
        };
    }

    if text.contains(YEAR_ROUND) {
        return Month::school_year().collect();
    }
    Vec::new()
}

/// Read a single month from a label such as "4月", "4", " 10 月".
pub fn parse_month_label(value: &str) -> Option<Month> {
    let text = fold_digits(value);
    let caps = LEADING_NUMBER.captures(&text)?;
    parse_number(caps.get(1)?.as_str())
}

/// Expand an inclusive range along the school year, wrapping past March.
///
/// Either endpoint outside 1..=12 yields an empty range.
pub fn expand_range(start: u32, end: u32) -> Vec<Month> {
    let (Some(start), Some(end)) = (Month::new(start), Month::new(end)) else {
        return Vec::new();
    };
    let (si, ei) = (start.school_index(), end.school_index());
    let numbers: Vec<u8> = if si <= ei {
        SCHOOL_YEAR[si..=ei].to_vec()
    } else {
        SCHOOL_YEAR[si..]
            .iter()
            .chain(&SCHOOL_YEAR[..=ei])
            .copied()
            .collect()
    };
    numbers.into_iter().map(Month).collect()
}

fn parse_number(digits: &str) -> Option<Month> {
    digits.parse::<u32>().ok().and_then(Month::new)
}

fn dedup(months: impl Iterator<Item = Month>) -> Vec<Month> {
    let mut out: Vec<Month> = Vec::new();
    for m in months {
        if !out.contains(&m) {
            out.push(m);
        }
    }
    out
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Fold full-width digits (０-９) to ASCII.
fn fold_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect()
}
