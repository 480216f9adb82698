use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A fully resolved calendar month. Orders chronologically and renders in
/// the `"YYYY年M月"` form used by the persisted store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: u16,
    pub month: u8,
}

impl MonthKey {
    pub fn new(year: u16, month: u8) -> Self {
        Self { year, month }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}年{}月", self.year, self.month)
    }
}

fn month_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(\d{4})-(\d{1,2})").unwrap(),
            Regex::new(r"(\d{4})年(\d{1,2})月").unwrap(),
            Regex::new(r"(\d{4})/(\d{1,2})").unwrap(),
        ]
    })
}

/// Extract `(year, month)` from free-form month text.
///
/// Accepted forms, tried in order with first match winning: `YYYY-M`,
/// `YYYY年M月`, `YYYY/M`. Returns `None` for empty text, unmatched text or
/// an out-of-range month; callers treat `None` as "drop this record from
/// aggregation", never as an error.
pub fn parse_month(text: &str) -> Option<MonthKey> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for pattern in month_patterns() {
        if let Some(caps) = pattern.captures(text) {
            let year: u16 = caps[1].parse().ok()?;
            let month: u8 = caps[2].parse().ok()?;
            if year == 0 || !(1..=12).contains(&month) {
                return None;
            }
            return Some(MonthKey { year, month });
        }
    }

    None
}
