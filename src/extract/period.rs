// src/extract/period.rs

use chrono::{Month, NaiveDate};
use regex::Regex;
use std::cmp::Ordering;

/// A reporting period column such as `Mar '24`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Period {
    pub label: String,
    /// First day of the period's month.
    pub date: NaiveDate,
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date
            .cmp(&other.date)
            .then_with(|| self.label.cmp(&other.label))
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Recognises period labels and turns them into [`Period`]s.
#[derive(Debug, Clone)]
pub struct PeriodMatcher {
    re: Regex,
}

impl PeriodMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(pattern)?,
        })
    }

    /// True when `text` (trimmed) looks like a period label.
    pub fn is_period(&self, text: &str) -> bool {
        self.parse(text).is_some()
    }

    /// `"Mar '24"` → `Period { label: "Mar '24", date: 2024-03-01 }`.
    /// Two-digit years are taken as 20yy.
    pub fn parse(&self, text: &str) -> Option<Period> {
        let label = text.trim();
        let caps = self.re.captures(label)?;
        let month: Month = caps.get(1)?.as_str().parse().ok()?;
        let yy: i32 = caps.get(2)?.as_str().parse().ok()?;
        let date = NaiveDate::from_ymd_opt(2000 + yy, month.number_from_month(), 1)?;
        Some(Period {
            label: label.to_string(),
            date,
        })
    }
}

/// Most recent first.
pub fn sort_descending(periods: &mut [Period]) {
    periods.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.label.cmp(&b.label)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::rules::ParserRules;

    fn matcher() -> PeriodMatcher {
        PeriodMatcher::new(&ParserRules::default().period_pattern).unwrap()
    }

    #[test]
    fn parses_quarterly_and_yearly_labels() {
        let m = matcher();
        let p = m.parse("Mar '24").unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(p.label, "Mar '24");

        let p = m.parse(" Dec 19 ").unwrap();
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2019, 12, 1).unwrap());
        assert_eq!(p.label, "Dec 19");
    }

    #[test]
    fn rejects_near_misses() {
        let m = matcher();
        assert!(!m.is_period("12 mths"));
        assert!(!m.is_period("Mar 2024"));
        assert!(!m.is_period("March '24"));
        assert!(!m.is_period(""));
        assert!(!m.is_period("Item"));
    }

    #[test]
    fn descending_order_ignores_discovery_order() {
        let m = matcher();
        let mut ps: Vec<Period> = ["Dec '22", "Mar '24", "Jun '23"]
            .iter()
            .map(|l| m.parse(l).unwrap())
            .collect();
        sort_descending(&mut ps);
        let labels: Vec<&str> = ps.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["Mar '24", "Jun '23", "Dec '22"]);
    }
}
