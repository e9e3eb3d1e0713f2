// src/extract/clean.rs

use std::fmt;

/// A non-missing cell. Missing cells are `None` at the use site.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Number(f64),
    /// Text the cleaner could not read as a number, kept verbatim (trimmed).
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// Empty and `-` are missing; `1,234.50` is `1234.5`; anything else stays text.
pub fn clean_value(raw: &str) -> Option<CellValue> {
    let text = raw.trim();
    if text.is_empty() || text == "-" {
        return None;
    }
    match text.replace(',', "").parse::<f64>() {
        Ok(n) if n.is_finite() => Some(CellValue::Number(n)),
        _ => Some(CellValue::Text(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_markers_are_null_not_zero() {
        assert_eq!(clean_value(""), None);
        assert_eq!(clean_value("   "), None);
        assert_eq!(clean_value(" - "), None);
    }

    #[test]
    fn numbers_lose_thousands_separators() {
        assert_eq!(clean_value("1,234.50"), Some(CellValue::Number(1234.5)));
        assert_eq!(clean_value("-2,079.00"), Some(CellValue::Number(-2079.0)));
        assert_eq!(clean_value("0.00"), Some(CellValue::Number(0.0)));
        assert_eq!(clean_value("1,00,000"), Some(CellValue::Number(100000.0)));
    }

    #[test]
    fn unreadable_cells_keep_their_text() {
        assert_eq!(clean_value(" N/A "), Some(CellValue::Text("N/A".into())));
        assert_eq!(clean_value("--"), Some(CellValue::Text("--".into())));
        assert_eq!(clean_value("NaN"), Some(CellValue::Text("NaN".into())));
    }

    #[test]
    fn display_is_locale_neutral() {
        assert_eq!(CellValue::Number(1234.5).to_string(), "1234.5");
        assert_eq!(CellValue::Number(-0.75).to_string(), "-0.75");
        assert_eq!(CellValue::Text("N/A".into()).to_string(), "N/A");
    }
}
