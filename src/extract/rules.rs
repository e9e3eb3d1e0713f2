// src/extract/rules.rs

use serde::{Deserialize, Serialize};

/// Bumped whenever a default below changes how rows are classified.
pub const RULESET_VERSION: u32 = 1;

/// Everything the page parser needs to know about the site's markup.
///
/// Defaults match moneycontrol's printable financials page. All fields can be
/// overridden from the `rules:` section of the YAML config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserRules {
    /// CSS selector narrowing the candidate tables.
    pub table_selector: String,
    /// Class carried by label/header cells.
    pub header_class: String,
    /// Class carried by ordinary value cells.
    pub value_class: String,
    /// Regex a period label must match in full. Capture 1 is the month
    /// abbreviation, capture 2 the two-digit year.
    pub period_pattern: String,
    /// Second-cell texts of decorative header rows ("12 mths").
    pub noise_markers: Vec<String>,
    /// Label marker after which nothing on the page is data.
    pub terminator: String,
    /// How many leading rows of a candidate table are checked for the header.
    pub header_scan_rows: usize,
    /// `onclick` fragment of the "previous periods" link.
    pub prev_nav_marker: String,
    /// Form whose hidden inputs are echoed back for the next page.
    pub form_selector: String,
    pub nav_field: String,
    pub nav_value: String,
    /// Cell holding the company name.
    pub company_selector: String,
}

impl Default for ParserRules {
    fn default() -> Self {
        Self {
            table_selector: r##"table.table4[width="100%"][bgcolor="#ffffff"]"##.into(),
            header_class: "detb".into(),
            value_class: "det".into(),
            period_pattern: r"^(Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) '?(\d{2})$"
                .into(),
            noise_markers: vec!["12 mths".into()],
            terminator: "Source :".into(),
            header_scan_rows: 5,
            prev_nav_marker: "post_prevnext('2')".into(),
            form_selector: r#"form[name="finyear_frm"]"#.into(),
            nav_field: "nav".into(),
            nav_value: "next".into(),
            company_selector: "td.det".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let rules: ParserRules =
            serde_yaml::from_str("terminator: 'Data Source'\nheader_scan_rows: 8\n").unwrap();
        assert_eq!(rules.terminator, "Data Source");
        assert_eq!(rules.header_scan_rows, 8);
        assert_eq!(rules.header_class, "detb");
        assert_eq!(rules.noise_markers, vec!["12 mths".to_string()]);
        assert!(rules.table_selector.contains(r##"[bgcolor="#ffffff"]"##));
    }
}
