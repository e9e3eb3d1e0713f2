// src/extract/table.rs

use scraper::{ElementRef, Html};
use tracing::trace;

use super::{cell_text, cells, has_class, squash_ws, PageParser, ITEM_COLUMN, TR};

impl PageParser {
    /// First candidate table, top to bottom, whose leading rows contain a
    /// period header row.
    pub(crate) fn locate_table<'a>(&self, doc: &'a Html) -> Option<ElementRef<'a>> {
        let header_class = self.rules.header_class.as_str();
        doc.select(&self.table_sel).enumerate().find_map(|(idx, table)| {
            let found = table
                .select(&TR)
                .take(self.rules.header_scan_rows)
                .any(|tr| {
                    let tds = cells(tr);
                    tds.len() > 1
                        && has_class(tds[0], header_class)
                        && has_class(tds[1], header_class)
                        && self.periods.is_period(&cell_text(tds[1]))
                });
            trace!(candidate = idx, found, "checked candidate table");
            found.then_some(table)
        })
    }

    /// Index (among the table's rows) and labels of the header row:
    /// `["Item", period, ...]` in page order.
    pub(crate) fn header_row(&self, table: ElementRef<'_>) -> Option<(usize, Vec<String>)> {
        table.select(&TR).enumerate().find_map(|(idx, tr)| {
            let tds = cells(tr);
            if tds.len() > 1
                && has_class(tds[0], &self.rules.header_class)
                && self.periods.is_period(&cell_text(tds[1]))
            {
                let mut headers = Vec::with_capacity(tds.len());
                headers.push(ITEM_COLUMN.to_string());
                headers.extend(tds[1..].iter().map(|td| squash_ws(&cell_text(*td))));
                Some((idx, headers))
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ExtractError;
    use crate::extract::{PageParser, ParserRules};
    use scraper::Html;

    const STATEMENT_TABLE: &str = r##"<table class="table4" width="100%" bgcolor="#ffffff">"##;

    fn parser() -> PageParser {
        PageParser::new(&ParserRules::default()).unwrap()
    }

    #[test]
    fn skips_lookalike_tables() {
        let html = r##"
<table class="table4" width="100%" bgcolor="#ffffff"><tr><td class="detb">Ad</td><td class="detb">12 mths</td></tr></table>
<table class="nav"><tr><td class="detb"></td><td class="detb">Mar '24</td></tr></table>
<table class="table4" width="100%"><tr><td class="detb"></td><td class="detb">Jun '24</td></tr></table>
<table class="table4" width="100%" bgcolor="#ffffff">
  <tr><td class="detb"></td><td class="detb">Dec '23</td><td class="detb">Sep '23</td></tr>
  <tr><td class="det">Net Sales</td><td class="det">10</td><td class="det">9</td></tr>
</table>"##;
        let doc = Html::parse_document(html);
        let table = parser().extract_table(&doc).unwrap();
        assert_eq!(table.headers, vec!["Item", "Dec '23", "Sep '23"]);
        assert_eq!(table.items.len(), 1);
    }

    #[test]
    fn header_must_be_within_scan_window() {
        let mut html = String::from(STATEMENT_TABLE);
        for i in 0..5 {
            html.push_str(&format!(
                r#"<tr><td class="det">filler {}</td><td class="det">x</td></tr>"#,
                i
            ));
        }
        html.push_str(r#"<tr><td class="detb"></td><td class="detb">Mar '24</td></tr></table>"#);
        let doc = Html::parse_document(&html);
        assert_eq!(
            parser().extract_table(&doc).unwrap_err(),
            ExtractError::TableNotFound
        );

        let rules = ParserRules {
            header_scan_rows: 6,
            ..ParserRules::default()
        };
        let table = PageParser::new(&rules).unwrap().extract_table(&doc).unwrap();
        assert_eq!(table.headers, vec!["Item", "Mar '24"]);
    }

    #[test]
    fn period_header_requires_header_styling() {
        let html = r##"
<table class="table4" width="100%" bgcolor="#ffffff">
  <tr><td class="det"></td><td class="det">Mar '24</td></tr>
  <tr><td class="det">Net Sales</td><td class="det">10</td></tr>
</table>"##;
        let doc = Html::parse_document(html);
        assert_eq!(
            parser().extract_table(&doc).unwrap_err(),
            ExtractError::TableNotFound
        );
    }
}
