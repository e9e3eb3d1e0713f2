// src/extract/mod.rs
//
// One page of HTML in, one statement table (plus pagination hints) out.

pub mod clean;
pub mod nav;
pub mod period;
pub mod rows;
pub mod rules;
pub mod table;

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};

use crate::error::ExtractError;
pub use clean::{clean_value, CellValue};
pub use nav::{FormParams, NextPage};
pub use period::{Period, PeriodMatcher};
pub use rules::{ParserRules, RULESET_VERSION};

pub const ITEM_COLUMN: &str = "Item";

pub(crate) static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
pub(crate) static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("td selector"));

/// How a line item was recognised on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Label-only heading such as `EXPENDITURE`.
    Section,
    /// Label plus one cell per period.
    Data,
    /// Header-styled label whose cell count disagrees with the header row.
    Degenerate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub label: String,
    pub kind: RowKind,
    /// `(header label, cleaned cell)` in page order. Empty unless `kind` is `Data`.
    pub values: Vec<(String, Option<CellValue>)>,
}

impl LineItem {
    pub fn value(&self, column: &str) -> Option<&CellValue> {
        self.values
            .iter()
            .find(|(k, _)| k == column)
            .and_then(|(_, v)| v.as_ref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    /// Labelled rows whose cell count disagreed with the header.
    pub shape_mismatches: usize,
    /// Cells kept as text because they were not numbers.
    pub unparsed_cells: usize,
    /// Decorative, divider and spacer rows.
    pub skipped_rows: usize,
}

/// The statement table of a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageTable {
    /// `"Item"` followed by the page's column labels, left to right.
    pub headers: Vec<String>,
    pub items: Vec<LineItem>,
    pub stats: PageStats,
}

impl PageTable {
    pub fn column_labels(&self) -> &[String] {
        &self.headers[1..]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPage {
    pub company: Option<String>,
    pub table: PageTable,
    pub next: NextPage,
}

/// Compiled form of [`ParserRules`].
#[derive(Debug, Clone)]
pub struct PageParser {
    rules: ParserRules,
    periods: PeriodMatcher,
    table_sel: Selector,
    form_sel: Selector,
    company_sel: Selector,
}

fn compile_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {:?}: {:?}", css, e))
}

impl PageParser {
    pub fn new(rules: &ParserRules) -> Result<Self> {
        let periods = PeriodMatcher::new(&rules.period_pattern)
            .with_context(|| format!("invalid period pattern {:?}", rules.period_pattern))?;
        Ok(Self {
            rules: rules.clone(),
            periods,
            table_sel: compile_selector(&rules.table_selector)?,
            form_sel: compile_selector(&rules.form_selector)?,
            company_sel: compile_selector(&rules.company_selector)?,
        })
    }

    pub fn periods(&self) -> &PeriodMatcher {
        &self.periods
    }

    /// Parse a whole page: statement table, company name and next-page hints.
    #[instrument(level = "debug", skip(self, html), fields(html_len = html.len()))]
    pub fn parse_page(&self, html: &str) -> Result<ParsedPage, ExtractError> {
        let doc = Html::parse_document(html);
        let table = self.extract_table(&doc)?;
        let parsed = ParsedPage {
            company: self.company_name(&doc),
            next: self.next_page(&doc),
            table,
        };
        debug!(
            items = parsed.table.items.len(),
            columns = parsed.table.headers.len() - 1,
            next = ?parsed.next,
            "parsed page"
        );
        Ok(parsed)
    }

    /// Locate the statement table, read its header row and classify every
    /// row after it.
    pub fn extract_table(&self, doc: &Html) -> Result<PageTable, ExtractError> {
        let table = self.locate_table(doc).ok_or(ExtractError::TableNotFound)?;
        let (header_idx, headers) = self
            .header_row(table)
            .ok_or(ExtractError::HeaderNotFound)?;
        let rows = table.select(&TR).skip(header_idx + 1);
        let (items, stats) = self.classify_rows(rows, &headers);
        Ok(PageTable {
            headers,
            items,
            stats,
        })
    }
}

pub(crate) fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.select(&TD).collect()
}

pub(crate) fn cell_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

pub(crate) fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value()
        .attr("class")
        .map_or(false, |c| c.split_whitespace().any(|c| c == class))
}

/// Collapse runs of whitespace (including non-breaking spaces) and trim.
pub(crate) fn squash_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
