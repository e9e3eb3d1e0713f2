// src/merge/mod.rs
//
// Folds the page tables of one paginated statement into a single table.

pub mod csv;

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, trace};

use crate::error::StatementError;
use crate::extract::{period, CellValue, PageTable, Period, PeriodMatcher, ITEM_COLUMN};

/// Line item label → (column key → cell), items in first-seen order.
#[derive(Debug, Clone)]
pub struct MergedStatement {
    periods_re: PeriodMatcher,
    order: Vec<String>,
    cells: HashMap<String, HashMap<String, Option<CellValue>>>,
    periods: BTreeSet<Period>,
    stray: BTreeSet<String>,
}

impl MergedStatement {
    pub fn new(periods: PeriodMatcher) -> Self {
        Self {
            periods_re: periods,
            order: Vec::new(),
            cells: HashMap::new(),
            periods: BTreeSet::new(),
            stray: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Read back one cell; `None` both for missing and for null cells.
    pub fn get(&self, item: &str, column: &str) -> Option<&CellValue> {
        self.cells.get(item)?.get(column)?.as_ref()
    }

    /// Merge one page. Earlier pages win every cell they already filled.
    pub fn absorb(&mut self, page: &PageTable) {
        for label in page.column_labels() {
            if let Some(p) = self.periods_re.parse(label) {
                self.periods.insert(p);
            }
        }

        for item in &page.items {
            if item.label.is_empty() {
                continue;
            }
            self.touch(&item.label);
            for (column, value) in &item.values {
                self.fill_if_absent(&item.label, column, value.clone());
            }
        }
        debug!(
            page_items = page.items.len(),
            total_items = self.order.len(),
            periods = self.periods.len(),
            "absorbed page"
        );
    }

    fn touch(&mut self, label: &str) {
        if !self.cells.contains_key(label) {
            self.order.push(label.to_string());
            self.cells.insert(label.to_string(), HashMap::new());
        }
    }

    /// Write `value` into `(item, column)` unless a non-null value is
    /// already there. Null never overwrites anything.
    pub fn fill_if_absent(&mut self, item: &str, column: &str, value: Option<CellValue>) {
        if column.is_empty() || column == ITEM_COLUMN {
            return;
        }
        let is_period = match self.periods_re.parse(column) {
            Some(p) => {
                self.periods.insert(p);
                true
            }
            None => false,
        };
        if !is_period && value.is_none() {
            return;
        }
        self.touch(item);
        let Some(row) = self.cells.get_mut(item) else {
            return;
        };
        let slot = row.entry(column.to_string()).or_insert(None);
        if slot.is_none() {
            *slot = value;
        } else if value.is_some() {
            trace!(item, column, "cell already filled by an earlier page");
        }
        if !is_period && slot.is_some() {
            self.stray.insert(column.to_string());
        }
    }

    /// `"Item"`, periods most recent first, then stray keys alphabetically.
    pub fn columns(&self) -> Vec<String> {
        let mut periods: Vec<Period> = self.periods.iter().cloned().collect();
        period::sort_descending(&mut periods);
        let mut columns = Vec::with_capacity(1 + periods.len() + self.stray.len());
        columns.push(ITEM_COLUMN.to_string());
        columns.extend(periods.into_iter().map(|p| p.label));
        columns.extend(self.stray.iter().cloned());
        columns
    }

    /// Square the table off: one row per item, one cell per column.
    pub fn finish(&self) -> Result<StatementTable, StatementError> {
        if self.is_empty() {
            return Err(StatementError::EmptyMergeResult);
        }
        let columns = self.columns();
        let rows = self
            .order
            .iter()
            .map(|label| {
                let row = &self.cells[label];
                StatementRow {
                    label: label.clone(),
                    cells: columns[1..]
                        .iter()
                        .map(|c| row.get(c).cloned().flatten())
                        .collect(),
                }
            })
            .collect();
        Ok(StatementTable { columns, rows })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatementRow {
    pub label: String,
    /// Aligned with `StatementTable::columns[1..]`.
    pub cells: Vec<Option<CellValue>>,
}

/// The final merged statement.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementTable {
    pub columns: Vec<String>,
    pub rows: Vec<StatementRow>,
}

impl StatementTable {
    pub fn row(&self, label: &str) -> Option<&StatementRow> {
        self.rows.iter().find(|r| r.label == label)
    }

    pub fn cell(&self, label: &str, column: &str) -> Option<&CellValue> {
        let idx = self.columns.iter().position(|c| c == column)?.checked_sub(1)?;
        self.row(label)?.cells.get(idx)?.as_ref()
    }
}
