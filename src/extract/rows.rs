// src/extract/rows.rs

use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use tracing::{debug, trace};

use super::{
    cell_text, cells, clean_value, has_class, CellValue, LineItem, PageParser, PageStats, RowKind,
};

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));

/// What a single `<tr>` turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verdict {
    /// Row without cells.
    Empty,
    /// Decorative header such as `12 mths`.
    Noise,
    /// Image-only divider.
    Divider,
    /// No label and no values.
    Spacer,
    /// Values without a label; nothing to file them under.
    Unlabelled,
    /// Footer marker; nothing after it on the page is data.
    Terminator,
    Item(LineItem),
    /// Labelled row that fits none of the shapes above.
    Discard,
}

/// Label text with non-breaking spaces turned into plain ones.
fn item_label(cell: ElementRef<'_>) -> String {
    cell_text(cell).replace('\u{a0}', " ").trim().to_string()
}

fn is_blank(cell: &ElementRef<'_>) -> bool {
    cell_text(*cell).trim().is_empty()
}

impl PageParser {
    pub(crate) fn classify_rows<'a>(
        &self,
        rows: impl Iterator<Item = ElementRef<'a>>,
        headers: &[String],
    ) -> (Vec<LineItem>, PageStats) {
        let mut items = Vec::new();
        let mut stats = PageStats::default();

        for row in rows {
            match self.classify_row(&cells(row), headers) {
                Verdict::Empty => {}
                Verdict::Noise | Verdict::Divider | Verdict::Spacer | Verdict::Unlabelled => {
                    stats.skipped_rows += 1
                }
                Verdict::Terminator => {
                    trace!("terminator row reached");
                    break;
                }
                Verdict::Item(item) => {
                    if item.kind == RowKind::Degenerate {
                        stats.shape_mismatches += 1;
                    }
                    stats.unparsed_cells += item
                        .values
                        .iter()
                        .filter(|(_, v)| matches!(v, Some(CellValue::Text(_))))
                        .count();
                    items.push(item);
                }
                Verdict::Discard => stats.shape_mismatches += 1,
            }
        }

        if stats.shape_mismatches > 0 || stats.unparsed_cells > 0 {
            debug!(
                shape_mismatches = stats.shape_mismatches,
                unparsed_cells = stats.unparsed_cells,
                "page had irregular rows"
            );
        }
        (items, stats)
    }

    /// Decide what one row is. `headers` is the page's header row including
    /// the leading `"Item"`.
    pub(crate) fn classify_row(&self, tds: &[ElementRef<'_>], headers: &[String]) -> Verdict {
        let Some((first, values)) = tds.split_first() else {
            return Verdict::Empty;
        };
        let header_class = self.rules.header_class.as_str();

        if let Some(second) = values.first() {
            let text = cell_text(*second);
            let styled = has_class(*second, header_class)
                || has_class(*second, &self.rules.value_class);
            if styled && self.rules.noise_markers.iter().any(|m| text.contains(m.as_str())) {
                return Verdict::Noise;
            }
        }

        let label = item_label(*first);
        if label.contains(self.rules.terminator.as_str()) {
            return Verdict::Terminator;
        }
        if values.is_empty() && label.is_empty() && first.select(&IMG).next().is_some() {
            return Verdict::Divider;
        }
        let siblings_blank = values.iter().all(is_blank);
        if label.is_empty() {
            return if siblings_blank {
                Verdict::Spacer
            } else {
                Verdict::Unlabelled
            };
        }

        let expected = headers.len().saturating_sub(1);
        let header_styled = has_class(*first, header_class);

        if header_styled && (values.len() < expected || siblings_blank) {
            return Verdict::Item(LineItem {
                label,
                kind: RowKind::Section,
                values: Vec::new(),
            });
        }
        if values.len() == expected {
            let values = headers[1..]
                .iter()
                .zip(values)
                .map(|(h, td)| (h.clone(), clean_value(&cell_text(*td))))
                .collect();
            return Verdict::Item(LineItem {
                label,
                kind: RowKind::Data,
                values,
            });
        }
        if header_styled {
            trace!(%label, cells = values.len(), expected, "keeping label of mismatched row");
            return Verdict::Item(LineItem {
                label,
                kind: RowKind::Degenerate,
                values: Vec::new(),
            });
        }
        trace!(%label, cells = values.len(), expected, "dropping mismatched row");
        Verdict::Discard
    }
}
