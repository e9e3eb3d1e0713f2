// src/paginate.rs
//
// Walks a statement's "previous periods" pages, one at a time. Each follow-up
// request echoes the hidden form of the page before it, so pages are
// inherently sequential.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::{FetchError, StatementError};
use crate::extract::{FormParams, NextPage, PageParser, PageStats};
use crate::merge::{MergedStatement, StatementTable};

/// What to scrape: the site's stock id and the statement kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRequest {
    pub sc_id: String,
    pub report_type: String,
}

/// Where pages come from. The HTTP implementation lives in `fetch`; tests
/// serve canned HTML.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    /// Page one of the statement.
    async fn first_page(&mut self, request: &StatementRequest) -> Result<String, FetchError>;
    /// The page reached by submitting `form` from the previous page.
    async fn next_page(&mut self, form: &FormParams) -> Result<String, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedStatement {
    pub table: StatementTable,
    /// Pages whose table was merged.
    pub pages: usize,
    pub company: Option<String>,
    /// Pagination was cut short by a fetch failure.
    pub partial: bool,
    pub stats: PageStats,
}

#[derive(Debug)]
enum PageState {
    Fetching {
        page: usize,
        form: Option<FormParams>,
    },
    Parsing {
        page: usize,
        html: String,
    },
    HasNextPage {
        page: usize,
        form: FormParams,
    },
    FetchFailed {
        page: usize,
        error: FetchError,
    },
    NoMorePages,
}

/// Drives one statement through its pages and merges them.
#[derive(Debug, Clone)]
pub struct Paginator<'a> {
    parser: &'a PageParser,
    max_pages: usize,
    page_delay: Duration,
}

impl<'a> Paginator<'a> {
    pub fn new(parser: &'a PageParser, max_pages: usize, page_delay: Duration) -> Self {
        Self {
            parser,
            max_pages: max_pages.max(1),
            page_delay,
        }
    }

    #[instrument(level = "info", skip(self, source), fields(sc_id = %request.sc_id, report = %request.report_type))]
    pub async fn run<S: PageSource>(
        &self,
        source: &mut S,
        request: &StatementRequest,
    ) -> Result<ScrapedStatement, StatementError> {
        let mut merged = MergedStatement::new(self.parser.periods().clone());
        let mut stats = PageStats::default();
        let mut company = None;
        let mut pages = 0;
        let mut partial = false;

        let mut state = PageState::Fetching {
            page: 1,
            form: None,
        };
        loop {
            state = match state {
                PageState::Fetching { page, form } => {
                    debug!(page, "fetching");
                    let fetched = match &form {
                        None => source.first_page(request).await,
                        Some(form) => source.next_page(form).await,
                    };
                    match fetched {
                        Ok(html) => PageState::Parsing { page, html },
                        Err(error) => PageState::FetchFailed { page, error },
                    }
                }

                PageState::Parsing { page, html } => match self.parser.parse_page(&html) {
                    Err(e) if page == 1 => return Err(StatementError::from_extract(page, e)),
                    Err(e) => {
                        info!(page, reason = %e, "no table on later page, treating as end of data");
                        PageState::NoMorePages
                    }
                    Ok(parsed) => {
                        if page == 1 && parsed.table.items.is_empty() {
                            warn!("first page has a table but no line items");
                            return Err(StatementError::EmptyMergeResult);
                        }
                        merged.absorb(&parsed.table);
                        stats.shape_mismatches += parsed.table.stats.shape_mismatches;
                        stats.unparsed_cells += parsed.table.stats.unparsed_cells;
                        stats.skipped_rows += parsed.table.stats.skipped_rows;
                        pages = page;
                        if company.is_none() {
                            company = parsed.company;
                        }
                        match parsed.next {
                            NextPage::Form(form) if page < self.max_pages => {
                                PageState::HasNextPage { page, form }
                            }
                            NextPage::Form(_) => {
                                info!(page, max_pages = self.max_pages, "page cap reached");
                                PageState::NoMorePages
                            }
                            NextPage::Unavailable => {
                                warn!(page, "older periods offered but no form to submit");
                                PageState::NoMorePages
                            }
                            NextPage::None => PageState::NoMorePages,
                        }
                    }
                },

                PageState::HasNextPage { page, form } => {
                    sleep(self.page_delay).await;
                    PageState::Fetching {
                        page: page + 1,
                        form: Some(form),
                    }
                }

                PageState::FetchFailed { page, error } => {
                    if page == 1 {
                        return Err(StatementError::FetchFailure {
                            page,
                            source: error,
                        });
                    }
                    warn!(page, error = %error, "fetch failed, keeping earlier pages");
                    partial = true;
                    PageState::NoMorePages
                }

                PageState::NoMorePages => break,
            };
        }

        let table = merged.finish()?;
        info!(
            pages,
            items = table.rows.len(),
            periods = table.columns.len() - 1,
            partial,
            "statement merged"
        );
        Ok(ScrapedStatement {
            table,
            pages,
            company,
            partial,
            stats,
        })
    }
}
