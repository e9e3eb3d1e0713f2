// src/batch.rs
//
// Ticker list → one merged statement CSV per ticker.

use anyhow::{Context, Result};
use futures::{stream::FuturesUnordered, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::ScrapeConfig;
use crate::extract::PageParser;
use crate::fetch::{build_client, suggest::resolve_sc_id, HttpSource};
use crate::paginate::{Paginator, ScrapedStatement, StatementRequest};

static UNSAFE_PATH_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static regex"));

/// One ticker per line; blank lines and surrounding whitespace ignored.
pub fn read_tickers(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading ticker list {}", path.display()))?;
    Ok(parse_tickers(&text))
}

fn parse_tickers(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

pub fn safe_folder_name(ticker: &str) -> String {
    UNSAFE_PATH_CHARS.replace_all(ticker, "_").into_owned()
}

/// `<out>/<safe ticker>/<safe ticker>_<report>_merged_financials.csv`
pub fn output_path(out_dir: &Path, ticker: &str, report_type: &str) -> PathBuf {
    let safe = safe_folder_name(ticker);
    out_dir
        .join(&safe)
        .join(format!("{safe}_{report_type}_merged_financials.csv"))
}

/// Scrape one statement with a fresh session and write it to `path`.
#[instrument(level = "info", skip(cfg, parser, client, path), fields(path = %path.display()))]
pub async fn scrape_to_csv(
    client: reqwest::Client,
    cfg: &ScrapeConfig,
    parser: &PageParser,
    sc_id: &str,
    path: &Path,
) -> Result<ScrapedStatement> {
    let request = StatementRequest {
        sc_id: sc_id.to_string(),
        report_type: cfg.report_type.clone(),
    };
    let mut source = HttpSource::new(client, cfg);
    let paginator = Paginator::new(parser, cfg.max_pages, cfg.page_delay());
    let scraped = paginator.run(&mut source, &request).await?;

    if scraped.partial {
        warn!(sc_id, pages = scraped.pages, "saving partial statement");
    }
    scraped.table.save_csv(path, cfg.csv_bom)?;
    info!(
        sc_id,
        company = scraped.company.as_deref().unwrap_or("?"),
        pages = scraped.pages,
        items = scraped.table.rows.len(),
        periods = scraped.table.columns.len().saturating_sub(1),
        shape_mismatches = scraped.stats.shape_mismatches,
        unparsed_cells = scraped.stats.unparsed_cells,
        "statement saved"
    );
    Ok(scraped)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    /// Output already on disk; nothing fetched.
    Existing(PathBuf),
    Saved { path: PathBuf, pages: usize, partial: bool },
}

/// Resolve, scrape and save one ticker. `Err` carries the reason shown in
/// the run summary.
pub async fn process_ticker(
    cfg: &ScrapeConfig,
    parser: &PageParser,
    ticker: &str,
    out_dir: &Path,
) -> Result<TickerOutcome, String> {
    let path = output_path(out_dir, ticker, &cfg.report_type);
    if path.exists() {
        info!(ticker, path = %path.display(), "skipping, output already exists");
        return Ok(TickerOutcome::Existing(path));
    }

    let client = build_client(cfg).map_err(|e| format!("{e:#}"))?;
    let looked_up = resolve_sc_id(&client, cfg, ticker).await;
    sleep(cfg.lookup_delay()).await;
    let sc_id = match looked_up {
        Ok(Some(id)) => id,
        Ok(None) => return Err("sc_id lookup failed".to_string()),
        Err(e) => {
            error!(ticker, error = %format!("{e:#}"), "lookup error");
            return Err("sc_id lookup failed".to_string());
        }
    };

    match scrape_to_csv(client, cfg, parser, &sc_id, &path).await {
        Ok(scraped) => Ok(TickerOutcome::Saved {
            path,
            pages: scraped.pages,
            partial: scraped.partial,
        }),
        Err(e) => {
            error!(ticker, %sc_id, error = %format!("{e:#}"), "scrape failed");
            Err(format!("Failed during financial scrape (sc_id: {sc_id}): {e:#}"))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub already_present: usize,
    /// ticker → reason
    pub failures: BTreeMap<String, String>,
}

impl BatchSummary {
    fn record(&mut self, ticker: &str, outcome: Result<TickerOutcome, String>) {
        self.attempted += 1;
        match outcome {
            Ok(TickerOutcome::Existing(_)) => {
                self.succeeded += 1;
                self.already_present += 1;
            }
            Ok(TickerOutcome::Saved { .. }) => self.succeeded += 1,
            Err(reason) => {
                self.failures.insert(ticker.to_string(), reason);
            }
        }
    }

    pub fn log(&self) {
        info!(
            attempted = self.attempted,
            succeeded = self.succeeded,
            already_present = self.already_present,
            failed = self.failures.len(),
            "batch complete"
        );
        for (i, (ticker, reason)) in self.failures.iter().enumerate() {
            warn!(n = i + 1, %ticker, %reason, "ticker failed");
        }
    }
}

/// Run every ticker. With `concurrency` 1 stocks go one after another,
/// `stock_delay` apart; above that up to `concurrency` run at once.
#[instrument(level = "info", skip_all, fields(tickers = tickers.len(), out = %out_dir.display()))]
pub async fn run_batch(
    cfg: &ScrapeConfig,
    parser: &PageParser,
    tickers: &[String],
    out_dir: &Path,
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    if cfg.concurrency <= 1 {
        for (i, ticker) in tickers.iter().enumerate() {
            info!(n = i + 1, total = tickers.len(), %ticker, "processing");
            let outcome = process_ticker(cfg, parser, ticker, out_dir).await;
            let fetched = !matches!(outcome, Ok(TickerOutcome::Existing(_)));
            summary.record(ticker, outcome);
            if fetched && i + 1 < tickers.len() {
                sleep(cfg.stock_delay()).await;
            }
        }
        return summary;
    }

    let mut tasks = FuturesUnordered::new();
    for ticker in tickers {
        tasks.push(async move {
            let outcome = process_ticker(cfg, parser, ticker, out_dir).await;
            (ticker.as_str(), outcome)
        });

        // throttle concurrency
        if tasks.len() >= cfg.concurrency {
            if let Some((t, outcome)) = tasks.next().await {
                summary.record(t, outcome);
            }
        }
    }
    while let Some((t, outcome)) = tasks.next().await {
        summary.record(t, outcome);
    }
    summary
}
