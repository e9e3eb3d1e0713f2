use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use finscraper::{
    batch::{self, output_path},
    config::ScrapeConfig,
    extract::{PageParser, RULESET_VERSION},
    fetch::build_client,
};
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Scrape paginated financial statements and merge them into one CSV per stock"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Command {
    /// One statement for a known stock id.
    Single {
        #[arg(long)]
        sc_id: String,
        /// Ticker or name used for the output folder and file.
        #[arg(long)]
        name: String,
        #[command(flatten)]
        common: Common,
    },
    /// Every ticker in a file, one per line.
    Batch {
        #[arg(long)]
        tickers: PathBuf,
        #[arg(long)]
        concurrency: Option<usize>,
        #[command(flatten)]
        common: Common,
    },
}

#[derive(Args)]
struct Common {
    #[arg(long, default_value = "stock_data")]
    out: PathBuf,
    /// YAML settings file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    report_type: Option<String>,
    #[arg(long)]
    max_pages: Option<usize>,
}

impl Common {
    fn load_config(&self) -> Result<ScrapeConfig> {
        let mut cfg = ScrapeConfig::load(self.config.as_deref())?;
        if let Some(r) = &self.report_type {
            cfg.report_type = r.clone();
        }
        if let Some(n) = self.max_pages {
            cfg.max_pages = n;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .init();
    info!("startup");

    let start = Instant::now();
    match cli.command {
        Command::Single {
            sc_id,
            name,
            common,
        } => {
            // ─── 2) config & parser ──────────────────────────────────
            let cfg = common.load_config()?;
            let parser = PageParser::new(&cfg.rules)?;
            info!(ruleset = RULESET_VERSION, report = %cfg.report_type, "parser ready");

            // ─── 3) scrape one statement ─────────────────────────────
            let path = output_path(&common.out, &name, &cfg.report_type);
            let client = build_client(&cfg)?;
            let scraped = batch::scrape_to_csv(client, &cfg, &parser, &sc_id, &path).await?;
            info!(
                %name,
                pages = scraped.pages,
                partial = scraped.partial,
                elapsed = ?start.elapsed(),
                "done"
            );
        }
        Command::Batch {
            tickers,
            concurrency,
            common,
        } => {
            // ─── 2) config & parser ──────────────────────────────────
            let mut cfg = common.load_config()?;
            if let Some(c) = concurrency {
                cfg.concurrency = c;
                cfg.validate()?;
            }
            let parser = PageParser::new(&cfg.rules)?;
            info!(ruleset = RULESET_VERSION, report = %cfg.report_type, "parser ready");

            // ─── 3) load tickers ─────────────────────────────────────
            let tickers = batch::read_tickers(&tickers)?;
            if tickers.is_empty() {
                bail!("ticker list is empty");
            }
            info!(count = tickers.len(), "tickers loaded");

            // ─── 4) scrape all ───────────────────────────────────────
            let summary = batch::run_batch(&cfg, &parser, &tickers, &common.out).await;
            summary.log();
            info!(elapsed = ?start.elapsed(), "done");
        }
    }
    Ok(())
}
