// src/config.rs

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::extract::ParserRules;

/// Runtime settings. Every field has a default, so a YAML file only needs
/// the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Printable financials page (GET for page one, POST for older periods).
    pub financials_url: String,
    /// JSONP auto-suggestion endpoint used to resolve tickers.
    pub suggest_url: String,
    /// Sent as `Origin` on follow-up POSTs.
    pub origin: String,
    pub user_agent: String,
    /// Statement kind, e.g. `balance_VI` or `quarterly_VI`.
    pub report_type: String,
    /// Hard cap on pages fetched per statement.
    pub max_pages: usize,
    pub page_delay_ms: u64,
    pub lookup_delay_ms: u64,
    pub stock_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub lookup_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Statements scraped at once in batch mode.
    pub concurrency: usize,
    pub csv_bom: bool,
    pub rules: ParserRules,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            financials_url: "https://www.moneycontrol.com/stocks/company_info/print_financials.php"
                .into(),
            suggest_url: "https://www.moneycontrol.com/mccode/common/autosuggestion_solr.php"
                .into(),
            origin: "https://www.moneycontrol.com".into(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/136.0.0.0 Safari/537.36"
                .into(),
            report_type: "balance_VI".into(),
            max_pages: 10,
            page_delay_ms: 2000,
            lookup_delay_ms: 1000,
            stock_delay_ms: 2000,
            request_timeout_secs: 25,
            lookup_timeout_secs: 10,
            max_retries: 2,
            retry_backoff_ms: 500,
            concurrency: 1,
            csv_bom: true,
            rules: ParserRules::default(),
        }
    }
}

impl ScrapeConfig {
    /// Defaults, overlaid with the YAML file at `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Self::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_pages >= 1, "max_pages must be at least 1");
        ensure!(self.concurrency >= 1, "concurrency must be at least 1");
        ensure!(!self.report_type.trim().is_empty(), "report_type is empty");
        url::Url::parse(&self.financials_url)
            .with_context(|| format!("financials_url {:?}", self.financials_url))?;
        url::Url::parse(&self.suggest_url)
            .with_context(|| format!("suggest_url {:?}", self.suggest_url))?;
        Ok(())
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn lookup_delay(&self) -> Duration {
        Duration::from_millis(self.lookup_delay_ms)
    }

    pub fn stock_delay(&self) -> Duration {
        Duration::from_millis(self.stock_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_site() {
        let cfg = ScrapeConfig::default();
        assert_eq!(cfg.max_pages, 10);
        assert_eq!(cfg.report_type, "balance_VI");
        assert_eq!(cfg.page_delay(), Duration::from_secs(2));
        cfg.validate().unwrap();
    }

    #[test]
    fn yaml_overrides_nested_rules() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "report_type: quarterly_VI\nmax_pages: 3\nrules:\n  terminator: 'Source:'\n"
        )?;
        let cfg = ScrapeConfig::load(Some(file.path()))?;
        assert_eq!(cfg.report_type, "quarterly_VI");
        assert_eq!(cfg.max_pages, 3);
        assert_eq!(cfg.rules.terminator, "Source:");
        assert_eq!(cfg.rules.header_class, "detb");
        assert_eq!(cfg.page_delay_ms, 2000);
        Ok(())
    }

    #[test]
    fn rejects_zero_pages() {
        let err = ScrapeConfig::from_yaml("max_pages: 0")
            .unwrap()
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("max_pages"));
    }

    #[test]
    fn empty_file_is_defaults() {
        assert_eq!(ScrapeConfig::from_yaml("\n").unwrap(), ScrapeConfig::default());
    }
}
