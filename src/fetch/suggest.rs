// src/fetch/suggest.rs
//
// Ticker → stock id through the site's JSONP auto-suggestion endpoint.

use anyhow::{anyhow, Context, Result};
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::{send_with_retry, Retry};
use crate::config::ScrapeConfig;

const CALLBACK: &str = "suggest1";

/// The fields of one suggestion that can carry a stock id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestion {
    pub link_src: Option<String>,
    pub pdt_dis_nm: Option<String>,
    pub sc_id: Option<String>,
    pub link_track: Option<String>,
}

impl Suggestion {
    fn from_json(v: &Value) -> Self {
        Self {
            link_src: string_field(v, "link_src"),
            pdt_dis_nm: string_field(v, "pdt_dis_nm"),
            sc_id: string_field(v, "sc_id"),
            link_track: string_field(v, "link_track"),
        }
    }

    /// Display name mentions the ticker (`&nbsp;` counts as a space).
    fn mentions(&self, ticker_upper: &str) -> bool {
        self.pdt_dis_nm.as_deref().map_or(false, |name| {
            name.to_uppercase()
                .replace("&NBSP;", " ")
                .contains(ticker_upper)
        })
    }

    fn link_src_id(&self) -> Option<&str> {
        let last = self.link_src.as_deref()?.trim_matches('/').rsplit('/').next()?;
        (!last.is_empty() && last.chars().all(char::is_alphanumeric)).then_some(last)
    }

    fn link_track_id(&self) -> Option<String> {
        let raw = self.link_track.as_deref()?;
        let base = Url::parse("https://www.moneycontrol.com/").ok()?;
        let url = base.join(raw).ok()?;
        let id = url
            .query_pairs()
            .find(|(k, v)| k == "id" && !v.is_empty())
            .map(|(_, v)| v.into_owned());
        id
    }
}

/// Ids may come back as strings or bare numbers.
fn string_field(v: &Value, key: &str) -> Option<String> {
    match v.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Body of a `suggest1(...)` JSONP response.
pub fn strip_jsonp(body: &str) -> Option<&str> {
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body);
    body.strip_prefix(CALLBACK)?
        .strip_prefix('(')?
        .strip_suffix(')')
}

pub fn parse_suggestions(body: &str) -> Result<Vec<Suggestion>> {
    let json = strip_jsonp(body).ok_or_else(|| anyhow!("unexpected suggestion response format"))?;
    let value: Value = serde_json::from_str(json).context("decoding suggestions")?;
    Ok(match value {
        Value::Array(items) => items.iter().map(Suggestion::from_json).collect(),
        _ => Vec::new(),
    })
}

/// Pick the stock id for `ticker`.
///
/// `link_src` ids first, then `sc_id`, then the `id` parameter of
/// `link_track`. Within the first two, a suggestion whose display name
/// mentions the ticker beats the first candidate seen.
pub fn pick_sc_id(ticker: &str, suggestions: &[Suggestion]) -> Option<String> {
    let wanted = ticker.to_uppercase();

    let mut fallback: Option<&str> = None;
    for s in suggestions {
        if let Some(id) = s.link_src_id() {
            if s.mentions(&wanted) {
                return Some(id.to_string());
            }
            fallback.get_or_insert(id);
        }
    }
    if let Some(id) = fallback {
        return Some(id.to_string());
    }

    for s in suggestions {
        if let Some(id) = s.sc_id.as_deref() {
            if s.mentions(&wanted) {
                return Some(id.to_string());
            }
            fallback.get_or_insert(id);
        }
    }
    if let Some(id) = fallback {
        return Some(id.to_string());
    }

    suggestions.iter().find_map(Suggestion::link_track_id)
}

/// Look `ticker` up. `Ok(None)` when the API answered but nothing usable
/// came back.
#[instrument(skip(client, cfg))]
pub async fn resolve_sc_id(client: &Client, cfg: &ScrapeConfig, ticker: &str) -> Result<Option<String>> {
    let query = [
        ("classic", "true"),
        ("query", ticker),
        ("type", "1"),
        ("format", "json"),
        ("callback", CALLBACK),
    ];
    let referer = format!("{}/", cfg.origin.trim_end_matches('/'));
    let (body, _) = send_with_retry(&cfg.suggest_url, Retry::from_config(cfg), || {
        client
            .get(&cfg.suggest_url)
            .query(&query)
            .timeout(cfg.lookup_timeout())
            .header(
                header::ACCEPT,
                "text/javascript, application/javascript, application/ecmascript, \
                 application/x-ecmascript, */*; q=0.01",
            )
            .header(header::REFERER, referer.as_str())
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
    })
    .await
    .with_context(|| format!("suggestion lookup for {ticker}"))?;

    let suggestions = parse_suggestions(&body)?;
    if suggestions.is_empty() {
        warn!(ticker, "no suggestions");
        return Ok(None);
    }
    debug!(ticker, count = suggestions.len(), "suggestions received");

    match pick_sc_id(ticker, &suggestions) {
        Some(id) => {
            info!(ticker, sc_id = %id, "resolved stock id");
            Ok(Some(id))
        }
        None => {
            warn!(ticker, first = ?suggestions.first(), "no usable id in suggestions");
            Ok(None)
        }
    }
}
