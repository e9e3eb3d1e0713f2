// src/fetch/mod.rs

pub mod suggest;

use anyhow::{Context, Result};
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    Client, RequestBuilder,
};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::config::ScrapeConfig;
use crate::error::FetchError;
use crate::extract::FormParams;
use crate::paginate::{PageSource, StatementRequest};

/// A fresh HTTP session: browser-like headers, its own cookie jar and the
/// configured request timeout.
pub fn build_client(cfg: &ScrapeConfig) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
        ),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.6"),
    );
    headers.insert(
        header::UPGRADE_INSECURE_REQUESTS,
        HeaderValue::from_static("1"),
    );
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("iframe"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-origin"));

    Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .default_headers(headers)
        .cookie_store(true)
        .gzip(true)
        .timeout(cfg.request_timeout())
        .build()
        .context("building HTTP client")
}

/// Retry policy shared by every request this crate sends.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Retry {
    pub fn from_config(cfg: &ScrapeConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            initial_backoff_ms: cfg.retry_backoff_ms,
        }
    }

    /// Delay before retry number `attempt` (1-based): doubles each time,
    /// saturating instead of overflowing.
    fn backoff_ms(&self, attempt: u32) -> u64 {
        self.initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
    }
}

fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Timeout { .. } | FetchError::Request { .. } => true,
        FetchError::Status { status, .. } => *status >= 500 || *status == 429,
        FetchError::Other(_) => false,
    }
}

/// Send once; non-2xx is an error. Returns the body and the final URL.
async fn send_core(url: &str, req: RequestBuilder) -> Result<(String, String), FetchError> {
    debug!("requesting {}", url);
    let resp = req
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;
    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let final_url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|e| FetchError::from_reqwest(url, e))?;
    Ok((body, final_url))
}

/// `make` builds a fresh request for every attempt.
pub async fn send_with_retry<F>(
    url: &str,
    retry: Retry,
    make: F,
) -> Result<(String, String), FetchError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempts = 0;
    loop {
        match send_core(url, make()).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < retry.max_retries && is_retryable(&e) => {
                attempts += 1;
                let backoff = retry.backoff_ms(attempts);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}

/// Pages of the printable financials report over HTTP.
///
/// Page one is a GET with `sc_did` and `type`; older periods are POSTs of
/// the previous page's hidden form, with that page as `Referer`.
pub struct HttpSource {
    client: Client,
    url: String,
    origin: String,
    retry: Retry,
    referer: Option<String>,
}

impl HttpSource {
    pub fn new(client: Client, cfg: &ScrapeConfig) -> Self {
        Self {
            client,
            url: cfg.financials_url.clone(),
            origin: cfg.origin.clone(),
            retry: Retry::from_config(cfg),
            referer: None,
        }
    }
}

impl PageSource for HttpSource {
    #[instrument(level = "debug", skip(self))]
    async fn first_page(&mut self, request: &StatementRequest) -> Result<String, FetchError> {
        let query = [
            ("sc_did", request.sc_id.as_str()),
            ("type", request.report_type.as_str()),
        ];
        let (body, final_url) = send_with_retry(&self.url, self.retry, || {
            self.client.get(&self.url).query(&query)
        })
        .await?;
        self.referer = Some(final_url);
        Ok(body)
    }

    #[instrument(level = "debug", skip(self, form), fields(form_fields = form.pairs().len()))]
    async fn next_page(&mut self, form: &FormParams) -> Result<String, FetchError> {
        let referer = self.referer.clone().unwrap_or_else(|| self.url.clone());
        let (body, final_url) = send_with_retry(&self.url, self.retry, || {
            self.client
                .post(&self.url)
                .header(header::REFERER, referer.as_str())
                .header(header::ORIGIN, self.origin.as_str())
                .form(form)
        })
        .await?;
        self.referer = Some(final_url);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(is_retryable(&FetchError::Timeout { url: "u".into() }));
        assert!(is_retryable(&FetchError::Status {
            url: "u".into(),
            status: 503
        }));
        assert!(is_retryable(&FetchError::Status {
            url: "u".into(),
            status: 429
        }));
        assert!(!is_retryable(&FetchError::Status {
            url: "u".into(),
            status: 404
        }));
        assert!(!is_retryable(&FetchError::Other("bad".into())));
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        let retry = Retry {
            max_retries: 100,
            initial_backoff_ms: 500,
        };
        assert_eq!(retry.backoff_ms(1), 500);
        assert_eq!(retry.backoff_ms(2), 1000);
        assert_eq!(retry.backoff_ms(3), 2000);
        assert_eq!(retry.backoff_ms(70), u64::MAX);

        let zero = Retry {
            max_retries: 100,
            initial_backoff_ms: 0,
        };
        assert_eq!(zero.backoff_ms(80), 0);
    }

    #[tokio::test]
    async fn many_retries_do_not_overflow() {
        let client = build_client(&ScrapeConfig::default()).unwrap();
        let url = "http://127.0.0.1:9/print_financials.php";
        let retry = Retry {
            max_retries: 70,
            initial_backoff_ms: 0,
        };
        let err = send_with_retry(url, retry, || client.get(url)).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Request { .. } | FetchError::Timeout { .. }
        ));
    }

    #[test]
    fn client_builds_from_defaults() {
        build_client(&ScrapeConfig::default()).unwrap();
    }

    #[tokio::test]
    async fn unreachable_host_is_a_fetch_error() {
        let cfg = ScrapeConfig {
            financials_url: "http://127.0.0.1:9/print_financials.php".into(),
            request_timeout_secs: 2,
            max_retries: 0,
            ..ScrapeConfig::default()
        };
        let mut source = HttpSource::new(build_client(&cfg).unwrap(), &cfg);
        let request = StatementRequest {
            sc_id: "RI".into(),
            report_type: "balance_VI".into(),
        };
        let err = source.first_page(&request).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Request { .. } | FetchError::Timeout { .. }
        ));
    }
}
