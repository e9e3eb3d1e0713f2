// src/error.rs

use thiserror::Error;

/// Why a single page could not yield a statement table.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no financial table found on page")]
    TableNotFound,
    #[error("financial table has no period header row")]
    HeaderNotFound,
}

/// Network-side failure while fetching one page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Classify a reqwest error against the URL it was issued for.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Terminal outcome of scraping one statement. The `Display` text is the
/// reason reported to the caller and written to the run summary.
#[derive(Debug, Error)]
pub enum StatementError {
    #[error("page {page}: no financial table found")]
    TableNotFound { page: usize },
    #[error("page {page}: financial table has no period header row")]
    HeaderNotFound { page: usize },
    #[error("page {page}: fetch failed: {source}")]
    FetchFailure {
        page: usize,
        #[source]
        source: FetchError,
    },
    #[error("no line items collected")]
    EmptyMergeResult,
}

impl StatementError {
    pub fn from_extract(page: usize, err: ExtractError) -> Self {
        match err {
            ExtractError::TableNotFound => StatementError::TableNotFound { page },
            ExtractError::HeaderNotFound => StatementError::HeaderNotFound { page },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_readable() {
        let err = StatementError::from_extract(1, ExtractError::TableNotFound);
        assert_eq!(err.to_string(), "page 1: no financial table found");

        let err = StatementError::FetchFailure {
            page: 1,
            source: FetchError::Status {
                url: "https://example.com/x".into(),
                status: 404,
            },
        };
        assert_eq!(
            err.to_string(),
            "page 1: fetch failed: https://example.com/x answered with status 404"
        );
        assert_eq!(
            StatementError::EmptyMergeResult.to_string(),
            "no line items collected"
        );
    }
}
