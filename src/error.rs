//! Error taxonomy for a scraping run.
//!
//! Date parse failures never show up here: they are absorbed in [`crate::dates`]
//! and turn into "ignore this row". Everything else a site run can hit is one of
//! the variants below, and the orchestrator in [`crate::run`] decides whether it
//! ends the site (structural errors on the first page) or just the current page.

use thiserror::Error;

/// Anything that can go wrong while crawling one site or writing its output.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Transport-level failure (DNS, TLS, connection reset, body decode).
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered, but not with a 2xx.
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Page load exceeded the site's timeout.
    #[error("timed out loading {url}")]
    Timeout { url: String },

    /// An element the site's layout depends on is missing (e.g. no listing table).
    #[error("page structure not recognised: {0}")]
    Structure(String),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid date window: start {start} is after end {end}")]
    InvalidWindow {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    /// Map a reqwest error onto the taxonomy, keeping timeouts distinct.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ScrapeError::Timeout {
                url: url.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            };
        }
        ScrapeError::Http {
            url: url.to_string(),
            source: err,
        }
    }

    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Http { .. } | ScrapeError::Timeout { .. } => true,
            ScrapeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let timeout = ScrapeError::Timeout {
            url: "https://example.org".into(),
        };
        assert!(timeout.is_transient());

        let unavailable = ScrapeError::Status {
            url: "https://example.org".into(),
            status: 503,
        };
        assert!(unavailable.is_transient());

        let missing = ScrapeError::Status {
            url: "https://example.org".into(),
            status: 404,
        };
        assert!(!missing.is_transient());

        assert!(!ScrapeError::Structure("no table".into()).is_transient());
    }

    #[test]
    fn test_display_messages() {
        let err = ScrapeError::Status {
            url: "https://example.org/x".into(),
            status: 500,
        };
        assert_eq!(err.to_string(), "https://example.org/x returned HTTP 500");
    }
}
