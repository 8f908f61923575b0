use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// First `/…` run up to a query or fragment, for URLs `Url` can't parse.
static PATH_FALLBACK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(/[^?#]*)").expect("valid endpoint regex"));

// ─── Public types ────────────────────────────────────────────────

/// One intercepted outbound call, as posted to the collector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    pub id: String,
    pub url: String,
    pub method: String,
    /// Milliseconds from call start to completion or failure.
    pub latency: f64,
    /// Wall-clock start, Unix epoch milliseconds.
    pub timestamp: i64,
    /// Transport status, or `0` when the call never got one.
    pub status_code: u16,
    /// Path component of `url`; the collector's aggregation key.
    pub endpoint: String,
    /// Same measurement as `latency`; kept for collectors that read either.
    pub duration: f64,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// How a call ended, after each transport's completion mechanism has been
/// translated into one shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { status: u16 },
    Failure { message: String },
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

/// Normalizes raw transport data into a [`CallRecord`], applying the
/// post-hoc latency threshold.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    min_latency_ms: f64,
}

impl RecordBuilder {
    pub fn new(min_latency_ms: f64) -> Self {
        Self { min_latency_ms }
    }

    /// `None` when the call finished faster than the threshold.
    pub fn build(
        &self,
        request_id: &str,
        url: &str,
        method: &str,
        latency_ms: f64,
        outcome: Outcome,
        started_at: DateTime<Utc>,
    ) -> Option<CallRecord> {
        if latency_ms < self.min_latency_ms {
            return None;
        }

        let (status_code, error_message) = match outcome {
            Outcome::Success { status } => (status, None),
            Outcome::Failure { message } => {
                let message = if message.is_empty() {
                    "request failed".to_string()
                } else {
                    message
                };
                (0, Some(message))
            }
        };

        Some(CallRecord {
            id: request_id.to_string(),
            url: url.to_string(),
            method: method.to_ascii_uppercase(),
            latency: latency_ms,
            timestamp: started_at.timestamp_millis(),
            status_code,
            endpoint: extract_endpoint(url),
            duration: latency_ms,
            error_message,
        })
    }
}

/// Path component of `url`. Never fails: unparseable input falls back to the
/// first `/…` segment, then to the input verbatim.
pub fn extract_endpoint(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            return parsed.path().to_string();
        }
    }
    match PATH_FALLBACK.captures(url).and_then(|c| c.get(1)) {
        Some(m) => m.as_str().to_string(),
        None => url.to_string(),
    }
}
