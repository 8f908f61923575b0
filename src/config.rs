use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

// ─── Environment keys ────────────────────────────────────────────

const ENV_AGENT_URL: &str = "PROBE_AGENT_URL";
const ENV_SAMPLING_RATE: &str = "PROBE_SAMPLING_RATE";
const ENV_MIN_LATENCY_MS: &str = "PROBE_MIN_LATENCY_MS";
const ENV_ENDPOINT_FILTERS: &str = "PROBE_ENDPOINT_FILTERS";
const ENV_ENABLE_LOGGING: &str = "PROBE_ENABLE_LOGGING";

// ─── Public types ────────────────────────────────────────────────

/// Everything the instrumentation layer reads at install time.
///
/// Field names on the wire follow the camelCase surface consumed by the
/// editor front end, so a JSON settings blob deserializes directly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProbeConfig {
    /// Base URL of the collector; records go to `<agentUrl>/api/calls`.
    #[serde(default = "default_agent_url")]
    pub agent_url: String,

    /// Log collector delivery failures and emitted records.
    #[serde(default)]
    pub enable_logging: bool,

    #[serde(flatten)]
    pub filter: FilterConfig,
}

/// Per-installation filter policy. Immutable once an adapter is installed;
/// changing it means restoring and installing again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    /// Probability (0.0 – 1.0) that a call is considered at all.
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,

    /// Calls faster than this are discarded after they complete.
    #[serde(default = "default_min_latency")]
    pub min_latency_threshold_ms: f64,

    /// Glob patterns; a call must match one of them. Empty = match all.
    #[serde(default = "default_endpoint_filters")]
    pub endpoint_filters: Vec<String>,
}

fn default_agent_url() -> String {
    "http://localhost:3001".into()
}
fn default_sampling_rate() -> f64 {
    1.0
}
fn default_min_latency() -> f64 {
    10.0
}
fn default_endpoint_filters() -> Vec<String> {
    vec!["/api/*".into()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            sampling_rate: default_sampling_rate(),
            min_latency_threshold_ms: default_min_latency(),
            endpoint_filters: default_endpoint_filters(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            agent_url: default_agent_url(),
            enable_logging: false,
            filter: FilterConfig::default(),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────

impl ProbeConfig {
    /// Parse a JSON settings object. Missing keys take their defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| ProbeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by any `PROBE_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_AGENT_URL) {
            config.agent_url = url;
        }
        if let Some(raw) = lookup(ENV_SAMPLING_RATE) {
            config.filter.sampling_rate = parse_number(ENV_SAMPLING_RATE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MIN_LATENCY_MS) {
            config.filter.min_latency_threshold_ms = parse_number(ENV_MIN_LATENCY_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ENDPOINT_FILTERS) {
            config.filter.endpoint_filters = raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(raw) = lookup(ENV_ENABLE_LOGGING) {
            config.enable_logging = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.agent_url.trim().is_empty() {
            return Err(ProbeError::InvalidConfig("agentUrl must not be empty".into()));
        }
        self.filter.validate()
    }

    /// Full collector endpoint for record delivery.
    pub fn calls_endpoint(&self) -> String {
        format!("{}/api/calls", self.agent_url.trim_end_matches('/'))
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sampling_rate) {
            return Err(ProbeError::InvalidConfig(format!(
                "samplingRate must be between 0 and 1, got {}",
                self.sampling_rate
            )));
        }
        if !self.min_latency_threshold_ms.is_finite() || self.min_latency_threshold_ms < 0.0 {
            return Err(ProbeError::InvalidConfig(format!(
                "minLatencyThresholdMs must be a non-negative number, got {}",
                self.min_latency_threshold_ms
            )));
        }
        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ProbeError::InvalidConfig(format!("{key}: {e}")))
}
