use rand::Rng;
use regex::Regex;

use crate::config::FilterConfig;
use crate::error::{ProbeError, Result};
use crate::record::extract_endpoint;

/// Call-start admission policy: sampling draw, then endpoint globs.
///
/// The latency threshold is applied once the call has finished, by
/// [`crate::record::RecordBuilder`].
#[derive(Debug, Clone)]
pub struct FilterPipeline {
    sampling_rate: f64,
    patterns: Vec<Regex>,
}

impl FilterPipeline {
    /// Compile every glob in `config.endpoint_filters` once, up front.
    pub fn new(config: &FilterConfig) -> Result<Self> {
        let patterns = config
            .endpoint_filters
            .iter()
            .map(|glob| {
                Regex::new(&glob_to_regex(glob)).map_err(|source| ProbeError::InvalidFilter {
                    pattern: glob.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            sampling_rate: config.sampling_rate,
            patterns,
        })
    }

    /// Admit or reject a call about to start, drawing from the thread RNG.
    /// Rates of 1 and 0 are decided without a draw: always in, always out.
    pub fn decide(&self, url: &str) -> bool {
        if self.sampling_rate >= 1.0 {
            return self.matches(url);
        }
        if self.sampling_rate <= 0.0 {
            return false;
        }
        let draw = rand::thread_rng().gen::<f64>();
        self.decide_with_draw(url, draw)
    }

    /// Deterministic form of [`decide`](Self::decide) for a given draw in `[0, 1)`.
    pub fn decide_with_draw(&self, url: &str, draw: f64) -> bool {
        // A draw equal to the rate is outside the sample: rate 0 admits nothing.
        if draw >= self.sampling_rate {
            return false;
        }
        self.matches(url)
    }

    /// Endpoint-filter stage alone. Tries the raw URL first, then its path,
    /// so `/api/*` also covers `http://host/api/users`.
    pub fn matches(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        if self.patterns.iter().any(|re| re.is_match(url)) {
            return true;
        }
        let path = extract_endpoint(url);
        path != url && self.patterns.iter().any(|re| re.is_match(&path))
    }
}

/// Anchored regex for a glob: `*` is any run of characters, `?` exactly one,
/// everything else literal. `**` gets no special meaning.
pub fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    out.push('$');
    out
}
