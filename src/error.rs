use thiserror::Error;

/// Failures surfaced by the controller and configuration layer.
///
/// None of these ever reach an instrumented call: the adapters swallow
/// their own problems and only host transport errors propagate.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid endpoint filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("transport registry is already instrumented by another controller")]
    RegistryBusy,

    #[error("failed to build collector client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T, E = ProbeError> = std::result::Result<T, E>;
