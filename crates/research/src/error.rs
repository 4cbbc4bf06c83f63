use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Planner error: {0}")]
    Planner(String),

    #[error("Classifier error: {0}")]
    Classifier(String),
}

/// Why an external evidence lookup produced nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalFailure {
    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("empty result")]
    Empty,

    #[error("{0}")]
    Unknown(String),
}

impl ExternalFailure {
    /// Short machine-readable kind, used in warnings and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Protocol(_) => "protocol",
            Self::Network(_) => "network",
            Self::Empty => "empty",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<reqwest::Error> for ExternalFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout(0);
        }
        if let Some(status) = e.status() {
            return Self::Protocol(format!("HTTP {}", status.as_u16()));
        }
        if e.is_decode() || e.is_body() {
            return Self::Protocol(e.to_string());
        }
        if e.is_connect() || e.is_request() {
            return Self::Network(e.to_string());
        }
        Self::Unknown(e.to_string())
    }
}
