use crate::{ResearchError, Result};
use evidence_pool::PoolConfig;
use evidence_protocol::{env_usize, SearchLimits};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_ROUNDS_CEILING: usize = 10;
const MAX_EXTERNAL_TIMEOUT_MS: usize = 10 * 60 * 1000;

/// Knobs of one research run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResearchConfig {
    pub limits: SearchLimits,
    pub pool: PoolConfig,
    pub max_rounds: usize,
    pub max_sources: usize,
    pub repo_queries_per_round: usize,
    pub external_queries_per_round: usize,
    pub max_follow_ups: usize,
    pub external_timeout_ms: u64,
    /// Rounds after the first only run when this is set and a planner is present.
    pub llm_mode: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            limits: SearchLimits::default(),
            pool: PoolConfig::default(),
            max_rounds: 3,
            max_sources: 20,
            repo_queries_per_round: 2,
            external_queries_per_round: 2,
            max_follow_ups: 3,
            external_timeout_ms: 20_000,
            llm_mode: true,
        }
    }
}

impl ResearchConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        let timeout = usize::try_from(self.external_timeout_ms).unwrap_or(MAX_EXTERNAL_TIMEOUT_MS);
        Self {
            limits: self.limits.with_env_overrides(),
            pool: self.pool.with_env_overrides(),
            external_timeout_ms: env_usize(
                "EVIDENCE_EXTERNAL_TIMEOUT_MS",
                timeout,
                1,
                MAX_EXTERNAL_TIMEOUT_MS,
            ) as u64,
            ..self
        }
    }

    #[must_use]
    pub fn external_timeout(&self) -> Duration {
        Duration::from_millis(self.external_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 || self.max_rounds > MAX_ROUNDS_CEILING {
            return Err(ResearchError::Config(format!(
                "max_rounds must be within 1..={MAX_ROUNDS_CEILING}, got {}",
                self.max_rounds
            )));
        }
        if self.external_timeout_ms == 0 {
            return Err(ResearchError::Config(
                "external_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
