use evidence_protocol::env_usize;
use serde::{Deserialize, Serialize};

const MAX_POOL_SIZE: usize = 64;
const MAX_QUEUE: usize = 4_096;

/// Shape of a [`WorkerPool`](crate::WorkerPool).
///
/// `queue_max == 0` means a task is only accepted when a worker is idle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct PoolConfig {
    pub size: usize,
    pub queue_max: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 2,
            queue_max: 16,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn new(size: usize, queue_max: usize) -> Self {
        Self { size, queue_max }.normalized()
    }

    /// Defaults overridden by `EVIDENCE_POOL_SIZE` / `EVIDENCE_POOL_QUEUE_MAX`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        Self {
            size: env_usize("EVIDENCE_POOL_SIZE", self.size, 1, MAX_POOL_SIZE),
            queue_max: env_usize("EVIDENCE_POOL_QUEUE_MAX", self.queue_max, 0, MAX_QUEUE),
        }
    }

    /// Clamp to the supported range: at least one worker.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            size: self.size.clamp(1, MAX_POOL_SIZE),
            queue_max: self.queue_max.min(MAX_QUEUE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalized_enforces_minimum_size() {
        assert_eq!(PoolConfig::new(0, 0), PoolConfig { size: 1, queue_max: 0 });
        assert_eq!(
            PoolConfig::new(1_000, 1_000_000),
            PoolConfig {
                size: MAX_POOL_SIZE,
                queue_max: MAX_QUEUE
            }
        );
        assert_eq!(PoolConfig::default().normalized(), PoolConfig::default());
    }
}
