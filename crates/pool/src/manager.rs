use crate::handler::{AggregatorHandlerFactory, HandlerFactory};
use crate::{PoolConfig, PoolError, PoolStats, WorkerPool};
use evidence_indexer::Scanner;
use evidence_protocol::{AggregateRequest, AggregatedResult};
use evidence_search::Aggregator;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Caller-side owner of the live [`WorkerPool`].
///
/// Rebuilds the pool when a different [`PoolConfig`] is requested and runs the
/// aggregator in-process when no pool can be used. Every outcome is a
/// well-formed result; pool errors become "no evidence".
pub struct EvidencePool {
    factory: Arc<dyn HandlerFactory>,
    live: Mutex<Option<WorkerPool>>,
    fallback: Aggregator,
}

impl EvidencePool {
    #[must_use]
    pub fn new() -> Self {
        Self::with_factory(Arc::new(AggregatorHandlerFactory))
    }

    #[must_use]
    pub fn with_factory(factory: Arc<dyn HandlerFactory>) -> Self {
        Self {
            factory,
            live: Mutex::new(None),
            fallback: Aggregator::new(Arc::new(Scanner::new())),
        }
    }

    pub async fn run(&self, request: AggregateRequest, config: PoolConfig) -> AggregatedResult {
        let pool = match self.pool_for(config.normalized()).await {
            Ok(pool) => pool,
            Err(err) => {
                log::warn!("Worker pool unavailable ({err}); searching in-process");
                return self.fallback.run(&request).await;
            }
        };

        let query = request.query.clone();
        match pool.run(request.clone()).await {
            Ok(result) => result,
            Err(PoolError::Unavailable(reason)) => {
                log::warn!("Worker pool stopped ({reason}); searching in-process");
                self.fallback.run(&request).await
            }
            Err(err) => {
                log::warn!("No repository evidence for {query:?}: {err}");
                AggregatedResult::empty(query)
            }
        }
    }

    /// Stats of the live pool, if one has been started.
    pub async fn stats(&self) -> Option<PoolStats> {
        self.live.lock().await.as_ref().map(WorkerPool::stats)
    }

    pub async fn close(&self) {
        if let Some(pool) = self.live.lock().await.take() {
            pool.close().await;
        }
    }

    async fn pool_for(&self, config: PoolConfig) -> crate::Result<WorkerPool> {
        let mut live = self.live.lock().await;
        if let Some(pool) = live.as_ref() {
            if pool.config() == config && !pool.is_closed() {
                return Ok(pool.clone());
            }
        }
        if let Some(old) = live.take() {
            log::info!(
                "Reconfiguring worker pool: {:?} -> {:?}",
                old.config(),
                config
            );
            old.close().await;
        }
        let pool = WorkerPool::new(config, self.factory.clone())?;
        *live = Some(pool.clone());
        Ok(pool)
    }
}

impl Default for EvidencePool {
    fn default() -> Self {
        Self::new()
    }
}
