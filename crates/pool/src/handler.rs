use crate::Result;
use async_trait::async_trait;
use evidence_indexer::Scanner;
use evidence_protocol::{AggregateRequest, AggregatedResult};
use evidence_search::Aggregator;
use std::sync::Arc;

pub type TaskId = u64;

/// Unit of pool work.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub request: AggregateRequest,
}

/// Executes tasks inside one worker. A worker runs one task at a time.
#[async_trait]
pub trait TaskHandler: Send {
    async fn handle(&mut self, task: Task) -> Result<AggregatedResult>;
}

/// Builds a fresh handler for a worker slot, on start and after every respawn.
pub trait HandlerFactory: Send + Sync {
    fn create(&self, slot: usize) -> Box<dyn TaskHandler>;
}

impl<F> HandlerFactory for F
where
    F: Fn(usize) -> Box<dyn TaskHandler> + Send + Sync,
{
    fn create(&self, slot: usize) -> Box<dyn TaskHandler> {
        self(slot)
    }
}

/// Runs the multi-repository aggregator with a scanner private to the worker.
pub struct AggregatorHandler {
    aggregator: Aggregator,
}

impl AggregatorHandler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            aggregator: Aggregator::new(Arc::new(Scanner::new())),
        }
    }
}

impl Default for AggregatorHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHandler for AggregatorHandler {
    async fn handle(&mut self, task: Task) -> Result<AggregatedResult> {
        log::debug!(
            "Task {} searching {} repo(s) for {:?}",
            task.id,
            task.request.repos.len(),
            task.request.query
        );
        Ok(self.aggregator.run(&task.request).await)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregatorHandlerFactory;

impl HandlerFactory for AggregatorHandlerFactory {
    fn create(&self, _slot: usize) -> Box<dyn TaskHandler> {
        Box::new(AggregatorHandler::new())
    }
}
