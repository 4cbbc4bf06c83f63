use crate::classifier::{Classification, ClassifyRequest};
use crate::planner::{PlannerDecision, PlannerRequest};
use crate::{ExternalFailure, Result};
use async_trait::async_trait;
use evidence_pool::{EvidencePool, PoolConfig};
use evidence_protocol::{AggregateRequest, AggregatedResult};
use evidence_search::Aggregator;
use serde::{Deserialize, Serialize};

/// Context body and sources returned by an external lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExternalEvidence {
    pub context: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Decides which sources round one should consult.
#[async_trait]
pub trait QuestionClassifier: Send + Sync {
    async fn classify(&self, request: &ClassifyRequest<'_>) -> Result<Classification>;
}

/// Proposes follow-up queries and clarifying questions for rounds two onward.
///
/// Implementations backed by a raw model reply should return
/// [`PlannerDecision::parse`] of that reply, which maps anything malformed to
/// the stopping default.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &PlannerRequest<'_>) -> Result<PlannerDecision>;
}

#[async_trait]
pub trait ExternalEvidenceProvider: Send + Sync {
    async fn lookup(
        &self,
        query: &str,
        transcript: Option<&str>,
    ) -> std::result::Result<ExternalEvidence, ExternalFailure>;
}

/// Where repository queries are executed.
#[async_trait]
pub trait RepoEvidenceBackend: Send + Sync {
    async fn search(&self, request: AggregateRequest, pool: PoolConfig) -> AggregatedResult;
}

#[async_trait]
impl RepoEvidenceBackend for EvidencePool {
    async fn search(&self, request: AggregateRequest, pool: PoolConfig) -> AggregatedResult {
        self.run(request, pool).await
    }
}

/// In-process search, no pool.
#[async_trait]
impl RepoEvidenceBackend for Aggregator {
    async fn search(&self, request: AggregateRequest, _pool: PoolConfig) -> AggregatedResult {
        self.run(&request).await
    }
}
