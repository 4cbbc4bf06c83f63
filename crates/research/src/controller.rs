use crate::classifier::{Classification, ClassifyRequest, HeuristicClassifier};
use crate::planner::{PlannerDecision, PlannerRequest};
use crate::traits::{
    ExternalEvidence, ExternalEvidenceProvider, Planner, QuestionClassifier, RepoEvidenceBackend,
};
use crate::{ExternalFailure, ResearchConfig};
use evidence_protocol::{join_blocks, AggregateRequest, RepoTarget};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

const BLOCK_SEPARATOR: &str = "\n\n";

/// Everything gathered for one question.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutcome {
    pub repo_context: Option<String>,
    pub external_context: Option<String>,
    pub sources: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub warnings: Vec<String>,
    pub rounds: usize,
    pub repo_queries: Vec<String>,
    pub external_queries: Vec<String>,
}

/// Issued queries for one evidence source, compared trimmed and case-folded.
#[derive(Debug, Default)]
struct SeenQueries {
    keys: HashSet<String>,
    issued: Vec<String>,
}

impl SeenQueries {
    fn contains(&self, query: &str) -> bool {
        self.keys.contains(&query.trim().to_lowercase())
    }

    fn insert(&mut self, query: &str) -> bool {
        let inserted = self.keys.insert(query.trim().to_lowercase());
        if inserted {
            self.issued.push(query.trim().to_string());
        }
        inserted
    }

    /// New queries from `proposed`, deduplicated among themselves, at most `cap`.
    fn fresh(&self, proposed: &[String], cap: usize) -> Vec<String> {
        let mut batch = HashSet::new();
        proposed
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty() && !self.contains(q))
            .filter(|q| batch.insert(q.to_lowercase()))
            .take(cap)
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Default)]
struct ResearchState {
    repo_blocks: Vec<String>,
    external_blocks: Vec<String>,
    sources: Vec<String>,
    repo_seen: SeenQueries,
    external_seen: SeenQueries,
    follow_ups: Vec<String>,
    warnings: Vec<String>,
    rounds: usize,
}

impl ResearchState {
    fn repo_context(&self, max_chars: usize) -> String {
        join_blocks(&self.repo_blocks, BLOCK_SEPARATOR, max_chars)
    }

    fn external_context(&self, max_chars: usize) -> String {
        join_blocks(&self.external_blocks, BLOCK_SEPARATOR, max_chars)
    }
}

/// Results of the queries issued in one round.
struct RoundResults {
    external: Vec<(String, Result<ExternalEvidence, ExternalFailure>)>,
}

/// Drives rounds of repository and external lookups for one question.
///
/// Round one is decided by the classifier. Later rounds only run in LLM mode
/// with a planner, and stop on clarifying questions, on nothing new to ask, on
/// `done`, or when `max_rounds` is reached.
pub struct ResearchController {
    config: ResearchConfig,
    backend: Arc<dyn RepoEvidenceBackend>,
    classifier: Arc<dyn QuestionClassifier>,
    planner: Option<Arc<dyn Planner>>,
    external: Option<Arc<dyn ExternalEvidenceProvider>>,
}

impl ResearchController {
    #[must_use]
    pub fn new(config: ResearchConfig, backend: Arc<dyn RepoEvidenceBackend>) -> Self {
        Self {
            config,
            backend,
            classifier: Arc::new(HeuristicClassifier),
            planner: None,
            external: None,
        }
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn QuestionClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    #[must_use]
    pub fn with_external(mut self, provider: Arc<dyn ExternalEvidenceProvider>) -> Self {
        self.external = Some(provider);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    pub async fn collect_evidence(
        &self,
        question: &str,
        transcript: Option<&str>,
        repos: &[RepoTarget],
    ) -> ResearchOutcome {
        let question = question.trim();
        let transcript = transcript.map(str::trim).filter(|t| !t.is_empty());
        let mut state = ResearchState::default();

        let request = ClassifyRequest {
            question,
            transcript,
            has_repos: !repos.is_empty(),
            has_external: self.external.is_some(),
        };
        let classification = match self.classifier.classify(&request).await {
            Ok(classification) => classification,
            Err(err) => {
                log::warn!("Question classification failed ({err}); using heuristics");
                HeuristicClassifier::classify_now(&request)
            }
        };
        let Classification {
            repo_query,
            external_query,
        } = classification;
        let repo_queries: Vec<String> = repo_query
            .filter(|_| request.has_repos)
            .into_iter()
            .collect();
        let external_queries: Vec<String> = external_query
            .filter(|_| request.has_external)
            .into_iter()
            .collect();

        let first = self
            .run_round(&mut state, repos, transcript, repo_queries, external_queries)
            .await;
        state.rounds = 1;
        if let Some((query, result)) = first.external.first() {
            let usable = result.as_ref().is_ok_and(|e| !e.context.trim().is_empty());
            if !usable {
                let reason = result
                    .as_ref()
                    .err()
                    .map_or_else(|| ExternalFailure::Empty.to_string(), ToString::to_string);
                state
                    .warnings
                    .push(format!("External evidence lookup for {query:?} failed: {reason}"));
            }
        }

        if let (true, Some(planner)) = (self.config.llm_mode, self.planner.as_ref()) {
            for round in 2..=self.config.max_rounds {
                if !self
                    .follow_up_round(&mut state, planner.as_ref(), round, question, transcript, repos)
                    .await
                {
                    break;
                }
            }
        }

        self.finish(state)
    }

    /// One planner-driven round. Returns whether another round may follow.
    async fn follow_up_round(
        &self,
        state: &mut ResearchState,
        planner: &dyn Planner,
        round: usize,
        question: &str,
        transcript: Option<&str>,
        repos: &[RepoTarget],
    ) -> bool {
        let max_chars = self.config.limits.max_context_chars;
        let repo_context = state.repo_context(max_chars);
        let external_context = state.external_context(max_chars);
        let request = PlannerRequest {
            question,
            transcript,
            round,
            repo_context: &repo_context,
            external_context: &external_context,
            repo_queries: &state.repo_seen.issued,
            external_queries: &state.external_seen.issued,
        };
        let decision = match planner.plan(&request).await {
            Ok(decision) => decision,
            Err(err) => {
                log::warn!("Planner failed in round {round} ({err}); stopping");
                PlannerDecision::default()
            }
        };

        let mut asked = HashSet::new();
        let questions: Vec<String> = decision
            .ask_user
            .iter()
            .map(|q| q.trim())
            .filter(|q| !q.is_empty() && asked.insert(q.to_lowercase()))
            .take(self.config.max_follow_ups)
            .map(str::to_string)
            .collect();
        if !questions.is_empty() {
            log::info!("Round {round}: planner asks {} clarifying question(s)", questions.len());
            state.follow_ups = questions;
            return false;
        }

        let repo_queries = if repos.is_empty() {
            Vec::new()
        } else {
            state
                .repo_seen
                .fresh(&decision.repo_queries, self.config.repo_queries_per_round)
        };
        let external_queries = if self.external.is_some() {
            state
                .external_seen
                .fresh(&decision.external_queries, self.config.external_queries_per_round)
        } else {
            Vec::new()
        };
        if repo_queries.is_empty() && external_queries.is_empty() {
            log::debug!("Round {round}: no new queries; stopping");
            return false;
        }

        self.run_round(state, repos, transcript, repo_queries, external_queries)
            .await;
        state.rounds = round;
        !decision.done
    }

    /// Issue all queries of a round concurrently and fold the results into `state`.
    async fn run_round(
        &self,
        state: &mut ResearchState,
        repos: &[RepoTarget],
        transcript: Option<&str>,
        repo_queries: Vec<String>,
        external_queries: Vec<String>,
    ) -> RoundResults {
        for query in &repo_queries {
            state.repo_seen.insert(query);
        }
        for query in &external_queries {
            state.external_seen.insert(query);
        }
        log::debug!(
            "Issuing {} repo and {} external queries",
            repo_queries.len(),
            external_queries.len()
        );

        let repo_handles: Vec<_> = repo_queries
            .into_iter()
            .map(|query| {
                let backend = self.backend.clone();
                let request = AggregateRequest::new(repos.to_vec(), query, self.config.limits);
                let pool = self.config.pool;
                tokio::spawn(async move { backend.search(request, pool).await })
            })
            .collect();

        let timeout = self.config.external_timeout();
        let timeout_ms = self.config.external_timeout_ms;
        let external_handles: Vec<_> = match &self.external {
            Some(provider) => external_queries
                .into_iter()
                .map(|query| {
                    let provider = provider.clone();
                    let transcript = transcript.map(str::to_string);
                    let handle = tokio::spawn({
                        let query = query.clone();
                        async move {
                            match tokio::time::timeout(
                                timeout,
                                provider.lookup(&query, transcript.as_deref()),
                            )
                            .await
                            {
                                Ok(result) => result,
                                Err(_) => Err(ExternalFailure::Timeout(timeout_ms)),
                            }
                        }
                    });
                    (query, handle)
                })
                .collect(),
            None => Vec::new(),
        };

        for handle in repo_handles {
            match handle.await {
                Ok(result) if !result.is_empty() => {
                    state.repo_blocks.push(result.context_text);
                    state.sources.extend(result.sources);
                }
                Ok(result) => log::debug!("No repository evidence for {:?}", result.query),
                Err(err) => log::error!("Repository search task failed: {err}"),
            }
        }

        let mut external = Vec::with_capacity(external_handles.len());
        for (query, handle) in external_handles {
            let result = handle
                .await
                .unwrap_or_else(|err| Err(ExternalFailure::Unknown(err.to_string())))
                .and_then(|evidence| {
                    if evidence.context.trim().is_empty() {
                        Err(ExternalFailure::Empty)
                    } else {
                        Ok(evidence)
                    }
                });
            match &result {
                Ok(evidence) => {
                    state.external_blocks.push(evidence.context.clone());
                    state.sources.extend(evidence.sources.iter().cloned());
                }
                Err(failure) => {
                    log::warn!("External lookup for {query:?} failed ({}): {failure}", failure.kind());
                }
            }
            external.push((query, result));
        }

        RoundResults { external }
    }

    fn finish(&self, state: ResearchState) -> ResearchOutcome {
        let max_chars = self.config.limits.max_context_chars;
        let repo_context = state.repo_context(max_chars);
        let external_context = state.external_context(max_chars);

        let mut seen = HashSet::new();
        let sources: Vec<String> = state
            .sources
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .take(self.config.max_sources)
            .collect();

        log::info!(
            "Research finished after {} round(s): {} repo block(s), {} external block(s), {} source(s)",
            state.rounds,
            state.repo_blocks.len(),
            state.external_blocks.len(),
            sources.len()
        );

        ResearchOutcome {
            repo_context: (!repo_context.is_empty()).then_some(repo_context),
            external_context: (!external_context.is_empty()).then_some(external_context),
            sources,
            follow_up_questions: state.follow_ups,
            warnings: state.warnings,
            rounds: state.rounds,
            repo_queries: state.repo_seen.issued,
            external_queries: state.external_seen.issued,
        }
    }
}
