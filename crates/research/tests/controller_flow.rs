use async_trait::async_trait;
use evidence_pool::PoolConfig;
use evidence_protocol::{AggregateRequest, AggregatedResult, RepoTarget};
use evidence_research::{
    ExternalEvidence, ExternalEvidenceProvider, ExternalFailure, Planner, PlannerDecision,
    PlannerRequest, ResearchConfig, ResearchController, ResearchError,
};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers every repo query with one block and one source named after it.
#[derive(Default)]
struct RecordingBackend {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl evidence_research::RepoEvidenceBackend for RecordingBackend {
    async fn search(&self, request: AggregateRequest, _pool: PoolConfig) -> AggregatedResult {
        self.queries.lock().unwrap().push(request.query.clone());
        AggregatedResult {
            context_text: format!("Repo: tidb\nFile: {}.go:1\n", request.query),
            sources: vec![format!("/src/tidb/{}.go:1", request.query), "/src/tidb/shared.go:1".to_string()],
            query: request.query,
        }
    }
}

/// Replays scripted decisions; runs out into the safe default.
struct ScriptedPlanner {
    script: Mutex<VecDeque<evidence_research::Result<PlannerDecision>>>,
    rounds: Mutex<Vec<usize>>,
}

impl ScriptedPlanner {
    fn new(script: Vec<evidence_research::Result<PlannerDecision>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            rounds: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, request: &PlannerRequest<'_>) -> evidence_research::Result<PlannerDecision> {
        self.rounds.lock().unwrap().push(request.round);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(PlannerDecision::default()))
    }
}

struct StaticProvider {
    delay: Duration,
    reply: Result<ExternalEvidence, ExternalFailure>,
    queries: Mutex<Vec<String>>,
}

impl StaticProvider {
    fn ok(context: &str, source: &str) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::ZERO,
            reply: Ok(ExternalEvidence {
                context: context.to_string(),
                sources: vec![source.to_string()],
            }),
            queries: Mutex::new(Vec::new()),
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            reply: Ok(ExternalEvidence {
                context: "too late".to_string(),
                sources: Vec::new(),
            }),
            queries: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ExternalEvidenceProvider for StaticProvider {
    async fn lookup(
        &self,
        query: &str,
        _transcript: Option<&str>,
    ) -> Result<ExternalEvidence, ExternalFailure> {
        self.queries.lock().unwrap().push(query.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }
}

fn decision(repo: &[&str], external: &[&str], ask: &[&str], done: bool) -> PlannerDecision {
    let own = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    PlannerDecision {
        done,
        repo_queries: own(repo),
        external_queries: own(external),
        ask_user: own(ask),
    }
}

fn repos() -> Vec<RepoTarget> {
    vec![RepoTarget::new("/src/tidb", "tidb")]
}

#[tokio::test]
async fn clarifying_question_stops_before_round_three() {
    let backend = Arc::new(RecordingBackend::default());
    let planner = ScriptedPlanner::new(vec![
        Ok(decision(&["ignored"], &[], &["Which TiDB version?", "which tidb version?"], false)),
        Ok(decision(&["never"], &[], &[], false)),
    ]);
    let controller = ResearchController::new(ResearchConfig::default(), backend.clone())
        .with_planner(planner.clone());

    let outcome = controller
        .collect_evidence("How is ParseConfig validated?", None, &repos())
        .await;

    assert_eq!(outcome.follow_up_questions, vec!["Which TiDB version?"]);
    assert_eq!(*planner.rounds.lock().unwrap(), vec![2]);
    assert_eq!(
        *backend.queries.lock().unwrap(),
        vec!["How is ParseConfig validated?"]
    );
    assert_eq!(outcome.rounds, 1);
    assert!(outcome.repo_context.is_some());
}

#[tokio::test(start_paused = true)]
async fn external_timeout_is_a_warning_not_a_failure() {
    let backend = Arc::new(RecordingBackend::default());
    let provider = StaticProvider::slow(Duration::from_secs(60));
    let config = ResearchConfig {
        external_timeout_ms: 20_000,
        ..ResearchConfig::default()
    };
    let controller = ResearchController::new(config, backend).with_external(provider);

    let outcome = controller
        .collect_evidence("What does tidb_gc_life_time do?", None, &repos())
        .await;

    assert_eq!(outcome.external_context, None);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].contains("timed out after 20000 ms"));
    assert!(outcome
        .repo_context
        .as_deref()
        .is_some_and(|c| c.contains("tidb_gc_life_time")));
}

#[tokio::test]
async fn follow_up_rounds_skip_seen_queries_and_cap_per_round() {
    let backend = Arc::new(RecordingBackend::default());
    let provider = StaticProvider::ok("docs: gc", "https://docs.example/gc");
    let planner = ScriptedPlanner::new(vec![
        Ok(decision(
            &["GC worker", "gc_life_time", "safepoint", "extra"],
            &["gc worker", "GC WORKER"],
            &[],
            false,
        )),
        Ok(decision(&["GC worker", "safepoint", "resolve locks"], &[], &[], false)),
    ]);
    let controller = ResearchController::new(ResearchConfig::default(), backend.clone())
        .with_planner(planner.clone())
        .with_external(provider.clone());

    let outcome = controller.collect_evidence("GC worker", None, &repos()).await;

    assert_eq!(
        *backend.queries.lock().unwrap(),
        vec!["GC worker", "gc_life_time", "safepoint", "resolve locks"]
    );
    // The round-one external query already covered "gc worker".
    assert_eq!(*provider.queries.lock().unwrap(), vec!["GC worker"]);
    assert_eq!(*planner.rounds.lock().unwrap(), vec![2, 3]);
    assert_eq!(outcome.rounds, 3);
    assert_eq!(
        outcome.repo_queries,
        vec!["GC worker", "gc_life_time", "safepoint", "resolve locks"]
    );
    assert!(outcome.warnings.is_empty());
    assert_eq!(outcome.external_context.as_deref(), Some("docs: gc"));
}

#[tokio::test]
async fn done_stops_after_processing_the_round() {
    let backend = Arc::new(RecordingBackend::default());
    let planner = ScriptedPlanner::new(vec![Ok(decision(&["region split"], &[], &[], true))]);
    let controller = ResearchController::new(ResearchConfig::default(), backend.clone())
        .with_planner(planner.clone());

    let outcome = controller.collect_evidence("region merge", None, &repos()).await;

    assert_eq!(outcome.rounds, 2);
    assert_eq!(*planner.rounds.lock().unwrap(), vec![2]);
    assert!(outcome
        .repo_context
        .as_deref()
        .is_some_and(|c| c.contains("region split.go")));
}

#[tokio::test]
async fn planner_error_is_treated_as_done() {
    let backend = Arc::new(RecordingBackend::default());
    let planner = ScriptedPlanner::new(vec![Err(ResearchError::Planner("llm down".to_string()))]);
    let controller = ResearchController::new(ResearchConfig::default(), backend.clone())
        .with_planner(planner);

    let outcome = controller.collect_evidence("region merge", None, &repos()).await;

    assert_eq!(outcome.rounds, 1);
    assert_eq!(backend.queries.lock().unwrap().len(), 1);
    assert!(outcome.follow_up_questions.is_empty());
}

#[tokio::test]
async fn without_llm_mode_only_round_one_runs() {
    let backend = Arc::new(RecordingBackend::default());
    let planner = ScriptedPlanner::new(vec![Ok(decision(&["more"], &[], &[], false))]);
    let config = ResearchConfig {
        llm_mode: false,
        ..ResearchConfig::default()
    };
    let controller = ResearchController::new(config, backend).with_planner(planner.clone());

    let outcome = controller.collect_evidence("region merge", None, &repos()).await;

    assert_eq!(outcome.rounds, 1);
    assert!(planner.rounds.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sources_are_deduplicated_and_capped() {
    let backend = Arc::new(RecordingBackend::default());
    let planner = ScriptedPlanner::new(vec![Ok(decision(&["alpha", "beta"], &[], &[], true))]);
    let config = ResearchConfig {
        max_sources: 3,
        ..ResearchConfig::default()
    };
    let controller = ResearchController::new(config, backend).with_planner(planner);

    let outcome = controller.collect_evidence("gamma", None, &repos()).await;

    assert_eq!(
        outcome.sources,
        vec![
            "/src/tidb/gamma.go:1",
            "/src/tidb/shared.go:1",
            "/src/tidb/alpha.go:1"
        ]
    );
}

#[tokio::test]
async fn empty_inputs_yield_empty_outcome() {
    let backend = Arc::new(RecordingBackend::default());
    let controller = ResearchController::new(ResearchConfig::default(), backend.clone());

    let outcome = controller.collect_evidence("   ", None, &[]).await;

    assert_eq!(outcome.repo_context, None);
    assert_eq!(outcome.external_context, None);
    assert!(outcome.sources.is_empty());
    assert!(outcome.warnings.is_empty());
    assert!(backend.queries.lock().unwrap().is_empty());
}

/// Model-style planner: decisions come from raw reply text.
struct RawReplyPlanner {
    replies: Mutex<VecDeque<&'static str>>,
}

#[async_trait]
impl Planner for RawReplyPlanner {
    async fn plan(&self, _request: &PlannerRequest<'_>) -> evidence_research::Result<PlannerDecision> {
        let raw = self.replies.lock().unwrap().pop_front().unwrap_or_default();
        Ok(PlannerDecision::parse(raw))
    }
}

#[tokio::test]
async fn garbled_planner_reply_ends_the_research() {
    let backend = Arc::new(RecordingBackend::default());
    let planner = Arc::new(RawReplyPlanner {
        replies: Mutex::new(
            vec![
                "```json\n{\"done\": false, \"repo_queries\": [\"region split\"]}\n```",
                "I could not decide, sorry.",
            ]
            .into(),
        ),
    });
    let controller =
        ResearchController::new(ResearchConfig::default(), backend.clone()).with_planner(planner);

    let outcome = controller
        .collect_evidence("How are regions split?", None, &repos())
        .await;

    assert_eq!(
        *backend.queries.lock().unwrap(),
        vec!["How are regions split?", "region split"]
    );
    assert_eq!(outcome.rounds, 2);
    assert!(outcome.follow_up_questions.is_empty());
}
