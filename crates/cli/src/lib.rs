use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use evidence_indexer::Scanner;
use evidence_pool::EvidencePool;
use evidence_protocol::{AggregateRequest, AggregatedResult, RepoTarget};
use evidence_research::{
    HttpEvidenceProvider, ResearchConfig, ResearchController, ResearchOutcome,
};
use evidence_search::Aggregator;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

mod config;

pub use config::{parse_repo_arg, FileConfig, RepoEntry};

#[derive(Parser)]
#[command(name = "evidence")]
#[command(about = "Find evidence for questions in local repositories", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (applied before EVIDENCE_* environment overrides)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(flatten)]
    limits: LimitArgs,
}

#[derive(Args, Default)]
struct LimitArgs {
    /// Maximum files listed per repository
    #[arg(long, global = true)]
    max_files: Option<usize>,

    /// Skip files larger than this many bytes
    #[arg(long, global = true)]
    max_file_bytes: Option<usize>,

    /// Maximum snippets per result
    #[arg(long, global = true)]
    max_snippets: Option<usize>,

    /// Lines of context around each match
    #[arg(long, global = true)]
    context_lines: Option<usize>,

    /// Character budget of the assembled context
    #[arg(long, global = true)]
    max_context_chars: Option<usize>,

    /// Number of pool workers
    #[arg(long, global = true)]
    pool_size: Option<usize>,

    /// Pending task capacity of the pool
    #[arg(long, global = true)]
    queue_max: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search repositories for a query and print the evidence
    Search(SearchArgs),

    /// Gather evidence for a question over one or more rounds
    Research(ResearchArgs),
}

impl Commands {
    /// `--json` runs log warnings only.
    fn json_output(&self) -> bool {
        match self {
            Commands::Search(args) => args.json,
            Commands::Research(args) => args.json,
        }
    }
}

#[derive(Args)]
struct SearchArgs {
    /// Free-text query; quote phrases to match them verbatim
    query: String,

    /// Repository to search: PATH, NAME=PATH or NAME@VARIANT=PATH (repeatable)
    #[arg(long = "repo", value_parser = parse_repo_arg)]
    repos: Vec<RepoTarget>,

    /// Search in this process instead of the worker pool
    #[arg(long)]
    in_process: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResearchArgs {
    /// Question to research
    question: String,

    /// Repository to search: PATH, NAME=PATH or NAME@VARIANT=PATH (repeatable)
    #[arg(long = "repo", value_parser = parse_repo_arg)]
    repos: Vec<RepoTarget>,

    /// File with the conversation so far
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Endpoint of the external docs lookup
    #[arg(long)]
    external_url: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let config = apply_limit_args(file.research.clone().with_env_overrides(), &cli.limits);
    config.validate()?;
    let configured_repos: Vec<RepoTarget> = file.repos.iter().map(RepoEntry::to_target).collect();

    match cli.command {
        Commands::Search(args) => {
            let repos = pick_repos(args.repos, &configured_repos)?;
            let result = run_search(&config, repos, &args.query, args.in_process).await;
            print_search(&result, args.json)
        }
        Commands::Research(args) => {
            let repos = pick_repos(args.repos, &configured_repos)?;
            let transcript = match &args.transcript {
                Some(path) => Some(
                    fs::read_to_string(path)
                        .with_context(|| format!("Failed to read transcript {}", path.display()))?,
                ),
                None => None,
            };
            let external_url = args.external_url.or(file.external_url);
            let outcome = run_research(
                config,
                &args.question,
                transcript.as_deref(),
                &repos,
                external_url,
            )
            .await?;
            print_research(&outcome, args.json)
        }
    }
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet || cli.command.json_output() {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn apply_limit_args(mut config: ResearchConfig, args: &LimitArgs) -> ResearchConfig {
    let limits = &mut config.limits;
    if let Some(v) = args.max_files {
        limits.max_files = v.max(1);
    }
    if let Some(v) = args.max_file_bytes {
        limits.max_file_bytes = v.max(1);
    }
    if let Some(v) = args.max_snippets {
        limits.max_snippets = v.max(1);
    }
    if let Some(v) = args.context_lines {
        limits.context_lines = v;
    }
    if let Some(v) = args.max_context_chars {
        limits.max_context_chars = v.max(1);
    }
    if let Some(v) = args.pool_size {
        config.pool.size = v;
    }
    if let Some(v) = args.queue_max {
        config.pool.queue_max = v;
    }
    config.pool = config.pool.normalized();
    config
}

fn pick_repos(from_args: Vec<RepoTarget>, configured: &[RepoTarget]) -> Result<Vec<RepoTarget>> {
    let repos = if from_args.is_empty() {
        configured.to_vec()
    } else {
        from_args
    };
    if repos.is_empty() {
        anyhow::bail!("No repositories given; pass --repo or list [[repos]] in the config file");
    }
    Ok(repos)
}

async fn run_search(
    config: &ResearchConfig,
    repos: Vec<RepoTarget>,
    query: &str,
    in_process: bool,
) -> AggregatedResult {
    let request = AggregateRequest::new(repos, query, config.limits);
    if in_process {
        return Aggregator::new(Arc::new(Scanner::new())).run(&request).await;
    }
    let pool = EvidencePool::new();
    let result = pool.run(request, config.pool).await;
    pool.close().await;
    result
}

async fn run_research(
    config: ResearchConfig,
    question: &str,
    transcript: Option<&str>,
    repos: &[RepoTarget],
    external_url: Option<String>,
) -> Result<ResearchOutcome> {
    let timeout = config.external_timeout();
    let pool = Arc::new(EvidencePool::new());
    let mut controller = ResearchController::new(config, pool.clone());
    if let Some(url) = external_url {
        let provider = HttpEvidenceProvider::new(url, timeout)
            .context("Failed to set up the external evidence provider")?;
        controller = controller.with_external(Arc::new(provider));
    }
    let outcome = controller.collect_evidence(question, transcript, repos).await;
    pool.close().await;
    Ok(outcome)
}

fn print_search(result: &AggregatedResult, json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, result)?;
        writeln!(out)?;
        return Ok(());
    }
    if result.is_empty() {
        writeln!(out, "No evidence found for {:?}.", result.query)?;
        return Ok(());
    }
    writeln!(out, "{}", result.context_text.trim_end())?;
    writeln!(out, "\nSources:")?;
    for source in &result.sources {
        writeln!(out, "  {source}")?;
    }
    Ok(())
}

fn print_research(outcome: &ResearchOutcome, json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, outcome)?;
        writeln!(out)?;
        return Ok(());
    }
    if let Some(context) = &outcome.repo_context {
        writeln!(out, "== Repository evidence ==\n{}\n", context.trim_end())?;
    }
    if let Some(context) = &outcome.external_context {
        writeln!(out, "== External evidence ==\n{}\n", context.trim_end())?;
    }
    if outcome.repo_context.is_none() && outcome.external_context.is_none() {
        writeln!(out, "No evidence found.\n")?;
    }
    if !outcome.sources.is_empty() {
        writeln!(out, "Sources:")?;
        for source in &outcome.sources {
            writeln!(out, "  {source}")?;
        }
    }
    for question in &outcome.follow_up_questions {
        writeln!(out, "Follow-up: {question}")?;
    }
    for warning in &outcome.warnings {
        writeln!(out, "Warning: {warning}")?;
    }
    writeln!(out, "Rounds: {}", outcome.rounds)?;
    Ok(())
}
