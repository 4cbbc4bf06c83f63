use evidence_indexer::Scanner;
use evidence_protocol::{AggregateRequest, RepoTarget, SearchLimits};
use evidence_search::Aggregator;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[tokio::test]
async fn merges_repos_by_score_with_labeled_blocks() {
    let temp = tempdir().unwrap();
    let tidb = temp.path().join("tidb");
    let docs = temp.path().join("docs");
    write(&tidb, "config/config.go", "package config\n\nfunc ParseConfig() {}\n");
    write(
        &docs,
        "tidb-configuration.md",
        "# Config\nCall ParseConfig to load the config file.\n",
    );

    let aggregator = Aggregator::new(Arc::new(Scanner::new()));
    let repos = vec![
        RepoTarget::new(&tidb, "tidb").with_variant("v8.5"),
        RepoTarget::new(&docs, "docs").with_display("TiDB Docs"),
    ];
    let result = aggregator
        .search_many(&repos, "ParseConfig config", &SearchLimits::default())
        .await;

    let docs_root = docs.canonicalize().unwrap();
    let tidb_root = tidb.canonicalize().unwrap();
    // docs: line 1 hits "config", line 2 hits both (score 3); tidb: lines 1 and 3 (score 3)
    // but tidb is listed first so it wins the tie.
    assert_eq!(
        result.sources,
        vec![
            format!("{}:3", tidb_root.join("config/config.go").display()),
            format!("{}:2", docs_root.join("tidb-configuration.md").display()),
        ]
    );
    assert!(result
        .context_text
        .starts_with("Repo: tidb@v8.5\nFile: config/config.go:3\n"));
    assert!(result
        .context_text
        .contains("\n\nRepo: TiDB Docs\nFile: tidb-configuration.md:2\n"));
}

#[tokio::test]
async fn duplicate_and_missing_repos_do_not_fail_the_search() {
    let temp = tempdir().unwrap();
    let repo = temp.path().join("repo");
    write(&repo, "lib.rs", "pub fn scheduler() {}\n");

    let aggregator = Aggregator::new(Arc::new(Scanner::new()));
    let request = AggregateRequest::new(
        vec![
            RepoTarget::from_path(&repo),
            RepoTarget::from_path(repo.join(".")),
            RepoTarget::from_path(temp.path().join("gone")),
        ],
        "scheduler",
        SearchLimits::default(),
    );
    let result = aggregator.run(&request).await;

    assert_eq!(result.sources.len(), 1);
    assert_eq!(result.context_text.matches("Repo: repo\n").count(), 1);
    assert_eq!(aggregator.scanner().cached_repos(), 1);
}

#[tokio::test]
async fn global_snippet_cap_and_char_budget_hold() {
    let temp = tempdir().unwrap();
    let mut repos = Vec::new();
    for r in 0..3 {
        let root = temp.path().join(format!("r{r}"));
        for f in 0..4 {
            write(&root, &format!("f{f}.txt"), "the balancer moves regions\n");
        }
        repos.push(RepoTarget::from_path(root));
    }
    let limits = SearchLimits {
        max_snippets: 5,
        max_context_chars: 200,
        ..SearchLimits::default()
    };

    let result = Aggregator::new(Arc::new(Scanner::new()))
        .search_many(&repos, "balancer", &limits)
        .await;

    assert_eq!(result.sources.len(), 5);
    assert!(result.context_text.chars().count() <= 200);
    assert!(result.context_text.ends_with("balancer moves regions\n"));
}
