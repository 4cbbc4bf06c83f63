use crate::query::Query;
use crate::repo::RepoSearcher;
use evidence_indexer::Scanner;
use evidence_protocol::{
    dedup_targets, AggregateRequest, AggregatedResult, BlockBudget, RepoTarget, SearchLimits,
    Snippet,
};
use std::collections::HashSet;
use std::sync::Arc;

/// A snippet tagged with the repository it came from.
#[derive(Debug, Clone)]
struct RankedSnippet {
    label: String,
    source: String,
    snippet: Snippet,
}

/// Fans one query out over several repositories and merges the results.
///
/// Each repository is searched on the blocking thread pool; a repository that
/// fails (missing path, unreadable root) is logged and contributes nothing.
#[derive(Debug, Clone)]
pub struct Aggregator {
    searcher: RepoSearcher,
}

impl Aggregator {
    #[must_use]
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self {
            searcher: RepoSearcher::new(scanner),
        }
    }

    #[must_use]
    pub fn scanner(&self) -> &Arc<Scanner> {
        self.searcher.scanner()
    }

    pub async fn run(&self, request: &AggregateRequest) -> AggregatedResult {
        self.search_many(&request.repos, &request.query, &request.limits)
            .await
    }

    pub async fn search_many(
        &self,
        repos: &[RepoTarget],
        query: &str,
        limits: &SearchLimits,
    ) -> AggregatedResult {
        let query = Query::parse(query);
        let repos = dedup_targets(repos);
        if !query.is_searchable() || repos.is_empty() {
            return AggregatedResult::empty(query.text());
        }

        let handles: Vec<_> = repos
            .into_iter()
            .map(|target| {
                let searcher = self.searcher.clone();
                let query = query.clone();
                let limits = *limits;
                let path = target.path.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    searcher.snippets(&path, &query, &limits)
                });
                (target, handle)
            })
            .collect();

        let mut ranked = Vec::new();
        for (target, handle) in handles {
            let snippets = match handle.await {
                Ok(Ok(snippets)) => snippets,
                Ok(Err(err)) => {
                    log::warn!("Search in {} failed: {err}", target.path.display());
                    continue;
                }
                Err(err) => {
                    log::error!("Search task for {} aborted: {err}", target.path.display());
                    continue;
                }
            };
            let label = target.label();
            ranked.extend(snippets.into_iter().map(|snippet| RankedSnippet {
                source: format!("{}:{}", target.path.join(&snippet.path).display(), snippet.line),
                label: label.clone(),
                snippet,
            }));
        }

        merge(query.text(), ranked, limits)
    }
}

fn merge(query: &str, mut ranked: Vec<RankedSnippet>, limits: &SearchLimits) -> AggregatedResult {
    // Stable: ties keep repository order, then per-repo rank.
    ranked.sort_by(|a, b| b.snippet.score.cmp(&a.snippet.score));
    ranked.truncate(limits.max_snippets);

    let mut seen = HashSet::new();
    let sources: Vec<String> = ranked
        .iter()
        .filter(|r| seen.insert(r.source.clone()))
        .map(|r| r.source.clone())
        .collect();

    let mut budget = BlockBudget::new(limits.max_context_chars);
    for r in &ranked {
        let block = format!(
            "Repo: {}\nFile: {}\n{}\n",
            r.label,
            r.snippet.source(),
            r.snippet.excerpt
        );
        if !budget.push(&block) {
            break;
        }
    }

    log::debug!(
        "Aggregated {} snippet(s) for {query:?} into {} chars",
        ranked.len(),
        budget.used_chars()
    );

    AggregatedResult {
        query: query.to_string(),
        context_text: budget.into_text(),
        sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ranked(label: &str, path: &str, score: u32) -> RankedSnippet {
        RankedSnippet {
            label: label.to_string(),
            source: format!("/repos/{label}/{path}:1"),
            snippet: Snippet {
                path: path.to_string(),
                line: 1,
                excerpt: format!("    1 | {path}"),
                score,
            },
        }
    }

    #[test]
    fn merge_ranks_globally_by_score() {
        let result = merge(
            "q",
            vec![
                ranked("a", "low.rs", 1),
                ranked("a", "mid.rs", 2),
                ranked("b", "high.rs", 5),
                ranked("b", "mid2.rs", 2),
            ],
            &SearchLimits {
                max_snippets: 3,
                ..SearchLimits::default()
            },
        );
        assert_eq!(
            result.sources,
            vec![
                "/repos/b/high.rs:1",
                "/repos/a/mid.rs:1",
                "/repos/b/mid2.rs:1"
            ]
        );
        assert!(result.context_text.starts_with("Repo: b\nFile: high.rs:1\n"));
    }

    #[test]
    fn merge_dedupes_sources_preserving_rank() {
        let dup = ranked("a", "x.rs", 3);
        let result = merge(
            "q",
            vec![dup.clone(), ranked("a", "y.rs", 2), dup],
            &SearchLimits::default(),
        );
        assert_eq!(result.sources, vec!["/repos/a/x.rs:1", "/repos/a/y.rs:1"]);
    }

    #[test]
    fn merge_truncates_whole_blocks() {
        let items: Vec<_> = (0..4).map(|i| ranked("r", &format!("f{i}.rs"), 1)).collect();
        let block = "Repo: r\nFile: f0.rs:1\n    1 | f0.rs\n".chars().count();
        let limits = SearchLimits {
            max_context_chars: block * 2 + 1,
            ..SearchLimits::default()
        };
        let result = merge("q", items, &limits);
        assert_eq!(result.context_text.matches("Repo: ").count(), 2);
        assert!(result.context_text.chars().count() <= limits.max_context_chars);
        assert_eq!(result.sources.len(), 4);
    }

    #[tokio::test]
    async fn empty_inputs_short_circuit() {
        let scanner = Arc::new(Scanner::new());
        let aggregator = Aggregator::new(scanner.clone());
        let temp = tempfile::tempdir().unwrap();

        let no_tokens = aggregator
            .search_many(&[RepoTarget::from_path(temp.path())], "is it", &SearchLimits::default())
            .await;
        assert!(no_tokens.is_empty());
        assert!(no_tokens.sources.is_empty());

        let no_repos = aggregator
            .search_many(&[], "ParseConfig", &SearchLimits::default())
            .await;
        assert_eq!(no_repos, AggregatedResult::empty("ParseConfig"));
        assert_eq!(scanner.cached_repos(), 0);
    }
}
