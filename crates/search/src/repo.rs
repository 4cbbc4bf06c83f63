use crate::query::Query;
use crate::scoring::{render_excerpt, score_lines};
use crate::Result;
use evidence_indexer::{is_binary_file, Scanner};
use evidence_protocol::{BlockBudget, SearchLimits, SingleRepoResult, Snippet};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// A file that matched at least one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: String,
    pub score: u32,
    pub best_line: usize,
}

/// Literal token search over one repository.
#[derive(Debug, Clone)]
pub struct RepoSearcher {
    scanner: Arc<Scanner>,
}

impl RepoSearcher {
    #[must_use]
    pub fn new(scanner: Arc<Scanner>) -> Self {
        Self { scanner }
    }

    #[must_use]
    pub fn scanner(&self) -> &Arc<Scanner> {
        &self.scanner
    }

    pub fn search(
        &self,
        repo_path: &Path,
        query: &str,
        limits: &SearchLimits,
    ) -> Result<SingleRepoResult> {
        self.search_query(repo_path, &Query::parse(query), limits)
    }

    /// Search with an already tokenized query.
    ///
    /// An unsearchable query returns an empty result without touching the
    /// scanner cache.
    pub fn search_query(
        &self,
        repo_path: &Path,
        query: &Query,
        limits: &SearchLimits,
    ) -> Result<SingleRepoResult> {
        if !query.is_searchable() {
            return Ok(SingleRepoResult::empty(query.text()));
        }

        let snippets = self.snippets(repo_path, query, limits)?;
        let sources: Vec<String> = snippets.iter().map(Snippet::source).collect();
        let mut budget = BlockBudget::new(limits.max_context_chars);
        for (snippet, source) in snippets.iter().zip(&sources) {
            if !budget.push(&format!("File: {source}\n{}\n", snippet.excerpt)) {
                break;
            }
        }

        Ok(SingleRepoResult {
            query: query.text().to_string(),
            snippets,
            context_text: budget.into_text(),
            sources,
        })
    }

    /// Ranked snippets for `query`, at most `limits.max_snippets` of them.
    pub fn snippets(
        &self,
        repo_path: &Path,
        query: &Query,
        limits: &SearchLimits,
    ) -> Result<Vec<Snippet>> {
        if !query.is_searchable() {
            return Ok(Vec::new());
        }

        let index = self.scanner.build_index(repo_path, limits.max_files)?;
        let mut candidates: Vec<FileCandidate> = index
            .files
            .iter()
            .filter_map(|rel| score_file(&index.absolute(rel), rel, query.needles(), limits))
            .collect();

        // Stable: equal scores keep listing order.
        candidates.sort_by(|a, b| b.score.cmp(&a.score));
        candidates.truncate(limits.max_snippets);

        let snippets: Vec<Snippet> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let lines = read_lines(&index.absolute(&candidate.path))?;
                Some(Snippet {
                    excerpt: render_excerpt(&lines, candidate.best_line, limits.context_lines),
                    line: candidate.best_line,
                    score: candidate.score,
                    path: candidate.path,
                })
            })
            .collect();

        log::debug!(
            "Query {:?} matched {} snippet(s) in {}",
            query.text(),
            snippets.len(),
            index.root.display()
        );
        Ok(snippets)
    }
}

/// Score one file, or `None` if it is skipped or has no hits.
fn score_file(
    path: &Path,
    rel: &str,
    needles: &[String],
    limits: &SearchLimits,
) -> Option<FileCandidate> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            log::debug!("Skipping {rel}: {err}");
            return None;
        }
    };
    if !meta.is_file() {
        return None;
    }
    let len = meta.len();
    if len == 0 || len > limits.max_file_bytes as u64 {
        return None;
    }
    match is_binary_file(path) {
        Ok(false) => {}
        Ok(true) => {
            log::debug!("Skipping binary file {rel}");
            return None;
        }
        Err(err) => {
            log::debug!("Skipping {rel}: {err}");
            return None;
        }
    }

    let lines = read_lines(path)?;
    let score = score_lines(&lines, needles)?;
    Some(FileCandidate {
        path: rel.to_string(),
        score: score.score,
        best_line: score.best_line,
    })
}

fn read_lines(path: &Path) -> Option<Vec<String>> {
    match fs::read(path) {
        Ok(bytes) => Some(
            String::from_utf8_lossy(&bytes)
                .lines()
                .map(str::to_string)
                .collect(),
        ),
        Err(err) => {
            log::debug!("Failed to read {}: {err}", path.display());
            None
        }
    }
}
