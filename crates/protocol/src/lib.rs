//! Shared data model for repository evidence search.
//!
//! Every component of the pipeline (scanner, search, pool, research) speaks in
//! terms of the types defined here, so the pool can ship a request to a worker
//! and hand back a result without either side knowing about the other.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub mod budget;
pub mod limits;

pub use budget::{join_blocks, BlockBudget};
pub use limits::{env_usize, parse_bounded, SearchLimits};

/// A local repository eligible for search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RepoTarget {
    pub path: PathBuf,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl RepoTarget {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            variant: None,
            display: None,
        }
    }

    /// Target named after the last component of `path`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(path, name)
    }

    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    #[must_use]
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Human-facing label used in context block headers.
    #[must_use]
    pub fn label(&self) -> String {
        if let Some(display) = self
            .display
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            return display.to_string();
        }
        match self
            .variant
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            Some(variant) => format!("{}@{variant}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Resolve `path` to an absolute path, preferring the canonical form.
#[must_use]
pub fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Deduplicate targets by resolved absolute path, keeping the first occurrence.
///
/// The returned targets carry the resolved path.
#[must_use]
pub fn dedup_targets(targets: &[RepoTarget]) -> Vec<RepoTarget> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut out = Vec::with_capacity(targets.len());
    for target in targets {
        let resolved = resolve_path(&target.path);
        if !seen.insert(resolved.clone()) {
            continue;
        }
        let mut target = target.clone();
        target.path = resolved;
        out.push(target);
    }
    out
}

/// One rendered excerpt from a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snippet {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// 1-based line number of the best-matching line.
    pub line: usize,
    pub excerpt: String,
    pub score: u32,
}

impl Snippet {
    /// `"path:line"` reference for this snippet.
    #[must_use]
    pub fn source(&self) -> String {
        format!("{}:{}", self.path, self.line)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SingleRepoResult {
    pub query: String,
    pub snippets: Vec<Snippet>,
    pub context_text: String,
    pub sources: Vec<String>,
}

impl SingleRepoResult {
    #[must_use]
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregatedResult {
    pub query: String,
    pub context_text: String,
    pub sources: Vec<String>,
}

impl AggregatedResult {
    #[must_use]
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.context_text.trim().is_empty()
    }
}

/// Payload of one pool task: search `query` across `repos`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregateRequest {
    pub repos: Vec<RepoTarget>,
    pub query: String,
    #[serde(default)]
    pub limits: SearchLimits,
}

impl AggregateRequest {
    pub fn new(repos: Vec<RepoTarget>, query: impl Into<String>, limits: SearchLimits) -> Self {
        Self {
            repos,
            query: query.into(),
            limits,
        }
    }
}
