use crate::filters::{is_excluded_dir_name, is_excluded_path};
use crate::{git, IndexerError, Result};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

const MAX_WALK_DEPTH: usize = 24;

/// Where a [`RepoIndex`] listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSource {
    Git,
    Walk,
}

/// Cached list of eligible files for one repository.
#[derive(Debug, Clone)]
pub struct RepoIndex {
    pub root: PathBuf,
    /// Repository-relative, `/`-separated paths in listing order.
    pub files: Vec<String>,
    pub built_at: SystemTime,
    /// The `max_files` bound this listing was built with.
    pub max_files: usize,
    pub source: ListingSource,
}

impl RepoIndex {
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn absolute(&self, rel_path: &str) -> PathBuf {
        self.root.join(rel_path)
    }

    /// Whether this listing can serve a request bounded by `max_files`.
    #[must_use]
    pub fn covers(&self, max_files: usize) -> bool {
        max_files <= self.max_files
    }
}

/// Builds and caches [`RepoIndex`] listings keyed by canonical repository root.
///
/// The cache has no expiry: an entry is reused for every request whose bound
/// it covers and replaced only when a larger bound is requested (or it is
/// explicitly invalidated).
#[derive(Debug, Default)]
pub struct Scanner {
    cache: Mutex<HashMap<PathBuf, Arc<RepoIndex>>>,
}

impl Scanner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the listing for `repo_path`, building it if the cache cannot serve `max_files`.
    pub fn build_index(&self, repo_path: &Path, max_files: usize) -> Result<Arc<RepoIndex>> {
        let root = canonical_root(repo_path)?;

        if let Some(cached) = self.lookup(&root) {
            if cached.covers(max_files) {
                log::debug!(
                    "Reusing cached index for {} ({} files, bound {})",
                    root.display(),
                    cached.len(),
                    cached.max_files
                );
                return Ok(cached);
            }
        }

        let index = Arc::new(Self::scan(root.clone(), max_files));
        log::info!(
            "Indexed {} files in {} via {:?} (bound {})",
            index.len(),
            root.display(),
            index.source,
            max_files
        );

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let replace = cache
            .get(&root)
            .map_or(true, |existing| max_files >= existing.max_files);
        if replace {
            cache.insert(root, index.clone());
        }
        Ok(index)
    }

    #[must_use]
    pub fn cached(&self, repo_path: &Path) -> Option<Arc<RepoIndex>> {
        let root = canonical_root(repo_path).ok()?;
        self.lookup(&root)
    }

    /// Drop the cached listing for `repo_path`; returns whether one existed.
    pub fn invalidate(&self, repo_path: &Path) -> bool {
        let Ok(root) = canonical_root(repo_path) else {
            return false;
        };
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&root)
            .is_some()
    }

    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    #[must_use]
    pub fn cached_repos(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn lookup(&self, root: &Path) -> Option<Arc<RepoIndex>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(root)
            .cloned()
    }

    fn scan(root: PathBuf, max_files: usize) -> RepoIndex {
        let listed = if git::has_git_metadata(&root) {
            git::list_files(&root).map(|files| {
                files
                    .into_iter()
                    .map(|f| f.replace('\\', "/"))
                    .filter(|f| !is_excluded_path(f))
                    .take(max_files)
                    .collect::<Vec<_>>()
            })
        } else {
            None
        };

        let (files, source) = match listed {
            Some(files) => (files, ListingSource::Git),
            None => (Self::walk(&root, max_files), ListingSource::Walk),
        };

        RepoIndex {
            root,
            files,
            built_at: SystemTime::now(),
            max_files,
            source,
        }
    }

    /// Bounded, deterministic directory walk.
    fn walk(root: &Path, max_files: usize) -> Vec<String> {
        let mut files = Vec::new();
        if max_files == 0 {
            return files;
        }

        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .parents(false)
            .follow_links(false)
            .max_depth(Some(MAX_WALK_DEPTH))
            .sort_by_file_name(|a, b| a.cmp(b));
        builder.filter_entry(|entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            let excluded = is_dir
                && entry.depth() > 0
                && is_excluded_dir_name(&entry.file_name().to_string_lossy());
            !excluded
        });

        for result in builder.build() {
            let entry = match result {
                Ok(entry) => entry,
                Err(err) => {
                    log::debug!("Skipping unreadable entry under {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(rel) = relative_slash_path(root, entry.path()) else {
                continue;
            };
            if is_excluded_path(&rel) {
                continue;
            }
            files.push(rel);
            if files.len() >= max_files {
                log::debug!(
                    "Walk of {} stopped at the {max_files}-file bound",
                    root.display()
                );
                break;
            }
        }
        files
    }
}

fn canonical_root(repo_path: &Path) -> Result<PathBuf> {
    let root = repo_path
        .canonicalize()
        .map_err(|e| IndexerError::InvalidPath(format!("{}: {e}", repo_path.display())))?;
    if !root.is_dir() {
        return Err(IndexerError::InvalidPath(format!(
            "{} is not a directory",
            root.display()
        )));
    }
    Ok(root)
}

fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!parts.is_empty()).then(|| parts.join("/"))
}
