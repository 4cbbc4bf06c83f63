use anyhow::{Context as AnyhowContext, Result};
use evidence_protocol::RepoTarget;
use evidence_research::ResearchConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Contents of a `--config` TOML file.
///
/// Top-level keys are those of [`ResearchConfig`] (`max_rounds`, `[limits]`,
/// `[pool]`, ...) plus the optional external lookup endpoint and repositories.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(flatten)]
    pub research: ResearchConfig,
    pub external_url: Option<String>,
    pub repos: Vec<RepoEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    pub path: PathBuf,
    pub name: Option<String>,
    pub variant: Option<String>,
    pub display: Option<String>,
}

impl RepoEntry {
    pub fn to_target(&self) -> RepoTarget {
        let mut target = match &self.name {
            Some(name) => RepoTarget::new(&self.path, name.clone()),
            None => RepoTarget::from_path(&self.path),
        };
        target.variant = self.variant.clone();
        target.display = self.display.clone();
        target
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Parse a `--repo` value: `PATH`, `NAME=PATH` or `NAME@VARIANT=PATH`.
pub fn parse_repo_arg(raw: &str) -> std::result::Result<RepoTarget, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("repository path is empty".to_string());
    }
    let Some((label, path)) = raw.split_once('=') else {
        return Ok(RepoTarget::from_path(raw));
    };
    let (label, path) = (label.trim(), path.trim());
    if path.is_empty() {
        return Err(format!("missing path in {raw:?}"));
    }
    let target = match label.split_once('@') {
        Some((name, variant)) if !name.is_empty() => {
            RepoTarget::new(path, name).with_variant(variant)
        }
        _ if !label.is_empty() => RepoTarget::new(path, label),
        _ => RepoTarget::from_path(path),
    };
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_flattened_toml() {
        let config = FileConfig::parse(
            r#"
            max_rounds = 2
            external_url = "http://127.0.0.1:9000/lookup"

            [limits]
            max_snippets = 5

            [pool]
            size = 4

            [[repos]]
            path = "/src/tidb"
            variant = "v8.5"
            "#,
        )
        .unwrap();

        assert_eq!(config.research.max_rounds, 2);
        assert_eq!(config.research.limits.max_snippets, 5);
        assert_eq!(config.research.limits.max_files, 4_000);
        assert_eq!(config.research.pool.size, 4);
        assert_eq!(config.external_url.as_deref(), Some("http://127.0.0.1:9000/lookup"));
        assert_eq!(config.repos[0].to_target().label(), "tidb@v8.5");
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.research, ResearchConfig::default());
        assert!(config.repos.is_empty());
    }

    #[test]
    fn repo_arg_forms() {
        assert_eq!(parse_repo_arg("/src/tidb").unwrap().label(), "tidb");
        assert_eq!(parse_repo_arg("docs=/src/docs-cn").unwrap().label(), "docs");
        let pinned = parse_repo_arg("tidb@v8.5=/src/tidb-8.5").unwrap();
        assert_eq!(pinned.label(), "tidb@v8.5");
        assert_eq!(pinned.path, PathBuf::from("/src/tidb-8.5"));
        assert!(parse_repo_arg("  ").is_err());
        assert!(parse_repo_arg("name=").is_err());
    }
}
