use serde::{Deserialize, Serialize};

const MAX_FILES_CEILING: usize = 200_000;
const MAX_FILE_BYTES_CEILING: usize = 16 * 1024 * 1024;
const MAX_SNIPPETS_CEILING: usize = 200;
const CONTEXT_LINES_CEILING: usize = 200;
const MAX_CONTEXT_CHARS_CEILING: usize = 1_000_000;

/// Budgets applied by single-repo search and the aggregator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SearchLimits {
    pub max_files: usize,
    pub max_file_bytes: usize,
    pub max_snippets: usize,
    pub context_lines: usize,
    pub max_context_chars: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_files: 4_000,
            max_file_bytes: 262_144,
            max_snippets: 8,
            context_lines: 6,
            max_context_chars: 12_000,
        }
    }
}

impl SearchLimits {
    /// Defaults overridden by `EVIDENCE_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        Self {
            max_files: env_usize("EVIDENCE_MAX_FILES", self.max_files, 1, MAX_FILES_CEILING),
            max_file_bytes: env_usize(
                "EVIDENCE_MAX_FILE_BYTES",
                self.max_file_bytes,
                1,
                MAX_FILE_BYTES_CEILING,
            ),
            max_snippets: env_usize(
                "EVIDENCE_MAX_SNIPPETS",
                self.max_snippets,
                1,
                MAX_SNIPPETS_CEILING,
            ),
            context_lines: env_usize(
                "EVIDENCE_CONTEXT_LINES",
                self.context_lines,
                0,
                CONTEXT_LINES_CEILING,
            ),
            max_context_chars: env_usize(
                "EVIDENCE_MAX_CONTEXT_CHARS",
                self.max_context_chars,
                1,
                MAX_CONTEXT_CHARS_CEILING,
            ),
        }
    }
}

/// Parse a numeric knob: blank or invalid input yields `default_value`,
/// anything else is clamped to `[min, max]`.
#[must_use]
pub fn parse_bounded(raw: Option<&str>, default_value: usize, min: usize, max: usize) -> usize {
    raw.map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default_value)
        .clamp(min, max)
}

#[must_use]
pub fn env_usize(name: &str, default_value: usize, min: usize, max: usize) -> usize {
    let raw = std::env::var(name).ok();
    parse_bounded(raw.as_deref(), default_value, min, max)
}
