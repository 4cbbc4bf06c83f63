/// Score of one file against a token set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileScore {
    /// Sum over all lines of the number of distinct tokens each line contains.
    pub score: u32,
    /// 1-based line with the highest per-line hit count; first one wins ties.
    pub best_line: usize,
}

/// Score `lines` against lowercased `needles`.
///
/// Returns `None` when no line contains any needle.
#[must_use]
pub fn score_lines<S: AsRef<str>>(lines: &[S], needles: &[String]) -> Option<FileScore> {
    if needles.is_empty() {
        return None;
    }

    let mut score = 0u32;
    let mut best_hits = 0usize;
    let mut best_line = 0usize;

    for (idx, line) in lines.iter().enumerate() {
        let lowered = line.as_ref().to_lowercase();
        let hits = needles
            .iter()
            .filter(|needle| lowered.contains(needle.as_str()))
            .count();
        if hits == 0 {
            continue;
        }
        score = score.saturating_add(u32::try_from(hits).unwrap_or(u32::MAX));
        if hits > best_hits {
            best_hits = hits;
            best_line = idx + 1;
        }
    }

    (score > 0 && best_line > 0).then_some(FileScore { score, best_line })
}

/// Render lines `best_line ± context_lines`, each prefixed with its 1-based
/// line number padded to width 5 and `" | "`.
#[must_use]
pub fn render_excerpt<S: AsRef<str>>(lines: &[S], best_line: usize, context_lines: usize) -> String {
    if lines.is_empty() || best_line == 0 {
        return String::new();
    }
    let center = (best_line - 1).min(lines.len() - 1);
    let start = center.saturating_sub(context_lines);
    let end = center.saturating_add(context_lines).min(lines.len() - 1);

    lines[start..=end]
        .iter()
        .enumerate()
        .map(|(offset, line)| format!("{:>5} | {}", start + offset + 1, line.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}
