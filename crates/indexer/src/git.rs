use std::path::Path;
use std::process::Command;

/// Whether `root` carries git metadata (a `.git` directory or worktree file).
pub(crate) fn has_git_metadata(root: &Path) -> bool {
    root.join(".git").exists()
}

/// Tracked plus untracked-but-not-ignored files, relative to `root`.
///
/// Returns `None` when git is unavailable or the listing cannot be decoded;
/// callers fall back to walking the directory.
pub(crate) fn list_files(root: &Path) -> Option<Vec<String>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(root)
        .args(["ls-files", "-z", "--cached", "--others", "--exclude-standard"])
        .output();
    let output = match output {
        Ok(output) => output,
        Err(err) => {
            log::debug!("git ls-files unavailable for {}: {err}", root.display());
            return None;
        }
    };
    if !output.status.success() {
        log::debug!(
            "git ls-files failed for {} ({}): {}",
            root.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }
    let Ok(stdout) = String::from_utf8(output.stdout) else {
        log::debug!("git ls-files output for {} is not UTF-8", root.display());
        return None;
    };
    Some(
        stdout
            .split('\0')
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
