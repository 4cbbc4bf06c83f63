use std::path::Path;

/// Directory names that are never searched, at any depth.
pub const EXCLUDED_DIRS: &[&str] = &[
    // VCS metadata
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    // dependencies / vendored code
    "node_modules",
    "bower_components",
    "vendor",
    "third_party",
    "third-party",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".yarn",
    ".npm",
    ".pnpm-store",
    // build / output
    "target",
    "build",
    "dist",
    "out",
    ".next",
    ".nuxt",
    ".turbo",
    ".output",
    ".gradle",
    ".cache",
    "coverage",
];

/// Extensions of binary media and build artifacts.
pub const EXCLUDED_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd", "icns",
    // audio / video
    "mp3", "mp4", "mov", "avi", "mkv", "wav", "flac", "ogg", "webm",
    // documents / archives
    "pdf", "zip", "gz", "tgz", "bz2", "xz", "7z", "rar", "tar", "jar", "war",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // compiled artifacts
    "exe", "dll", "so", "dylib", "a", "o", "obj", "class", "pyc", "wasm", "bin",
];

/// Whether a repository-relative path falls under an exclusion rule.
#[must_use]
pub fn is_excluded_path(rel_path: &str) -> bool {
    let normalized = rel_path.replace('\\', "/");
    let mut components = normalized.split('/').filter(|c| !c.is_empty()).peekable();
    while let Some(component) = components.next() {
        // The last component is the file name; only directories match scopes.
        if components.peek().is_none() {
            break;
        }
        let lowered = component.to_ascii_lowercase();
        if EXCLUDED_DIRS.iter().any(|dir| *dir == lowered) {
            return true;
        }
    }
    has_excluded_extension(Path::new(&normalized))
}

pub(crate) fn is_excluded_dir_name(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    EXCLUDED_DIRS.iter().any(|dir| *dir == lowered)
}

fn has_excluded_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            EXCLUDED_EXTENSIONS.iter().any(|candidate| *candidate == ext)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excludes_scoped_directories_at_any_depth() {
        assert!(is_excluded_path("node_modules/react/index.js"));
        assert!(is_excluded_path("web/node_modules/react/index.js"));
        assert!(is_excluded_path(".git/config"));
        assert!(is_excluded_path("crates/foo/target/debug/build.rs"));
        assert!(is_excluded_path("Vendor/lib.go"));
    }

    #[test]
    fn keeps_files_named_like_scopes() {
        assert!(!is_excluded_path("build"));
        assert!(!is_excluded_path("scripts/build"));
        assert!(!is_excluded_path("src/target.rs"));
    }

    #[test]
    fn excludes_binary_media_extensions() {
        assert!(is_excluded_path("docs/logo.PNG"));
        assert!(is_excluded_path("assets/font.woff2"));
        assert!(!is_excluded_path("docs/guide.md"));
        assert!(!is_excluded_path("Makefile"));
    }
}
