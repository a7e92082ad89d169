use std::path::{Path, PathBuf};

use docsync_core::{DocSyncError, Result};
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use notify::RecursiveMode;
use tracing::warn;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Compile a glob where `*` and `?` never cross a path separator and `**`
/// spans any depth.
pub fn compile(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| DocSyncError::Pattern(format!("{}: {}", pattern, e)))
}

/// Build the ignore set. Invalid entries are logged and left out.
pub fn build_ignore_set<S: AsRef<str>>(patterns: &[S]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match GlobBuilder::new(pattern.as_ref())
            .literal_separator(true)
            .build()
        {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => warn!("Ignoring invalid ignore pattern {:?}: {}", pattern.as_ref(), e),
        }
    }
    builder.build().unwrap_or_else(|e| {
        warn!("Failed to build ignore set: {}", e);
        GlobSet::empty()
    })
}

/// Leading path segments that contain no glob syntax.
pub fn literal_prefix(pattern: &str) -> PathBuf {
    let mut prefix = PathBuf::new();
    for segment in pattern.split('/') {
        if segment.contains(GLOB_META) {
            break;
        }
        if segment.is_empty() {
            if prefix.as_os_str().is_empty() && pattern.starts_with('/') {
                prefix.push("/");
            }
            continue;
        }
        prefix.push(segment);
    }

    // A pattern without any glob syntax names a single file.
    if !pattern.contains(GLOB_META) {
        prefix.pop();
    }
    prefix
}

/// Directory a pattern's subscription should watch, and how deep.
pub fn watch_target(root: &Path, pattern: &str) -> (PathBuf, RecursiveMode) {
    let prefix = literal_prefix(pattern);
    let mut base = root.join(&prefix);

    // Watch the nearest existing ancestor so not-yet-created directories
    // still produce events once they appear.
    while !base.exists() {
        match base.parent() {
            Some(parent) => base = parent.to_path_buf(),
            None => break,
        }
    }

    let tail = pattern
        .strip_prefix(prefix.to_string_lossy().as_ref())
        .unwrap_or(pattern)
        .trim_start_matches('/');
    let mode = if tail.contains("**") || tail.contains('/') || base != root.join(&prefix) {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    (base, mode)
}
