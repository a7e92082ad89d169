use std::path::{Component, Path, PathBuf};

use docsync_core::{
    ChangeGroups, ChangeKind, ClassifiedChange, ClassifierConfig, Priority,
};
use tokio::fs;
use tracing::{debug, warn};

use crate::docs::{is_readme, DocumentationDetector};
use crate::language::LanguageRegistry;

/// File names that always sync first (compared lowercase).
const IMPORTANT_FILES: &[&str] = &[
    "package.json",
    "cargo.toml",
    "pyproject.toml",
    "setup.py",
    "go.mod",
    "composer.json",
    "gemfile",
    "pom.xml",
    "build.gradle",
    "api.md",
    "docs.md",
    "changelog.md",
    "openapi.json",
    "openapi.yaml",
    "openapi.yml",
    "swagger.json",
    "swagger.yaml",
    "swagger.yml",
];

const API_DIRS: &[&str] = &[
    "api",
    "apis",
    "routes",
    "router",
    "routers",
    "controllers",
    "controller",
    "handlers",
    "endpoints",
];

const TEST_DIRS: &[&str] = &[
    "test",
    "tests",
    "spec",
    "specs",
    "__tests__",
    "__test__",
    "testing",
];

/// Outcome of classifying one path, before noise suppression and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Keep(ClassifiedChange),
    /// Low priority, undocumented edit.
    Suppressed,
    /// Content could not be read.
    Skipped,
}

/// Result of one classify cycle, with counts of what was left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Kept changes, ordered by priority then arrival.
    pub changes: Vec<ClassifiedChange>,
    pub suppressed: usize,
    /// Paths whose content could not be read.
    pub unreadable: usize,
}

/// Turns grouped raw events into a prioritized, filtered list of changes.
pub struct ChangeClassifier {
    registry: LanguageRegistry,
    config: ClassifierConfig,
    root: Option<PathBuf>,
}

impl ChangeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            registry: LanguageRegistry::new(),
            config,
            root: None,
        }
    }

    /// Directory checks (api/, tests/) are evaluated relative to `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Classify one debounce cycle. Never fails: unreadable paths are logged
    /// and left out.
    pub async fn classify(&self, batch: ChangeGroups) -> Vec<ClassifiedChange> {
        self.classify_counted(batch).await.changes
    }

    /// Like [`classify`](Self::classify), also counting suppressed and
    /// unreadable paths.
    pub async fn classify_counted(&self, batch: ChangeGroups) -> Classification {
        let mut result = Classification {
            changes: Vec::with_capacity(batch.len()),
            ..Default::default()
        };

        for group in batch.groups {
            let Some(last) = group.last() else {
                continue;
            };
            match self.classify_path(&group.path, last.kind).await {
                Verdict::Keep(change) => result.changes.push(change),
                Verdict::Suppressed => {
                    debug!("Suppressed trivial change to {:?}", group.path);
                    result.suppressed += 1;
                }
                Verdict::Skipped => result.unreadable += 1,
            }
        }

        // Stable: equal tiers keep arrival order.
        result.changes.sort_by_key(|change| change.priority);
        result
    }

    /// Classify the latest event kind observed for `path`.
    pub async fn classify_path(&self, path: &Path, kind: ChangeKind) -> Verdict {
        if kind == ChangeKind::Delete {
            return Verdict::Keep(ClassifiedChange::deleted(path));
        }

        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {:?}: failed to read content: {}", path, e);
                return Verdict::Skipped;
            }
        };

        let language = self.registry.detect_language(path);
        let has_documentation = DocumentationDetector::new(&self.registry).has_documentation(
            path,
            language.as_ref(),
            &content,
        );
        let line_count = content.lines().count();
        let priority = self.assign_priority(path, has_documentation, line_count);

        if priority == Priority::Low && !has_documentation && kind == ChangeKind::Change {
            return Verdict::Suppressed;
        }

        Verdict::Keep(ClassifiedChange {
            path: path.to_path_buf(),
            kind,
            content: Some(content),
            language,
            has_documentation,
            priority,
        })
    }

    /// Priority rules, first match wins.
    pub fn assign_priority(&self, path: &Path, has_documentation: bool, lines: usize) -> Priority {
        if is_important_file(path) {
            return Priority::High;
        }
        if has_documentation {
            return Priority::Medium;
        }

        let dirs = self.directory_names(path);
        if dirs.iter().any(|d| API_DIRS.contains(&d.as_str())) {
            return Priority::Medium;
        }
        if dirs.iter().any(|d| TEST_DIRS.contains(&d.as_str())) {
            return Priority::Low;
        }
        if lines > self.config.large_file_lines {
            return Priority::Low;
        }
        Priority::Low
    }

    fn directory_names(&self, path: &Path) -> Vec<String> {
        let relative = self
            .root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);

        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        parent
            .components()
            .filter_map(|c| match c {
                Component::Normal(name) => name.to_str().map(str::to_lowercase),
                _ => None,
            })
            .collect()
    }
}

impl Default for ChangeClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

fn is_important_file(path: &Path) -> bool {
    if is_readme(path) {
        return true;
    }
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| IMPORTANT_FILES.contains(&n.to_lowercase().as_str()))
        .unwrap_or(false)
}
