use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What happened to a path, as seen by the filesystem watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Change,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "create",
            ChangeKind::Change => "change",
            ChangeKind::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Delivery tier. Declaration order is the delivery order: `High` sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Java,
    Cpp,
    CSharp,
    Ruby,
    Php,
    Swift,
    Kotlin,
    Markdown,
    ReStructuredText,
    AsciiDoc,
    PlainText,
    Json,
    Yaml,
    Toml,
    Other(String),
}

impl Language {
    /// Languages whose files are documentation by nature.
    pub fn is_documentation(&self) -> bool {
        matches!(
            self,
            Language::Markdown
                | Language::ReStructuredText
                | Language::AsciiDoc
                | Language::PlainText
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Ruby => "ruby",
            Language::Php => "php",
            Language::Swift => "swift",
            Language::Kotlin => "kotlin",
            Language::Markdown => "markdown",
            Language::ReStructuredText => "restructuredtext",
            Language::AsciiDoc => "asciidoc",
            Language::PlainText => "plaintext",
            Language::Json => "json",
            Language::Yaml => "yaml",
            Language::Toml => "toml",
            Language::Other(s) => s.as_str(),
        };
        write!(f, "{}", s)
    }
}

/// A single filesystem notification that survived the ignore filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
}

impl RawChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            observed_at: Utc::now(),
        }
    }
}

/// All events seen for one path during a debounce cycle, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEvents {
    pub path: PathBuf,
    pub events: Vec<RawChangeEvent>,
}

impl PathEvents {
    pub fn last(&self) -> Option<&RawChangeEvent> {
        self.events.last()
    }
}

/// Output of one debounce cycle. Paths are ordered by first arrival.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeGroups {
    pub groups: Vec<PathEvents>,
}

impl ChangeGroups {
    /// Groups a flat event buffer by path, keeping arrival order both across
    /// paths (first sighting) and within each path.
    pub fn from_events(events: impl IntoIterator<Item = RawChangeEvent>) -> Self {
        let mut groups: Vec<PathEvents> = Vec::new();
        for event in events {
            match groups.iter_mut().find(|g| g.path == event.path) {
                Some(group) => group.events.push(event),
                None => groups.push(PathEvents {
                    path: event.path.clone(),
                    events: vec![event],
                }),
            }
        }
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.groups.iter().map(|g| g.path.as_path())
    }
}

/// A change that passed classification and is ready for the sync queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub has_documentation: bool,
    pub priority: Priority,
}

impl ClassifiedChange {
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Delete,
            content: None,
            language: None,
            has_documentation: false,
            priority: Priority::Low,
        }
    }
}
