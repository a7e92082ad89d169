use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::language::{DocStyle, LanguageRegistry};
use docsync_core::Language;

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*\*[^/].*?\*/").expect("valid block doc pattern"));
static LINE_DOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*//[/!][^/]").expect("valid line doc pattern"));
static DOCSTRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[ \t]*(?:[rRuU]?"""|[rRuU]?''')"#).expect("valid docstring pattern")
});
static HASH_DOC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*#[#:][ \t]").expect("valid hash doc pattern"));
static EMBEDDED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?ms)^=begin\b.*?^=end\b").expect("valid embedded doc pattern"));

fn pattern_for(style: DocStyle) -> &'static Regex {
    match style {
        DocStyle::BlockComment => &BLOCK_COMMENT,
        DocStyle::LineDoc => &LINE_DOC,
        DocStyle::Docstring => &DOCSTRING,
        DocStyle::HashDoc => &HASH_DOC,
        DocStyle::EmbeddedBlock => &EMBEDDED_BLOCK,
    }
}

/// Files named `readme*` count as documentation whatever they contain.
pub fn is_readme(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_lowercase().starts_with("readme"))
        .unwrap_or(false)
}

/// Decides whether a file carries documentation.
pub struct DocumentationDetector<'a> {
    registry: &'a LanguageRegistry,
}

impl<'a> DocumentationDetector<'a> {
    pub fn new(registry: &'a LanguageRegistry) -> Self {
        Self { registry }
    }

    pub fn has_documentation(
        &self,
        path: &Path,
        language: Option<&Language>,
        content: &str,
    ) -> bool {
        if is_readme(path) {
            return true;
        }

        let Some(language) = language else {
            return false;
        };

        if language.is_documentation() {
            return true;
        }

        self.registry
            .doc_styles(language)
            .iter()
            .any(|style| pattern_for(*style).is_match(content))
    }
}
