// ABOUTME: Maps file extensions to languages and the documentation styles each one uses.
// ABOUTME: Detection is extension based; documentation languages carry no comment styles.
use docsync_core::Language;
use std::collections::HashMap;
use std::path::Path;

/// Documentation comment conventions recognised by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocStyle {
    /// `/** ... */` (JSDoc, Javadoc, KDoc, PHPDoc, Doxygen)
    BlockComment,
    /// `///` or `//!` line docs
    LineDoc,
    /// `"""..."""` or `'''...'''`
    Docstring,
    /// `##` or `#:` doc lines
    HashDoc,
    /// `=begin` ... `=end`
    EmbeddedBlock,
}

pub struct LanguageConfig {
    pub file_extensions: Vec<&'static str>,
    pub doc_styles: Vec<DocStyle>,
}

pub struct LanguageRegistry {
    configs: HashMap<Language, LanguageConfig>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        use DocStyle::*;

        let mut configs = HashMap::new();
        let mut register = |language: Language, exts: Vec<&'static str>, styles: Vec<DocStyle>| {
            configs.insert(
                language,
                LanguageConfig {
                    file_extensions: exts,
                    doc_styles: styles,
                },
            );
        };

        register(Language::Rust, vec!["rs"], vec![LineDoc, BlockComment]);
        register(
            Language::TypeScript,
            vec!["ts", "tsx", "mts", "cts"],
            vec![BlockComment],
        );
        register(
            Language::JavaScript,
            vec!["js", "jsx", "mjs", "cjs"],
            vec![BlockComment],
        );
        register(Language::Python, vec!["py", "pyi"], vec![Docstring]);
        register(Language::Go, vec!["go"], vec![BlockComment]);
        register(Language::Java, vec!["java"], vec![BlockComment]);
        register(
            Language::Cpp,
            vec!["cpp", "cxx", "cc", "c", "hpp", "hxx", "h"],
            vec![BlockComment, LineDoc],
        );
        register(Language::CSharp, vec!["cs"], vec![LineDoc, BlockComment]);
        register(Language::Ruby, vec!["rb"], vec![HashDoc, EmbeddedBlock]);
        register(Language::Php, vec!["php"], vec![BlockComment]);
        register(Language::Swift, vec!["swift"], vec![LineDoc, BlockComment]);
        register(Language::Kotlin, vec!["kt", "kts"], vec![BlockComment]);
        register(Language::Markdown, vec!["md", "markdown", "mdx"], vec![]);
        register(Language::ReStructuredText, vec!["rst"], vec![]);
        register(Language::AsciiDoc, vec!["adoc", "asciidoc"], vec![]);
        register(Language::PlainText, vec!["txt"], vec![]);
        register(Language::Json, vec!["json"], vec![]);
        register(Language::Yaml, vec!["yaml", "yml"], vec![HashDoc]);
        register(Language::Toml, vec!["toml"], vec![HashDoc]);

        Self { configs }
    }

    pub fn detect_language(&self, path: &Path) -> Option<Language> {
        let extension = path.extension()?.to_str()?.to_lowercase();

        for (lang, config) in &self.configs {
            if config.file_extensions.contains(&extension.as_str()) {
                return Some(lang.clone());
            }
        }

        None
    }

    pub fn get_config(&self, language: &Language) -> Option<&LanguageConfig> {
        self.configs.get(language)
    }

    pub fn doc_styles(&self, language: &Language) -> &[DocStyle] {
        self.get_config(language)
            .map(|c| c.doc_styles.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
