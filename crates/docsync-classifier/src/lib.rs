pub mod classifier;
pub mod docs;
pub mod language;

pub use classifier::{ChangeClassifier, Classification, Verdict};
pub use docs::{is_readme, DocumentationDetector};
pub use language::{DocStyle, LanguageConfig, LanguageRegistry};
