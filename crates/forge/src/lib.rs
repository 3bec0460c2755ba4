//! Text Forge Library
//!
//! Turns an MkDocs book (an `mkdocs.yml` plus Markdown chapters) into a single
//! Markdown document and prepares it for EPUB conversion with pandoc.
//!
//! The pipeline is `nav` → `chapter` → `combine` → `normalize`; `epub_meta`
//! fills the metadata template used alongside the normalized document.

pub mod chapter;
pub mod cli;
pub mod combine;
pub mod config;
pub mod document;
pub mod epub_meta;
pub mod errors;
pub mod history;
pub mod nav;
pub mod normalize;
pub mod output;

// Re-export commonly used types
pub use chapter::{Chapter, ChapterTransformer, TransformedChapter};
pub use combine::{CombinedChapter, CombinedDocument, Combiner};
pub use config::{BookConfig, ForgeOptions};
pub use epub_meta::EpubMetadata;
pub use errors::{ActionableError, ForgeError, Warning};
pub use history::{FileDates, GitHistory, HistoryLookup, NoHistory};
pub use nav::{NavNode, NavigationEntry};
pub use normalize::{BlockNormalizer, Normalized};
pub use output::{ExitCode, JsonError, JsonOutput};
