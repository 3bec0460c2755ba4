//! Combining chapters into a single book document.
//!
//! The combiner resolves the navigation, transforms every chapter in reading
//! order and concatenates the results in memory. Anchors are checked for
//! collisions before each chapter is read, so a clash fails the run early.
//! Links to files outside the navigation only produce warnings.

use crate::chapter::{Chapter, ChapterTransformer};
use crate::config::BookConfig;
use crate::document::anchor_id;
use crate::errors::{ForgeError, Warning};
use crate::history::HistoryLookup;
use crate::nav::{self, NavigationEntry};
use crate::output::write_atomic;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A chapter as it appears in the combined document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombinedChapter {
    pub file_path: PathBuf,
    pub title: String,
    pub depth: usize,
    pub anchor_id: String,
}

/// The whole book as one Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedDocument {
    pub text: String,
    /// Chapters in reading order.
    pub chapters: Vec<CombinedChapter>,
    pub warnings: Vec<Warning>,
}

impl CombinedDocument {
    /// Write the document to `path`, replacing it atomically.
    pub fn write_to(&self, path: &Path) -> Result<(), ForgeError> {
        write_atomic(path, &self.text)
    }
}

/// Combines the chapters listed in a book's navigation.
pub struct Combiner<'a> {
    config: &'a BookConfig,
    history: &'a dyn HistoryLookup,
}

impl<'a> Combiner<'a> {
    pub fn new(config: &'a BookConfig, history: &'a dyn HistoryLookup) -> Self {
        Self { config, history }
    }

    /// Build the combined document.
    pub fn combine(&self) -> Result<CombinedDocument, ForgeError> {
        let entries = nav::resolve(self.config)?;
        let known: HashSet<&Path> = entries.iter().map(|e| e.file_path.as_path()).collect();
        let transformer = ChapterTransformer::new(self.config, self.history);

        let mut anchors: HashMap<String, PathBuf> = HashMap::with_capacity(entries.len());
        let mut sections = Vec::with_capacity(entries.len());
        let mut chapters = Vec::with_capacity(entries.len());
        let mut warnings = Vec::new();

        for entry in &entries {
            let anchor = claim_anchor(&mut anchors, entry)?;

            let chapter = Chapter::load(&self.config.docs_dir, entry)?;
            let transformed = transformer.transform(&chapter, entry.depth)?;

            for link in &transformed.links {
                if known.contains(link.target.as_path()) {
                    continue;
                }
                let warning = Warning::UnresolvedLink {
                    chapter: entry.file_path.clone(),
                    line: link.line,
                    target: link.raw.clone(),
                };
                debug!("{}", warning);
                warnings.push(warning);
            }

            let mut section = transformed.body;
            let trimmed_len = section.trim_end().len();
            section.truncate(trimmed_len);
            section.push('\n');
            sections.push(section);

            chapters.push(CombinedChapter {
                file_path: entry.file_path.clone(),
                title: entry.title.clone(),
                depth: entry.depth,
                anchor_id: anchor,
            });
            debug!("Added chapter {}", entry.file_path.display());
        }

        info!(
            "Combined {} chapters ({} warnings)",
            chapters.len(),
            warnings.len()
        );
        Ok(CombinedDocument {
            text: sections.join("\n"),
            chapters,
            warnings,
        })
    }
}

/// Register the anchor of `entry`, failing if another chapter already has it.
fn claim_anchor(
    anchors: &mut HashMap<String, PathBuf>,
    entry: &NavigationEntry,
) -> Result<String, ForgeError> {
    let anchor = anchor_id(&entry.file_path);
    match anchors.entry(anchor.clone()) {
        Entry::Occupied(existing) => Err(ForgeError::DuplicateAnchor {
            anchor,
            first: existing.get().clone(),
            second: entry.file_path.clone(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(entry.file_path.clone());
            Ok(anchor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::NoHistory;
    use std::fs;
    use tempfile::TempDir;

    fn book(nav: &str, files: &[(&str, &str)]) -> (TempDir, BookConfig) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join("docs").join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let yaml = format!(
            "site_url: https://example.com/\ndocs_dir: docs\nnav:\n{}",
            nav
        );
        let config_path = dir.path().join("mkdocs.yml");
        fs::write(&config_path, &yaml).unwrap();
        let config = BookConfig::load(&config_path).unwrap();
        (dir, config)
    }

    #[test]
    fn test_combine_in_nav_order() {
        let (_dir, config) = book(
            "  - index.md\n  - Part:\n      - part/one.md\n",
            &[("index.md", "# Home\n"), ("part/one.md", "# One\n\n\n")],
        );

        let doc = Combiner::new(&config, &NoHistory).combine().unwrap();
        assert_eq!(doc.text, "# Home {#index-md}\n\n## One {#part-one-md}\n");
        assert_eq!(doc.chapters[1].depth, 1);
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_anchor_names_both_paths() {
        let (_dir, config) = book(
            "  - a/b.md\n  - a-b.md\n",
            &[("a/b.md", "# B\n"), ("a-b.md", "# AB\n")],
        );

        match Combiner::new(&config, &NoHistory).combine() {
            Err(ForgeError::DuplicateAnchor {
                anchor,
                first,
                second,
            }) => {
                assert_eq!(anchor, "a-b-md");
                assert_eq!(first, PathBuf::from("a/b.md"));
                assert_eq!(second, PathBuf::from("a-b.md"));
            }
            other => panic!("expected duplicate anchor, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_link_is_a_warning() {
        let (_dir, config) = book(
            "  - a.md\n",
            &[("a.md", "# A\n\nSee [draft](draft.md).\n")],
        );

        let doc = Combiner::new(&config, &NoHistory).combine().unwrap();
        assert!(doc.text.contains("[draft](#draft-md)"));
        assert_eq!(
            doc.warnings,
            vec![Warning::UnresolvedLink {
                chapter: PathBuf::from("a.md"),
                line: 3,
                target: "draft.md".to_string(),
            }]
        );
    }
}
