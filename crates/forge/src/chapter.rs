//! Chapter loading and transformation.
//!
//! A chapter goes through the following steps, in order:
//!
//! 1. front-matter is split off (`created`, `published`, `updated`)
//! 2. the anchor id is derived from the chapter path
//! 3. the anchor is attached to the first level-1 heading
//! 4. headings are demoted by the chapter's navigation depth
//! 5. links to other chapters become in-document anchor links
//! 6. `details` block bodies become a link to the page on the website
//! 7. a `chapter-dates` block is appended
//!
//! Steps 3-6 happen in a single pass over the parsed blocks.

use crate::config::BookConfig;
use crate::document::anchors::{anchor_id, demote, Heading};
use crate::document::blocks::{self, NamedBlock, Segment};
use crate::document::frontmatter::{self, FrontMatterError};
use crate::document::links::{LinkReference, LinkRewriter};
use crate::errors::ForgeError;
use crate::history::HistoryLookup;
use crate::nav::NavigationEntry;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Block type whose body is replaced with a website link.
pub const DETAILS_BLOCK: &str = "details";
/// Block type generated for chapter dates.
pub const DATES_BLOCK: &str = "chapter-dates";

/// A chapter file with its front-matter split off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Path relative to `docs_dir`.
    pub file_path: PathBuf,
    /// Content after the front-matter block.
    pub body: String,
    pub frontmatter: BTreeMap<String, String>,
    pub anchor_id: String,
    /// Number of source lines taken by the front-matter block.
    body_line_offset: usize,
}

impl Chapter {
    /// Split raw chapter text into front-matter and body.
    pub fn parse(file_path: &Path, raw: &str) -> Result<Self, ForgeError> {
        let extracted = frontmatter::extract(raw).map_err(|e| match e {
            FrontMatterError::Unterminated => ForgeError::MalformedDocument {
                path: file_path.to_path_buf(),
                line: 1,
                reason: e.to_string(),
            },
        })?;

        let header = &raw[..raw.len() - extracted.body.len()];
        Ok(Self {
            file_path: file_path.to_path_buf(),
            body: extracted.body.to_string(),
            frontmatter: extracted.fields,
            anchor_id: anchor_id(file_path),
            body_line_offset: header.matches('\n').count(),
        })
    }

    /// Read and parse the chapter a navigation entry points at.
    pub fn load(docs_dir: &Path, entry: &NavigationEntry) -> Result<Self, ForgeError> {
        let source = entry.source_path(docs_dir);
        let raw = std::fs::read_to_string(&source).map_err(|e| ForgeError::io(&source, e))?;
        Self::parse(&entry.file_path, &raw)
    }
}

/// Dates shown in a chapter's `chapter-dates` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterDates {
    pub created: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
}

impl ChapterDates {
    pub fn is_empty(&self) -> bool {
        self.created.is_none() && self.published.is_none() && self.updated.is_none()
    }
}

/// Result of transforming one chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedChapter {
    pub body: String,
    /// Chapter links that were rewritten, for validation by the caller.
    pub links: Vec<LinkReference>,
}

/// Turns chapters into sections of the combined document.
pub struct ChapterTransformer<'a> {
    config: &'a BookConfig,
    history: &'a dyn HistoryLookup,
}

impl<'a> ChapterTransformer<'a> {
    pub fn new(config: &'a BookConfig, history: &'a dyn HistoryLookup) -> Self {
        Self { config, history }
    }

    /// Transform a chapter nested `depth` groups deep in the navigation.
    pub fn transform(
        &self,
        chapter: &Chapter,
        depth: usize,
    ) -> Result<TransformedChapter, ForgeError> {
        let segments = blocks::parse(&chapter.body).map_err(|e| {
            ForgeError::malformed_block(&chapter.file_path, chapter.body_line_offset, &e)
        })?;

        let mut pass = Pass {
            chapter,
            depth,
            page_url: self.config.page_url(&chapter.file_path),
            details_link_text: &self.config.options.details_link_text,
            rewriter: LinkRewriter::new(&chapter.file_path),
            out: String::with_capacity(chapter.body.len() + 128),
            links: Vec::new(),
            line: chapter.body_line_offset + 1,
            anchor_placed: false,
            nearest_anchor: None,
            site_anchors: HashSet::new(),
        };
        pass.segments(&segments);

        let mut body = pass.out;
        if !pass.anchor_placed {
            body.insert_str(0, &format!("[]{{#{}}}\n\n", chapter.anchor_id));
        }

        let dates = self.dates(chapter);
        if !dates.is_empty() {
            if !body.is_empty() && !body.ends_with('\n') {
                body.push('\n');
            }
            body.push('\n');
            body.push_str(&self.render_dates(&dates));
        }

        debug!(
            "Transformed {} (depth {}, {} chapter links)",
            chapter.file_path.display(),
            depth,
            pass.links.len()
        );
        Ok(TransformedChapter {
            body,
            links: pass.links,
        })
    }

    /// Front-matter dates, with git history filling `created`/`updated`.
    pub fn dates(&self, chapter: &Chapter) -> ChapterDates {
        let field = |key: &str| {
            chapter
                .frontmatter
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut dates = ChapterDates {
            created: field("created"),
            published: field("published"),
            updated: field("updated"),
        };

        if self.config.options.git_dates && (dates.created.is_none() || dates.updated.is_none()) {
            let source = self.config.docs_dir.join(&chapter.file_path);
            if let Some(history) = self.history.dates(&source) {
                dates.created = dates.created.or(history.created);
                dates.updated = dates.updated.or(history.updated);
            }
        }

        dates
    }

    fn render_dates(&self, dates: &ChapterDates) -> String {
        let labels = &self.config.options.chapter_dates;
        let fields = [
            (&labels.created, &dates.created),
            (&labels.published, &dates.published),
            (&labels.updated, &dates.updated),
        ];

        let paragraphs: Vec<String> = fields
            .iter()
            .filter_map(|(label, value)| value.as_ref().map(|v| format!("{}: {}\n", label, v)))
            .collect();

        format!("/// {}\n{}///\n", DATES_BLOCK, paragraphs.join("\n"))
    }
}

/// State of one pass over a chapter's segments.
struct Pass<'c> {
    chapter: &'c Chapter,
    depth: usize,
    page_url: String,
    details_link_text: &'c str,
    rewriter: LinkRewriter<'c>,
    out: String,
    links: Vec<LinkReference>,
    /// 1-based source line of the next segment.
    line: usize,
    anchor_placed: bool,
    /// Website anchor of the last heading seen.
    nearest_anchor: Option<String>,
    site_anchors: HashSet<String>,
}

impl Pass<'_> {
    fn segments(&mut self, segments: &[Segment<'_>]) {
        let mut index = 0;
        while index < segments.len() {
            match &segments[index] {
                Segment::Code(line) => {
                    self.out.push_str(line);
                    self.line += 1;
                }
                Segment::Text(line) => {
                    if let Some(heading) = setext_at(segments, index) {
                        self.heading(&heading);
                        self.line += 2;
                        index += 2;
                        continue;
                    }
                    self.text_line(line);
                    self.line += 1;
                }
                Segment::Block(block) if block.kind == DETAILS_BLOCK => self.details(block),
                Segment::Block(block) => {
                    self.out.push_str(block.header);
                    for option in &block.options {
                        self.out.push_str(option);
                    }
                    self.line += 1 + block.options.len();
                    self.segments(&block.children);
                    self.out.push_str(block.closer);
                    self.line += 1;
                }
            }
            index += 1;
        }
    }

    fn text_line(&mut self, line: &str) {
        match Heading::parse(line) {
            Some(heading) => self.heading(&heading),
            None => self.push_rewritten(line),
        }
    }

    /// Emit a heading as ATX at its demoted level, anchoring the first H1.
    fn heading(&mut self, heading: &Heading<'_>) {
        let site_anchor = self.unique_site_anchor(heading);
        self.nearest_anchor = Some(site_anchor);
        let level = demote(heading.level, self.depth);

        let rendered = if heading.level == 1 && !self.anchor_placed {
            self.anchor_placed = true;
            if heading.explicit_id().is_some() {
                self.out
                    .push_str(&format!("[]{{#{}}}\n\n", self.chapter.anchor_id));
                heading.render(level, None)
            } else {
                heading.render(level, Some(&self.chapter.anchor_id))
            }
        } else {
            heading.render(level, None)
        };

        self.push_rewritten(&rendered);
    }

    fn push_rewritten(&mut self, line: &str) {
        let rewritten = self.rewriter.rewrite_line(line, self.line, &mut self.links);
        self.out.push_str(&rewritten);
    }

    /// Site anchor with the `_1`, `_2` suffixes the site adds to repeated slugs.
    fn unique_site_anchor(&mut self, heading: &Heading<'_>) -> String {
        if let Some(id) = heading.explicit_id() {
            self.site_anchors.insert(id.to_string());
            return id.to_string();
        }

        let base = heading.site_anchor();
        let mut candidate = base.clone();
        let mut suffix = 1;
        while !self.site_anchors.insert(candidate.clone()) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    /// Keep the header and options; the body becomes a single website link.
    fn details(&mut self, block: &NamedBlock<'_>) {
        self.out.push_str(block.header);
        for option in &block.options {
            self.out.push_str(option);
        }

        let anchor = self
            .nearest_anchor
            .clone()
            .unwrap_or_else(|| self.chapter.anchor_id.clone());
        self.out.push_str(&format!(
            "[{}]({}#{})\n",
            self.details_link_text, self.page_url, anchor
        ));
        self.out.push_str(block.closer);

        let mut skipped = String::new();
        blocks::write_source(&block.children, &mut skipped);
        self.line += 2 + block.options.len() + skipped.matches('\n').count();
    }
}

/// A setext heading starting at `segments[index]`, if one starts a paragraph there.
fn setext_at<'s>(segments: &[Segment<'s>], index: usize) -> Option<Heading<'s>> {
    let (Segment::Text(line), Some(Segment::Text(underline))) =
        (&segments[index], segments.get(index + 1))
    else {
        return None;
    };
    let starts_paragraph = match index.checked_sub(1).map(|i| &segments[i]) {
        Some(Segment::Text(previous)) => {
            previous.trim().is_empty() || Heading::parse(previous).is_some()
        }
        _ => true,
    };
    if !starts_paragraph {
        return None;
    }
    Heading::parse_setext(*line, *underline)
}
