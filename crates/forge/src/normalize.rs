//! Conversion of `///` named blocks into pandoc fenced divs.
//!
//! ```text
//! /// situation | Caption          ::: situation
//! Body                       =>    ###### Caption {.block-caption}
//! ///                              Body
//!                                  :::
//! ```
//!
//! Outer divs get one extra colon per level of nesting below them so pandoc
//! can match the fences. Image attribute lists are rewritten into the strict
//! `{key="value" .class #id}` form along the way. Text without `///` fences
//! only goes through the image rewrite, which makes normalization idempotent.

use crate::config::ForgeOptions;
use crate::document::blocks::{self, BlockError, NamedBlock, Segment};
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Block types with built-in handling; anything else is rendered generically.
const BUILTIN_BLOCKS: &[&str] = &[
    "admonition",
    "caption",
    "chapter-dates",
    "details",
    "html",
    "tab",
];

static IMAGE_ATTRS: OnceLock<Regex> = OnceLock::new();
static ATTR_TOKEN: OnceLock<Regex> = OnceLock::new();

fn image_attrs_regex() -> &'static Regex {
    IMAGE_ATTRS.get_or_init(|| {
        Regex::new(r"(!\[[^\]]*\]\([^)]*\))\{([^}]*)\}").expect("image attribute regex is valid")
    })
}

fn attr_token_regex() -> &'static Regex {
    ATTR_TOKEN.get_or_init(|| {
        Regex::new(r#"([A-Za-z_][\w\-:.]*)=("[^"]*"|'[^']*'|[^\s"']+)|([.#][\w\-:]+)"#)
            .expect("attribute token regex is valid")
    })
}

/// How a block type is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind<'a> {
    /// Configured in `block_captions`; the default caption applies.
    Captioned(&'a str),
    /// Handled by this tool or the Markdown extensions it mirrors.
    Builtin,
    /// Unknown type, passed through as a div with the type as class.
    Generic,
}

/// The normalized document and what was found on the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Normalized {
    pub text: String,
    /// Number of named blocks converted.
    pub blocks: usize,
    /// Block types that got generic handling.
    pub generic_types: BTreeSet<String>,
}

/// Rewrites named blocks and image attributes for pandoc.
#[derive(Debug, Clone)]
pub struct BlockNormalizer {
    captions: BTreeMap<String, String>,
    caption_class: String,
}

impl BlockNormalizer {
    pub fn new(captions: BTreeMap<String, String>, caption_class: impl Into<String>) -> Self {
        Self {
            captions,
            caption_class: caption_class.into(),
        }
    }

    pub fn from_options(options: &ForgeOptions) -> Self {
        Self::new(options.block_captions.clone(), options.caption_class.clone())
    }

    fn kind_of(&self, block_type: &str) -> BlockKind<'_> {
        if let Some(caption) = self.captions.get(block_type) {
            BlockKind::Captioned(caption)
        } else if BUILTIN_BLOCKS.contains(&block_type) {
            BlockKind::Builtin
        } else {
            BlockKind::Generic
        }
    }

    /// Normalize a whole document.
    pub fn normalize(&self, text: &str) -> Result<Normalized, BlockError> {
        let segments = blocks::parse(text)?;
        let mut writer = Writer {
            normalizer: self,
            out: String::with_capacity(text.len() + text.len() / 8),
            blank_pending: false,
            blocks: 0,
            generic_types: BTreeSet::new(),
        };
        writer.segments(&segments);

        debug!(
            "Normalized {} blocks ({} generic types)",
            writer.blocks,
            writer.generic_types.len()
        );
        Ok(Normalized {
            text: writer.out,
            blocks: writer.blocks,
            generic_types: writer.generic_types,
        })
    }
}

struct Writer<'n> {
    normalizer: &'n BlockNormalizer,
    out: String,
    /// A div just closed; the next non-blank line needs a blank line first.
    blank_pending: bool,
    blocks: usize,
    generic_types: BTreeSet<String>,
}

impl Writer<'_> {
    fn segments(&mut self, segments: &[Segment<'_>]) {
        for segment in segments {
            match segment {
                Segment::Text(line) => {
                    let line = sanitize_image_attributes(line);
                    self.push_line(&line);
                }
                Segment::Code(line) => self.push_line(line),
                Segment::Block(block) => self.block(block),
            }
        }
    }

    fn push_line(&mut self, line: &str) {
        if self.blank_pending {
            self.blank_pending = false;
            if !line.trim().is_empty() {
                self.out.push('\n');
            }
        }
        self.out.push_str(line);
    }

    fn block(&mut self, block: &NamedBlock<'_>) {
        self.blocks += 1;
        let normalizer = self.normalizer;
        let caption = match normalizer.kind_of(block.kind) {
            BlockKind::Captioned(default) => block.caption.or(Some(default)),
            BlockKind::Builtin => block.caption,
            BlockKind::Generic => {
                if self.generic_types.insert(block.kind.to_string()) {
                    warn!(
                        "Block type '{}' (line {}) has no special handling, emitting a plain div",
                        block.kind, block.line
                    );
                }
                block.caption
            }
        };

        let fence = ":".repeat(3 + block.nesting_height());

        self.blank_pending = false;
        self.ensure_blank_line();
        self.out.push_str(&format!("{} {}\n", fence, div_attributes(block)));
        if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
            self.out.push_str(&format!(
                "\n###### {} {{.{}}}\n\n",
                caption.trim(),
                normalizer.caption_class
            ));
        }

        self.segments(&block.children);

        self.blank_pending = false;
        if !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out.push_str(&fence);
        self.out.push('\n');
        self.blank_pending = true;
    }

    fn ensure_blank_line(&mut self) {
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        if self.out.ends_with('\n') {
            self.out.push('\n');
        } else {
            self.out.push_str("\n\n");
        }
    }
}

/// `type`, or `{.type key="value"}` when the block has options.
fn div_attributes(block: &NamedBlock<'_>) -> String {
    if block.options.is_empty() {
        return block.kind.to_string();
    }

    let mut attrs = vec![format!(".{}", block.kind)];
    for option in &block.options {
        if let Some((key, value)) = option.trim().split_once(':') {
            let value = value.trim().trim_matches('"').replace('"', "&quot;");
            attrs.push(format!("{}=\"{}\"", key.trim(), value));
        }
    }
    format!("{{{}}}", attrs.join(" "))
}

/// Rewrite lenient image attribute lists into pandoc's strict syntax.
///
/// `![a](x.png){: width=75% .wide }` becomes `![a](x.png){width="75%" .wide}`.
/// Only lists pandoc would reject are touched: a `{:` prefix, or an unquoted
/// value with characters pandoc does not take bare (such as `%`). Everything
/// else, including lists with no recognizable token, is copied unchanged.
pub fn sanitize_image_attributes(line: &str) -> String {
    image_attrs_regex()
        .replace_all(line, |caps: &Captures| {
            let image = &caps[1];
            let trimmed = caps[2].trim();
            let (lenient_prefix, raw) = match trimmed.strip_prefix(':') {
                Some(rest) => (true, rest),
                None => (false, trimmed),
            };

            let mut needs_rewrite = lenient_prefix;
            let tokens: Vec<String> = attr_token_regex()
                .captures_iter(raw)
                .filter_map(|token| match (token.get(1), token.get(2), token.get(3)) {
                    (Some(key), Some(value), _) => {
                        let value = value.as_str();
                        let quoted = value.starts_with(['"', '\''])
                            && value.len() >= 2
                            && value.ends_with(&value[..1]);
                        if quoted || is_bare_value(value) {
                            Some(format!("{}={}", key.as_str(), value))
                        } else {
                            needs_rewrite = true;
                            Some(format!("{}=\"{}\"", key.as_str(), value))
                        }
                    }
                    (_, _, Some(shorthand)) => Some(shorthand.as_str().to_string()),
                    _ => None,
                })
                .collect();

            if tokens.is_empty() || !needs_rewrite {
                caps[0].to_string()
            } else {
                format!("{}{{{}}}", image, tokens.join(" "))
            }
        })
        .into_owned()
}

/// Characters pandoc accepts in an unquoted attribute value.
fn is_bare_value(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/'))
}
