//! Cross-chapter link rewriting
//!
//! Finds Markdown links that point at other chapter files and turns them into
//! in-document anchor links, so the combined book stays navigable.

use super::anchors::{anchor_id, split_eol};
use crate::nav::normalize_path;
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static SCHEME_PATTERN: OnceLock<Regex> = OnceLock::new();
static REFERENCE_DEFINITION: OnceLock<Regex> = OnceLock::new();

fn scheme_regex() -> &'static Regex {
    SCHEME_PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("scheme regex is valid")
    })
}

fn reference_definition_regex() -> &'static Regex {
    REFERENCE_DEFINITION.get_or_init(|| {
        // Footnote definitions (`[^1]: text`) are not link definitions
        Regex::new(r"^( {0,3}\[[^\]^][^\]]*\]:[ \t]*)(<[^>]*>|\S+)(.*)$")
            .expect("reference definition regex is valid")
    })
}

/// How a link target was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    /// Relative to the linking chapter (`other.md`, `../part/x.md`)
    Relative,
    /// Relative to `docs_dir` (`/part/x.md`)
    RootRelative,
}

/// A link to another chapter found while rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkReference {
    /// 1-based line in the chapter source.
    pub line: usize,
    /// Destination as written.
    pub raw: String,
    /// Target chapter relative to `docs_dir`, normalized.
    pub target: PathBuf,
    pub fragment: Option<String>,
    pub link_type: LinkType,
}

impl LinkReference {
    /// Anchor the link points at in the combined document.
    ///
    /// An explicit fragment wins over the chapter anchor.
    pub fn anchor(&self) -> String {
        match &self.fragment {
            Some(fragment) => fragment.clone(),
            None => anchor_id(&self.target),
        }
    }
}

/// Rewrites chapter links found in the lines of one chapter.
pub struct LinkRewriter<'a> {
    chapter_path: &'a Path,
}

impl<'a> LinkRewriter<'a> {
    /// `chapter_path` is the linking chapter, relative to `docs_dir`.
    pub fn new(chapter_path: &'a Path) -> Self {
        Self { chapter_path }
    }

    /// Resolve a link destination to a chapter reference.
    ///
    /// Returns `None` for external URLs, in-page anchors and anything that is
    /// not a Markdown file.
    pub fn resolve(&self, destination: &str, line: usize) -> Option<LinkReference> {
        let destination = destination.trim();
        if destination.is_empty()
            || destination.starts_with('#')
            || destination.starts_with("//")
            || scheme_regex().is_match(destination)
        {
            return None;
        }

        let (path_part, fragment) = match destination.split_once('#') {
            Some((path, fragment)) => (path, Some(fragment)),
            None => (destination, None),
        };
        let path_part = path_part.split('?').next().unwrap_or(path_part);
        let path_part = percent_decode_str(path_part).decode_utf8_lossy();
        if !path_part.to_ascii_lowercase().ends_with(".md") {
            return None;
        }

        let (target, link_type) = match path_part.strip_prefix('/') {
            Some(root_relative) => (
                normalize_path(Path::new(root_relative)),
                LinkType::RootRelative,
            ),
            None => {
                let from_dir = self.chapter_path.parent().unwrap_or(Path::new(""));
                (normalize_path(&from_dir.join(path_part.as_ref())), LinkType::Relative)
            }
        };

        Some(LinkReference {
            line,
            raw: destination.to_string(),
            target,
            fragment: fragment
                .filter(|f| !f.is_empty())
                .map(|f| percent_decode_str(f).decode_utf8_lossy().into_owned()),
            link_type,
        })
    }

    /// Rewrite the chapter links on one Markdown line (line ending included).
    ///
    /// Images, code spans and non-chapter destinations are copied unchanged.
    /// Every rewritten link is pushed to `found`.
    pub fn rewrite_line(
        &self,
        line: &str,
        line_number: usize,
        found: &mut Vec<LinkReference>,
    ) -> String {
        let (content, eol) = split_eol(line);

        if let Some(caps) = reference_definition_regex().captures(content) {
            let prefix = caps.get(1).map_or("", |m| m.as_str());
            let destination = caps.get(2).map_or("", |m| m.as_str());
            let tail = caps.get(3).map_or("", |m| m.as_str());
            let url = destination
                .strip_prefix('<')
                .and_then(|d| d.strip_suffix('>'))
                .unwrap_or(destination);

            if let Some(link) = self.resolve(url, line_number) {
                let rewritten = format!("{}#{}{}{}", prefix, link.anchor(), tail, eol);
                found.push(link);
                return rewritten;
            }
            return line.to_string();
        }

        let mut out = String::with_capacity(line.len());
        let mut i = 0;
        while i < content.len() {
            let rest = &content[i..];

            if rest.starts_with('\\') {
                let end = next_char_boundary(content, i + 1);
                out.push_str(&content[i..end]);
                i = end;
                continue;
            }

            if rest.starts_with('`') {
                let end = consume_code_span(content, i);
                out.push_str(&content[i..end]);
                i = end;
                continue;
            }

            if rest.starts_with("![") {
                // Images keep their destination; copy the whole construct.
                let end = inline_link_at(content, i + 1).map_or(i + 2, |link| link.end);
                out.push_str(&content[i..end]);
                i = end;
                continue;
            }

            if rest.starts_with('[') {
                if let Some(link) = inline_link_at(content, i) {
                    out.push_str(&content[i..link.dest_start]);
                    let inner = &content[link.dest_start..link.dest_end];
                    out.push_str(&self.rewrite_destination(inner, line_number, found));
                    out.push(')');
                    i = link.end;
                    continue;
                }
            }

            let end = next_char_boundary(content, i);
            out.push_str(&content[i..end]);
            i = end;
        }

        out.push_str(eol);
        out
    }

    /// Rewrite the contents of `(...)`, keeping any title.
    fn rewrite_destination(
        &self,
        inner: &str,
        line_number: usize,
        found: &mut Vec<LinkReference>,
    ) -> String {
        let leading = &inner[..inner.len() - inner.trim_start().len()];
        let trimmed = inner.trim_start();

        let (url, tail) = match trimmed.strip_prefix('<') {
            Some(angled) => match angled.find('>') {
                Some(close) => (&angled[..close], &angled[close + 1..]),
                None => return inner.to_string(),
            },
            None => {
                let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
                (&trimmed[..end], &trimmed[end..])
            }
        };

        match self.resolve(url, line_number) {
            Some(link) => {
                let rewritten = format!("{}#{}{}", leading, link.anchor(), tail);
                found.push(link);
                rewritten
            }
            None => inner.to_string(),
        }
    }
}

/// Byte positions of an inline link `[text](destination)`.
struct InlineLink {
    dest_start: usize,
    dest_end: usize,
    /// One past the closing parenthesis.
    end: usize,
}

/// Parse an inline link whose `[` is at `open`.
fn inline_link_at(line: &str, open: usize) -> Option<InlineLink> {
    let bytes = line.as_bytes();
    if bytes.get(open) != Some(&b'[') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    let close_bracket = loop {
        match bytes.get(i)? {
            b'\\' => i += 1,
            b'`' => {
                i = consume_code_span(line, i);
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    break i;
                }
            }
            _ => {}
        }
        i += 1;
    };

    if bytes.get(close_bracket + 1) != Some(&b'(') {
        return None;
    }

    let dest_start = close_bracket + 2;
    let rest = line.get(dest_start..)?;
    let angle_start = dest_start + (rest.len() - rest.trim_start().len());
    let mut depth = 1usize;
    let mut in_angle = false;
    let mut i = dest_start;
    loop {
        match bytes.get(i)? {
            b'\\' => i += 1,
            b'<' if i == angle_start => in_angle = true,
            b'>' if in_angle => in_angle = false,
            b'(' if !in_angle => depth += 1,
            b')' if !in_angle => {
                depth -= 1;
                if depth == 0 {
                    return Some(InlineLink {
                        dest_start,
                        dest_end: i,
                        end: i + 1,
                    });
                }
            }
            _ => {}
        }
        i += 1;
    }
}

/// Skip a code span starting at `start`; an unmatched backtick run is literal.
fn consume_code_span(line: &str, start: usize) -> usize {
    let bytes = line.as_bytes();
    let run = bytes[start..].iter().take_while(|&&b| b == b'`').count();

    let mut i = start + run;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let closing = bytes[i..].iter().take_while(|&&b| b == b'`').count();
            if closing == run {
                return i + closing;
            }
            i += closing;
        } else {
            i += 1;
        }
    }
    start + run
}

fn next_char_boundary(s: &str, from: usize) -> usize {
    let mut end = (from + 1).min(s.len());
    while !s.is_char_boundary(end) {
        end += 1;
    }
    end
}
