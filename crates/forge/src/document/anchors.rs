//! Anchor derivation and ATX heading handling.

use pulldown_cmark::{Event, Parser};
use std::path::Path;

/// Deepest heading level Markdown can express.
pub const MAX_HEADING_LEVEL: usize = 6;

/// Derive the in-document anchor for a chapter from its path.
///
/// Path separators, dots and any other character that cannot appear in an
/// identifier become `-`, so `part/intro.md` yields `part-intro-md`. Distinct
/// paths can collide (`a/b.md` and `a-b.md`); callers must check uniqueness.
///
/// # Example
///
/// ```
/// use text_forge::document::anchor_id;
/// use std::path::Path;
///
/// assert_eq!(anchor_id(Path::new("chapter1.md")), "chapter1-md");
/// assert_eq!(anchor_id(Path::new("part/intro.md")), "part-intro-md");
/// ```
pub fn anchor_id(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Slug for heading text, keeping non-ASCII letters.
///
/// Lowercases, turns whitespace and `-`/`_` runs into a single `-` and drops
/// punctuation.
pub fn slugify(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_lowercase().collect::<String>())
            } else if c.is_whitespace() || c == '-' || c == '_' {
                Some("-".to_string())
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Plain text of an inline Markdown fragment (emphasis, links and code removed).
pub fn plain_text(inline: &str) -> String {
    let mut text = String::new();
    for event in Parser::new(inline) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            _ => {}
        }
    }
    text
}

/// An ATX heading line, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading<'a> {
    pub level: usize,
    indent: &'a str,
    /// Heading content without markers or attribute list.
    pub text: &'a str,
    /// Contents of a trailing `{...}` attribute list.
    pub attrs: Option<&'a str>,
    eol: &'a str,
}

impl<'a> Heading<'a> {
    /// Parse a single line (line ending included or not).
    pub fn parse(line: &'a str) -> Option<Self> {
        let (body, eol) = split_eol(line);

        let indent_len = body.len() - body.trim_start_matches(' ').len();
        if indent_len > 3 {
            return None;
        }
        let (indent, rest) = body.split_at(indent_len);

        let level = rest.chars().take_while(|&c| c == '#').count();
        if level == 0 || level > MAX_HEADING_LEVEL {
            return None;
        }
        let after = &rest[level..];
        if !after.is_empty() && !after.starts_with([' ', '\t']) {
            return None;
        }

        let (content, attrs) = split_attr_list(after.trim());

        Some(Self {
            level,
            indent,
            text: strip_closing_sequence(content),
            attrs,
            eol,
        })
    }

    /// Parse a setext heading: a text line followed by an `===` (level 1) or
    /// `---` (level 2) underline.
    ///
    /// Only single-line headings are recognized; the caller decides whether
    /// `line` starts a paragraph.
    pub fn parse_setext(line: &'a str, underline: &'a str) -> Option<Self> {
        let level = setext_level(underline)?;
        let (body, _) = split_eol(line);

        let indent_len = body.len() - body.trim_start_matches(' ').len();
        let content = body.trim();
        if indent_len > 3 || content.is_empty() || starts_other_block(content) {
            return None;
        }
        let (text, attrs) = split_attr_list(content);

        Some(Self {
            level,
            indent: "",
            text,
            attrs,
            eol: split_eol(underline).1,
        })
    }

    /// The `#id` from the attribute list, if any.
    pub fn explicit_id(&self) -> Option<&'a str> {
        self.attrs?
            .split_whitespace()
            .find_map(|token| token.strip_prefix('#'))
            .filter(|id| !id.is_empty())
    }

    /// Anchor the heading gets on the rendered site: explicit id, else a slug.
    pub fn site_anchor(&self) -> String {
        match self.explicit_id() {
            Some(id) => id.to_string(),
            None => slugify(&plain_text(self.text)),
        }
    }

    /// Render at `level`, optionally adding an `#id` to the attribute list.
    pub fn render(&self, level: usize, id: Option<&str>) -> String {
        let mut attrs: Vec<String> = Vec::new();
        if let Some(id) = id {
            attrs.push(format!("#{}", id));
        }
        if let Some(existing) = self.attrs {
            let existing = existing.trim_start_matches(':').trim();
            if !existing.is_empty() {
                attrs.push(existing.to_string());
            }
        }

        let mut out = format!("{}{}", self.indent, "#".repeat(level));
        if !self.text.is_empty() {
            out.push(' ');
            out.push_str(self.text);
        }
        if !attrs.is_empty() {
            out.push_str(&format!(" {{{}}}", attrs.join(" ")));
        }
        out.push_str(self.eol);
        out
    }
}

/// Split a line into content and its line ending.
pub(crate) fn split_eol(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

/// Split a trailing `{...}` attribute list off heading content.
fn split_attr_list(content: &str) -> (&str, Option<&str>) {
    let Some(open) = content.strip_suffix('}').and_then(|c| c.rfind('{')) else {
        return (content, None);
    };
    let inner = &content[open + 1..content.len() - 1];
    if looks_like_attr_list(inner) {
        (content[..open].trim_end(), Some(inner.trim()))
    } else {
        (content, None)
    }
}

/// Level of a setext underline line, if it is one.
fn setext_level(line: &str) -> Option<usize> {
    let (body, _) = split_eol(line);
    if body.len() - body.trim_start_matches(' ').len() > 3 {
        return None;
    }
    let marks = body.trim();
    if !marks.is_empty() && marks.chars().all(|c| c == '=') {
        Some(1)
    } else if !marks.is_empty() && marks.chars().all(|c| c == '-') {
        Some(2)
    } else {
        None
    }
}

/// Lines that open a construct other than a paragraph.
fn starts_other_block(content: &str) -> bool {
    if content.starts_with(['#', '>', '|', '<', '*', '+', '-', '=', '`', '~', ':', '/']) {
        return true;
    }
    let digits = content.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && content[digits..].starts_with(['.', ')'])
}

fn looks_like_attr_list(inner: &str) -> bool {
    let inner = inner.trim().trim_start_matches(':').trim();
    !inner.is_empty()
        && inner
            .split_whitespace()
            .all(|t| t.starts_with('#') || t.starts_with('.') || t.contains('='))
}

/// Drop an optional closing `###` sequence.
fn strip_closing_sequence(content: &str) -> &str {
    let trimmed = content.trim_end_matches('#');
    if trimmed.len() == content.len() {
        return content;
    }
    if trimmed.is_empty() {
        ""
    } else if trimmed.ends_with([' ', '\t']) {
        trimmed.trim_end()
    } else {
        content
    }
}

/// Shift a heading level by `depth`, clamped to the deepest level.
pub fn demote(level: usize, depth: usize) -> usize {
    (level + depth).min(MAX_HEADING_LEVEL)
}
