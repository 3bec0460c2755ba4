//! Named block parsing.
//!
//! Authors write blocks as
//!
//! ```text
//! /// situation | Optional caption
//!     option: value
//! Body text
//! ///
//! ```
//!
//! The parser is line-oriented: every line is text, code, or part of a block.
//! Blocks nest by opening with a longer fence (`////`) on the outside; a bare
//! fence closes the innermost open block only when its length matches. Fences
//! inside fenced code are plain code.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block '{kind}' opened on line {line} is never closed")]
    Unterminated { kind: String, line: usize },
}

/// One line of a document, or a whole block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// A Markdown line, line ending included.
    Text(&'a str),
    /// A line inside fenced code, fence lines included.
    Code(&'a str),
    Block(NamedBlock<'a>),
}

/// A `/// type | caption ... ///` region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlock<'a> {
    pub kind: &'a str,
    pub caption: Option<&'a str>,
    /// Number of slashes in the opening fence.
    pub fence_len: usize,
    /// 1-based line of the opening fence.
    pub line: usize,
    pub header: &'a str,
    /// Indented `key: value` lines directly after the header.
    pub options: Vec<&'a str>,
    pub children: Vec<Segment<'a>>,
    pub closer: &'a str,
}

impl NamedBlock<'_> {
    /// Depth of block nesting below this block (0 when it holds no blocks).
    pub fn nesting_height(&self) -> usize {
        self.children
            .iter()
            .filter_map(|segment| match segment {
                Segment::Block(block) => Some(block.nesting_height() + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fence<'a> {
    Open {
        len: usize,
        kind: &'a str,
        caption: Option<&'a str>,
    },
    Close {
        len: usize,
    },
}

/// Recognize a block fence line.
fn classify_fence(line: &str) -> Option<Fence<'_>> {
    let trimmed = line.trim();
    let len = trimmed.chars().take_while(|&c| c == '/').count();
    if len < 3 {
        return None;
    }

    let rest = &trimmed[len..];
    if rest.is_empty() {
        return Some(Fence::Close { len });
    }
    if !rest.starts_with([' ', '\t']) {
        return None;
    }

    let (kind, caption) = match rest.split_once('|') {
        Some((kind, caption)) => (kind.trim(), Some(caption.trim())),
        None => (rest.trim(), None),
    };

    let valid_kind = kind.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && kind
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid_kind {
        return None;
    }

    Some(Fence::Open {
        len,
        kind,
        caption: caption.filter(|c| !c.is_empty()),
    })
}

/// Opening marker of a fenced code block (backticks or tildes).
pub(crate) fn code_fence_marker(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for fence_char in ['`', '~'] {
        let len = trimmed.chars().take_while(|&c| c == fence_char).count();
        if len >= 3 {
            return Some(&trimmed[..len]);
        }
    }
    None
}

pub(crate) fn closes_code_fence(line: &str, marker: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with(marker) && trimmed.chars().all(|c| Some(c) == marker.chars().next())
}

fn is_option_line(line: &str) -> bool {
    (line.starts_with("    ") || line.starts_with('\t'))
        && line
            .trim()
            .split_once(':')
            .is_some_and(|(key, _)| !key.is_empty() && !key.contains(' '))
}

/// Parse a document into text, code and named blocks.
pub fn parse(text: &str) -> Result<Vec<Segment<'_>>, BlockError> {
    let mut root: Vec<Segment<'_>> = Vec::new();
    let mut open: Vec<NamedBlock<'_>> = Vec::new();
    let mut code_marker: Option<&str> = None;
    let mut collecting_options = false;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        if let Some(marker) = code_marker {
            if closes_code_fence(line, marker) {
                code_marker = None;
            }
            push(&mut root, &mut open, Segment::Code(line));
            continue;
        }

        if collecting_options {
            if let Some(block) = open.last_mut() {
                if is_option_line(line) {
                    block.options.push(line);
                    continue;
                }
            }
            collecting_options = false;
        }

        if let Some(marker) = code_fence_marker(line) {
            code_marker = Some(marker);
            push(&mut root, &mut open, Segment::Code(line));
            continue;
        }

        match classify_fence(line) {
            Some(Fence::Open { len, kind, caption }) => {
                open.push(NamedBlock {
                    kind,
                    caption,
                    fence_len: len,
                    line: index + 1,
                    header: line,
                    options: Vec::new(),
                    children: Vec::new(),
                    closer: "",
                });
                collecting_options = true;
            }
            Some(Fence::Close { len }) if open.last().is_some_and(|b| b.fence_len == len) => {
                if let Some(mut block) = open.pop() {
                    block.closer = line;
                    push(&mut root, &mut open, Segment::Block(block));
                }
            }
            _ => push(&mut root, &mut open, Segment::Text(line)),
        }
    }

    match open.pop() {
        Some(block) => Err(BlockError::Unterminated {
            kind: block.kind.to_string(),
            line: block.line,
        }),
        None => Ok(root),
    }
}

fn push<'a>(root: &mut Vec<Segment<'a>>, open: &mut [NamedBlock<'a>], segment: Segment<'a>) {
    match open.last_mut() {
        Some(block) => block.children.push(segment),
        None => root.push(segment),
    }
}

/// Write segments back out exactly as they were read.
pub fn write_source(segments: &[Segment<'_>], out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(line) | Segment::Code(line) => out.push_str(line),
            Segment::Block(block) => {
                out.push_str(block.header);
                for option in &block.options {
                    out.push_str(option);
                }
                write_source(&block.children, out);
                out.push_str(block.closer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks<'a>(segments: &'a [Segment<'a>]) -> Vec<&'a NamedBlock<'a>> {
        segments
            .iter()
            .filter_map(|s| match s {
                Segment::Block(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_classify_fence() {
        assert_eq!(
            classify_fence("/// situation | A caption\n"),
            Some(Fence::Open {
                len: 3,
                kind: "situation",
                caption: Some("A caption")
            })
        );
        assert_eq!(
            classify_fence("//// quote"),
            Some(Fence::Open {
                len: 4,
                kind: "quote",
                caption: None
            })
        );
        assert_eq!(classify_fence("///  \n"), Some(Fence::Close { len: 3 }));
        assert_eq!(classify_fence("// comment"), None);
        assert_eq!(classify_fence("///comment"), None);
        assert_eq!(classify_fence("/// !!!"), None);
    }

    #[test]
    fn test_parse_single_block() {
        let text = "Intro\n/// situation | Case\nBody line\n///\nOutro\n";
        let segments = parse(text).unwrap();

        assert_eq!(segments.len(), 3);
        let found = blocks(&segments);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, "situation");
        assert_eq!(found[0].caption, Some("Case"));
        assert_eq!(found[0].line, 2);
        assert_eq!(found[0].children, vec![Segment::Text("Body line\n")]);
    }

    #[test]
    fn test_parse_options() {
        let text = "/// details | More\n    open: True\n\nHidden\n///\n";
        let segments = parse(text).unwrap();
        let found = blocks(&segments);

        assert_eq!(found[0].options, vec!["    open: True\n"]);
        assert_eq!(found[0].children.len(), 2);
    }

    #[test]
    fn test_parse_nested_blocks() {
        let text = "//// situation\n/// quote\nInner\n///\n////\n";
        let segments = parse(text).unwrap();
        let outer = blocks(&segments)[0];

        assert_eq!(outer.kind, "situation");
        assert_eq!(outer.nesting_height(), 1);
        assert_eq!(blocks(&outer.children)[0].kind, "quote");
    }

    #[test]
    fn test_fences_in_code_are_ignored() {
        let text = "```\n/// situation\n```\n";
        let segments = parse(text).unwrap();

        assert!(blocks(&segments).is_empty());
        assert!(segments.iter().all(|s| matches!(s, Segment::Code(_))));
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse("Text\n/// quote\nNever closed\n").unwrap_err();
        assert_eq!(
            err,
            BlockError::Unterminated {
                kind: "quote".to_string(),
                line: 2
            }
        );
    }

    #[test]
    fn test_mismatched_closer_leaves_block_open() {
        assert!(parse("//// quote\nText\n///\n").is_err());
    }

    #[test]
    fn test_stray_closer_is_text() {
        let segments = parse("Text\n///\n").unwrap();
        assert_eq!(segments[1], Segment::Text("///\n"));
    }

    #[test]
    fn test_write_source_round_trips() {
        let text = "A\n/// details | x\n    open: True\nB\n```\n///\n```\n///\nC";
        let segments = parse(text).unwrap();
        let mut out = String::new();
        write_source(&segments, &mut out);
        assert_eq!(out, text);
    }
}
