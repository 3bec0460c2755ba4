//! Navigation tree parsing and resolution.
//!
//! The `nav` section of the configuration is a recursive tree of titled file
//! references. Resolution flattens it depth-first, pre-order, into the reading
//! order of the book, recording how deeply each chapter is nested.

use crate::config::BookConfig;
use crate::errors::ForgeError;
use serde::Serialize;
use serde_yaml::Value;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// One node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavNode {
    /// A chapter file, relative to `docs_dir`.
    Leaf { title: String, file: PathBuf },
    /// A titled group of nodes; produces no entry of its own.
    Group { title: String, children: Vec<NavNode> },
}

/// A chapter in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationEntry {
    /// Path relative to `docs_dir`, normalized.
    pub file_path: PathBuf,
    pub title: String,
    /// Number of groups enclosing this entry; root entries are 0.
    pub depth: usize,
}

impl NavigationEntry {
    /// Location of the chapter on disk.
    pub fn source_path(&self, docs_dir: &Path) -> PathBuf {
        docs_dir.join(&self.file_path)
    }
}

impl NavNode {
    /// Parse the YAML `nav` list.
    ///
    /// Accepted shapes: `file.md`, `{Title: file.md}` and `{Title: [children]}`.
    /// Leaves pointing at external URLs are dropped.
    pub fn parse_list(value: &Value) -> Result<Vec<NavNode>, String> {
        let items = value
            .as_sequence()
            .ok_or_else(|| format!("expected a list, found {}", describe(value)))?;

        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            if let Some(node) = Self::parse_item(item)? {
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    fn parse_item(item: &Value) -> Result<Option<NavNode>, String> {
        match item {
            Value::String(file) => Ok(leaf(None, file)),
            Value::Mapping(map) if map.len() == 1 => {
                let Some((key, value)) = map.iter().next() else {
                    return Ok(None);
                };
                let title = key
                    .as_str()
                    .ok_or_else(|| format!("nav title must be a string, found {}", describe(key)))?
                    .to_string();

                match value {
                    Value::String(file) => Ok(leaf(Some(title), file)),
                    Value::Sequence(_) => Ok(Some(NavNode::Group {
                        children: Self::parse_list(value)
                            .map_err(|e| format!("in '{}': {}", title, e))?,
                        title,
                    })),
                    other => Err(format!(
                        "entry '{}' must map to a file or a list, found {}",
                        title,
                        describe(other)
                    )),
                }
            }
            other => Err(format!(
                "unsupported nav entry: expected a file or a single-key mapping, found {}",
                describe(other)
            )),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            NavNode::Leaf { title, .. } | NavNode::Group { title, .. } => title,
        }
    }
}

fn leaf(title: Option<String>, file: &str) -> Option<NavNode> {
    if is_external(file) {
        debug!("Skipping external nav link {}", file);
        return None;
    }

    let file = normalize_path(Path::new(file.trim()));
    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    Some(NavNode::Leaf { title, file })
}

fn is_external(target: &str) -> bool {
    target.contains("://") || target.starts_with("mailto:")
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a list",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

/// Normalize a path by resolving `.` and `..` and dropping root prefixes.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(c) => components.push(c),
            Component::ParentDir => {
                components.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    components.iter().collect()
}

/// Flatten a navigation tree depth-first, pre-order.
///
/// Only leaves produce entries; each enclosing group adds one to the depth.
pub fn flatten(nodes: &[NavNode]) -> Vec<NavigationEntry> {
    let mut entries = Vec::new();
    let mut stack: Vec<(&NavNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();

    while let Some((node, depth)) = stack.pop() {
        match node {
            NavNode::Leaf { title, file } => entries.push(NavigationEntry {
                file_path: file.clone(),
                title: title.clone(),
                depth,
            }),
            NavNode::Group { children, .. } => {
                stack.extend(children.iter().rev().map(|child| (child, depth + 1)));
            }
        }
    }

    entries
}

/// Flatten the configured navigation and check every chapter exists.
///
/// A missing chapter aborts the run: a book with a hole in it is not publishable.
pub fn resolve(config: &BookConfig) -> Result<Vec<NavigationEntry>, ForgeError> {
    let entries = flatten(&config.nav);

    for entry in &entries {
        let source = entry.source_path(&config.docs_dir);
        if !source.is_file() {
            return Err(ForgeError::MissingFile {
                path: source,
                title: entry.title.clone(),
            });
        }
    }

    debug!(
        "Resolved {} chapters from {}",
        entries.len(),
        config.config_path.display()
    );
    Ok(entries)
}
