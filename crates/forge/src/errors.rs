//! Error taxonomy for the book pipeline and actionable rendering for the CLI.
//!
//! Fatal conditions are `ForgeError` values and abort the whole run. Non-fatal
//! conditions are `Warning` values collected next to a successful result.
//! `ActionableError` turns either into a message with possible causes and
//! remediation steps for the terminal.

use crate::document::BlockError;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fatal pipeline errors.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// A required configuration field is absent or has the wrong shape.
    #[error("configuration error in {}: {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },

    /// A navigation leaf references a file that does not exist.
    #[error("navigation entry '{title}' references missing file {}", path.display())]
    MissingFile { path: PathBuf, title: String },

    /// Unterminated front-matter or named block.
    #[error("malformed document {} (line {line}): {reason}", path.display())]
    MalformedDocument {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Two chapters derive the same anchor id.
    #[error(
        "duplicate anchor '{anchor}' derived from both {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateAnchor {
        anchor: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A metadata template still has placeholders after substitution.
    #[error("unreplaced placeholders in {}: {}", path.display(), placeholders.join(", "))]
    Template {
        path: PathBuf,
        placeholders: Vec<String>,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ForgeError {
    pub fn configuration(path: &Path, reason: impl Into<String>) -> Self {
        ForgeError::Configuration {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        ForgeError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// A block parse error in `path`, whose body starts `line_offset` lines in.
    pub fn malformed_block(path: &Path, line_offset: usize, error: &BlockError) -> Self {
        match error {
            BlockError::Unterminated { line, .. } => ForgeError::MalformedDocument {
                path: path.to_path_buf(),
                line: line + line_offset,
                reason: error.to_string(),
            },
        }
    }

    /// Build the terminal-facing explanation for this error.
    pub fn to_actionable(&self) -> ActionableError {
        match self {
            ForgeError::Configuration { path, .. } => ActionableError::new(self.to_string())
                .with_cause("A required field (docs_dir, nav, site_url) is missing")
                .with_cause("The nav tree contains an entry of an unsupported shape")
                .with_remedy(format!("Check {}", path.display())),
            ForgeError::MissingFile { path, title } => ActionableError::new(self.to_string())
                .with_cause("The chapter was renamed or deleted")
                .with_cause("The path in nav is not relative to docs_dir")
                .with_remedy(format!(
                    "Restore {} or fix the nav entry '{}'",
                    path.display(),
                    title
                )),
            ForgeError::MalformedDocument { path, line, .. } => {
                ActionableError::new(self.to_string())
                    .with_cause("A front-matter block or a /// block is never closed")
                    .with_remedy(format!(
                        "Add the closing fence after line {} in {}",
                        line,
                        path.display()
                    ))
            }
            ForgeError::DuplicateAnchor { first, second, .. } => {
                ActionableError::new(self.to_string())
                    .with_cause("Anchors replace path separators and dots with '-'")
                    .with_cause("The same file is listed twice in nav")
                    .with_remedy(format!(
                        "Rename either {} or {}",
                        first.display(),
                        second.display()
                    ))
            }
            ForgeError::Template { .. } => ActionableError::new(self.to_string())
                .with_cause("The template uses a placeholder this tool does not know")
                .with_remedy(concat!(
                    "Supported: [title] [subtitle] [author] [identifier] ",
                    "[publisher] [rights] [edition] [date]",
                )),
            ForgeError::Io { .. } => ActionableError::new(self.to_string())
                .with_cause("The file is missing or not readable")
                .with_remedy("Check file permissions and paths"),
        }
    }
}

/// Non-fatal conditions reported alongside a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// An internal link points at a chapter that is not part of the navigation.
    UnresolvedLink {
        chapter: PathBuf,
        line: usize,
        target: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedLink {
                chapter,
                line,
                target,
            } => write!(
                f,
                "{}:{}: link target '{}' is not a chapter in nav",
                chapter.display(),
                line,
                target
            ),
        }
    }
}

/// An error with diagnostic context and remediation steps.
#[derive(Debug, Clone)]
pub struct ActionableError {
    error: String,
    causes: Vec<String>,
    remediation: Vec<String>,
}

impl ActionableError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            causes: Vec::new(),
            remediation: Vec::new(),
        }
    }

    /// Add a possible cause (diagnostic hint).
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a remediation step.
    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remediation.push(remedy.into());
        self
    }

    pub fn to_error_message(&self) -> String {
        let mut msg = format!("Error: {}\n", self.error);

        if !self.causes.is_empty() {
            msg.push_str("\nPossible causes:\n");
            for cause in &self.causes {
                msg.push_str(&format!("  • {}\n", cause));
            }
        }

        if !self.remediation.is_empty() {
            msg.push_str("\nTo fix:\n");
            for remedy in &self.remediation {
                msg.push_str(&format!("  • {}\n", remedy));
            }
        }

        msg
    }
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error_message())
    }
}

impl std::error::Error for ActionableError {}
