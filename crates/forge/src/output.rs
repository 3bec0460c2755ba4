//! Output handling for CLI commands.
//!
//! Human-readable messages, the JSON envelope used with `--json`, exit codes,
//! and atomic writing of generated documents.

use chrono::Utc;
use serde::{Serialize, Serializer};
use std::fmt::Display;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::errors::ForgeError;

/// Version of the JSON output format
const OUTPUT_VERSION: &str = "0.1.0";

// ============================================================================
// Output Context
// ============================================================================

/// Context for controlling output verbosity
pub struct OutputContext {
    quiet: bool,
    json: bool,
}

impl OutputContext {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    /// Print essential output (always shown unless --json)
    pub fn print_data(&self, msg: impl Display) -> io::Result<()> {
        if !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print informational message (suppressed by --quiet or --json)
    pub fn print_info(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe_stderr(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print warning (suppressed by --quiet or --json)
    pub fn print_warning(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe_stderr(&format!("Warning: {}", msg))
        } else {
            Ok(())
        }
    }

    /// Print a JSON document on stdout (only with --json)
    pub fn print_json<T: Serialize>(&self, output: &JsonOutput<T>) -> io::Result<()> {
        if self.json {
            let text = output.to_json_string().map_err(io::Error::other)?;
            writeln_safe(&text)
        } else {
            Ok(())
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Safe println that handles broken pipes gracefully
fn writeln_safe(msg: &str) -> io::Result<()> {
    match writeln!(io::stdout(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            // Silently exit on broken pipe (expected when piping to head, etc.)
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

/// Safe eprintln that handles broken pipes gracefully
fn writeln_safe_stderr(msg: &str) -> io::Result<()> {
    match writeln!(io::stderr(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// Document Sinks
// ============================================================================

/// Write `contents` to `path` all at once: a temp file in the same directory
/// is renamed over the target, so a failed run never leaves a partial file.
pub fn write_atomic(path: &Path, contents: &str) -> Result<(), ForgeError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| ForgeError::io(dir, e))?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| ForgeError::io(dir, e))?;
    temp.write_all(contents.as_bytes())
        .and_then(|_| temp.flush())
        .map_err(|e| ForgeError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| ForgeError::io(path, e.error))?;
    Ok(())
}

/// Write a whole document to stdout.
pub fn write_stdout(contents: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    match stdout.write_all(contents.as_bytes()).and_then(|_| stdout.flush()) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => std::process::exit(0),
        Err(e) => Err(e),
    }
}

// ============================================================================
// JSON Output Types
// ============================================================================

/// Wrapper for successful command output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: Metadata,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(data: T, command: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            metadata: Metadata::new(command),
        }
    }

    /// Serialize to JSON string with pretty formatting
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Wrapper for error output with suggestions
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub success: bool,
    pub error: ErrorDetail,
    pub metadata: Metadata,
}

impl JsonError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                suggestions: Vec::new(),
            },
            metadata: Metadata::new(command),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.suggestions.push(suggestion.into());
        self
    }

    /// Build the JSON error for a pipeline failure.
    pub fn from_forge_error(error: &ForgeError, command: impl Into<String>) -> Self {
        let suggestion = match error {
            ForgeError::Configuration { .. } => "Check docs_dir, nav and site_url in the config",
            ForgeError::MissingFile { .. } => "Fix the nav entry or restore the chapter file",
            ForgeError::MalformedDocument { .. } => "Close the front-matter or /// block",
            ForgeError::DuplicateAnchor { .. } => "Rename one of the colliding chapters",
            ForgeError::Template { .. } => "Remove unknown placeholders from the template",
            ForgeError::Io { .. } => "Check file permissions and paths",
        };
        Self::new(ErrorCode::for_error(error), error.to_string(), command)
            .with_suggestion(suggestion)
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn exit_code(&self) -> ExitCode {
        ErrorCode::to_exit_code(&self.error.code)
    }
}

/// Error details including code, message, and suggestions
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code (e.g., "MISSING_FILE", "DUPLICATE_ANCHOR")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Metadata included in all responses
#[derive(Debug, Serialize)]
pub struct Metadata {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: chrono::DateTime<Utc>,
    /// Version of the output format
    pub version: String,
    /// Command that generated this response
    pub command: String,
}

impl Metadata {
    fn new(command: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            version: OUTPUT_VERSION.to_string(),
            command: command.into(),
        }
    }
}

/// Serialize timestamp in ISO 8601 format
fn serialize_timestamp<S>(dt: &chrono::DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes of the `text-forge` binary
///
/// # Examples
///
/// ```rust
/// use text_forge::ExitCode;
///
/// assert_eq!(ExitCode::NotFound.code(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded (0)
    Success = 0,

    /// Generic error (1)
    GenericError = 1,

    /// Configuration missing or invalid (2)
    Configuration = 2,

    /// A chapter referenced by nav does not exist (3)
    NotFound = 3,

    /// Document failed validation - malformed block, duplicate anchor, template (4)
    ValidationFailed = 4,

    /// File system failure (10)
    ExternalError = 10,
}

impl ExitCode {
    /// Convert exit code to i32 for `std::process::exit`
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Command succeeded",
            ExitCode::GenericError => "Generic error occurred",
            ExitCode::Configuration => "Configuration missing or invalid",
            ExitCode::NotFound => "Chapter file not found",
            ExitCode::ValidationFailed => {
                "Validation failed (malformed document, duplicate anchor, template placeholders)"
            }
            ExitCode::ExternalError => "File system error",
        }
    }

    /// Exit codes as a formatted string for `--help`
    pub fn all_codes_documentation() -> String {
        [
            ExitCode::Success,
            ExitCode::GenericError,
            ExitCode::Configuration,
            ExitCode::NotFound,
            ExitCode::ValidationFailed,
            ExitCode::ExternalError,
        ]
        .iter()
        .fold(String::from("Exit Codes:"), |mut doc, code| {
            doc.push_str(&format!("\n  {:<2} - {}", code.code(), code.description()));
            doc
        })
    }
}

impl From<&ForgeError> for ExitCode {
    fn from(error: &ForgeError) -> Self {
        ErrorCode::to_exit_code(ErrorCode::for_error(error))
    }
}

// ============================================================================
// Error Codes (String constants for JSON responses)
// ============================================================================

/// Standard error codes (JSON format)
pub struct ErrorCode;

impl ErrorCode {
    pub const CONFIGURATION: &'static str = "CONFIGURATION";
    pub const MISSING_FILE: &'static str = "MISSING_FILE";
    pub const MALFORMED_DOCUMENT: &'static str = "MALFORMED_DOCUMENT";
    pub const DUPLICATE_ANCHOR: &'static str = "DUPLICATE_ANCHOR";
    pub const TEMPLATE: &'static str = "TEMPLATE";
    pub const IO_ERROR: &'static str = "IO_ERROR";

    pub fn for_error(error: &ForgeError) -> &'static str {
        match error {
            ForgeError::Configuration { .. } => Self::CONFIGURATION,
            ForgeError::MissingFile { .. } => Self::MISSING_FILE,
            ForgeError::MalformedDocument { .. } => Self::MALFORMED_DOCUMENT,
            ForgeError::DuplicateAnchor { .. } => Self::DUPLICATE_ANCHOR,
            ForgeError::Template { .. } => Self::TEMPLATE,
            ForgeError::Io { .. } => Self::IO_ERROR,
        }
    }

    /// Map error code string to exit code
    pub fn to_exit_code(code: &str) -> ExitCode {
        match code {
            Self::CONFIGURATION => ExitCode::Configuration,
            Self::MISSING_FILE => ExitCode::NotFound,
            Self::MALFORMED_DOCUMENT | Self::DUPLICATE_ANCHOR | Self::TEMPLATE => {
                ExitCode::ValidationFailed
            }
            Self::IO_ERROR => ExitCode::ExternalError,
            _ => ExitCode::GenericError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_json_output_success() {
        let data = json!({"chapters": 3});
        let output = JsonOutput::success(data, "combine");

        assert!(output.success);
        assert_eq!(output.data["chapters"], 3);
        assert_eq!(output.metadata.version, "0.1.0");
        assert_eq!(output.metadata.command, "combine");
    }

    #[test]
    fn test_json_output_serialization() {
        let output = JsonOutput::success(json!({"id": "123"}), "combine");
        let json_str = output.to_json_string().unwrap();

        assert!(json_str.contains("\"success\": true"));
        assert!(json_str.contains("\"timestamp\":"));
        assert!(json_str.contains("\"command\": \"combine\""));
    }

    #[test]
    fn test_json_error_from_forge_error() {
        let err = ForgeError::MissingFile {
            path: PathBuf::from("docs/ghost.md"),
            title: "Ghost".to_string(),
        };
        let error = JsonError::from_forge_error(&err, "combine");

        assert!(!error.success);
        assert_eq!(error.error.code, "MISSING_FILE");
        assert_eq!(error.exit_code(), ExitCode::NotFound);
        assert_eq!(error.error.suggestions.len(), 1);
    }

    #[test]
    fn test_exit_code_mapping() {
        let dup = ForgeError::DuplicateAnchor {
            anchor: "a-b-md".to_string(),
            first: PathBuf::from("a/b.md"),
            second: PathBuf::from("a-b.md"),
        };
        assert_eq!(ExitCode::from(&dup).code(), 4);

        let config = ForgeError::configuration(Path::new("mkdocs.yml"), "missing nav");
        assert_eq!(ExitCode::from(&config).code(), 2);

        let io = ForgeError::io(Path::new("x"), io::Error::other("boom"));
        assert_eq!(ExitCode::from(&io).code(), 10);

        assert_eq!(ErrorCode::to_exit_code("SOMETHING_ELSE"), ExitCode::GenericError);
    }

    #[test]
    fn test_exit_code_documentation_lists_all_codes() {
        let doc = ExitCode::all_codes_documentation();
        assert!(doc.starts_with("Exit Codes:"));
        assert!(doc.contains("10 - File system error"));
    }

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out").join("book.md");

        write_atomic(&target, "first").unwrap();
        write_atomic(&target, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        let leftovers = std::fs::read_dir(target.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
