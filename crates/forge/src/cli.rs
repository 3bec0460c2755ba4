//! Command-line interface definitions using clap.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Text Forge
///
/// Combines the chapters of an MkDocs book into one Markdown document and
/// prepares it for conversion to EPUB with pandoc.
///
/// Exit Codes:
///   0  - Command succeeded
///   1  - Generic error occurred
///   2  - Configuration missing or invalid
///   3  - Chapter file not found
///   4  - Validation failed (malformed document, duplicate anchor, template placeholders)
///  10  - File system error
#[derive(Parser)]
#[command(name = "text-forge", version)]
#[command(about = "Book pipeline for MkDocs chapters", long_about = None)]
pub struct Cli {
    /// Suppress non-essential output (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Combine all chapters listed in nav into one document
    Combine {
        /// Path to mkdocs.yml
        #[arg(short, long, default_value = "mkdocs.yml")]
        config: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not read chapter dates from git history
        #[arg(long)]
        no_git_dates: bool,

        /// Print a JSON report instead of human-readable messages
        #[arg(long, requires = "output")]
        json: bool,
    },

    /// Convert /// blocks into pandoc fenced divs
    Normalize {
        /// Combined Markdown document
        input: PathBuf,

        /// mkdocs.yml providing block captions and caption class
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, requires = "output")]
        json: bool,
    },

    /// Fill EPUB metadata placeholders in a template
    Meta {
        #[arg(short, long, default_value = "mkdocs.yml")]
        config: PathBuf,

        /// Metadata template with [title], [author], ... placeholders
        #[arg(short, long)]
        template: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Edition line (default: git tag and last commit date)
        #[arg(long)]
        edition: Option<String>,

        /// Publication date, YYYY-MM-DD (default: last commit date)
        #[arg(long)]
        date: Option<String>,
    },

    /// Write every input the EPUB renderer needs into a build directory
    ///
    /// Produces text_combined.txt, pandoc.md and, with --template, book_meta.yml.
    Prepare {
        #[arg(short, long, default_value = "mkdocs.yml")]
        config: PathBuf,

        #[arg(long, default_value = "build")]
        build_dir: PathBuf,

        /// Metadata template for book_meta.yml
        #[arg(short, long)]
        template: Option<PathBuf>,

        #[arg(long)]
        no_git_dates: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Info,
}

impl Commands {
    /// Name used in JSON output metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Combine { .. } => "combine",
            Commands::Normalize { .. } => "normalize",
            Commands::Meta { .. } => "meta",
            Commands::Prepare { .. } => "prepare",
            Commands::Info => "info",
        }
    }

    pub fn json(&self) -> bool {
        match self {
            Commands::Combine { json, .. }
            | Commands::Normalize { json, .. }
            | Commands::Prepare { json, .. } => *json,
            Commands::Meta { .. } | Commands::Info => false,
        }
    }
}
