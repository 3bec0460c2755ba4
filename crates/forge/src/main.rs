//! Text Forge
//!
//! Command-line driver for the book pipeline: combine chapters, normalize
//! blocks for pandoc, and fill EPUB metadata.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use text_forge::cli::{Cli, Commands};
use text_forge::combine::CombinedChapter;
use text_forge::epub_meta::{edition_from_git, edition_string, EpubMetadata};
use text_forge::output::{
    write_atomic, write_stdout, ExitCode, JsonError, JsonOutput, OutputContext,
};
use text_forge::{
    BlockNormalizer, BookConfig, CombinedDocument, Combiner, ForgeError, ForgeOptions, GitHistory,
    HistoryLookup, NoHistory, Normalized, Warning,
};
use tracing_subscriber::EnvFilter;

const COMBINED_FILE: &str = "text_combined.txt";
const PANDOC_FILE: &str = "pandoc.md";
const METADATA_FILE: &str = "book_meta.yml";

/// Helper to determine exit code from error
fn error_to_exit_code(error: &anyhow::Error) -> ExitCode {
    if let Some(forge_error) = error.downcast_ref::<ForgeError>() {
        return ExitCode::from(forge_error);
    }
    if error.downcast_ref::<std::io::Error>().is_some() {
        return ExitCode::ExternalError;
    }
    ExitCode::GenericError
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let command_name = cli.command.name();
    let json = cli.command.json();

    let exit_code = match run(cli) {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            report_error(&e, command_name, json);
            error_to_exit_code(&e)
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn report_error(error: &anyhow::Error, command: &str, json: bool) {
    let forge_error = error.downcast_ref::<ForgeError>();

    if json {
        let json_error = match forge_error {
            Some(e) => JsonError::from_forge_error(e, command),
            None => JsonError::new("ERROR", format!("{:#}", error), command),
        };
        if let Ok(text) = json_error.to_json_string() {
            println!("{}", text);
            return;
        }
    }

    match forge_error {
        Some(e) => eprint!("{}", e.to_actionable().to_error_message()),
        None => eprintln!("Error: {:#}", error),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Combine {
            config,
            output,
            no_git_dates,
            json,
        } => {
            let ctx = OutputContext::new(cli.quiet, json);
            let config = load_config(&config, no_git_dates)?;
            let history = history_for(&config);
            let doc = Combiner::new(&config, history.as_ref()).combine()?;

            match &output {
                Some(path) => {
                    doc.write_to(path)?;
                    ctx.print_info(format!(
                        "Combined {} chapters into {}",
                        doc.chapters.len(),
                        path.display()
                    ))?;
                }
                None => write_stdout(&doc.text)?,
            }
            print_warnings(&ctx, &doc.warnings)?;

            ctx.print_json(&JsonOutput::success(
                CombineReport {
                    output,
                    chapters: doc.chapters,
                    warnings: doc.warnings,
                },
                "combine",
            ))?;
        }

        Commands::Normalize {
            input,
            config,
            output,
            json,
        } => {
            let ctx = OutputContext::new(cli.quiet, json);
            let options = match &config {
                Some(path) => BookConfig::load(path)?.options,
                None => ForgeOptions::default(),
            };
            let text = std::fs::read_to_string(&input).map_err(|e| ForgeError::io(&input, e))?;
            let normalized = normalize(&options, &text, &input)?;

            match &output {
                Some(path) => {
                    write_atomic(path, &normalized.text)?;
                    ctx.print_info(format!(
                        "Normalized {} blocks into {}",
                        normalized.blocks,
                        path.display()
                    ))?;
                }
                None => write_stdout(&normalized.text)?,
            }
            print_generic_types(&ctx, &normalized)?;

            ctx.print_json(&JsonOutput::success(
                NormalizeReport {
                    output,
                    blocks: normalized.blocks,
                    generic_types: normalized.generic_types.into_iter().collect(),
                },
                "normalize",
            ))?;
        }

        Commands::Meta {
            config,
            template,
            output,
            edition,
            date,
        } => {
            let ctx = OutputContext::new(cli.quiet, false);
            let config = BookConfig::load(&config)?;
            let date = date
                .map(|d| {
                    NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                        .with_context(|| format!("Invalid --date '{}', expected YYYY-MM-DD", d))
                })
                .transpose()?;

            write_metadata(&config, &template, &output, edition, date)?;
            ctx.print_info(format!("EPUB metadata saved to {}", output.display()))?;
        }

        Commands::Prepare {
            config,
            build_dir,
            template,
            no_git_dates,
            json,
        } => {
            let ctx = OutputContext::new(cli.quiet, json);
            let config = load_config(&config, no_git_dates)?;
            let report = prepare(&config, &build_dir, template.as_deref(), &ctx)?;
            ctx.print_json(&JsonOutput::success(report, "prepare"))?;
        }

        Commands::Info => {
            let ctx = OutputContext::new(cli.quiet, false);
            ctx.print_data(format!("text-forge {}", env!("CARGO_PKG_VERSION")))?;
            ctx.print_data(ExitCode::all_codes_documentation())?;
        }
    }

    Ok(())
}

fn load_config(path: &Path, no_git_dates: bool) -> Result<BookConfig> {
    let mut config = BookConfig::load(path)?;
    if no_git_dates {
        config.options.git_dates = false;
    }
    Ok(config)
}

fn history_for(config: &BookConfig) -> Box<dyn HistoryLookup> {
    if !config.options.git_dates {
        return Box::new(NoHistory);
    }
    match GitHistory::discover(&config.docs_dir) {
        Some(git) => Box::new(git),
        None => Box::new(NoHistory),
    }
}

fn normalize(options: &ForgeOptions, text: &str, source: &Path) -> Result<Normalized> {
    BlockNormalizer::from_options(options)
        .normalize(text)
        .map_err(|e| ForgeError::malformed_block(source, 0, &e).into())
}

fn write_metadata(
    config: &BookConfig,
    template: &Path,
    output: &Path,
    edition: Option<String>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let template_text =
        std::fs::read_to_string(template).map_err(|e| ForgeError::io(template, e))?;

    let (tag, git_date) = edition_from_git(config);
    let date = date.unwrap_or(git_date);
    let edition =
        edition.unwrap_or_else(|| edition_string(&tag, date, config.language.as_deref()));

    let rendered =
        EpubMetadata::from_config(config, edition, date).render(&template_text, template)?;
    write_atomic(output, &rendered)?;
    Ok(())
}

fn prepare(
    config: &BookConfig,
    build_dir: &Path,
    template: Option<&Path>,
    ctx: &OutputContext,
) -> Result<PrepareReport> {
    let history = history_for(config);
    let CombinedDocument {
        text,
        chapters,
        warnings,
    } = Combiner::new(config, history.as_ref()).combine()?;

    let combined_path = build_dir.join(COMBINED_FILE);
    write_atomic(&combined_path, &text)?;
    ctx.print_info(format!(
        "Combined {} chapters into {}",
        chapters.len(),
        combined_path.display()
    ))?;
    print_warnings(ctx, &warnings)?;

    let normalized = normalize(&config.options, &text, &combined_path)?;
    let pandoc_path = build_dir.join(PANDOC_FILE);
    write_atomic(&pandoc_path, &normalized.text)?;
    ctx.print_info(format!(
        "Normalized {} blocks into {}",
        normalized.blocks,
        pandoc_path.display()
    ))?;
    print_generic_types(ctx, &normalized)?;

    let metadata = match template {
        Some(template) => {
            let path = build_dir.join(METADATA_FILE);
            write_metadata(config, template, &path, None, None)?;
            ctx.print_info(format!("EPUB metadata saved to {}", path.display()))?;
            Some(path)
        }
        None => None,
    };

    Ok(PrepareReport {
        combined: combined_path,
        pandoc: pandoc_path,
        metadata,
        chapters: chapters.len(),
        blocks: normalized.blocks,
        generic_types: normalized.generic_types.into_iter().collect(),
        warnings,
    })
}

fn print_warnings(ctx: &OutputContext, warnings: &[Warning]) -> Result<()> {
    for warning in warnings {
        ctx.print_warning(warning)?;
    }
    Ok(())
}

fn print_generic_types(ctx: &OutputContext, normalized: &Normalized) -> Result<()> {
    if !normalized.generic_types.is_empty() {
        let types: Vec<&str> = normalized.generic_types.iter().map(String::as_str).collect();
        ctx.print_info(format!("Generic block types: {}", types.join(", ")))?;
    }
    Ok(())
}

#[derive(Serialize)]
struct CombineReport {
    output: Option<PathBuf>,
    chapters: Vec<CombinedChapter>,
    warnings: Vec<Warning>,
}

#[derive(Serialize)]
struct NormalizeReport {
    output: Option<PathBuf>,
    blocks: usize,
    generic_types: Vec<String>,
}

#[derive(Serialize)]
struct PrepareReport {
    combined: PathBuf,
    pandoc: PathBuf,
    metadata: Option<PathBuf>,
    chapters: usize,
    blocks: usize,
    generic_types: Vec<String>,
    warnings: Vec<Warning>,
}
