//! LinkForge CLI
//!
//! Stage-by-stage access to the investigation pipeline:
//! - `parse`: raw blob -> rows
//! - `normalize`: rows -> typed, canonicalized rows
//! - `resolve`: full resolution -> nodes, edges, merge log
//! - `analyze`: full pipeline -> analysis report (JSON or text)
//! - `export`: full pipeline -> graph export (JSON or entity/link CSVs)
//!
//! Each command reads stdin unless `--in` is given, and writes stdout unless
//! `--out` is given. Exit codes: 0 success, 2 parse error, 3 warnings under
//! `--strict`, 4 internal error.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

use linkforge_analytics::render_analysis_text;
use linkforge_graph::export::{export_entities_csv, export_json, export_links_csv};
use linkforge_graph::{map_roles, resolve};
use linkforge_ingest::{ingest, Format, IngestError, IngestOptions, Warning};
use linkforge_pipeline::{CancelToken, Pipeline, PipelineError, PipelineOptions, Stage};
use linkforge_schema::{detect_types, normalize, DetectOptions, RecognizerRegistry};

const EXIT_PARSE: u8 = 2;
const EXIT_STRICT: u8 = 3;
const EXIT_INTERNAL: u8 = 4;

#[derive(Parser)]
#[command(name = "linkforge")]
#[command(author, version, about = "Investigation data pipeline and graph analytics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IoArgs {
    /// Input file; stdin when omitted.
    #[arg(long = "in")]
    input: Option<PathBuf>,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Input format: csv|tsv|json. Sniffed when omitted.
    #[arg(long = "input-format")]
    format: Option<Format>,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse raw input into rows (headers, rows, warnings).
    Parse {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Parse, detect column types, and canonicalize values.
    Normalize {
        #[command(flatten)]
        io: IoArgs,
    },

    /// Run through entity resolution; output nodes, edges, and the merge log.
    Resolve {
        #[command(flatten)]
        io: IoArgs,

        /// Treat resolution warnings as errors (exit 3).
        #[arg(long)]
        strict: bool,
    },

    /// Run the full pipeline and output the analysis report.
    Analyze {
        #[command(flatten)]
        io: IoArgs,

        /// Report format: json|text.
        #[arg(long = "format", default_value = "json")]
        report: ReportFormat,

        /// Treat pipeline warnings as errors (exit 3).
        #[arg(long)]
        strict: bool,

        /// Print per-stage progress to stderr.
        #[arg(long)]
        progress: bool,
    },

    /// Run the full pipeline and export the resolved graph.
    Export {
        #[command(flatten)]
        io: IoArgs,

        /// Export format: json (single document) or csv (entity + link
        /// tables; requires `--out`, writes `<out>.entities.csv` and
        /// `<out>.links.csv`).
        #[arg(long = "format", default_value = "json")]
        export: ExportFormat,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ReportFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum ExportFormat {
    Json,
    Csv,
}

/// Raised under `--strict` when a run produced warnings.
#[derive(Debug, Error)]
#[error("{0} warning(s) treated as errors under --strict")]
struct StrictWarnings(usize);

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<IngestError>().is_some() {
        return EXIT_PARSE;
    }
    if let Some(p) = err.downcast_ref::<PipelineError>() {
        return match p {
            PipelineError::Ingest(_) => EXIT_PARSE,
            _ => EXIT_INTERNAL,
        };
    }
    if err.downcast_ref::<StrictWarnings>().is_some() {
        return EXIT_STRICT;
    }
    EXIT_INTERNAL
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Parse { io } => cmd_parse(&io),
        Commands::Normalize { io } => cmd_normalize(&io),
        Commands::Resolve { io, strict } => cmd_resolve(&io, strict),
        Commands::Analyze {
            io,
            report,
            strict,
            progress,
        } => cmd_analyze(&io, report, strict, progress),
        Commands::Export { io, export } => cmd_export(&io, export),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_parse(io: &IoArgs) -> Result<()> {
    let blob = read_input(io)?;
    let result = ingest(&blob, io.format, &IngestOptions::default())?;
    write_output(io, &serde_json::to_string_pretty(&result)?)?;
    report_warnings(&result.warnings);
    Ok(())
}

fn cmd_normalize(io: &IoArgs) -> Result<()> {
    let blob = read_input(io)?;
    let registry = RecognizerRegistry::with_defaults();
    let ingested = ingest(&blob, io.format, &IngestOptions::default())?;
    let profiles = detect_types(
        &ingested.rows,
        &ingested.headers,
        &registry,
        &DetectOptions::default(),
    );
    let normalized = normalize(&ingested.rows, &profiles, &registry);

    let warnings = [ingested.warnings.as_slice(), normalized.warnings.as_slice()].concat();
    let payload = serde_json::json!({
        "profiles": profiles,
        "rows": normalized.rows,
        "warnings": warnings,
    });
    write_output(io, &serde_json::to_string_pretty(&payload)?)?;
    Ok(())
}

fn cmd_resolve(io: &IoArgs, strict: bool) -> Result<()> {
    let blob = read_input(io)?;
    let registry = RecognizerRegistry::with_defaults();
    let ingested = ingest(&blob, io.format, &IngestOptions::default())?;
    let profiles = detect_types(
        &ingested.rows,
        &ingested.headers,
        &registry,
        &DetectOptions::default(),
    );
    let normalized = normalize(&ingested.rows, &profiles, &registry);
    let mapped = map_roles(&normalized.rows, &profiles, None);
    let resolved = resolve(mapped.nodes, mapped.edges, &Default::default());

    write_output(io, &serde_json::to_string_pretty(&resolved)?)?;
    report_warnings(&resolved.warnings);
    if strict && !resolved.warnings.is_empty() {
        return Err(StrictWarnings(resolved.warnings.len()).into());
    }
    Ok(())
}

fn cmd_analyze(io: &IoArgs, report: ReportFormat, strict: bool, progress: bool) -> Result<()> {
    let blob = read_input(io)?;
    let pipeline = Pipeline::new(PipelineOptions {
        format: io.format,
        ..Default::default()
    });

    if progress {
        for stage in Stage::ALL {
            pipeline.bus().subscribe(stage, move |ev| {
                eprintln!(
                    "  {} {} ({} ms, {} warning(s))",
                    "→".yellow(),
                    ev.stage,
                    ev.duration_ms,
                    ev.warnings.len()
                );
            });
        }
    }

    let outcome = pipeline.run(&blob, &CancelToken::new())?;
    let rendered = match report {
        ReportFormat::Json => serde_json::to_string_pretty(&outcome.report)?,
        ReportFormat::Text => render_analysis_text(&outcome.report),
    };
    write_output(io, &rendered)?;
    report_warnings(&outcome.warnings);
    if strict && !outcome.warnings.is_empty() {
        return Err(StrictWarnings(outcome.warnings.len()).into());
    }
    Ok(())
}

fn cmd_export(io: &IoArgs, export: ExportFormat) -> Result<()> {
    let blob = read_input(io)?;
    let pipeline = Pipeline::new(PipelineOptions {
        format: io.format,
        ..Default::default()
    });
    let outcome = pipeline.run(&blob, &CancelToken::new())?;

    match export {
        ExportFormat::Json => {
            write_output(io, &export_json(&outcome.graph)?)?;
        }
        ExportFormat::Csv => {
            let base = io
                .out
                .as_ref()
                .context("csv export requires --out <base path>")?;
            let entities = with_suffix(base, "entities.csv");
            let links = with_suffix(base, "links.csv");
            fs::write(&entities, export_entities_csv(&outcome.graph))
                .with_context(|| format!("writing {}", entities.display()))?;
            fs::write(&links, export_links_csv(&outcome.graph))
                .with_context(|| format!("writing {}", links.display()))?;
            eprintln!(
                "{} {} and {}",
                "wrote".green().bold(),
                entities.display(),
                links.display()
            );
        }
    }
    report_warnings(&outcome.warnings);
    Ok(())
}

// ============================================================================
// IO helpers
// ============================================================================

fn read_input(io: &IoArgs) -> Result<String> {
    match &io.input {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(io: &IoArgs, content: &str) -> Result<()> {
    match &io.out {
        Some(path) => {
            fs::write(path, content).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("{} {}", "wrote".green().bold(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            if !content.ends_with('\n') {
                stdout.write_all(b"\n")?;
            }
        }
    }
    Ok(())
}

fn report_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{} {warning}", "warning:".yellow().bold());
    }
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_by_error_kind() {
        let parse: anyhow::Error = IngestError::EmptyInput.into();
        assert_eq!(exit_code_for(&parse), EXIT_PARSE);

        let strict: anyhow::Error = StrictWarnings(2).into();
        assert_eq!(exit_code_for(&strict), EXIT_STRICT);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), EXIT_INTERNAL);
    }

    #[test]
    fn csv_suffix_appends_to_base() {
        let base = PathBuf::from("out/graph");
        assert_eq!(
            with_suffix(&base, "entities.csv"),
            PathBuf::from("out/graph.entities.csv")
        );
    }
}
