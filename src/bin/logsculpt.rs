//! `logsculpt` CLI: `learn`, `parse`, and `drift` subcommands over the
//! `logsculpt` library.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use logsculpt::config::{build_options, load_config_file, CliOverrides};
use logsculpt::error::Result;
use logsculpt::outputs::{write_jsonl, write_sqlite};
use logsculpt::patterns::{learn_patterns, PatternSet};
use logsculpt::streaming::{parallel_learn, parse_logs};
use logsculpt::{detect_drift, LogSculptError};

#[derive(Parser)]
#[command(name = "logsculpt", about = "Learns and applies log line patterns")]
struct Cli {
    /// Optional TOML config file layered under CLI flags.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Learn a pattern set from a log file and write it as JSON.
    Learn {
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        sample_size: Option<usize>,
        #[arg(long)]
        parallel: bool,
        #[arg(long)]
        num_workers: Option<usize>,
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Read the file with buffered reads instead of mmap.
        #[arg(long)]
        no_mmap: bool,
    },
    /// Parse a log file with a previously learned pattern set.
    Parse {
        input: PathBuf,
        #[arg(long)]
        patterns: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long, value_enum, default_value = "jsonl")]
        format: OutputFormat,
        /// Skip primitive type detection; every field stays a raw string.
        #[arg(long)]
        no_detect_types: bool,
        /// Read the file with buffered reads instead of mmap.
        #[arg(long)]
        no_mmap: bool,
    },
    /// Detect format drift against a previously learned pattern set.
    Drift {
        input: PathBuf,
        #[arg(long)]
        patterns: PathBuf,
        #[arg(long)]
        window_size: Option<usize>,
        #[arg(long)]
        change_threshold: Option<f64>,
        /// Read the file with buffered reads instead of mmap.
        #[arg(long)]
        no_mmap: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Jsonl,
    Sqlite,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::error!(%err, "logsculpt failed");
            Err(err.into())
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let file = cli.config.as_ref().map(load_config_file).transpose()?;

    match cli.command {
        Commands::Learn {
            input,
            out,
            threshold,
            sample_size,
            parallel,
            num_workers,
            chunk_size,
            no_mmap,
        } => {
            let options = build_options(
                file,
                CliOverrides {
                    threshold,
                    sample_size,
                    num_workers,
                    chunk_size,
                    use_mmap: no_mmap.then_some(false),
                    ..CliOverrides::default()
                },
            )?;

            let patterns = if parallel {
                parallel_learn(&input, &options)?
            } else {
                learn_patterns(&input, &options)?
            };

            write_pattern_set(&out, &patterns)?;
            tracing::info!(pattern_count = patterns.len(), out = %out.display(), "learned pattern set");
            Ok(())
        }

        Commands::Parse {
            input,
            patterns,
            out,
            format,
            no_detect_types,
            no_mmap,
        } => {
            let options = build_options(
                file,
                CliOverrides {
                    detect_types: no_detect_types.then_some(false),
                    use_mmap: no_mmap.then_some(false),
                    ..CliOverrides::default()
                },
            )?;
            let pattern_set = read_pattern_set(&patterns)?;
            let records = parse_logs(&input, &pattern_set, &options)?;

            let count = match format {
                OutputFormat::Jsonl => write_jsonl(&out, records)?,
                OutputFormat::Sqlite => write_sqlite(&out, records)?,
            };
            tracing::info!(record_count = count, out = %out.display(), "wrote parsed records");
            Ok(())
        }

        Commands::Drift {
            input,
            patterns,
            window_size,
            change_threshold,
            no_mmap,
        } => {
            let options = build_options(
                file,
                CliOverrides {
                    window_size,
                    change_threshold,
                    use_mmap: no_mmap.then_some(false),
                    ..CliOverrides::default()
                },
            )?;
            let pattern_set = read_pattern_set(&patterns)?;
            let report = detect_drift(&input, &pattern_set, &options)?;
            println!("{}", report.summary());
            println!("{}", serde_json::to_string_pretty(&report).map_err(|e| {
                LogSculptError::output(format!("failed to serialize drift report: {e}"))
            })?);
            if report.has_drift() {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

fn write_pattern_set(path: &PathBuf, patterns: &PatternSet) -> Result<()> {
    let json = serde_json::to_string_pretty(patterns)
        .map_err(|e| LogSculptError::output(format!("failed to serialize pattern set: {e}")))?;
    std::fs::write(path, json).map_err(|e| LogSculptError::io(path.clone(), e))
}

fn read_pattern_set(path: &PathBuf) -> Result<PatternSet> {
    let text = std::fs::read_to_string(path).map_err(|e| LogSculptError::io(path.clone(), e))?;
    serde_json::from_str(&text)
        .map_err(|e| LogSculptError::invalid_option(format!("failed to parse pattern set {}: {e}", path.display())))
}
