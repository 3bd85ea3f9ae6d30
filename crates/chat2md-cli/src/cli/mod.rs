//! CLI entry and dispatch.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use chat2md_core::combine::{self, NamedLog};
use chat2md_core::config::Config;
use chat2md_core::document;
use chat2md_core::transcript;

#[derive(Parser)]
#[command(name = "chat2md")]
#[command(version)]
#[command(about = "Convert Copilot chat log JSON file(s) to markdown")]
struct Cli {
    /// Input JSON file(s) or directories
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output markdown file (or directory with --separate)
    #[arg(short, long)]
    output: PathBuf,

    /// Combine multiple inputs into one document
    #[arg(long)]
    combine: bool,

    /// Write one markdown file per input into the output directory
    #[arg(long, conflicts_with = "combine")]
    separate: bool,

    /// Disable the sentence/bold paragraph-spacing heuristic
    #[arg(long = "no-sentence-spacing")]
    no_sentence_spacing: bool,
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if cli.no_sentence_spacing {
        config.sentence_spacing = false;
    }

    let inputs = collect_inputs(&cli.input)?;

    if cli.separate {
        convert_separate(&inputs, &cli.output, &config)
    } else if inputs.len() == 1 && !cli.combine {
        convert_single(&inputs[0], &cli.output, &config)
    } else {
        convert_combined(&inputs, &cli.output, &config)
    }
}

/// RUST_LOG-driven logging to stderr so stdout stays clean for progress
/// output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Expands the input arguments into the list of JSON files to convert.
///
/// Directories contribute their `*.json` files in sorted order; anything
/// that is neither a JSON file nor a directory is skipped with a warning.
fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut inputs: Vec<PathBuf> = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)
                .with_context(|| format!("read directory '{}'", path.display()))?
                .filter_map(std::result::Result::ok)
                .map(|entry| entry.path())
                .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            entries.sort();
            inputs.extend(entries);
        } else if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            inputs.push(path.clone());
        } else {
            warn!("skipping '{}' (not a JSON file or directory)", path.display());
        }
    }
    if inputs.is_empty() {
        bail!("no JSON input files found");
    }
    Ok(inputs)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "chat".to_string(), |stem| stem.to_string_lossy().into_owned())
}

fn convert_single(input: &Path, output: &Path, config: &Config) -> Result<()> {
    let log = transcript::load_chat_log(input)?;
    let markdown = document::render_chat_log(&log, config);
    fs::write(output, markdown).with_context(|| format!("write '{}'", output.display()))?;
    println!(
        "Successfully converted {} to {}",
        input.display(),
        output.display()
    );
    Ok(())
}

fn convert_separate(inputs: &[PathBuf], output_dir: &Path, config: &Config) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("create output directory '{}'", output_dir.display()))?;

    for input in inputs {
        let log = transcript::load_chat_log(input)?;
        let markdown = document::render_chat_log(&log, config);
        let output = output_dir.join(format!("{}.md", file_stem(input)));
        fs::write(&output, markdown).with_context(|| format!("write '{}'", output.display()))?;
        println!("Converted {} to {}", input.display(), output.display());
    }
    println!(
        "Successfully converted {} files to {}",
        inputs.len(),
        output_dir.display()
    );
    Ok(())
}

fn convert_combined(inputs: &[PathBuf], output: &Path, config: &Config) -> Result<()> {
    let mut logs: Vec<NamedLog> = Vec::with_capacity(inputs.len());
    for input in inputs {
        logs.push(NamedLog {
            name: file_stem(input),
            log: transcript::load_chat_log(input)?,
        });
    }
    let markdown = combine::render_combined(logs, config);
    fs::write(output, markdown).with_context(|| format!("write '{}'", output.display()))?;
    println!(
        "Successfully combined {} files into {}",
        inputs.len(),
        output.display()
    );
    Ok(())
}
