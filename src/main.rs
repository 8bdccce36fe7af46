use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use mhtml_chat_export::export::{self, ExportFormat};
use mhtml_chat_export::{ChatSession, ExtractConfig, MhtmlParser, Sender};

/// Converts saved chat pages (.mhtml) into Markdown or JSON.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Archive to convert, or a directory searched for *.mhtml / *.mht files
    input: PathBuf,

    /// Output file (or directory when INPUT is a directory)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value_t = ExportFormat::Markdown)]
    format: ExportFormat,

    /// JSON file with extraction settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Shortest block kept as dialogue, in characters
    #[arg(long, value_name = "N")]
    min_block_chars: Option<usize>,

    /// Title used when the page has none
    #[arg(long)]
    title: Option<String>,

    /// Log every extraction decision
    #[arg(short, long)]
    verbose: bool,
}

const ARCHIVE_EXTENSIONS: &[&str] = &["mhtml", "mht"];

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => ExtractConfig::load(path)?,
        None => ExtractConfig::default(),
    };
    if let Some(min_block_chars) = args.min_block_chars {
        config.segmenter.min_block_chars = min_block_chars;
    }
    if let Some(title) = &args.title {
        config.default_title = title.clone();
    }

    let parser = MhtmlParser::with_config(config);

    if args.input.is_dir() {
        convert_directory(&parser, &args.input, args.output.as_deref(), args.format);
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| export::default_output_path(&args.input, args.format));
    convert_file(&parser, &args.input, &output, args.format)
}

fn convert_file(
    parser: &MhtmlParser,
    input: &Path,
    output: &Path,
    format: ExportFormat,
) -> Result<()> {
    let session = parser.parse_file(input)?;
    export::write(&session, format, output)
        .with_context(|| format!("Failed to export {}", input.display()))?;
    print_summary(&session, output);
    Ok(())
}

/// Failures are logged per file and do not stop the batch.
fn convert_directory(
    parser: &MhtmlParser,
    dir: &Path,
    output_dir: Option<&Path>,
    format: ExportFormat,
) {
    let mut converted = 0;

    for entry in walkdir::WalkDir::new(dir)
        .max_depth(5)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_archive(path) {
            continue;
        }

        let output = match output_dir {
            Some(output_dir) => {
                let relative = path.strip_prefix(dir).unwrap_or(path);
                export::default_output_path(&output_dir.join(relative), format)
            }
            None => export::default_output_path(path, format),
        };

        match convert_file(parser, path, &output, format) {
            Ok(()) => converted += 1,
            Err(err) => tracing::warn!("Skipping {}: {:#}", path.display(), err),
        }
    }

    tracing::info!("Converted {} archive(s) under {}", converted, dir.display());
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

fn print_summary(session: &ChatSession, output: &Path) {
    println!("{} -> {}", session.title(), output.display());
    println!(
        "  {} turns ({} user, {} assistant)",
        session.turns().len(),
        session.count_by_sender(Sender::User),
        session.count_by_sender(Sender::Assistant)
    );
    if let Some(prompt) = session.first_prompt() {
        println!("  first prompt: {prompt}");
    }
}
