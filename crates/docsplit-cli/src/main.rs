//! docsplit CLI - Split documents from disk into chunks.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use docsplit_chunk::{InputDocument, Pipeline, Splitter};
use docsplit_core::{EngineConfig, SplitError};

/// docsplit - Split documents into bounded, structure-aware chunks
#[derive(Parser)]
#[command(name = "docsplit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ~/.config/docsplit/config.toml or ./docsplit.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a file and print its chunks as JSON
    Split {
        /// File to split
        file: PathBuf,

        /// Strategy name, or "auto" to detect one
        #[arg(short, long)]
        strategy: Option<String>,

        /// Maximum chunk length in characters
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Characters repeated between consecutive chunks
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// Print one chunk per line instead of a pretty JSON array
        #[arg(long)]
        compact: bool,
    },

    /// List registered strategy names
    Strategies,

    /// Show how confident each splitter is about a file
    Detect {
        /// File to inspect
        file: PathBuf,
    },
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Split {
            file,
            strategy,
            chunk_size,
            chunk_overlap,
            compact,
        } => {
            if let Some(size) = chunk_size {
                config.chunking.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                config.chunking.chunk_overlap = overlap;
            }
            let pipeline = Pipeline::from_config(&config);
            let strategy = strategy.unwrap_or_else(|| pipeline.default_strategy().to_string());
            split(&pipeline, &file, &strategy, compact)?;
        }
        Commands::Strategies => {
            let pipeline = Pipeline::from_config(&config);
            for tag in pipeline.registry().types() {
                println!("{}", tag);
            }
        }
        Commands::Detect { file } => {
            let pipeline = Pipeline::from_config(&config);
            detect(&pipeline, &file)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, SplitError> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_default(),
    }
}

/// Type tag for a file extension, for the splitters' auto-detection.
fn type_for_extension(ext: &str) -> Option<&'static str> {
    let tag = match ext {
        "md" | "markdown" => "markdown",
        "json" => "json",
        "txt" => "text",
        "html" | "htm" => "html",
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "java" => "java",
        "go" => "go",
        "c" | "cpp" | "h" | "hpp" => "cpp",
        _ => return None,
    };
    Some(tag)
}

fn read_document(path: &Path) -> Result<InputDocument, SplitError> {
    let content = fs::read_to_string(path)?;
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("doc")
        .to_string();

    let mut doc = InputDocument::new(content).with_id(&id);
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        let ext = ext.to_ascii_lowercase();
        if let Some(tag) = type_for_extension(&ext) {
            doc = doc.with_meta("type", tag);
        }
        doc = doc.with_meta("extension", format!(".{}", ext));
    }
    doc = doc.with_meta("source", path.display().to_string());
    Ok(doc)
}

fn split(
    pipeline: &Pipeline,
    path: &Path,
    strategy: &str,
    compact: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = read_document(path)?;
    let chunks = match pipeline.run(&doc, strategy) {
        Ok(chunks) => chunks,
        Err(e) => {
            eprintln!("Error [{}]: {}", e.error_code(), e);
            std::process::exit(1);
        }
    };
    debug!("{} chunks from {}", chunks.len(), path.display());

    if compact {
        for chunk in &chunks {
            println!("{}", serde_json::to_string(chunk)?);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    }
    Ok(())
}

fn detect(pipeline: &Pipeline, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let doc = read_document(path)?;

    println!("Scores for {}:", path.display());
    for (name, score) in pipeline.scores(&doc) {
        println!("  {:<16} {:.2}", name, score);
    }

    match pipeline.resolve(&doc, "auto") {
        Ok(splitter) => println!("\nSelected: {}", splitter.name()),
        Err(e) => println!("\nSelected: none ({})", e),
    }
    Ok(())
}
