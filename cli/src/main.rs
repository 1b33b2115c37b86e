use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;
use xso_normalize_core::resolver::dangling_references;
use xso_normalize_core::{normalize, Dictionary, Document, NormalizeOptions};

#[derive(Parser)]
#[command(name = "xso-normalize")]
#[command(about = "Normalize XML-Schema-derived definitions graphs for API gateways")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the normalization pipeline over a generated document
    Normalize {
        /// Input Swagger 2.0 / OpenAPI 3 document
        input: PathBuf,

        /// Namespace dictionary produced alongside the document
        #[arg(short, long)]
        dictionary: PathBuf,

        /// Output document file (defaults to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Options file (kebab-case JSON); flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Keep schema-declared root elements even when unreferenced
        #[arg(long)]
        keep_root_elements: bool,

        /// Keep xml annotations everywhere instead of only where they are read
        #[arg(long)]
        no_pure_xml: bool,

        /// Nullable keyword: true emits `nullable`, false emits `x-nullable`
        #[arg(long)]
        v3_nullable: Option<bool>,

        /// Max length of extension, typeOf and inlining chains
        #[arg(long)]
        max_depth: Option<usize>,

        /// Write the run report (created/removed definitions, warnings) here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Check that every $ref in a document resolves
    Verify {
        /// Document to check
        input: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    Pretty,
    Compact,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for JSON
    let log_level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Normalize {
            input,
            dictionary,
            output,
            config,
            keep_root_elements,
            no_pure_xml,
            v3_nullable,
            max_depth,
            report: report_path,
            format,
        } => {
            let mut document = Document::from_value(read_json(&input, "document")?)
                .with_context(|| format!("Failed to load document: {}", input.display()))?;
            let dict: Dictionary = read_json(&dictionary, "dictionary")?;

            let mut options = match &config {
                Some(path) => read_json::<NormalizeOptions>(path, "config")?,
                None => NormalizeOptions::default(),
            };
            options.keep_root_elements |= keep_root_elements;
            if no_pure_xml {
                options.pure_xml = false;
            }
            if v3_nullable.is_some() {
                options.v3_nullable = v3_nullable;
            }
            if let Some(depth) = max_depth {
                options.max_depth = depth;
            }

            let report = normalize(&mut document, &dict, &options)
                .map_err(|e| anyhow::Error::from(e).context("Normalization failed"))?;

            for warning in &report.warnings {
                eprintln!("Warning: [{}] {}", warning.stage, warning.message);
            }

            let value = document.to_value().context("Failed to render document")?;
            write_json(&value, output.as_ref(), format)?;

            if let Some(path) = report_path {
                write_json(&report, Some(&path), format)?;
            }
        }
        Commands::Verify { input } => {
            let document = Document::from_value(read_json(&input, "document")?)
                .with_context(|| format!("Failed to load document: {}", input.display()))?;
            let dangling = dangling_references(&document);
            for err in &dangling {
                eprintln!("{}", err.to_json());
            }
            if !dangling.is_empty() {
                bail!("{} dangling reference(s) in {}", dangling.len(), input.display());
            }
            println!("OK: {} definitions", document.definitions.len());
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {what} file: {}", path.display()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse {what} from: {}", path.display()))
}

fn write_json<T: serde::Serialize>(
    val: &T,
    path: Option<&PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let mut writer: Box<dyn Write> = if let Some(p) = path {
        let file = File::create(p)
            .with_context(|| format!("Failed to create output file: {}", p.display()))?;
        Box::new(BufWriter::new(file))
    } else {
        Box::new(BufWriter::new(io::stdout()))
    };

    match format {
        OutputFormat::Pretty => {
            serde_json::to_writer_pretty(&mut writer, val).context("Failed to write JSON")?;
        }
        OutputFormat::Compact => {
            serde_json::to_writer(&mut writer, val).context("Failed to write JSON")?;
        }
    }

    // Ensure trailing newline
    writeln!(writer).context("Failed to write trailing newline")?;

    Ok(())
}
