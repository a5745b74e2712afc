//! Invoice PDF renderer
//!
//! Renders one record onto its configured template and writes the PDF.

mod assets;

use anyhow::{Context, Result};
use clap::Parser;
use invoice_layout::{render_invoice, LayoutConfig, Record};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "invoice-pdf")]
#[command(version, about = "Populate a template PDF from an invoice record")]
struct Args {
    /// Layout configuration (.json or .toml)
    #[arg(short, long)]
    config: PathBuf,

    /// Record JSON file
    #[arg(short, long)]
    record: PathBuf,

    /// Directory holding files addressed by file key
    #[arg(short, long)]
    assets: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    out: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = LayoutConfig::from_path(&args.config)
        .with_context(|| format!("loading config {}", args.config.display()))?;
    let record_json = std::fs::read_to_string(&args.record)
        .with_context(|| format!("reading record {}", args.record.display()))?;
    let record = Record::from_json_str(&record_json)
        .with_context(|| format!("parsing record {}", args.record.display()))?;

    let host = assets::DirectoryHost::new(&args.assets);
    let rendered = render_invoice(&host, &config, &record)
        .await
        .context("rendering invoice")?;

    for warning in &rendered.warnings {
        eprintln!("warning: {}: {}", warning.field_key, warning.message);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;
    let path = args.out.join(&rendered.file_name);
    std::fs::write(&path, &rendered.bytes)
        .with_context(|| format!("writing {}", path.display()))?;

    println!("{}", path.display());
    Ok(())
}
