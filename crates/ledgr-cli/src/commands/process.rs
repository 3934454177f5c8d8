//! Process command - run a single document through the pipeline.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};
use uuid::Uuid;

use ledgr_core::{
    Channel, FileSource, IncomingDocument, MemoryStore, Owner, Pipeline, PipelineOutcome,
    TracingNotifier,
};

use super::{OutputFormat, format_outcome_text, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (PDF or image)
    #[arg(required = true)]
    input: PathBuf,

    /// GSTIN of the client whose books are being kept
    #[arg(long)]
    client_gstin: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show the provider attempts and confidence
    #[arg(long)]
    show_confidence: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let owner = Owner::new(Uuid::new_v4(), Uuid::new_v4());
    let store = Arc::new(MemoryStore::new());
    let mut pipeline = Pipeline::new(
        &config,
        store.clone(),
        Arc::new(FileSource),
        Arc::new(TracingNotifier),
    );
    if let Some(gstin) = &args.client_gstin {
        pipeline = pipeline.with_client_gstin(owner.client_id, gstin.clone());
    }

    let document = document_for(owner, &args.input);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Processing {}...", document.filename));

    let outcome = pipeline.process(&document).await;
    pb.finish_and_clear();
    let outcome = outcome?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&outcome)?,
        OutputFormat::Text => format_outcome_text(&outcome),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        print_confidence(&outcome, store.as_ref(), &document)?;
    }

    debug!("Total processing time: {:?}", start.elapsed());
    Ok(())
}

/// Build an upload document whose content handle is the file path.
pub fn document_for(owner: Owner, path: &std::path::Path) -> IncomingDocument {
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    IncomingDocument::new(owner, Channel::Upload, path.display().to_string(), filename)
}

fn print_confidence(
    outcome: &PipelineOutcome,
    store: &MemoryStore,
    document: &IncomingDocument,
) -> anyhow::Result<()> {
    use ledgr_core::LedgerStore;

    println!();
    if let Some(extraction) = store.latest_extraction(&document.owner, document.id)? {
        for attempt in &extraction.attempts {
            let status = match &attempt.error {
                Some(e) => style(format!("failed: {}", e)).red(),
                None => style("ok".to_string()).green(),
            };
            println!(
                "{} {} ({}ms): {}",
                style("ℹ").blue(),
                attempt.provider,
                attempt.elapsed_ms,
                status
            );
        }
        println!(
            "{} Classified as {} ({:.1}%)",
            style("ℹ").blue(),
            extraction.classification.doc_type,
            extraction.classification.confidence * 100.0
        );
    }
    if let PipelineOutcome::QueuedForReview { item } | PipelineOutcome::Escalated { item } =
        outcome
    {
        println!(
            "{} Weighted confidence: {:.1}%",
            style("ℹ").blue(),
            item.confidence_report.weighted_score * 100.0
        );
    }
    Ok(())
}
