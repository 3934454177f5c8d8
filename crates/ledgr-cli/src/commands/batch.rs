//! Batch command - run many documents through one shared ledger.
//!
//! All files share one in-memory store and one client, so an invoice
//! submitted twice under different file names is caught as a duplicate.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};
use uuid::Uuid;

use ledgr_core::{FileSource, MemoryStore, Owner, Pipeline, PipelineOutcome, TracingNotifier};

use super::load_config;
use super::process::document_for;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern of input files
    #[arg(required = true)]
    input: String,

    /// GSTIN of the client whose books are being kept
    #[arg(long)]
    client_gstin: Option<String>,

    /// Directory for one JSON outcome per file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Write a summary CSV to this path
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Result of processing a single file.
struct FileResult {
    path: PathBuf,
    outcome: Option<PipelineOutcome>,
    error: Option<String>,
    processing_time_ms: u64,
}

const EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "webp", "tif", "tiff", "bmp"];

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            EXTENSIONS.contains(&ext.to_lowercase().as_str())
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

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

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let file_start = Instant::now();
        let document = document_for(owner, &path);
        let result = pipeline.process(&document).await;
        let processing_time_ms = file_start.elapsed().as_millis() as u64;

        match result {
            Ok(outcome) => results.push(FileResult {
                path,
                outcome: Some(outcome),
                error: None,
                processing_time_ms,
            }),
            Err(e) if args.continue_on_error => {
                warn!("Failed to process {}: {}", path.display(), e);
                results.push(FileResult {
                    path,
                    outcome: None,
                    error: Some(e.to_string()),
                    processing_time_ms,
                });
            }
            Err(e) => {
                pb.abandon();
                error!("Failed to process {}: {}", path.display(), e);
                anyhow::bail!("Processing failed for {}: {}", path.display(), e);
            }
        }

        pb.inc(1);
    }

    pb.finish_and_clear();

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            if let Some(outcome) = &result.outcome {
                let stem = result
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("document");
                let output_path = output_dir.join(format!("{}.json", stem));
                fs::write(&output_path, serde_json::to_string_pretty(outcome)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    print_summary(&results, start);
    Ok(())
}

fn print_summary(results: &[FileResult], start: Instant) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for result in results {
        let label = result.outcome.as_ref().map(|o| o.label()).unwrap_or("failed");
        *counts.entry(label).or_default() += 1;
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    for (label, count) in &counts {
        let count = match *label {
            "posted" => style(count).green(),
            "queued_for_review" => style(count).yellow(),
            "escalated" | "failed" => style(count).red(),
            _ => style(count).dim(),
        };
        println!("   {:<20} {}", label, count);
    }

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();
    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "outcome",
        "document_type",
        "amount",
        "reference",
        "processing_time_ms",
        "detail",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let time = result.processing_time_ms.to_string();
        let outcome = result.outcome.as_ref().map(|o| o.label()).unwrap_or("failed");

        let (doc_type, amount, reference, detail) = match &result.outcome {
            Some(PipelineOutcome::Posted { entry }) => (
                String::new(),
                entry.total_debit().to_string(),
                entry.id.to_string(),
                entry.narration.clone(),
            ),
            Some(
                PipelineOutcome::QueuedForReview { item }
                | PipelineOutcome::Escalated { item }
                | PipelineOutcome::Rejected { item }
                | PipelineOutcome::Filed { item },
            ) => (
                item.extracted_data.classification.doc_type.to_string(),
                String::new(),
                item.id.to_string(),
                item.review_reason.clone(),
            ),
            Some(PipelineOutcome::ArchivedDuplicate { detection }) => (
                String::new(),
                String::new(),
                detection
                    .matches
                    .first()
                    .map(|m| m.candidate_invoice_id.to_string())
                    .unwrap_or_default(),
                format!("duplicate confidence {:.2}", detection.confidence),
            ),
            None => (
                String::new(),
                String::new(),
                String::new(),
                result.error.clone().unwrap_or_default(),
            ),
        };

        wtr.write_record([
            filename,
            outcome,
            &doc_type,
            &amount,
            &reference,
            &time,
            &detail,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
