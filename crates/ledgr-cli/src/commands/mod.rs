//! CLI subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod gstin;
pub mod process;
pub mod validate;

use std::path::{Path, PathBuf};

use ledgr_core::validation::format_inr;
use ledgr_core::{LedgrConfig, PipelineOutcome};

/// Output format for pipeline results.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ledgr")
        .join("config.json")
}

/// Load the explicit config file, else the default one, else defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<LedgrConfig> {
    let config = match path {
        Some(path) => LedgrConfig::from_file(Path::new(path))?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                LedgrConfig::from_file(&default_path)?
            } else {
                LedgrConfig::default()
            }
        }
    };
    config.validate()?;
    Ok(config)
}

/// Human-readable description of a pipeline outcome.
pub fn format_outcome_text(outcome: &PipelineOutcome) -> String {
    let mut output = String::new();

    match outcome {
        PipelineOutcome::Posted { entry } => {
            output.push_str(&format!("Posted entry {} ({})\n", entry.id, entry.date));
            output.push_str(&format!("{}\n\n", entry.narration));
            for line in &entry.lines {
                let (side, amount) = if line.debit_amount.is_zero() {
                    ("Cr", line.credit_amount)
                } else {
                    ("Dr", line.debit_amount)
                };
                output.push_str(&format!(
                    "  {} {:<22} {:>16}\n",
                    side,
                    line.account_name,
                    format_inr(amount)
                ));
            }
        }
        PipelineOutcome::QueuedForReview { item }
        | PipelineOutcome::Escalated { item }
        | PipelineOutcome::Rejected { item }
        | PipelineOutcome::Filed { item } => {
            output.push_str(&format!(
                "Review item {}: {} ({} priority)\n",
                item.id,
                item.status,
                item.priority.as_str()
            ));
            output.push_str(&format!(
                "Document type: {}, confidence {:.2}\n",
                item.extracted_data.classification.doc_type,
                item.confidence_report.weighted_score
            ));
            output.push_str(&format!("Reason: {}\n", item.review_reason));
        }
        PipelineOutcome::ArchivedDuplicate { detection } => {
            output.push_str(&format!(
                "Archived as duplicate (confidence {:.2})\n",
                detection.confidence
            ));
            for m in &detection.matches {
                output.push_str(&format!(
                    "  {} {:.2}: {}\n",
                    m.candidate_invoice_id,
                    m.similarity_score,
                    m.match_reasons.join(", ")
                ));
            }
        }
    }

    output
}
