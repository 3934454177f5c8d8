//! Validate command - classify, extract, validate and score a text document.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use serde_json::json;
use uuid::Uuid;

use ledgr_core::{
    ConfidenceScorer, ExtractionResult, InvoiceData, ValidationEngine, ValidationReport, classify,
    extract_fields,
};

use super::{OutputFormat, load_config};

/// Confidence given to text supplied directly by the user.
const DIRECT_TEXT_CONFIDENCE: f32 = 1.0;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Plain-text transcription of the document
    #[arg(required = true)]
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

pub fn run(args: ValidateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let text = fs::read_to_string(&args.input)?;
    let filename = args.input.file_name().and_then(|s| s.to_str());

    let classification = classify(&text, filename);
    let parsed = extract_fields(&text, classification.doc_type);
    let extraction = ExtractionResult {
        document_id: Uuid::new_v4(),
        version: 1,
        classification,
        fields: parsed.fields,
        field_confidence: parsed.confidence,
        raw_text: text,
        confidence: DIRECT_TEXT_CONFIDENCE,
        provider: Some("text".to_string()),
        attempts: Vec::new(),
    };

    let invoice = InvoiceData::from_fields(&extraction.fields);
    let validation = if classification.doc_type.is_financial() {
        ValidationEngine::new(config.validation.clone()).validate(&invoice)
    } else {
        ValidationReport::from_outcomes(Vec::new())
    };
    let report = ConfidenceScorer::new(config.scoring.clone()).score(&extraction, &validation);

    match args.format {
        OutputFormat::Json => {
            let output = json!({
                "classification": extraction.classification,
                "fields": extraction.fields,
                "validation": validation,
                "confidence": report,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!(
                "Document type: {} ({:.0}%)",
                classification.doc_type,
                classification.confidence * 100.0
            );
            println!();
            for (key, value) in &extraction.fields {
                println!("  {:<24} {}", key, value);
            }

            if !validation.outcomes.is_empty() {
                println!();
                for outcome in &validation.outcomes {
                    let mark = if outcome.passed {
                        style("✓").green()
                    } else if outcome.severity == ledgr_core::Severity::Critical {
                        style("✗").red()
                    } else {
                        style("!").yellow()
                    };
                    println!("{} {:<18} {}", mark, outcome.rule_name, outcome.message);
                }
            }

            println!();
            println!(
                "Weighted confidence: {:.2} ({})",
                report.weighted_score,
                if report.should_auto_approve {
                    style("auto-approve").green()
                } else {
                    style("needs review").yellow()
                }
            );
            if let Some(reason) = &report.review_reason {
                println!("Reason: {}", reason);
            }
        }
    }

    Ok(())
}
