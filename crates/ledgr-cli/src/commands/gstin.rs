//! GSTIN command - checksum and state lookup.

use clap::Args;
use console::style;

use ledgr_core::document::rules::Gstin;

/// Arguments for the gstin command.
#[derive(Args)]
pub struct GstinArgs {
    /// One or more GSTINs to check
    #[arg(required = true)]
    ids: Vec<String>,
}

pub fn run(args: GstinArgs) -> anyhow::Result<()> {
    let mut invalid = 0;

    for id in &args.ids {
        match Gstin::parse(id) {
            Ok(gstin) => println!(
                "{} {}  state {} ({})  PAN {}",
                style("✓").green(),
                gstin,
                gstin.state_code(),
                gstin.state_name().unwrap_or("unknown"),
                gstin.pan()
            ),
            Err(issue) => {
                invalid += 1;
                println!("{} {}  {}", style("✗").red(), id, issue);
            }
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} GSTINs are invalid", invalid, args.ids.len());
    }
    Ok(())
}
