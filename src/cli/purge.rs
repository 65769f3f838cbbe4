use std::path::PathBuf;

use clap::Parser;
use dialoguer::Confirm;
use tracing::instrument;

use super::{date_or_today, open, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Purge {
    /// Evaluate expiry on this date instead of today
    #[arg(long, value_name = "DATE")]
    as_of: Option<String>,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    yes: bool,
}

impl Purge {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = open(&root)?;
        let digits = directory.config().digits();
        let format = directory.config().date_format;
        let as_of = date_or_today(self.as_of.as_deref(), format)?;
        let inventory = directory.inventory();

        let expired: Vec<_> = inventory
            .list_all_units()
            .into_iter()
            .filter(|unit| unit.is_expired(inventory.policy(), as_of))
            .collect();

        if expired.is_empty() {
            println!("{}", "No expired units ✅".success());
            return Ok(());
        }

        if !self.yes {
            println!("Will remove {} expired unit(s):", expired.len());
            for unit in &expired {
                println!(
                    "  • {} {} ×{} donated {}",
                    unit.id().display(digits),
                    unit.blood_type(),
                    unit.quantity(),
                    format.format(unit.donation_date())
                );
            }

            let proceed = Confirm::new()
                .with_prompt("Proceed?")
                .default(false)
                .interact()?;
            if !proceed {
                println!("Cancelled");
                std::process::exit(130);
            }
        }

        let report = directory.engine().purge_expired_stock(as_of);
        directory.flush()?;

        for (blood_type, ids) in report.by_blood_type() {
            let ids: Vec<String> = ids
                .iter()
                .map(|id| id.display(digits).to_string())
                .collect();
            println!("{blood_type}: {}", ids.join(", ").dim());
        }
        println!(
            "{}",
            format!("✅ Purged {} expired unit(s)", report.count()).success()
        );
        Ok(())
    }
}
