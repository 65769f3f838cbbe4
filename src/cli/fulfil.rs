use std::path::PathBuf;

use bloodbank::{Error, Fulfilment, RequestId};
use clap::Parser;
use tracing::instrument;

use super::{date_or_today, open, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct Fulfil {
    /// The request to fulfil, e.g. REQ-001
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    id: Option<RequestId>,

    /// Fulfil every pending request, oldest first
    #[arg(long)]
    all: bool,

    /// Evaluate expiry on this date instead of today
    #[arg(long, value_name = "DATE")]
    as_of: Option<String>,
}

impl Fulfil {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = open(&root)?;
        let config = directory.config();
        let digits = config.digits();
        let as_of = date_or_today(self.as_of.as_deref(), config.date_format)?;
        let engine = directory.engine();

        if config.purge_before_fulfil {
            let report = engine.purge_expired_stock(as_of);
            if report.count() > 0 {
                println!(
                    "{}",
                    format!("Purged {} expired unit(s)", report.count()).dim()
                );
            }
        }

        let outcomes = match self.id {
            Some(id) => vec![(id, engine.fulfill_request(id, as_of))],
            None => engine.fulfill_all_pending(as_of),
        };

        // Persist whatever succeeded before reporting failures.
        directory.flush()?;

        if outcomes.is_empty() {
            println!("No pending requests.");
            return Ok(());
        }

        let mut failed = 0;
        for (id, outcome) in &outcomes {
            match outcome {
                Ok(fulfilment) => print_receipt(fulfilment, digits),
                Err(error) => {
                    failed += 1;
                    let line = format!("✗ {}: {error}", id.display(digits));
                    match error {
                        Error::InsufficientStock { .. } => println!("{}", line.warning()),
                        _ => println!("{}", line.failure()),
                    }
                }
            }
        }

        // A single explicit request that could not be served is an error.
        if self.id.is_some() && failed > 0 {
            anyhow::bail!("Request was not fulfilled");
        }
        if outcomes.len() > 1 {
            println!(
                "{}",
                format!("{} fulfilled, {failed} not fulfilled", outcomes.len() - failed).dim()
            );
        }
        Ok(())
    }
}

fn print_receipt(fulfilment: &Fulfilment, digits: usize) {
    let draws: Vec<String> = fulfilment
        .draws()
        .iter()
        .map(|draw| format!("{} ×{}", draw.unit.display(digits), draw.amount))
        .collect();
    println!(
        "{} {}",
        format!(
            "✓ {}: {} of {}",
            fulfilment.request().display(digits),
            fulfilment.quantity(),
            fulfilment.blood_type()
        )
        .success(),
        format!("from {}", draws.join(", ")).dim()
    );
}
