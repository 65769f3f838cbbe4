use std::{collections::BTreeMap, path::PathBuf, process};

use bloodbank::{BloodType, RequestStatus};
use clap::Parser;
use serde_json::json;
use tracing::instrument;

use super::{
    date_or_today, open,
    terminal::{is_narrow, stock_label, Colorize},
    OutputFormat,
};

#[derive(Debug, Parser, Default)]
#[command(about = "Show usable stock per blood type and request counts")]
pub struct Status {
    /// Evaluate expiry on this date instead of today
    #[arg(long, value_name = "DATE")]
    as_of: Option<String>,

    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", value_enum, default_value_t)]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

struct Summary {
    available: BTreeMap<BloodType, u64>,
    pending: usize,
    /// Pending demand per blood type.
    demand: BTreeMap<BloodType, u64>,
    expired_units: usize,
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = open(&root)?;
        let as_of = date_or_today(self.as_of.as_deref(), directory.config().date_format)?;

        let inventory = directory.inventory();
        let pending = directory.ledger().list_by_status(RequestStatus::Pending);

        let mut demand = BTreeMap::new();
        for request in &pending {
            *demand.entry(request.blood_type()).or_insert(0) +=
                u64::from(request.quantity().get());
        }

        let summary = Summary {
            available: inventory.availability(as_of),
            pending: pending.len(),
            demand,
            expired_units: inventory
                .list_all_units()
                .iter()
                .filter(|unit| unit.is_expired(inventory.policy(), as_of))
                .count(),
        };

        match self.output {
            OutputFormat::Json => Self::output_json(&summary, as_of)?,
            OutputFormat::Table if self.quiet => Self::output_quiet(&summary),
            OutputFormat::Table => Self::output_table(&summary, as_of),
        }

        // Exit with a non-zero code when expired stock is waiting to be purged.
        if summary.expired_units > 0 {
            process::exit(2);
        }

        Ok(())
    }

    fn output_json(summary: &Summary, as_of: chrono::NaiveDate) -> anyhow::Result<()> {
        let stock: Vec<_> = summary
            .available
            .iter()
            .map(|(blood_type, available)| {
                json!({
                    "blood_type": blood_type.code(),
                    "available": available,
                    "pending_demand": summary.demand.get(blood_type).copied().unwrap_or(0),
                })
            })
            .collect();

        let output = json!({
            "as_of": as_of.to_string(),
            "stock": stock,
            "pending_requests": summary.pending,
            "expired_units": summary.expired_units,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_quiet(summary: &Summary) {
        let total: u64 = summary.available.values().sum();
        println!(
            "available={total} pending={} expired={}",
            summary.pending, summary.expired_units
        );
    }

    fn output_table(summary: &Summary, as_of: chrono::NaiveDate) {
        println!("Usable stock as of {as_of}");
        println!("{}", "────────────────────────────".dim());

        for (blood_type, available) in &summary.available {
            let demand = summary.demand.get(blood_type).copied().unwrap_or(0);

            if is_narrow() {
                println!(
                    "{}: {} (wanted {demand})",
                    blood_type.code(),
                    stock_label(*available, demand, 0)
                );
            } else {
                println!(
                    "{:<4} {}  {}",
                    blood_type.code(),
                    stock_label(*available, demand, 6),
                    format!("pending demand {demand}").dim()
                );
            }
        }

        println!();

        if summary.pending == 0 {
            println!("Pending requests: {} ✅", "0".success());
        } else {
            println!("Pending requests: {}", summary.pending.to_string().warning());
            println!("{}", "Run 'bbank fulfil --all' to serve them.".dim());
        }

        if summary.expired_units == 0 {
            println!("Expired units: {} ✅", "0".success());
        } else {
            println!(
                "Expired units: {} ⚠️",
                summary.expired_units.to_string().warning()
            );
            println!("{}", "Run 'bbank purge' to remove them.".dim());
        }
    }
}
