use std::path::PathBuf;

use bloodbank::{BloodType, UnitId, UserId};
use clap::Parser;
use serde_json::json;
use tracing::instrument;

use super::{
    date_or_today, open,
    terminal::{use_by_label, Colorize},
    OutputFormat,
};

#[derive(Debug, Parser)]
pub struct Unit {
    #[command(subcommand)]
    command: UnitCommand,
}

#[derive(Debug, Parser)]
enum UnitCommand {
    /// Record a donation
    ///
    /// The blood type may be omitted when a registered donor is given, in
    /// which case the donor's blood type is used.
    Add {
        /// Amount donated, in whole units
        #[arg(allow_negative_numbers = true)]
        quantity: i64,

        /// Blood type (A+, A-, B+, B-, AB+, AB-, O+, O-)
        blood_type: Option<String>,

        /// Donation date (defaults to today)
        #[arg(long, short)]
        date: Option<String>,

        /// Id of the donor
        #[arg(long)]
        donor: Option<String>,
    },

    /// List units in stock
    List {
        /// Only show this blood type
        #[arg(long, short)]
        blood_type: Option<String>,

        /// Evaluate expiry on this date instead of today
        #[arg(long, value_name = "DATE")]
        as_of: Option<String>,

        /// Output format (table, json)
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Delete a unit, whatever its state
    Remove {
        /// The unit id, e.g. BU-001
        id: UnitId,
    },

    /// Correct the amount held by a unit
    Adjust {
        /// The unit id, e.g. BU-001
        id: UnitId,

        /// Signed change, e.g. 3 or -2
        #[arg(allow_negative_numbers = true)]
        delta: i64,
    },
}

impl Unit {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = open(&root)?;
        let digits = directory.config().digits();
        let format = directory.config().date_format;

        match self.command {
            UnitCommand::Add {
                quantity,
                blood_type,
                date,
                donor,
            } => {
                let blood_type = donor_blood_type(&directory, blood_type, donor.as_deref())?;
                let date = date_or_today(date.as_deref(), format)?;
                let id = directory
                    .engine()
                    .add_unit(&blood_type, quantity, date, donor.as_deref())?;
                directory.flush()?;
                println!(
                    "{}",
                    format!("Added {} ({quantity} of {blood_type})", id.display(digits)).success()
                );
            }
            UnitCommand::List {
                blood_type,
                as_of,
                output,
            } => {
                let as_of = date_or_today(as_of.as_deref(), format)?;
                let inventory = directory.inventory();
                let units = match blood_type {
                    Some(text) => inventory.list_units(BloodType::normalize(&text)?),
                    None => inventory.list_all_units(),
                };
                let policy = inventory.policy();

                match output {
                    OutputFormat::Json => {
                        let rows: Vec<_> = units
                            .iter()
                            .map(|unit| {
                                json!({
                                    "id": unit.id().display(digits).to_string(),
                                    "blood_type": unit.blood_type().code(),
                                    "quantity": unit.quantity(),
                                    "donation_date": unit.donation_date().to_string(),
                                    "donor": unit.donor(),
                                    "expired": unit.is_expired(policy, as_of),
                                })
                            })
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                    }
                    OutputFormat::Table => {
                        if units.is_empty() {
                            println!("No units in stock.");
                            return Ok(());
                        }
                        println!(
                            "{:<10} {:<4} {:>5}  {:<12} {:<12} Donor",
                            "ID", "Type", "Qty", "Donated", "Use by"
                        );
                        for unit in &units {
                            let use_by = policy
                                .last_usable_day(unit.donation_date())
                                .map(|day| format.format(day))
                                .unwrap_or_default();
                            let use_by =
                                use_by_label(&use_by, unit.is_expired(policy, as_of), 12);
                            println!(
                                "{:<10} {:<4} {:>5}  {:<12} {} {}",
                                unit.id().display(digits).to_string(),
                                unit.blood_type().code(),
                                unit.quantity(),
                                format.format(unit.donation_date()),
                                use_by,
                                unit.donor().unwrap_or("-").dim()
                            );
                        }
                    }
                }
            }
            UnitCommand::Remove { id } => {
                let unit = directory.inventory().remove_unit(id)?;
                directory.flush()?;
                println!(
                    "{}",
                    format!(
                        "Removed {} ({} of {})",
                        id.display(digits),
                        unit.quantity(),
                        unit.blood_type()
                    )
                    .success()
                );
            }
            UnitCommand::Adjust { id, delta } => {
                let quantity = directory.inventory().adjust_quantity(id, delta)?;
                directory.flush()?;
                println!(
                    "{}",
                    format!("{} now holds {quantity}", id.display(digits)).success()
                );
            }
        }

        Ok(())
    }
}

/// Works out the blood type of a donation from the explicit argument and
/// the donor's registration.
fn donor_blood_type(
    directory: &bloodbank::Directory<bloodbank::storage::Loaded>,
    explicit: Option<String>,
    donor: Option<&str>,
) -> anyhow::Result<String> {
    let registered = match donor {
        Some(donor) => {
            let id = UserId::new(donor)?;
            directory
                .users()
                .find(&id)
                .and_then(bloodbank::User::donor_blood_type)
        }
        None => None,
    };

    match (explicit, registered) {
        (Some(explicit), Some(registered)) => {
            let explicit_type = BloodType::normalize(&explicit)?;
            if explicit_type != registered {
                anyhow::bail!(
                    "Donor {} is registered as {registered}, not {explicit_type}",
                    donor.unwrap_or_default()
                );
            }
            Ok(explicit)
        }
        (Some(explicit), None) => Ok(explicit),
        (None, Some(registered)) => Ok(registered.code().to_string()),
        (None, None) => {
            anyhow::bail!("A blood type is required unless --donor names a registered donor")
        }
    }
}
