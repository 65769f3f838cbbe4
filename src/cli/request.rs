use std::path::PathBuf;

use bloodbank::{BloodRequest, RequestId, RequestStatus};
use clap::Parser;
use serde_json::json;
use tracing::instrument;

use super::{
    date_or_today, open,
    terminal::{status_label, Colorize},
    OutputFormat,
};

#[derive(Debug, Parser)]
pub struct Request {
    #[command(subcommand)]
    command: RequestCommand,
}

#[derive(Debug, Parser)]
enum RequestCommand {
    /// Raise a new request
    Create {
        /// Who is asking, e.g. a hospital or ward
        requestor: String,

        /// Blood type (A+, A-, B+, B-, AB+, AB-, O+, O-)
        blood_type: String,

        /// Amount wanted, in whole units
        #[arg(allow_negative_numbers = true)]
        quantity: i64,

        /// Request date (defaults to today)
        #[arg(long, short)]
        date: Option<String>,
    },

    /// List requests
    List {
        /// Only show requests in this state
        #[arg(long, short)]
        status: Option<RequestStatus>,

        /// Only show requests from this requestor
        #[arg(long)]
        requestor: Option<String>,

        /// Output format (table, json)
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Change a pending request
    Update {
        /// The request id, e.g. REQ-001
        id: RequestId,

        /// New blood type
        #[arg(long, short)]
        blood_type: Option<String>,

        /// New amount
        #[arg(long, short, allow_negative_numbers = true)]
        quantity: Option<i64>,

        /// New request date
        #[arg(long, short)]
        date: Option<String>,
    },

    /// Withdraw a pending request
    Cancel {
        /// The request id, e.g. REQ-001
        id: RequestId,
    },

    /// Delete a request record, whatever its state
    Delete {
        /// The request id, e.g. REQ-001
        id: RequestId,
    },
}

impl Request {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let directory = open(&root)?;
        let digits = directory.config().digits();
        let format = directory.config().date_format;
        let engine = directory.engine();

        match self.command {
            RequestCommand::Create {
                requestor,
                blood_type,
                quantity,
                date,
            } => {
                let date = date_or_today(date.as_deref(), format)?;
                let id = engine.add_request(&requestor, &blood_type, quantity, date)?;
                directory.flush()?;
                println!("{}", format!("Created {}", id.display(digits)).success());
            }
            RequestCommand::List {
                status,
                requestor,
                output,
            } => {
                let ledger = directory.ledger();
                let mut requests = match &requestor {
                    Some(requestor) => ledger.list_by_requestor(requestor),
                    None => ledger.list_all_requests(),
                };
                if let Some(status) = status {
                    requests.retain(|request| request.status() == status);
                }

                match output {
                    OutputFormat::Json => {
                        let rows: Vec<_> = requests
                            .iter()
                            .map(|request| {
                                json!({
                                    "id": request.id().display(digits).to_string(),
                                    "requestor": request.requestor(),
                                    "blood_type": request.blood_type().code(),
                                    "quantity": request.quantity().get(),
                                    "request_date": request.request_date().to_string(),
                                    "status": request.status().as_str(),
                                })
                            })
                            .collect();
                        println!("{}", serde_json::to_string_pretty(&rows)?);
                    }
                    OutputFormat::Table => print_table(&requests, digits, format),
                }
            }
            RequestCommand::Update {
                id,
                blood_type,
                quantity,
                date,
            } => {
                let date = date
                    .as_deref()
                    .map(|text| bloodbank::domain::parse_date(text, format))
                    .transpose()?;
                let request = engine.update_request(id, blood_type.as_deref(), quantity, date)?;
                directory.flush()?;
                println!(
                    "{}",
                    format!(
                        "Updated {}: {} of {} on {}",
                        id.display(digits),
                        request.quantity(),
                        request.blood_type(),
                        format.format(request.request_date())
                    )
                    .success()
                );
            }
            RequestCommand::Cancel { id } => {
                engine.cancel_request(id)?;
                directory.flush()?;
                println!("{}", format!("Cancelled {}", id.display(digits)).success());
            }
            RequestCommand::Delete { id } => {
                engine.delete_request(id)?;
                directory.flush()?;
                println!("{}", format!("Deleted {}", id.display(digits)).success());
            }
        }

        Ok(())
    }
}

fn print_table(requests: &[BloodRequest], digits: usize, format: bloodbank::DateFormat) {
    if requests.is_empty() {
        println!("No matching requests.");
        return;
    }

    println!(
        "{:<10} {:<10} {:<4} {:>5}  {:<12} Requestor",
        "ID", "Status", "Type", "Qty", "Date"
    );
    for request in requests {
        println!(
            "{:<10} {} {:<4} {:>5}  {:<12} {}",
            request.id().display(digits).to_string(),
            status_label(request.status(), 10),
            request.blood_type().code(),
            request.quantity().get(),
            format.format(request.request_date()),
            request.requestor()
        );
    }
}
