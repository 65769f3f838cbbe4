use std::path::{Path, PathBuf};

mod fulfil;
mod purge;
mod request;
mod status;
mod terminal;
mod unit;
mod user;

use anyhow::Context;
use bloodbank::{
    domain::{parse_date, DateFormat},
    storage::Loaded,
    Directory,
};
use chrono::NaiveDate;
use clap::ArgAction;
use fulfil::Fulfil;
use purge::Purge;
use request::Request;
use status::Status;
use tracing::instrument;
use unit::Unit;
use user::User;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the blood bank directory
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Show stock levels and request counts (default)
    Status(Status),

    /// Initialize a new blood bank directory
    Init(Init),

    /// Record, list, and correct donated units
    Unit(Unit),

    /// Raise and manage blood requests
    Request(Request),

    /// Fulfil pending requests from stock
    ///
    /// Requests are served in full from the oldest usable units, or not at
    /// all.
    Fulfil(Fulfil),

    /// Remove expired units from stock
    Purge(Purge),

    /// Register and manage donors, requestors, and staff
    User(User),

    /// Show or modify configuration settings
    Config(Config),
}

impl Command {
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(root)?,
            Self::Init(command) => command.run(root)?,
            Self::Unit(command) => command.run(root)?,
            Self::Request(command) => command.run(root)?,
            Self::Fulfil(command) => command.run(root)?,
            Self::Purge(command) => command.run(root)?,
            Self::User(command) => command.run(root)?,
            Self::Config(command) => command.run(root)?,
        }
        Ok(())
    }
}

/// Opens an initialised blood bank directory.
fn open(root: &Path) -> anyhow::Result<Directory<Loaded>> {
    let directory = Directory::new(root.to_path_buf());
    if !directory.is_initialised() {
        anyhow::bail!(
            "No blood bank found in {} (run 'bbank init' first)",
            root.display()
        );
    }
    directory
        .load_all()
        .with_context(|| format!("Failed to load blood bank from {}", root.display()))
}

/// Parses a date given on the command line, or falls back to today.
///
/// The local clock is read here and nowhere else.
fn date_or_today(text: Option<&str>, format: DateFormat) -> anyhow::Result<NaiveDate> {
    match text {
        Some(text) => Ok(parse_date(text, format)?),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

/// Output format shared by listing commands.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, clap::Parser)]
pub struct Init {
    /// Date format for command-line input (iso or dmy)
    #[arg(long, default_value_t)]
    date_format: DateFormat,

    /// Number of digits in displayed ids
    #[arg(long, default_value_t = 3)]
    digits: usize,
}

impl Init {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        use terminal::Colorize;

        let mut config = bloodbank::Config::default();
        config.date_format = self.date_format;
        config
            .set_digits(self.digits)
            .map_err(|e| anyhow::anyhow!("{e}"))?;

        let directory = Directory::init(root, config)?;

        println!(
            "{}",
            format!(
                "Initialized blood bank in {}",
                directory.root().display()
            )
            .success()
        );
        println!();
        println!("Next steps:");
        println!("  bbank unit add 10 A+");
        println!("  bbank request create \"St Mary's\" A+ 2");
        println!("  bbank fulfil --all");

        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Config {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Parser)]
enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Set how dates are written on the command line
    SetDateFormat {
        /// iso (YYYY-MM-DD) or dmy (DD MM YYYY)
        format: DateFormat,
    },

    /// Set the number of digits in displayed ids
    SetDigits {
        /// Padding width, at least 1
        digits: usize,
    },

    /// Purge expired stock automatically before each fulfilment run
    SetPurgeBeforeFulfil {
        /// true or false
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },
}

impl Config {
    #[instrument]
    fn run(self, root: PathBuf) -> anyhow::Result<()> {
        use terminal::Colorize;

        let mut directory = open(&root)?;

        match self.command {
            ConfigCommand::Show => {
                let config = directory.config();
                println!("Configuration:");
                println!(
                    "  date_format: {} ({})",
                    config.date_format,
                    config.date_format.pattern().dim()
                );
                println!("  digits: {}", config.digits());
                println!("  purge_before_fulfil: {}", config.purge_before_fulfil);
                println!(
                    "  shelf_life_days: {} {}",
                    bloodbank::domain::SHELF_LIFE_DAYS,
                    "(fixed)".dim()
                );
                return Ok(());
            }
            ConfigCommand::SetDateFormat { format } => {
                directory.config_mut().date_format = format;
                println!(
                    "{}",
                    format!("Dates are now entered as {}", format.pattern()).success()
                );
            }
            ConfigCommand::SetDigits { digits } => {
                directory
                    .config_mut()
                    .set_digits(digits)
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                println!("{}", format!("Ids now use {digits} digits").success());
            }
            ConfigCommand::SetPurgeBeforeFulfil { enabled } => {
                directory.config_mut().purge_before_fulfil = enabled;
                let message = if enabled {
                    "Expired stock will be purged before fulfilment"
                } else {
                    "Expired stock will no longer be purged before fulfilment"
                };
                println!("{}", message.success());
            }
        }

        directory.flush()?;
        Ok(())
    }
}
