use std::path::PathBuf;

use bloodbank::{BloodType, Role, UserId};
use clap::{Parser, ValueEnum};
use non_empty_string::NonEmptyString;
use tracing::instrument;

use super::{open, terminal::Colorize};

#[derive(Debug, Parser)]
pub struct User {
    #[command(subcommand)]
    command: UserCommand,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleKind {
    Donor,
    Requestor,
    Staff,
    Admin,
}

#[derive(Debug, Parser)]
enum UserCommand {
    /// Register a new user
    Register {
        /// Unique id, e.g. D042
        id: String,

        /// Display name
        name: String,

        /// What the user is
        #[arg(long, value_enum)]
        role: RoleKind,

        /// The donor's blood type (donors only)
        #[arg(long, required_if_eq("role", "donor"))]
        blood_type: Option<String>,

        /// The hospital a requestor acts for (requestors only)
        #[arg(long)]
        hospital: Option<String>,

        /// Phone number, email, or similar
        #[arg(long)]
        contact: Option<String>,
    },

    /// List registered users
    List {
        /// Only show donors of this blood type
        #[arg(long)]
        blood_type: Option<String>,
    },

    /// Remove a user
    ///
    /// Units and requests that mention the user are kept.
    Remove {
        /// The user's id
        id: String,
    },
}

impl User {
    #[instrument]
    pub fn run(self, root: PathBuf) -> anyhow::Result<()> {
        let mut directory = open(&root)?;

        match self.command {
            UserCommand::Register {
                id,
                name,
                role,
                blood_type,
                hospital,
                contact,
            } => {
                let role = match role {
                    RoleKind::Donor => Role::Donor {
                        blood_type: BloodType::normalize(blood_type.as_deref().unwrap_or_default())?,
                    },
                    RoleKind::Requestor => Role::Requestor {
                        hospital: hospital.and_then(|h| NonEmptyString::new(h).ok()),
                    },
                    RoleKind::Staff => Role::Staff,
                    RoleKind::Admin => Role::Admin,
                };
                let user = bloodbank::User::new(&id, &name, contact.as_deref(), role)?;
                let id = user.id.clone();
                directory.users_mut().register(user)?;
                directory.flush()?;
                println!("{}", format!("Registered {id}").success());
            }
            UserCommand::List { blood_type } => {
                let users = directory.users();
                let selected: Vec<_> = match blood_type {
                    Some(text) => users
                        .donors_with_blood_type(BloodType::normalize(&text)?)
                        .collect(),
                    None => users.iter().collect(),
                };

                if selected.is_empty() {
                    println!("No users found.");
                    return Ok(());
                }
                for user in selected {
                    let detail = match &user.role {
                        Role::Donor { blood_type } => blood_type.code().to_string(),
                        Role::Requestor {
                            hospital: Some(hospital),
                        } => hospital.as_str().to_string(),
                        _ => String::new(),
                    };
                    println!(
                        "{:<12} {:<10} {:<24} {}",
                        user.id.as_str(),
                        user.role.name(),
                        user.name.as_str(),
                        detail.dim()
                    );
                }
            }
            UserCommand::Remove { id } => {
                let id = UserId::new(&id)?;
                let user = directory.users_mut().remove(&id)?;
                directory.flush()?;
                println!(
                    "{}",
                    format!("Removed {} {}", user.role.name(), user.id).success()
                );
            }
        }

        Ok(())
    }
}
