//! People known to the blood bank.
//!
//! A user is a single record whose role decides what it can do. Role-specific
//! data travels as the payload of the [`Role`] variant, so a donor always has
//! a blood type and a requestor may name a hospital.

use std::{collections::BTreeMap, fmt};

use non_empty_string::NonEmptyString;

use super::{BloodType, Error, Result};

/// Identifier of a registered user, e.g. `D042` or `st-marys`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from non-blank text. Surrounding whitespace is
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyField`] if the id is blank.
    pub fn new(id: &str) -> Result<Self> {
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyField("user id"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a user is allowed to do. Roles are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    /// Gives blood of a fixed type.
    Donor {
        /// The donor's blood type.
        blood_type: BloodType,
    },
    /// Raises requests for blood.
    Requestor {
        /// The hospital the requestor acts for, if any.
        hospital: Option<NonEmptyString>,
    },
    /// Manages stock and processes requests.
    Staff,
    /// Manages users and configuration.
    Admin,
}

impl Role {
    /// Lowercase role name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Donor { .. } => "donor",
            Self::Requestor { .. } => "requestor",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    /// Whether this role may record donations.
    #[must_use]
    pub const fn can_donate(&self) -> bool {
        matches!(self, Self::Donor { .. })
    }

    /// Whether this role may raise blood requests.
    #[must_use]
    pub const fn can_request(&self) -> bool {
        matches!(self, Self::Requestor { .. })
    }

    /// Whether this role may manage stock, requests, and users.
    #[must_use]
    pub const fn can_administer(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Display name.
    pub name: NonEmptyString,
    /// Phone number, email, or similar.
    pub contact: Option<NonEmptyString>,
    /// What the user is.
    pub role: Role,
}

impl User {
    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyField`] if the id or name is blank.
    pub fn new(id: &str, name: &str, contact: Option<&str>, role: Role) -> Result<Self> {
        let id = UserId::new(id)?;
        let name = NonEmptyString::new(name.trim().to_string())
            .map_err(|_| Error::EmptyField("user name"))?;
        let contact = contact.and_then(|c| NonEmptyString::new(c.trim().to_string()).ok());
        Ok(Self {
            id,
            name,
            contact,
            role,
        })
    }

    /// The donor's blood type, if this user is a donor.
    #[must_use]
    pub const fn donor_blood_type(&self) -> Option<BloodType> {
        match self.role {
            Role::Donor { blood_type } => Some(blood_type),
            _ => None,
        }
    }
}

/// The set of registered users, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct Users {
    users: BTreeMap<UserId, User>,
}

impl Users {
    /// Adds a user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateUser`] if the id is taken.
    pub fn register(&mut self, user: User) -> Result<()> {
        if self.users.contains_key(&user.id) {
            return Err(Error::DuplicateUser(user.id));
        }
        tracing::info!("Registered {} {}", user.role.name(), user.id);
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Looks up a user by id.
    #[must_use]
    pub fn find(&self, id: &UserId) -> Option<&User> {
        self.users.get(id)
    }

    /// Removes a user, returning the removed record.
    ///
    /// Units and requests that mention the user are left alone; those
    /// references are informational.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UserNotFound`] if no such user exists.
    pub fn remove(&mut self, id: &UserId) -> Result<User> {
        self.users
            .remove(id)
            .ok_or_else(|| Error::UserNotFound(id.clone()))
    }

    /// All users, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Donors whose blood type is `blood_type`.
    pub fn donors_with_blood_type(&self, blood_type: BloodType) -> impl Iterator<Item = &User> {
        self.users
            .values()
            .filter(move |user| user.donor_blood_type() == Some(blood_type))
    }

    /// Number of registered users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if nobody is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
