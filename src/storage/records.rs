//! On-disk record formats.
//!
//! Each `.jsonl` file holds one JSON object per line. Every object carries a
//! `_version` tag so the format can evolve without breaking old directories.
//! Records are plain data: converting them into domain values goes through
//! the stores' bulk-load entry points, which apply the usual validation.

use std::{fmt::Display, str::FromStr};

use chrono::NaiveDate;
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{
    BloodRequest, BloodType, BloodUnit, Error, InventoryStore, Quantity, RequestId,
    RequestLedger, RequestStatus, Role, UnitId, User, Users,
};

/// Serialize a value through its [`Display`] implementation.
///
/// # Errors
///
/// Returns an error if serialization fails.
fn as_string<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

/// Deserialize a value through its [`FromStr`] implementation.
///
/// # Errors
///
/// Returns an error if the string cannot be parsed.
fn from_string<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_version")]
pub(crate) enum UnitRecord {
    #[serde(rename = "1")]
    V1 {
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        id: UnitId,
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        blood_type: BloodType,
        quantity: u32,
        donation_date: NaiveDate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        donor: Option<String>,
    },
}

impl From<&BloodUnit> for UnitRecord {
    fn from(unit: &BloodUnit) -> Self {
        Self::V1 {
            id: unit.id(),
            blood_type: unit.blood_type(),
            quantity: unit.quantity(),
            donation_date: unit.donation_date(),
            donor: unit.donor().map(str::to_string),
        }
    }
}

impl UnitRecord {
    pub(crate) fn load_into(self, inventory: &InventoryStore) -> Result<(), Error> {
        match self {
            Self::V1 {
                id,
                blood_type,
                quantity,
                donation_date,
                donor,
            } => inventory.load_unit(id, blood_type, quantity, donation_date, donor.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_version")]
pub(crate) enum RequestRecord {
    #[serde(rename = "1")]
    V1 {
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        id: RequestId,
        requestor: String,
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        blood_type: BloodType,
        quantity: i64,
        request_date: NaiveDate,
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        status: RequestStatus,
    },
}

impl From<&BloodRequest> for RequestRecord {
    fn from(request: &BloodRequest) -> Self {
        Self::V1 {
            id: request.id(),
            requestor: request.requestor().to_string(),
            blood_type: request.blood_type(),
            quantity: i64::from(request.quantity().get()),
            request_date: request.request_date(),
            status: request.status(),
        }
    }
}

impl RequestRecord {
    pub(crate) fn load_into(self, ledger: &RequestLedger) -> Result<(), Error> {
        match self {
            Self::V1 {
                id,
                requestor,
                blood_type,
                quantity,
                request_date,
                status,
            } => ledger.load_request(
                id,
                &requestor,
                blood_type,
                Quantity::new(quantity)?,
                request_date,
                status,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub(crate) enum RoleRecord {
    Donor {
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        blood_type: BloodType,
    },
    Requestor {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hospital: Option<String>,
    },
    Staff,
    Admin,
}

impl From<&Role> for RoleRecord {
    fn from(role: &Role) -> Self {
        match role {
            Role::Donor { blood_type } => Self::Donor {
                blood_type: *blood_type,
            },
            Role::Requestor { hospital } => Self::Requestor {
                hospital: hospital.as_ref().map(|h| h.as_str().to_string()),
            },
            Role::Staff => Self::Staff,
            Role::Admin => Self::Admin,
        }
    }
}

impl From<RoleRecord> for Role {
    fn from(role: RoleRecord) -> Self {
        match role {
            RoleRecord::Donor { blood_type } => Self::Donor { blood_type },
            RoleRecord::Requestor { hospital } => Self::Requestor {
                hospital: hospital.and_then(|h| NonEmptyString::new(h.trim().to_string()).ok()),
            },
            RoleRecord::Staff => Self::Staff,
            RoleRecord::Admin => Self::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_version")]
pub(crate) enum UserRecord {
    #[serde(rename = "1")]
    V1 {
        id: String,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contact: Option<String>,
        role: RoleRecord,
    },
}

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self::V1 {
            id: user.id.to_string(),
            name: user.name.as_str().to_string(),
            contact: user.contact.as_ref().map(|c| c.as_str().to_string()),
            role: RoleRecord::from(&user.role),
        }
    }
}

impl UserRecord {
    pub(crate) fn load_into(self, users: &mut Users) -> Result<(), Error> {
        match self {
            Self::V1 {
                id,
                name,
                contact,
                role,
            } => users.register(User::new(&id, &name, contact.as_deref(), role.into())?),
        }
    }
}

/// The next ids to hand out, so that ids of deleted records are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SequenceVersions", into = "SequenceVersions")]
pub(crate) struct Sequences {
    pub(crate) next_unit: UnitId,
    pub(crate) next_request: RequestId,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum SequenceVersions {
    #[serde(rename = "1")]
    V1 {
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        next_unit: UnitId,
        #[serde(serialize_with = "as_string", deserialize_with = "from_string")]
        next_request: RequestId,
    },
}

impl From<SequenceVersions> for Sequences {
    fn from(versions: SequenceVersions) -> Self {
        match versions {
            SequenceVersions::V1 {
                next_unit,
                next_request,
            } => Self {
                next_unit,
                next_request,
            },
        }
    }
}

impl From<Sequences> for SequenceVersions {
    fn from(sequences: Sequences) -> Self {
        Self::V1 {
            next_unit: sequences.next_unit,
            next_request: sequences.next_request,
        }
    }
}
