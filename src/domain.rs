//! Domain models for blood bank stock and requests.
//!
//! This module contains the value types (blood types, identifiers,
//! quantities, dates), the expiry rule, the two stores, and the engine that
//! reconciles them. Nothing here touches the filesystem or reads the clock.

mod blood_type;
pub use blood_type::{BloodType, InvalidBloodTypeError};

mod config;
pub use config::Config;

mod date;
pub use date::{parse_date, DateFormat, InvalidDateError, MAX_YEAR, MIN_YEAR};

mod engine;
pub use engine::{Fulfilment, ReconciliationEngine};

mod error;
pub use error::{Error, Result};

mod expiry;
pub use expiry::{ExpiryPolicy, SHELF_LIFE_DAYS};

/// Unit and request identifiers.
pub mod ids;
pub use ids::{FormattedId, ParseIdError, RequestId, UnitId};

/// Stock held per blood type.
pub mod inventory;
pub use inventory::{Allocation, Draw, InventoryStore, PurgeReport};

mod ledger;
pub use ledger::RequestLedger;

mod quantity;
pub use quantity::{InvalidQuantityError, Quantity};

mod request;
pub use request::{BloodRequest, RequestStatus};

mod unit;
pub use unit::BloodUnit;

/// Registered users and their roles.
pub mod user;
pub use user::{Role, User, UserId, Users};
