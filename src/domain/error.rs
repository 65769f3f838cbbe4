use super::{
    BloodType, InvalidBloodTypeError, InvalidDateError, InvalidQuantityError, RequestId,
    RequestStatus, UnitId, UserId,
};

/// Errors returned by inventory, ledger, and reconciliation operations.
///
/// Every variant is recoverable. An operation that returns an error has not
/// mutated any state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Text that does not name one of the eight blood types.
    #[error(transparent)]
    InvalidBloodType(#[from] InvalidBloodTypeError),

    /// A zero or negative amount where a positive one is required.
    #[error(transparent)]
    InvalidQuantity(#[from] InvalidQuantityError),

    /// Text that is not a plausible calendar date.
    #[error(transparent)]
    InvalidDate(#[from] InvalidDateError),

    /// A required reference (requestor, user name, ...) was blank.
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),

    /// No request with the given id exists.
    #[error("request {0} not found")]
    RequestNotFound(RequestId),

    /// No unit with the given id exists.
    #[error("unit {0} not found")]
    UnitNotFound(UnitId),

    /// A unit with the given id is already in stock.
    #[error("unit {0} already exists")]
    DuplicateUnit(UnitId),

    /// A request with the given id is already in the ledger.
    #[error("request {0} already exists")]
    DuplicateRequest(RequestId),

    /// No user with the given id exists.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A user with the given id is already registered.
    #[error("user {0} already exists")]
    DuplicateUser(UserId),

    /// The request has already been fulfilled or cancelled.
    #[error("request {id} is {status}, not pending")]
    RequestNotPending {
        /// The request.
        id: RequestId,
        /// Its current, terminal, status.
        status: RequestStatus,
    },

    /// The requested status change is not one of the permitted transitions.
    #[error("request {id} cannot move from {from} to {to}")]
    IllegalStateTransition {
        /// The request.
        id: RequestId,
        /// Current status.
        from: RequestStatus,
        /// Rejected target status.
        to: RequestStatus,
    },

    /// A planned allocation no longer matches the unit it draws from, which
    /// has been removed or now holds less than the planned draw.
    #[error("allocation is stale: unit {0} no longer holds its planned draw")]
    StaleAllocation(UnitId),

    /// Not enough usable stock of a blood type.
    #[error("insufficient {blood_type} stock: {requested} requested, {available} available")]
    InsufficientStock {
        /// The blood type.
        blood_type: BloodType,
        /// The amount asked for.
        requested: u64,
        /// The usable amount on hand.
        available: u64,
    },
}

/// Result alias for domain operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
