use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use non_empty_string::NonEmptyString;

use super::{BloodType, Quantity, RequestId};

/// Lifecycle state of a [`BloodRequest`].
///
/// ```text
/// Pending ──fulfil──> Fulfilled
///    └─────cancel──> Cancelled
/// ```
///
/// `Fulfilled` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestStatus {
    /// Awaiting fulfilment.
    Pending,
    /// Stock has been allocated.
    Fulfilled,
    /// Withdrawn before any stock was allocated.
    Cancelled,
}

impl RequestStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::Fulfilled, Self::Cancelled];

    /// Returns `true` for `Fulfilled` and `Cancelled`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns `true` if moving from `self` to `next` is permitted.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Fulfilled | Self::Cancelled)
        )
    }

    /// Lowercase name used in files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| format!("unknown request status '{s}'"))
    }
}

/// A request for a quantity of one blood type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloodRequest {
    pub(crate) id: RequestId,
    pub(crate) requestor: NonEmptyString,
    pub(crate) blood_type: BloodType,
    pub(crate) quantity: Quantity,
    pub(crate) request_date: NaiveDate,
    pub(crate) status: RequestStatus,
}

impl BloodRequest {
    /// The request's identifier.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Identifier of the requesting party.
    #[must_use]
    pub fn requestor(&self) -> &str {
        self.requestor.as_str()
    }

    /// The blood type asked for.
    #[must_use]
    pub const fn blood_type(&self) -> BloodType {
        self.blood_type
    }

    /// The amount asked for.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// The day the request was raised.
    #[must_use]
    pub const fn request_date(&self) -> NaiveDate {
        self.request_date
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn status(&self) -> RequestStatus {
        self.status
    }

    /// Shorthand for `status() == RequestStatus::Pending`.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }
}
