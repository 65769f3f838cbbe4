use chrono::NaiveDate;
use non_empty_string::NonEmptyString;

use super::{BloodType, ExpiryPolicy, UnitId};

/// A discrete donation held in stock.
///
/// Units are tracked individually, never merged, so that each keeps its own
/// donation date for expiry and first-in-first-out allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloodUnit {
    pub(crate) id: UnitId,
    pub(crate) blood_type: BloodType,
    pub(crate) quantity: u32,
    pub(crate) donation_date: NaiveDate,
    pub(crate) donor: Option<NonEmptyString>,
}

impl BloodUnit {
    /// The unit's identifier.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// The unit's blood type.
    #[must_use]
    pub const fn blood_type(&self) -> BloodType {
        self.blood_type
    }

    /// Remaining amount. Zero once fully allocated.
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// The day the blood was collected.
    #[must_use]
    pub const fn donation_date(&self) -> NaiveDate {
        self.donation_date
    }

    /// Identifier of the donor, if recorded.
    ///
    /// Informational only; the donor need not exist in any registry.
    #[must_use]
    pub fn donor(&self) -> Option<&str> {
        self.donor.as_ref().map(NonEmptyString::as_str)
    }

    /// Whether the unit has passed its shelf life on `as_of`.
    #[must_use]
    pub fn is_expired(&self, policy: &ExpiryPolicy, as_of: NaiveDate) -> bool {
        policy.is_expired(self.donation_date, as_of)
    }

    /// The amount this unit can contribute on `as_of`.
    ///
    /// A unit donated after `as_of` has not been collected yet on that day
    /// and contributes nothing, although it is not expired either.
    #[must_use]
    pub(crate) fn usable(&self, policy: &ExpiryPolicy, as_of: NaiveDate) -> u32 {
        if self.donation_date > as_of || self.is_expired(policy, as_of) {
            0
        } else {
            self.quantity
        }
    }
}
