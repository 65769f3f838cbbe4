use chrono::NaiveDate;

/// Whole-blood shelf life, in days.
pub const SHELF_LIFE_DAYS: i64 = 42;

/// Decides whether a unit is still usable on a given day.
///
/// Elapsed time is the exact number of calendar days between the two dates,
/// so month lengths and leap years are accounted for. A unit donated on day
/// `d` is usable through `d + 41` and expired from `d + 42` onwards. A
/// donation dated after `as_of` is not expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    shelf_life_days: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            shelf_life_days: SHELF_LIFE_DAYS,
        }
    }
}

impl ExpiryPolicy {
    /// Returns `true` if a unit donated on `donation_date` has reached the end
    /// of its shelf life by `as_of`.
    #[must_use]
    pub fn is_expired(&self, donation_date: NaiveDate, as_of: NaiveDate) -> bool {
        Self::elapsed_days(donation_date, as_of) >= self.shelf_life_days
    }

    /// The last day on which a unit donated on `donation_date` may be used.
    #[must_use]
    pub fn last_usable_day(&self, donation_date: NaiveDate) -> Option<NaiveDate> {
        donation_date.checked_add_days(chrono::Days::new(
            u64::try_from(self.shelf_life_days - 1).unwrap_or_default(),
        ))
    }

    fn elapsed_days(from: NaiveDate, to: NaiveDate) -> i64 {
        to.signed_duration_since(from).num_days()
    }
}
