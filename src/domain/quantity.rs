use std::{fmt, num::NonZeroU32};

/// A strictly positive amount of blood, in whole units.
///
/// Constructed from a signed integer so that the negative and zero inputs
/// the surrounding layers may pass through are rejected here rather than
/// wrapped or truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(NonZeroU32);

impl Quantity {
    /// Creates a new `Quantity`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidQuantityError`] if `value` is zero, negative, or too
    /// large to represent.
    pub fn new(value: i64) -> Result<Self, InvalidQuantityError> {
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(InvalidQuantityError(value))
    }

    /// The amount as an unsigned integer.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl From<NonZeroU32> for Quantity {
    fn from(value: NonZeroU32) -> Self {
        Self(value)
    }
}

impl TryFrom<i64> for Quantity {
    type Error = InvalidQuantityError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error returned when an amount is not a positive integer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid quantity {0}: must be a positive whole number")]
pub struct InvalidQuantityError(pub(crate) i64);

impl InvalidQuantityError {
    /// The rejected amount.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1; "one")]
    #[test_case(450; "typical")]
    #[test_case(i64::from(u32::MAX); "largest")]
    fn accepts_positive(value: i64) {
        assert_eq!(i64::from(Quantity::new(value).unwrap().get()), value);
    }

    #[test_case(0; "zero")]
    #[test_case(-1; "negative")]
    #[test_case(i64::from(u32::MAX) + 1; "overflow")]
    fn rejects(value: i64) {
        assert_eq!(Quantity::new(value), Err(InvalidQuantityError(value)));
    }
}
