use std::{fmt, str::FromStr};

/// One of the eight ABO/Rh blood groups.
///
/// Free text is converted into a [`BloodType`] once, at the boundary, and is
/// never carried around as a string afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BloodType {
    /// A, Rh positive.
    APositive,
    /// A, Rh negative.
    ANegative,
    /// B, Rh positive.
    BPositive,
    /// B, Rh negative.
    BNegative,
    /// AB, Rh positive.
    AbPositive,
    /// AB, Rh negative.
    AbNegative,
    /// O, Rh positive.
    OPositive,
    /// O, Rh negative.
    ONegative,
}

impl BloodType {
    /// Every blood type, in catalogue order.
    pub const ALL: [Self; 8] = [
        Self::APositive,
        Self::ANegative,
        Self::BPositive,
        Self::BNegative,
        Self::AbPositive,
        Self::AbNegative,
        Self::OPositive,
        Self::ONegative,
    ];

    /// The canonical code, e.g. `AB-`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::APositive => "A+",
            Self::ANegative => "A-",
            Self::BPositive => "B+",
            Self::BNegative => "B-",
            Self::AbPositive => "AB+",
            Self::AbNegative => "AB-",
            Self::OPositive => "O+",
            Self::ONegative => "O-",
        }
    }

    /// Position in [`BloodType::ALL`].
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// Returns `true` if `s` names a blood type, ignoring case and
    /// surrounding whitespace.
    #[must_use]
    pub fn is_valid(s: &str) -> bool {
        Self::normalize(s).is_ok()
    }

    /// Converts free text into a [`BloodType`].
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace, so
    /// `" ab- "` is accepted as [`BloodType::AbNegative`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBloodTypeError`] if the text is not one of the eight
    /// canonical codes.
    pub fn normalize(s: &str) -> Result<Self, InvalidBloodTypeError> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|blood_type| blood_type.code() == upper)
            .ok_or_else(|| InvalidBloodTypeError(s.to_string()))
    }
}

impl fmt::Display for BloodType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for BloodType {
    type Err = InvalidBloodTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalize(s)
    }
}

impl TryFrom<&str> for BloodType {
    type Error = InvalidBloodTypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::normalize(value)
    }
}

/// Error returned when text does not name one of the eight blood types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Invalid blood type '{0}': must be one of A+, A-, B+, B-, AB+, AB-, O+, O-")]
pub struct InvalidBloodTypeError(pub(crate) String);

impl InvalidBloodTypeError {
    /// The rejected input.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.0
    }
}
