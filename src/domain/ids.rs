use std::{
    fmt,
    num::NonZeroUsize,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Errors that can occur when parsing an identifier.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseIdError {
    /// The text carries a prefix belonging to another kind of identifier.
    #[error("Invalid identifier '{0}': expected prefix {1}")]
    Prefix(String, &'static str),

    /// The numeric part is missing, not a number, or zero.
    #[error("Invalid identifier '{0}': expected a non-zero integer")]
    Number(String),
}

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroUsize);

        impl $name {
            /// The display prefix, without the trailing dash.
            pub const PREFIX: &'static str = $prefix;

            /// Wraps a raw sequence number.
            #[must_use]
            pub const fn new(value: NonZeroUsize) -> Self {
                Self(value)
            }

            /// The raw sequence number.
            #[must_use]
            pub const fn get(self) -> usize {
                self.0.get()
            }

            /// Returns a displayable representation with the number padded to
            /// `digits` places.
            #[must_use]
            pub const fn display(self, digits: usize) -> FormattedId {
                FormattedId {
                    prefix: Self::PREFIX,
                    value: self.0,
                    digits,
                }
            }
        }

        impl TryFrom<usize> for $name {
            type Error = ParseIdError;

            fn try_from(value: usize) -> Result<Self, Self::Error> {
                NonZeroUsize::new(value)
                    .map(Self)
                    .ok_or_else(|| ParseIdError::Number(value.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.display(DEFAULT_DIGITS))
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            /// Accepts `REQ-007`, `req-7` or a bare `7`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_sequential(s, Self::PREFIX).map(Self)
            }
        }
    };
}

sequential_id!(
    /// Identifier of a [`BloodUnit`](crate::BloodUnit), displayed as `BU-001`.
    UnitId,
    "BU"
);

sequential_id!(
    /// Identifier of a [`BloodRequest`](crate::BloodRequest), displayed as
    /// `REQ-001`.
    RequestId,
    "REQ"
);

const DEFAULT_DIGITS: usize = 3;

/// An identifier formatted with a fixed digit width.
///
/// Returned by [`UnitId::display`] and [`RequestId::display`].
#[derive(Debug, Clone, Copy)]
pub struct FormattedId {
    prefix: &'static str,
    value: NonZeroUsize,
    digits: usize,
}

impl fmt::Display for FormattedId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.prefix,
            self.value,
            width = self.digits
        )
    }
}

fn parse_sequential(s: &str, prefix: &'static str) -> Result<NonZeroUsize, ParseIdError> {
    let trimmed = s.trim();
    let digits = match trimmed.split_once('-') {
        Some((head, tail)) if head.eq_ignore_ascii_case(prefix) => tail,
        Some(_) => return Err(ParseIdError::Prefix(s.to_string(), prefix)),
        None => trimmed,
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseIdError::Number(s.to_string()));
    }

    digits
        .parse::<usize>()
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| ParseIdError::Number(s.to_string()))
}

/// A monotonically increasing id source.
///
/// Values handed out are never handed out again, even after the records they
/// named are removed. [`Sequence::observe`] advances the counter past ids
/// that arrive from persistence.
#[derive(Debug)]
pub(crate) struct Sequence(AtomicUsize);

impl Sequence {
    pub(crate) const fn new() -> Self {
        Self(AtomicUsize::new(1))
    }

    pub(crate) fn next(&self) -> NonZeroUsize {
        let value = self.0.fetch_add(1, Ordering::SeqCst);
        NonZeroUsize::new(value).unwrap_or(NonZeroUsize::MIN)
    }

    /// The id the next call to [`Sequence::next`] will return.
    pub(crate) fn peek(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.0.load(Ordering::SeqCst)).unwrap_or(NonZeroUsize::MIN)
    }

    /// Moves the counter forward so the next id handed out is at least `next`.
    pub(crate) fn advance_to(&self, next: NonZeroUsize) {
        self.0.fetch_max(next.get(), Ordering::SeqCst);
    }

    pub(crate) fn observe(&self, seen: NonZeroUsize) {
        self.0.fetch_max(seen.get().saturating_add(1), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(1, 3, "REQ-001"; "3 digits id 1")]
    #[test_case(42, 3, "REQ-042"; "3 digits id 42")]
    #[test_case(1000, 3, "REQ-1000"; "3 digits expansion")]
    #[test_case(7, 1, "REQ-7"; "1 digit")]
    #[test_case(7, 5, "REQ-00007"; "5 digits")]
    fn request_id_display(value: usize, digits: usize, expected: &str) {
        let id = RequestId::try_from(value).unwrap();
        assert_eq!(id.display(digits).to_string(), expected);
    }

    #[test_case("REQ-007", 7; "padded")]
    #[test_case("req-7", 7; "lowercase")]
    #[test_case("12", 12; "bare number")]
    #[test_case(" REQ-3 ", 3; "whitespace")]
    fn request_id_parses(input: &str, expected: usize) {
        let id: RequestId = input.parse().unwrap();
        assert_eq!(id.get(), expected);
    }

    #[test_case("BU-001"; "wrong prefix")]
    #[test_case("REQ-"; "missing number")]
    #[test_case("REQ-0"; "zero")]
    #[test_case("REQ-x1"; "not a number")]
    #[test_case(""; "empty")]
    fn request_id_rejects(input: &str) {
        assert!(input.parse::<RequestId>().is_err());
    }

    #[test]
    fn unit_id_uses_its_own_prefix() {
        let id: UnitId = "bu-12".parse().unwrap();
        assert_eq!(id.to_string(), "BU-012");
        assert_eq!(
            "REQ-12".parse::<UnitId>(),
            Err(ParseIdError::Prefix("REQ-12".to_string(), "BU"))
        );
    }

    #[test]
    fn sequence_never_goes_backwards() {
        let sequence = Sequence::new();
        assert_eq!(sequence.next().get(), 1);
        assert_eq!(sequence.next().get(), 2);

        sequence.observe(NonZeroUsize::new(10).unwrap());
        assert_eq!(sequence.peek().get(), 11);

        // observing an older id does not rewind
        sequence.observe(NonZeroUsize::new(4).unwrap());
        assert_eq!(sequence.next().get(), 11);
    }
}
