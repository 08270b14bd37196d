use thiserror::Error;

/// Reason a `RecurrenceRule` was rejected at construction.
///
/// Query operations never produce one of these — only construction can
/// fail; every query is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidRuleReason {
    /// `frequency` was zero (or, for the builder API, could not be made
    /// non-zero).
    ZeroFrequency,
    /// A BY-filter value fell outside its RFC 5545 domain.
    FilterValueOutOfRange {
        filter: &'static str,
        value: i32,
    },
    /// `BYSETPOS` contained a literal `0`, which is never valid.
    BySetPosZero,
    /// Both `COUNT` and `UNTIL` were supplied; RFC 5545 allows at most one.
    ConflictingTermination,
    /// An all-day rule was given a `startInstant` with a time-of-day
    /// component.
    AllDayWithTimeComponent,
}

impl std::fmt::Display for InvalidRuleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroFrequency => write!(f, "frequency must be >= 1"),
            Self::FilterValueOutOfRange { filter, value } => {
                write!(f, "{filter} value {value} is out of range")
            }
            Self::BySetPosZero => write!(f, "BYSETPOS may not contain 0"),
            Self::ConflictingTermination => {
                write!(f, "COUNT and UNTIL are mutually exclusive")
            }
            Self::AllDayWithTimeComponent => {
                write!(f, "all-day rule's start instant has a time component")
            }
        }
    }
}

/// Errors raised by this crate.
///
/// Only `RecurrenceRule` construction raises errors; every query
/// operation is total and returns `None`/`false`/an empty collection
/// instead of failing.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(InvalidRuleReason),

    #[error("failed to parse RRULE content line: {0}")]
    ParseError(String),
}

pub type Result<T> = std::result::Result<T, RuleError>;
