use std::fmt;

/// Day of the week, RFC 5545 two-letter form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    /// Returns the two-letter abbreviation (`MO`, `TU`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
            Self::Sunday => "SU",
        }
    }

    /// Parses a weekday from its two-letter abbreviation (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "MO" => Self::Monday,
            "TU" => Self::Tuesday,
            "WE" => Self::Wednesday,
            "TH" => Self::Thursday,
            "FR" => Self::Friday,
            "SA" => Self::Saturday,
            "SU" => Self::Sunday,
            _ => return None,
        })
    }

    /// All seven weekdays starting Monday.
    #[must_use]
    pub const fn all() -> [Self; 7] {
        [
            Self::Monday,
            Self::Tuesday,
            Self::Wednesday,
            Self::Thursday,
            Self::Friday,
            Self::Saturday,
            Self::Sunday,
        ]
    }

    /// Monday-based ordinal, `0..=6`. Used for week-relative arithmetic
    /// anchored at an arbitrary `weekStart`.
    #[must_use]
    pub const fn monday_index(self) -> u8 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
            Self::Saturday => 5,
            Self::Sunday => 6,
        }
    }

    /// Offset (`0..=6`) from `week_start` to `self`, wrapping forward.
    #[must_use]
    pub const fn offset_from(self, week_start: Self) -> u8 {
        let a = self.monday_index();
        let b = week_start.monday_index();
        (a + 7 - b) % 7
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(value: chrono::Weekday) -> Self {
        match value {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(value: Weekday) -> Self {
        match value {
            Weekday::Monday => Self::Mon,
            Weekday::Tuesday => Self::Tue,
            Weekday::Wednesday => Self::Wed,
            Weekday::Thursday => Self::Thu,
            Weekday::Friday => Self::Fri,
            Weekday::Saturday => Self::Sat,
            Weekday::Sunday => Self::Sun,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A `(offset, weekday)` pair as used in `BYDAY`.
///
/// `offset == 0` means "every such weekday within the period". A
/// non-zero offset means "the n-th such weekday of the enclosing MONTH
/// or YEAR, counting from the start if positive or from the end if
/// negative".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekdayPosition {
    pub offset: i8,
    pub weekday: Weekday,
}

impl WeekdayPosition {
    /// `weekday` with no offset ("every such weekday").
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self { offset: 0, weekday }
    }

    /// The n-th `weekday`, `n` in `[-53, 53]` and non-zero.
    #[must_use]
    pub const fn nth(offset: i8, weekday: Weekday) -> Self {
        Self { offset, weekday }
    }
}

impl fmt::Display for WeekdayPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset != 0 {
            write!(f, "{}", self.offset)?;
        }
        write!(f, "{}", self.weekday)
    }
}
