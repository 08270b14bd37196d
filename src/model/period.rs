use std::fmt;

/// Base recurrence frequency (RFC 5545 `FREQ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodType {
    None,
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl PeriodType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Self::Secondly,
            "MINUTELY" => Self::Minutely,
            "HOURLY" => Self::Hourly,
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }

    /// Coarseness rank used by the BY-filter expand-vs-limit rule: a
    /// filter at a unit coarser than `self` expands, finer-or-equal
    /// limits. Lower rank = coarser.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Yearly => 0,
            Self::Monthly => 1,
            Self::Weekly => 2,
            Self::Daily => 3,
            Self::Hourly => 4,
            Self::Minutely => 5,
            Self::Secondly => 6,
            Self::None => 7,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trip() {
        for p in [
            PeriodType::Secondly,
            PeriodType::Minutely,
            PeriodType::Hourly,
            PeriodType::Daily,
            PeriodType::Weekly,
            PeriodType::Monthly,
            PeriodType::Yearly,
        ] {
            assert_eq!(PeriodType::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn yearly_is_coarsest() {
        assert!(PeriodType::Yearly.rank() < PeriodType::Monthly.rank());
        assert!(PeriodType::Monthly.rank() < PeriodType::Weekly.rank());
        assert!(PeriodType::Daily.rank() < PeriodType::Secondly.rank());
    }
}
