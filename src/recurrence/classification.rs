//! Coarse recurrence classification, cached on [`super::Recurrence`] and
//! invalidated on every mutation.

use crate::model::PeriodType;
use crate::rule::RecurrenceRule;

/// A coarse characterization of a recurrence's shape, derived from its
/// first inclusion rule.
///
/// `MonthlyDay`/`MonthlyPos` and `YearlyMonthDay`/`YearlyMonthPos` are
/// kept as distinct variants rather than aliased onto shared fields —
/// a monthly-by-day-of-month rule and a monthly-by-weekday-position rule
/// are different shapes even though both are `MONTHLY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecurrenceKind {
    /// No inclusion rules at all (the recurrence is driven only by its
    /// anchor and/or explicit RDATE/RDATETIME entries).
    None,
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    /// Monthly, selecting by day-of-month (`BYMONTHDAY`, or the
    /// anchor's day-of-month by default).
    MonthlyDay,
    /// Monthly, selecting by weekday position (`BYDAY` with a non-zero
    /// offset, e.g. "the last Friday").
    MonthlyPos,
    /// Yearly, selecting a specific month and day-of-month.
    YearlyMonthDay,
    /// Yearly, selecting a specific month and weekday position within
    /// it (e.g. "the first Monday of March").
    YearlyMonthPos,
    /// Yearly, selecting by day-of-year (`BYYEARDAY`).
    YearlyDay,
    /// Yearly, selecting by weekday position with no month restriction.
    YearlyPos,
    /// Any rule using `BYSETPOS`, `BYWEEKNO`, `BYSECOND`, `BYMINUTE`, or
    /// `BYHOUR` — these don't fit a simple named shape.
    Other,
}

impl RecurrenceKind {
    #[must_use]
    pub fn classify(rule: &RecurrenceRule) -> Self {
        if rule.uses_other_classifying_filter() {
            return Self::Other;
        }
        match rule.period() {
            PeriodType::None => Self::Other,
            PeriodType::Secondly => Self::Secondly,
            PeriodType::Minutely => Self::Minutely,
            PeriodType::Hourly => Self::Hourly,
            PeriodType::Daily => Self::Daily,
            PeriodType::Weekly => Self::Weekly,
            PeriodType::Monthly => {
                let positional = rule.by_day().iter().any(|wp| wp.offset != 0);
                if rule.by_month_day().is_empty() && positional {
                    Self::MonthlyPos
                } else {
                    Self::MonthlyDay
                }
            }
            PeriodType::Yearly => classify_yearly(rule),
        }
    }
}

fn classify_yearly(rule: &RecurrenceRule) -> RecurrenceKind {
    if !rule.by_year_day().is_empty() {
        return RecurrenceKind::YearlyDay;
    }
    let has_month = !rule.by_month().is_empty();
    let positional = rule.by_day().iter().any(|wp| wp.offset != 0);
    match (has_month, positional) {
        (true, true) => RecurrenceKind::YearlyMonthPos,
        (true, false) => RecurrenceKind::YearlyMonthDay,
        (false, true) => RecurrenceKind::YearlyPos,
        (false, false) => RecurrenceKind::YearlyMonthDay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Weekday, WeekdayPosition};
    use crate::time::{ChronoTime, TimeProvider};
    use chrono_tz::Tz;

    fn anchor(time: &mut ChronoTime) -> crate::time::Instant {
        time.construct(2023, 1, 31, 17, 0, 0, Tz::UTC).unwrap()
    }

    #[test]
    fn monthly_day_rule_classifies_as_monthly_day() {
        let mut time = ChronoTime::new();
        let a = anchor(&mut time);
        let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, a)
            .by_month_day(vec![31])
            .build()
            .unwrap();
        assert_eq!(RecurrenceKind::classify(&rule), RecurrenceKind::MonthlyDay);
    }

    #[test]
    fn monthly_last_friday_classifies_as_monthly_pos() {
        let mut time = ChronoTime::new();
        let a = anchor(&mut time);
        let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, a)
            .by_day(vec![WeekdayPosition::nth(-1, Weekday::Friday)])
            .build()
            .unwrap();
        assert_eq!(RecurrenceKind::classify(&rule), RecurrenceKind::MonthlyPos);
    }

    #[test]
    fn yearly_byyearday_classifies_as_yearly_day() {
        let mut time = ChronoTime::new();
        let a = anchor(&mut time);
        let rule = RecurrenceRule::builder(PeriodType::Yearly, 1, a)
            .by_year_day(vec![60])
            .build()
            .unwrap();
        assert_eq!(RecurrenceKind::classify(&rule), RecurrenceKind::YearlyDay);
    }

    #[test]
    fn yearly_feb29_classifies_as_yearly_month_day() {
        let mut time = ChronoTime::new();
        let a = anchor(&mut time);
        let rule = RecurrenceRule::builder(PeriodType::Yearly, 1, a)
            .by_month(vec![2])
            .by_month_day(vec![29])
            .build()
            .unwrap();
        assert_eq!(
            RecurrenceKind::classify(&rule),
            RecurrenceKind::YearlyMonthDay
        );
    }

    #[test]
    fn bysetpos_rule_always_classifies_as_other() {
        let mut time = ChronoTime::new();
        let a = anchor(&mut time);
        let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, a)
            .by_day(vec![
                WeekdayPosition::every(Weekday::Monday),
                WeekdayPosition::every(Weekday::Friday),
            ])
            .by_set_pos(vec![-1])
            .build()
            .unwrap();
        assert_eq!(RecurrenceKind::classify(&rule), RecurrenceKind::Other);
    }
}
