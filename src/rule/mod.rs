//! `RecurrenceRule`: the engine's algorithmic heart — one RFC 5545
//! RRULE/EXRULE, its expansion, and its pointwise queries.

mod expand;
pub mod query;

use crate::error::{InvalidRuleReason, Result, RuleError};
use crate::model::{PeriodType, Termination, Weekday, WeekdayPosition};
use crate::time::Instant;

/// One RFC 5545 recurrence rule: frequency, interval, limit, and
/// BY-filters.
///
/// Construct through [`RecurrenceRuleBuilder`] (`RecurrenceRule::builder`)
/// — the builder is where every invariant is enforced, so a live
/// `RecurrenceRule` is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub(crate) frequency: u32,
    pub(crate) period: PeriodType,
    pub(crate) start_instant: Instant,
    pub(crate) termination: Termination,
    pub(crate) week_start: Weekday,
    pub(crate) all_day: bool,
    pub(crate) by_second: Vec<u8>,
    pub(crate) by_minute: Vec<u8>,
    pub(crate) by_hour: Vec<u8>,
    pub(crate) by_day: Vec<WeekdayPosition>,
    pub(crate) by_month_day: Vec<i8>,
    pub(crate) by_year_day: Vec<i16>,
    pub(crate) by_week_number: Vec<i8>,
    pub(crate) by_month: Vec<u8>,
    pub(crate) by_set_pos: Vec<i16>,
}

impl RecurrenceRule {
    /// Starts building a rule for `period` at `frequency`, anchored at
    /// `start_instant`.
    #[must_use]
    pub fn builder(
        period: PeriodType,
        frequency: u32,
        start_instant: Instant,
    ) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::new(period, frequency, start_instant)
    }

    #[must_use]
    pub const fn frequency(&self) -> u32 {
        self.frequency
    }

    #[must_use]
    pub const fn period(&self) -> PeriodType {
        self.period
    }

    #[must_use]
    pub const fn start_instant(&self) -> Instant {
        self.start_instant
    }

    #[must_use]
    pub const fn termination(&self) -> Termination {
        self.termination
    }

    #[must_use]
    pub const fn week_start(&self) -> Weekday {
        self.week_start
    }

    #[must_use]
    pub const fn all_day(&self) -> bool {
        self.all_day
    }

    #[must_use]
    pub fn by_second(&self) -> &[u8] {
        &self.by_second
    }

    #[must_use]
    pub fn by_minute(&self) -> &[u8] {
        &self.by_minute
    }

    #[must_use]
    pub fn by_hour(&self) -> &[u8] {
        &self.by_hour
    }

    #[must_use]
    pub fn by_day(&self) -> &[WeekdayPosition] {
        &self.by_day
    }

    #[must_use]
    pub fn by_month_day(&self) -> &[i8] {
        &self.by_month_day
    }

    #[must_use]
    pub fn by_year_day(&self) -> &[i16] {
        &self.by_year_day
    }

    #[must_use]
    pub fn by_week_number(&self) -> &[i8] {
        &self.by_week_number
    }

    #[must_use]
    pub fn by_month(&self) -> &[u8] {
        &self.by_month
    }

    #[must_use]
    pub fn by_set_pos(&self) -> &[i16] {
        &self.by_set_pos
    }

    /// True if this rule uses a filter that always maps the
    /// classification cache to `RecurrenceKind::Other`: `BYSETPOS`,
    /// `BYWEEKNO`, `BYSECOND`, `BYMINUTE`, or `BYHOUR`.
    #[must_use]
    pub fn uses_other_classifying_filter(&self) -> bool {
        !self.by_set_pos.is_empty()
            || !self.by_week_number.is_empty()
            || !self.by_second.is_empty()
            || !self.by_minute.is_empty()
            || !self.by_hour.is_empty()
    }

    /// Cascades a new anchor onto this rule.
    pub(crate) fn set_start_instant(&mut self, instant: Instant) {
        self.start_instant = instant;
    }

    /// Cascades the all-day flag onto this rule.
    pub(crate) fn set_all_day(&mut self, all_day: bool) {
        self.all_day = all_day;
    }
}

/// Builder for [`RecurrenceRule`], enforcing every invariant at
/// `build()` time.
#[derive(Debug, Clone)]
pub struct RecurrenceRuleBuilder {
    frequency: u32,
    period: PeriodType,
    start_instant: Instant,
    termination: Termination,
    termination_conflict: bool,
    week_start: Weekday,
    all_day: bool,
    by_second: Vec<u8>,
    by_minute: Vec<u8>,
    by_hour: Vec<u8>,
    by_day: Vec<WeekdayPosition>,
    by_month_day: Vec<i8>,
    by_year_day: Vec<i16>,
    by_week_number: Vec<i8>,
    by_month: Vec<u8>,
    by_set_pos: Vec<i16>,
}

impl RecurrenceRuleBuilder {
    #[must_use]
    fn new(period: PeriodType, frequency: u32, start_instant: Instant) -> Self {
        Self {
            frequency,
            period,
            start_instant,
            termination: Termination::Never,
            termination_conflict: false,
            week_start: Weekday::Monday,
            all_day: start_instant.is_all_day(),
            by_second: Vec::new(),
            by_minute: Vec::new(),
            by_hour: Vec::new(),
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_year_day: Vec::new(),
            by_week_number: Vec::new(),
            by_month: Vec::new(),
            by_set_pos: Vec::new(),
        }
    }

    #[must_use]
    pub fn count(mut self, n: u32) -> Self {
        if matches!(self.termination, Termination::Until(_)) {
            self.termination_conflict = true;
        }
        self.termination = Termination::Count(n);
        self
    }

    #[must_use]
    pub fn until(mut self, instant: Instant) -> Self {
        if matches!(self.termination, Termination::Count(_)) {
            self.termination_conflict = true;
        }
        self.termination = Termination::Until(instant);
        self
    }

    #[must_use]
    pub fn week_start(mut self, weekday: Weekday) -> Self {
        self.week_start = weekday;
        self
    }

    #[must_use]
    pub fn all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    #[must_use]
    pub fn by_second(mut self, values: Vec<u8>) -> Self {
        self.by_second = values;
        self
    }

    #[must_use]
    pub fn by_minute(mut self, values: Vec<u8>) -> Self {
        self.by_minute = values;
        self
    }

    #[must_use]
    pub fn by_hour(mut self, values: Vec<u8>) -> Self {
        self.by_hour = values;
        self
    }

    #[must_use]
    pub fn by_day(mut self, values: Vec<WeekdayPosition>) -> Self {
        self.by_day = values;
        self
    }

    #[must_use]
    pub fn by_month_day(mut self, values: Vec<i8>) -> Self {
        self.by_month_day = values;
        self
    }

    #[must_use]
    pub fn by_year_day(mut self, values: Vec<i16>) -> Self {
        self.by_year_day = values;
        self
    }

    #[must_use]
    pub fn by_week_number(mut self, values: Vec<i8>) -> Self {
        self.by_week_number = values;
        self
    }

    #[must_use]
    pub fn by_month(mut self, values: Vec<u8>) -> Self {
        self.by_month = values;
        self
    }

    #[must_use]
    pub fn by_set_pos(mut self, values: Vec<i16>) -> Self {
        self.by_set_pos = values;
        self
    }

    /// Validates every invariant and produces the rule.
    ///
    /// ## Errors
    ///
    /// Returns [`RuleError::InvalidRule`] if `frequency < 1`, any
    /// BY-filter value is out of its RFC 5545 domain, `BYSETPOS`
    /// contains `0`, both `COUNT` and `UNTIL` were set, or an all-day
    /// rule's start instant carries a time component.
    pub fn build(self) -> Result<RecurrenceRule> {
        if self.frequency < 1 {
            return Err(RuleError::InvalidRule(InvalidRuleReason::ZeroFrequency));
        }
        if self.termination_conflict {
            return Err(RuleError::InvalidRule(
                InvalidRuleReason::ConflictingTermination,
            ));
        }

        check_range("BYSECOND", &self.by_second, 0, 60)?;
        check_range("BYMINUTE", &self.by_minute, 0, 59)?;
        check_range("BYHOUR", &self.by_hour, 0, 23)?;
        check_split_range("BYMONTHDAY", &self.by_month_day, 1, 31)?;
        check_split_range("BYYEARDAY", &self.by_year_day, 1, 366)?;
        check_split_range("BYWEEKNO", &self.by_week_number, 1, 53)?;
        check_range("BYMONTH", &self.by_month, 1, 12)?;

        for &pos in &self.by_set_pos {
            if pos == 0 {
                return Err(RuleError::InvalidRule(InvalidRuleReason::BySetPosZero));
            }
        }
        check_split_range("BYSETPOS", &self.by_set_pos, 1, 366)?;

        for wp in &self.by_day {
            if wp.offset != 0 && !(-53..=53).contains(&wp.offset) {
                return Err(RuleError::InvalidRule(
                    InvalidRuleReason::FilterValueOutOfRange {
                        filter: "BYDAY",
                        value: i32::from(wp.offset),
                    },
                ));
            }
        }

        if self.all_day && !self.start_instant.is_all_day() {
            return Err(RuleError::InvalidRule(
                InvalidRuleReason::AllDayWithTimeComponent,
            ));
        }

        Ok(RecurrenceRule {
            frequency: self.frequency,
            period: self.period,
            start_instant: self.start_instant,
            termination: self.termination,
            week_start: self.week_start,
            all_day: self.all_day,
            by_second: self.by_second,
            by_minute: self.by_minute,
            by_hour: self.by_hour,
            by_day: self.by_day,
            by_month_day: self.by_month_day,
            by_year_day: self.by_year_day,
            by_week_number: self.by_week_number,
            by_month: self.by_month,
            by_set_pos: self.by_set_pos,
        })
    }
}

fn check_range(filter: &'static str, values: &[u8], min: u8, max: u8) -> Result<()> {
    for &v in values {
        if v < min || v > max {
            return Err(RuleError::InvalidRule(
                InvalidRuleReason::FilterValueOutOfRange {
                    filter,
                    value: i32::from(v),
                },
            ));
        }
    }
    Ok(())
}

/// Validates values drawn from `[-max..=-min] ∪ [min..=max]` — the
/// "excluding 0, counts from the end when negative" domain shared by
/// BYMONTHDAY/BYYEARDAY/BYWEEKNO/BYSETPOS.
fn check_split_range<T>(filter: &'static str, values: &[T], min: i32, max: i32) -> Result<()>
where
    T: Copy + Into<i32>,
{
    for &v in values {
        let v: i32 = v.into();
        let in_positive = (min..=max).contains(&v);
        let in_negative = (-max..=-min).contains(&v);
        if v != 0 && !in_positive && !in_negative {
            return Err(RuleError::InvalidRule(
                InvalidRuleReason::FilterValueOutOfRange { filter, value: v },
            ));
        }
    }
    Ok(())
}
