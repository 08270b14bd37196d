//! Instants, dates, and the `TimeProvider` abstraction injected into the
//! engine.
//!
//! The engine never talks to a timezone database directly; it is given a
//! `TimeProvider` implementation (production code uses [`ChronoTime`])
//! and only ever asks it a handful of calendar questions.

mod chrono_time;

pub use chrono_time::ChronoTime;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::model::weekday::Weekday;

/// A zone-agnostic calendar date, used for all-day occurrences and for
/// the explicit inclusion/exclusion date lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Date(pub NaiveDate);

impl Date {
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// An instant, in one of three forms: zoned, floating, or all-day.
///
/// `Instant` implements a total order by comparing wall-clock
/// components: this is correct and sufficient *within a consistent zone
/// frame* (the engine's contract — see the Glossary entry for "Floating
/// instant"), which is how `RecurrenceRule`/`Recurrence` always use it:
/// every occurrence of one rule is produced in the same zone as its
/// anchor. Comparing `Instant`s that were constructed in genuinely
/// different zones requires lifting one into the other's frame first,
/// via [`TimeProvider::to_zone`] — raw `Ord` does not do that for you.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instant {
    /// A date-time bound to an IANA zone (including UTC).
    Zoned(chrono::DateTime<Tz>),
    /// A wall-clock date-time with no zone binding.
    Floating(NaiveDateTime),
    /// An all-day date with no time-of-day and no zone.
    AllDay(Date),
}

impl Instant {
    #[must_use]
    pub fn zoned(dt: chrono::DateTime<Tz>) -> Self {
        Self::Zoned(dt)
    }

    #[must_use]
    pub fn floating(dt: NaiveDateTime) -> Self {
        Self::Floating(dt)
    }

    #[must_use]
    pub fn all_day(date: Date) -> Self {
        Self::AllDay(date)
    }

    /// This instant's calendar date, ignoring time-of-day and zone.
    #[must_use]
    pub fn date(self) -> Date {
        match self {
            Self::Zoned(dt) => Date(dt.naive_local().date()),
            Self::Floating(dt) => Date(dt.date()),
            Self::AllDay(d) => d,
        }
    }

    /// This instant's wall-clock time-of-day, `00:00:00` for all-day.
    #[must_use]
    pub fn time_of_day(self) -> NaiveTime {
        match self {
            Self::Zoned(dt) => dt.naive_local().time(),
            Self::Floating(dt) => dt.time(),
            Self::AllDay(_) => NaiveTime::MIN,
        }
    }

    /// True if this instant carries no time-of-day component.
    #[must_use]
    pub const fn is_all_day(self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    fn sort_key(self) -> (NaiveDate, NaiveTime) {
        (self.date().0, self.time_of_day())
    }
}

impl PartialOrd for Instant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Instant {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zoned(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%:z")),
            Self::Floating(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
            Self::AllDay(d) => write!(f, "{d}"),
        }
    }
}

/// Calendar components extracted from an `Instant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Components {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub weekday: Weekday,
    pub iso_week: u32,
    pub day_of_year: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

/// The abstraction the engine is built against. No engine type talks to
/// `chrono`/`chrono_tz` directly outside of [`ChronoTime`] — every
/// other module goes through this trait, so the engine can be
/// retargeted onto a different time library without touching the
/// expansion algorithm.
pub trait TimeProvider {
    /// Extracts calendar components, in `instant`'s own zone (or, for a
    /// floating/all-day instant, from its wall-clock fields directly).
    fn components(&self, instant: Instant) -> Components;

    /// Re-zones `instant`, preserving the absolute moment (a true zone
    /// *conversion*). All-day instants are returned unchanged, since
    /// they have no absolute moment to preserve.
    fn to_zone(&mut self, instant: Instant, zone: Tz) -> Instant;

    /// Re-stamps `instant`'s zone while preserving its wall-clock
    /// fields (a zone *shift*, as opposed to a conversion). Returns
    /// `instant` unchanged if it is all-day.
    fn shift_zone(&mut self, instant: Instant, zone: Tz) -> Instant;

    /// Builds an instant from components in `zone`. DST-ambiguous wall
    /// times resolve to the first occurrence (RFC 5545 §3.3.5); DST-gap
    /// wall times resolve to the zone's earliest valid instant at or
    /// after the requested time.
    fn construct(
        &mut self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        zone: Tz,
    ) -> Option<Instant>;

    /// Builds a floating instant from components, or `None` if they do
    /// not form a valid calendar date-time.
    fn construct_floating(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Instant>;

    /// Builds an all-day instant from components, or `None` if they do
    /// not form a valid calendar date.
    fn construct_all_day(&self, year: i32, month: u32, day: u32) -> Option<Instant>;

    /// Adds `amount * unit` to `instant`, handling DST by preserving
    /// wall-clock components across the addition. `unit`
    /// must be one of `Secondly`..`Yearly`; `Instant::None` is not a
    /// valid unit and this returns the instant unchanged in that case.
    fn add_period(
        &mut self,
        instant: Instant,
        unit: crate::model::period::PeriodType,
        amount: i64,
    ) -> Instant;

    /// The calendar date of the n-th `weekday` of `year`/`month`
    /// (1-based, from the start if `n > 0` or from the end if `n < 0`).
    /// `n == 0` is not meaningful and returns `None`.
    fn nth_weekday_of_month(
        &self,
        year: i32,
        month: u32,
        weekday: Weekday,
        n: i32,
    ) -> Option<Date>;

    /// The calendar date of the n-th `weekday` of `year` (1-based, from
    /// the start if `n > 0` or from the end if `n < 0`).
    fn nth_weekday_of_year(&self, year: i32, weekday: Weekday, n: i32) -> Option<Date>;

    /// 1-based index of `date` within its month, from the start.
    fn day_index_in_month(&self, date: Date) -> i32;

    /// 1-based index of `date` within its month, from the end (so the
    /// last day of the month is `-1`).
    fn day_index_in_month_from_end(&self, date: Date) -> i32;

    /// 1-based index of `date` within its year, from the start.
    fn day_index_in_year(&self, date: Date) -> i32;

    /// 1-based index of `date` within its year, from the end.
    fn day_index_in_year_from_end(&self, date: Date) -> i32;

    /// Number of days in `date`'s month.
    fn days_in_month(&self, year: i32, month: u32) -> u32;

    /// Number of days in `year`.
    fn days_in_year(&self, year: i32) -> u32;
}
