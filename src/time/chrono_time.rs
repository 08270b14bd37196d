//! `chrono`/`chrono_tz`-backed [`TimeProvider`] implementation.
//!
//! Grounded on `rfc::ical::expand::timezone::TimeZoneResolver` (zone
//! cache, DST gap/fold handling) — the cache here is trivial (`Tz` is a
//! `Copy` enum that parses instantly) but is kept for parity with the
//! teacher's resolver shape and as a seam for a future VTIMEZONE-backed
//! resolver.

use chrono::{Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;

use super::{Components, Date, Instant, TimeProvider};
use crate::model::period::PeriodType;
use crate::model::weekday::Weekday;

/// Production [`TimeProvider`] built on `chrono` + `chrono_tz`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChronoTime;

impl ChronoTime {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn localize(naive: NaiveDateTime, zone: Tz) -> chrono::DateTime<Tz> {
        match zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt,
            // DST fold: two valid offsets exist. RFC 5545 §3.3.5 calls
            // for the first (pre-transition) occurrence.
            LocalResult::Ambiguous(first, _second) => first,
            // DST gap: no valid offset exists. Shift forward until one
            // does; gaps are at most a couple of hours in every zone
            // chrono_tz models.
            LocalResult::None => {
                let mut candidate = naive;
                loop {
                    candidate += Duration::minutes(1);
                    if let LocalResult::Single(dt) = zone.from_local_datetime(&candidate) {
                        break dt;
                    }
                }
            }
        }
    }
}

impl TimeProvider for ChronoTime {
    fn components(&self, instant: Instant) -> Components {
        let date = instant.date().0;
        let time = instant.time_of_day();
        Components {
            year: date.year(),
            month: date.month(),
            day: date.day(),
            weekday: Weekday::from(date.weekday()),
            iso_week: date.iso_week().week(),
            day_of_year: date.ordinal(),
            hour: time.hour(),
            minute: time.minute(),
            second: time.second(),
        }
    }

    fn to_zone(&mut self, instant: Instant, zone: Tz) -> Instant {
        match instant {
            Instant::Zoned(dt) => Instant::Zoned(dt.with_timezone(&zone)),
            Instant::Floating(naive) => Instant::Zoned(Self::localize(naive, zone)),
            Instant::AllDay(_) => instant,
        }
    }

    fn shift_zone(&mut self, instant: Instant, zone: Tz) -> Instant {
        match instant {
            Instant::Zoned(dt) => Instant::Zoned(Self::localize(dt.naive_local(), zone)),
            Instant::Floating(naive) => Instant::Zoned(Self::localize(naive, zone)),
            Instant::AllDay(_) => instant,
        }
    }

    fn construct(
        &mut self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        zone: Tz,
    ) -> Option<Instant> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        Some(Instant::Zoned(Self::localize(naive, zone)))
    }

    fn construct_floating(
        &self,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Option<Instant> {
        let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
        Some(Instant::Floating(naive))
    }

    fn construct_all_day(&self, year: i32, month: u32, day: u32) -> Option<Instant> {
        NaiveDate::from_ymd_opt(year, month, day).map(|d| Instant::AllDay(Date(d)))
    }

    fn add_period(&mut self, instant: Instant, unit: PeriodType, amount: i64) -> Instant {
        if amount == 0 || unit == PeriodType::None {
            return instant;
        }
        match instant {
            Instant::Zoned(dt) => {
                let shifted = add_to_naive(dt.naive_local(), unit, amount);
                Instant::Zoned(Self::localize(shifted, dt.timezone()))
            }
            Instant::Floating(naive) => Instant::Floating(add_to_naive(naive, unit, amount)),
            Instant::AllDay(Date(date)) => {
                let naive = date.and_hms_opt(0, 0, 0).unwrap_or_default();
                Instant::AllDay(Date(add_to_naive(naive, unit, amount).date()))
            }
        }
    }

    fn nth_weekday_of_month(
        &self,
        year: i32,
        month: u32,
        weekday: Weekday,
        n: i32,
    ) -> Option<Date> {
        if n == 0 {
            return None;
        }
        let cw: chrono::Weekday = weekday.into();
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let days_in_month = self.days_in_month(year, month);
        let last = NaiveDate::from_ymd_opt(year, month, days_in_month)?;
        nth_weekday_in_range(first, last, cw, n)
    }

    fn nth_weekday_of_year(&self, year: i32, weekday: Weekday, n: i32) -> Option<Date> {
        if n == 0 {
            return None;
        }
        let cw: chrono::Weekday = weekday.into();
        let first = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let last = NaiveDate::from_ymd_opt(year, 12, 31)?;
        nth_weekday_in_range(first, last, cw, n)
    }

    fn day_index_in_month(&self, date: Date) -> i32 {
        i32::try_from(date.0.day()).unwrap_or(0)
    }

    fn day_index_in_month_from_end(&self, date: Date) -> i32 {
        let days = self.days_in_month(date.0.year(), date.0.month());
        let day = i32::try_from(date.0.day()).unwrap_or(0);
        let days = i32::try_from(days).unwrap_or(0);
        -(days - day + 1)
    }

    fn day_index_in_year(&self, date: Date) -> i32 {
        i32::try_from(date.0.ordinal()).unwrap_or(0)
    }

    fn day_index_in_year_from_end(&self, date: Date) -> i32 {
        let days = i32::try_from(self.days_in_year(date.0.year())).unwrap_or(0);
        let ordinal = i32::try_from(date.0.ordinal()).unwrap_or(0);
        -(days - ordinal + 1)
    }

    fn days_in_month(&self, year: i32, month: u32) -> u32 {
        let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
        let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1);
        let first_of_this = NaiveDate::from_ymd_opt(year, month, 1);
        match (first_of_this, first_of_next) {
            (Some(this), Some(next)) => u32::try_from((next - this).num_days()).unwrap_or(30),
            _ => 30,
        }
    }

    fn days_in_year(&self, year: i32) -> u32 {
        if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
            366
        } else {
            365
        }
    }
}

/// Finds the n-th occurrence of `weekday` within `[first, last]`
/// (1-based from the start if `n > 0`, from the end if `n < 0`).
fn nth_weekday_in_range(
    first: NaiveDate,
    last: NaiveDate,
    weekday: chrono::Weekday,
    n: i32,
) -> Option<Date> {
    let first_hit_offset = i64::from(weekday.num_days_from_monday())
        - i64::from(first.weekday().num_days_from_monday());
    let first_hit_offset = ((first_hit_offset % 7) + 7) % 7;
    let first_hit = first + Duration::days(first_hit_offset);

    if n > 0 {
        let candidate = first_hit + Duration::weeks(i64::from(n - 1));
        (candidate <= last).then(|| Date(candidate))
    } else {
        let last_hit_offset = i64::from(last.weekday().num_days_from_monday())
            - i64::from(weekday.num_days_from_monday());
        let last_hit_offset = ((last_hit_offset % 7) + 7) % 7;
        let last_hit = last - Duration::days(last_hit_offset);
        let candidate = last_hit - Duration::weeks(i64::from(-n - 1));
        (candidate >= first).then(|| Date(candidate))
    }
}

/// Adds `amount * unit` to a naive date-time, preserving wall-clock
/// fields where `chrono`'s calendar arithmetic allows it (months/years
/// clamp an out-of-range day to the end of the target month, matching
/// `chrono::Months` semantics).
fn add_to_naive(naive: NaiveDateTime, unit: PeriodType, amount: i64) -> NaiveDateTime {
    match unit {
        PeriodType::Yearly => add_months(naive, amount * 12),
        PeriodType::Monthly => add_months(naive, amount),
        PeriodType::Weekly => naive + Duration::weeks(amount),
        PeriodType::Daily => naive + Duration::days(amount),
        PeriodType::Hourly => naive + Duration::hours(amount),
        PeriodType::Minutely => naive + Duration::minutes(amount),
        PeriodType::Secondly => naive + Duration::seconds(amount),
        PeriodType::None => naive,
    }
}

fn add_months(naive: NaiveDateTime, months: i64) -> NaiveDateTime {
    if months >= 0 {
        u32::try_from(months)
            .ok()
            .and_then(|m| naive.checked_add_months(Months::new(m)))
            .unwrap_or(naive)
    } else {
        u32::try_from(-months)
            .ok()
            .and_then(|m| naive.checked_sub_months(Months::new(m)))
            .unwrap_or(naive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Tz;

    #[test]
    fn nth_weekday_of_month_last_friday() {
        let time = ChronoTime::new();
        let date = time
            .nth_weekday_of_month(2023, 1, Weekday::Friday, -1)
            .expect("last Friday exists");
        assert_eq!(date.to_string(), "2023-01-27");
    }

    #[test]
    fn nth_weekday_of_month_first_monday() {
        let time = ChronoTime::new();
        let date = time
            .nth_weekday_of_month(2023, 1, Weekday::Monday, 1)
            .expect("first Monday exists");
        assert_eq!(date.to_string(), "2023-01-02");
    }

    #[test]
    fn day_index_in_month_from_end_is_minus_one_on_last_day() {
        let time = ChronoTime::new();
        let date = Date::from_ymd(2023, 1, 31).unwrap();
        assert_eq!(time.day_index_in_month_from_end(date), -1);
    }

    #[test]
    fn add_period_months_clamps_into_shorter_month() {
        let mut time = ChronoTime::new();
        let jan31 = time
            .construct(2023, 1, 31, 12, 0, 0, Tz::UTC)
            .expect("valid instant");
        let shifted = time.add_period(jan31, PeriodType::Monthly, 1);
        // chrono clamps Jan 31 + 1 month to the last day of February.
        assert_eq!(shifted.date().to_string(), "2023-02-28");
    }

    #[test]
    fn add_period_preserves_wall_clock_across_dst() {
        let mut time = ChronoTime::new();
        let before_spring_forward = time
            .construct(2023, 3, 8, 9, 30, 0, Tz::America__New_York)
            .expect("valid instant");
        let after = time.add_period(before_spring_forward, PeriodType::Weekly, 1);
        assert_eq!(after.time_of_day().to_string(), "09:30:00");
    }

    #[test]
    fn days_in_month_handles_leap_february() {
        let time = ChronoTime::new();
        assert_eq!(time.days_in_month(2024, 2), 29);
        assert_eq!(time.days_in_month(2023, 2), 28);
    }
}
