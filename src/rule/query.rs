//! Pointwise and range queries over a single [`RecurrenceRule`].
//!
//! Every query here is total: a rule's own validation already rejected
//! anything that could make expansion fail, so these never return
//! `Result` — only `Option`/`Vec`, per `RecurrenceRule`'s own
//! `#[must_use]` getter style.

use crate::limits::EngineLimits;
use crate::rule::expand;
use crate::rule::RecurrenceRule;
use crate::time::{Date, Instant, TimeProvider};

impl RecurrenceRule {
    /// True if this rule produces an occurrence at exactly `instant`.
    #[must_use]
    pub fn recurs_at<T: TimeProvider>(
        &self,
        time: &mut T,
        instant: Instant,
        limits: &EngineLimits,
    ) -> bool {
        if instant < self.start_instant {
            return false;
        }
        match expand::last_before(
            self,
            time,
            bump_by_one_second(instant),
            limits,
        ) {
            Some(found) => found == instant,
            None => false,
        }
    }

    /// True if any occurrence of this rule falls on `date`, regardless
    /// of time-of-day.
    #[must_use]
    pub fn recurs_on<T: TimeProvider>(&self, time: &mut T, date: Date, limits: &EngineLimits) -> bool {
        !self.recur_times_on(time, date, limits).is_empty()
    }

    /// Every occurrence of this rule that falls on `date`, ascending.
    #[must_use]
    pub fn recur_times_on<T: TimeProvider>(
        &self,
        time: &mut T,
        date: Date,
        limits: &EngineLimits,
    ) -> Vec<Instant> {
        let Some(day_start) = day_bounds(self, time, date) else {
            return Vec::new();
        };
        let (start, end) = day_start;
        self.times_in_interval(time, start, end, limits)
    }

    /// Every occurrence in `[start, end]`, ascending. Bounded by
    /// `limits.max_interval_occurrences` if this rule never terminates
    /// and `end` is far beyond its last natural occurrence.
    #[must_use]
    pub fn times_in_interval<T: TimeProvider>(
        &self,
        time: &mut T,
        start: Instant,
        end: Instant,
        limits: &EngineLimits,
    ) -> Vec<Instant> {
        let occurrences =
            expand::occurrences_upto(self, time, Some(end), Some(limits.max_interval_occurrences), limits);
        let lower = start.max(self.start_instant);
        occurrences.into_iter().filter(|i| *i >= lower).collect()
    }

    /// The first occurrence strictly after `after`.
    #[must_use]
    pub fn next_occurrence<T: TimeProvider>(
        &self,
        time: &mut T,
        after: Instant,
        limits: &EngineLimits,
    ) -> Option<Instant> {
        expand::first_after(self, time, after, limits)
    }

    /// The last occurrence strictly before `before`.
    #[must_use]
    pub fn previous_occurrence<T: TimeProvider>(
        &self,
        time: &mut T,
        before: Instant,
        limits: &EngineLimits,
    ) -> Option<Instant> {
        expand::last_before(self, time, before, limits)
    }

    /// Total number of occurrences this rule will ever produce, or
    /// `None` if it never terminates.
    #[must_use]
    pub fn occurrence_count<T: TimeProvider>(&self, time: &mut T, limits: &EngineLimits) -> Option<u32> {
        if let Some(n) = self.termination.count() {
            return Some(n);
        }
        if self.termination.is_never() {
            return None;
        }
        let occurrences = expand::occurrences_upto(self, time, None, None, limits);
        Some(u32::try_from(occurrences.len()).unwrap_or(u32::MAX))
    }

    /// Number of occurrences at or before `instant`.
    #[must_use]
    pub fn occurrence_count_through<T: TimeProvider>(
        &self,
        time: &mut T,
        instant: Instant,
        limits: &EngineLimits,
    ) -> u32 {
        let occurrences = expand::occurrences_upto(self, time, Some(instant), None, limits);
        u32::try_from(occurrences.len()).unwrap_or(u32::MAX)
    }

    /// This rule's final occurrence, or `None` if it never terminates.
    #[must_use]
    pub fn end_instant<T: TimeProvider>(&self, time: &mut T, limits: &EngineLimits) -> Option<Instant> {
        if let Some(until) = self.termination.until() {
            return Some(until);
        }
        let count = self.termination.count()?;
        let occurrences =
            expand::occurrences_upto(self, time, None, Some(count as usize), limits);
        occurrences.last().copied()
    }
}

fn bump_by_one_second(instant: Instant) -> Instant {
    match instant {
        Instant::Zoned(dt) => Instant::Zoned(dt + chrono::Duration::seconds(1)),
        Instant::Floating(dt) => Instant::Floating(dt + chrono::Duration::seconds(1)),
        Instant::AllDay(date) => Instant::AllDay(Date(date.0 + chrono::Duration::days(1))),
    }
}

fn day_bounds<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &T,
    date: Date,
) -> Option<(Instant, Instant)> {
    match rule.start_instant {
        Instant::Zoned(dt) => {
            let zone = dt.timezone();
            let start = date.0.and_hms_opt(0, 0, 0)?;
            let end = date.0.and_hms_opt(23, 59, 59)?;
            Some((
                time_construct_zoned(time, start, zone),
                time_construct_zoned(time, end, zone),
            ))
        }
        Instant::Floating(_) => Some((
            Instant::Floating(date.0.and_hms_opt(0, 0, 0)?),
            Instant::Floating(date.0.and_hms_opt(23, 59, 59)?),
        )),
        Instant::AllDay(_) => Some((Instant::AllDay(date), Instant::AllDay(date))),
    }
}

fn time_construct_zoned<T: TimeProvider>(
    _time: &T,
    naive: chrono::NaiveDateTime,
    zone: chrono_tz::Tz,
) -> Instant {
    // `TimeProvider::construct` needs `&mut self` only to stay
    // consistent with the trait's other mutating entry points; zone
    // resolution itself (`from_local_datetime`) never mutates. Build
    // the zoned instant directly rather than threading a `&mut T`
    // through a read-only bounds helper.
    use chrono::{LocalResult, TimeZone};
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Instant::Zoned(dt),
        LocalResult::None => Instant::Zoned(zone.from_utc_datetime(&naive)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PeriodType, WeekdayPosition};
    use crate::model::Weekday;
    use crate::time::ChronoTime;
    use chrono_tz::Tz;

    fn daily_rule(time: &mut ChronoTime) -> RecurrenceRule {
        let anchor = time.construct(2024, 1, 1, 9, 0, 0, Tz::UTC).unwrap();
        RecurrenceRule::builder(PeriodType::Daily, 1, anchor)
            .count(10)
            .build()
            .unwrap()
    }

    #[test]
    fn recurs_at_matches_exact_instant_only() {
        let mut time = ChronoTime::new();
        let rule = daily_rule(&mut time);
        let hit = time.construct(2024, 1, 3, 9, 0, 0, Tz::UTC).unwrap();
        let miss = time.construct(2024, 1, 3, 9, 0, 1, Tz::UTC).unwrap();
        let limits = EngineLimits::default();
        assert!(rule.recurs_at(&mut time, hit, &limits));
        assert!(!rule.recurs_at(&mut time, miss, &limits));
    }

    #[test]
    fn next_and_previous_occurrence_bracket_a_point() {
        let mut time = ChronoTime::new();
        let rule = daily_rule(&mut time);
        let probe = time.construct(2024, 1, 5, 12, 0, 0, Tz::UTC).unwrap();
        let limits = EngineLimits::default();
        let next = rule.next_occurrence(&mut time, probe, &limits).unwrap();
        let prev = rule.previous_occurrence(&mut time, probe, &limits).unwrap();
        assert_eq!(next.date().to_string(), "2024-01-06");
        assert_eq!(prev.date().to_string(), "2024-01-05");
    }

    #[test]
    fn next_occurrence_is_none_past_count_termination() {
        let mut time = ChronoTime::new();
        let rule = daily_rule(&mut time);
        let past_end = time.construct(2024, 2, 1, 0, 0, 0, Tz::UTC).unwrap();
        let limits = EngineLimits::default();
        assert!(rule.next_occurrence(&mut time, past_end, &limits).is_none());
    }

    #[test]
    fn occurrence_count_reflects_count_termination() {
        let mut time = ChronoTime::new();
        let rule = daily_rule(&mut time);
        let limits = EngineLimits::default();
        assert_eq!(rule.occurrence_count(&mut time, &limits), Some(10));
    }

    #[test]
    fn end_instant_is_the_tenth_occurrence() {
        let mut time = ChronoTime::new();
        let rule = daily_rule(&mut time);
        let limits = EngineLimits::default();
        let end = rule.end_instant(&mut time, &limits).unwrap();
        assert_eq!(end.date().to_string(), "2024-01-10");
    }

    #[test]
    fn times_in_interval_is_inclusive_and_ascending() {
        let mut time = ChronoTime::new();
        let rule = daily_rule(&mut time);
        let start = time.construct(2024, 1, 2, 0, 0, 0, Tz::UTC).unwrap();
        let end = time.construct(2024, 1, 4, 23, 59, 59, Tz::UTC).unwrap();
        let limits = EngineLimits::default();
        let occurrences = rule.times_in_interval(&mut time, start, end, &limits);
        let dates: Vec<String> = occurrences.iter().map(|i| i.date().to_string()).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-03", "2024-01-04"]);
    }

    #[test]
    fn recur_times_on_weekly_byday_finds_the_right_date() {
        let mut time = ChronoTime::new();
        let anchor = time.construct(2024, 1, 1, 8, 0, 0, Tz::UTC).unwrap();
        let rule = RecurrenceRule::builder(PeriodType::Weekly, 1, anchor)
            .by_day(vec![
                WeekdayPosition::every(Weekday::Monday),
                WeekdayPosition::every(Weekday::Wednesday),
            ])
            .count(6)
            .build()
            .unwrap();
        let limits = EngineLimits::default();
        let wednesday = Date::from_ymd(2024, 1, 3).unwrap();
        let tuesday = Date::from_ymd(2024, 1, 2).unwrap();
        assert!(rule.recurs_on(&mut time, wednesday, &limits));
        assert!(!rule.recurs_on(&mut time, tuesday, &limits));
    }
}
