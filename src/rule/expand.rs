//! The expansion algorithm: base period iteration, per-period BY-filter
//! expand/limit, BYSETPOS selection, and termination.
//!
//! Most RRULE consumers delegate this to an external `rrule` crate; this
//! module *is* that crate's job, written directly against
//! [`TimeProvider`] rather than wrapping it, since reimplementing RFC
//! 5545 expansion is this engine's whole purpose.

use chrono::Datelike;

use crate::limits::EngineLimits;
use crate::model::{PeriodType, Weekday, WeekdayPosition};
use crate::rule::RecurrenceRule;
use crate::time::{Components, Date, Instant, TimeProvider};

/// Generates occurrences in ascending order, bounded by whichever of
/// `rule`'s own termination, `hard_upper`, or `hard_count` binds first.
/// Shared by every public query in `rule::query` and `recurrence`.
pub(crate) fn occurrences_upto<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    hard_upper: Option<Instant>,
    hard_count: Option<usize>,
    limits: &EngineLimits,
) -> Vec<Instant> {
    let mut results = Vec::new();

    let count_cap = rule.termination.count().map(|n| n as usize);
    let effective_cap = min_option(count_cap, hard_count);
    let effective_upper = min_option(rule.termination.until(), hard_upper);

    let mut period_index: i64 = 0;
    let mut empty_periods_in_a_row: u32 = 0;

    loop {
        let period_anchor = period_anchor_for_index(rule, time, period_index);

        if let Some(upper) = effective_upper {
            if period_anchor > upper {
                break;
            }
        }

        let candidates = candidates_for_period(rule, time, period_index, period_anchor);

        if candidates.is_empty() {
            empty_periods_in_a_row += 1;
        } else {
            empty_periods_in_a_row = 0;
        }

        for candidate in candidates {
            if candidate < rule.start_instant {
                continue;
            }
            if let Some(upper) = effective_upper {
                if candidate > upper {
                    continue;
                }
            }
            results.push(candidate);
            if let Some(cap) = effective_cap {
                if results.len() >= cap {
                    return results;
                }
            }
        }

        period_index += 1;

        if empty_periods_in_a_row > limits.max_interval_occurrences as u32 {
            tracing::debug!(
                period_index,
                "expansion gave up: no candidates in {} consecutive periods",
                empty_periods_in_a_row
            );
            break;
        }
        if effective_upper.is_none() && effective_cap.is_none() {
            // Never-terminated rule with no caller-supplied bound: this
            // would otherwise run forever. Guard against it.
            if period_index > i64::from(limits.max_interval_occurrences as u32) {
                break;
            }
        }
    }

    results
}

/// The first occurrence strictly after `after`, or `None` if the rule
/// never produces one (termination reached first).
pub(crate) fn first_after<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    after: Instant,
    limits: &EngineLimits,
) -> Option<Instant> {
    let until_bound = rule.termination.until();
    let count_cap = rule.termination.count();

    let mut period_index: i64 = 0;
    let mut produced: u32 = 0;
    let mut empty_periods_in_a_row: u32 = 0;

    loop {
        let period_anchor = period_anchor_for_index(rule, time, period_index);
        if let Some(until) = until_bound {
            if period_anchor > until {
                return None;
            }
        }

        let candidates = candidates_for_period(rule, time, period_index, period_anchor);
        if candidates.is_empty() {
            empty_periods_in_a_row += 1;
        } else {
            empty_periods_in_a_row = 0;
        }

        for candidate in candidates {
            if candidate < rule.start_instant {
                continue;
            }
            if let Some(until) = until_bound {
                if candidate > until {
                    return None;
                }
            }
            if let Some(cap) = count_cap {
                if produced >= cap {
                    return None;
                }
            }
            produced += 1;
            if candidate > after {
                return Some(candidate);
            }
        }

        period_index += 1;
        if empty_periods_in_a_row > limits.max_interval_occurrences as u32 {
            return None;
        }
    }
}

/// The last occurrence strictly before `before`, or `None` if the rule
/// has not yet produced one by that point.
pub(crate) fn last_before<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    before: Instant,
    limits: &EngineLimits,
) -> Option<Instant> {
    let until_bound = rule.termination.until();
    let count_cap = rule.termination.count();

    let mut period_index: i64 = 0;
    let mut produced: u32 = 0;
    let mut empty_periods_in_a_row: u32 = 0;
    let mut best: Option<Instant> = None;

    loop {
        let period_anchor = period_anchor_for_index(rule, time, period_index);
        if period_anchor >= before {
            break;
        }
        if let Some(until) = until_bound {
            if period_anchor > until {
                break;
            }
        }

        let candidates = candidates_for_period(rule, time, period_index, period_anchor);
        if candidates.is_empty() {
            empty_periods_in_a_row += 1;
        } else {
            empty_periods_in_a_row = 0;
        }

        for candidate in candidates {
            if candidate < rule.start_instant {
                continue;
            }
            if let Some(until) = until_bound {
                if candidate > until {
                    return best;
                }
            }
            if let Some(cap) = count_cap {
                if produced >= cap {
                    return best;
                }
            }
            produced += 1;
            if candidate < before {
                best = Some(candidate);
            }
        }

        period_index += 1;
        if empty_periods_in_a_row > limits.max_interval_occurrences as u32 {
            break;
        }
    }

    best
}

fn min_option<V: Ord + Copy>(a: Option<V>, b: Option<V>) -> Option<V> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) | (None, Some(a)) => Some(a),
        (None, None) => None,
    }
}

/// The calendar instant marking the start of the `index`-th base period
/// (period 0 contains `start_instant`). This is a lower bound for every
/// candidate the period can produce, used both to step forward and to
/// decide when an upper bound has been passed.
fn period_anchor_for_index<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    index: i64,
) -> Instant {
    let anchor = rule.start_instant;
    let step = index * i64::from(rule.frequency);

    match rule.period {
        PeriodType::Yearly => {
            let c = time.components(anchor);
            build_instant(rule, time, c.year + i32::try_from(step).unwrap_or(0), 1, 1, 0, 0, 0)
                .unwrap_or(anchor)
        }
        PeriodType::Monthly => {
            let c = time.components(anchor);
            let total_months = i64::from(c.month - 1) + step;
            let year = c.year + i32::try_from(total_months.div_euclid(12)).unwrap_or(0);
            let month = u32::try_from(total_months.rem_euclid(12)).unwrap_or(0) + 1;
            build_instant(rule, time, year, month, 1, 0, 0, 0).unwrap_or(anchor)
        }
        PeriodType::Weekly => {
            let week_start_date = week_start_date(rule, time, anchor);
            week_start_date.0.and_hms_opt(0, 0, 0).map_or(anchor, |midnight| {
                let shifted =
                    time.add_period(Instant::Floating(midnight), PeriodType::Daily, step * 7);
                rebuild_with_date(rule, time, shifted.date(), 0, 0, 0)
            })
        }
        PeriodType::Daily => {
            let shifted = time.add_period(anchor, PeriodType::Daily, step);
            rebuild_with_date(rule, time, shifted.date(), 0, 0, 0)
        }
        PeriodType::Hourly | PeriodType::Minutely | PeriodType::Secondly => {
            time.add_period(anchor, rule.period, step)
        }
        PeriodType::None => anchor,
    }
}

fn rebuild_with_date<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    date: Date,
    hour: u32,
    minute: u32,
    second: u32,
) -> Instant {
    build_instant(rule, time, date.0.year(), date.0.month(), date.0.day(), hour, minute, second)
        .unwrap_or(Instant::AllDay(date))
}

fn week_start_date<T: TimeProvider>(rule: &RecurrenceRule, time: &mut T, anchor: Instant) -> Date {
    let components = time.components(anchor);
    let offset = components.weekday.offset_from(rule.week_start);
    let shifted = time.add_period(anchor, PeriodType::Daily, -i64::from(offset));
    shifted.date()
}

fn build_instant<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<Instant> {
    match rule.start_instant {
        Instant::Zoned(dt) => time.construct(year, month, day, hour, minute, second, dt.timezone()),
        Instant::Floating(_) => time.construct_floating(year, month, day, hour, minute, second),
        Instant::AllDay(_) => time.construct_all_day(year, month, day),
    }
}

/// Builds the full, BYSETPOS-selected candidate set for one base
/// period, in ascending order.
fn candidates_for_period<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    _index: i64,
    period_anchor: Instant,
) -> Vec<Instant> {
    let anchor_components = time.components(rule.start_instant);

    let mut candidates: Vec<Instant> = match rule.period {
        PeriodType::Yearly => {
            let c = time.components(period_anchor);
            dates_for_yearly(rule, time, c.year)
                .into_iter()
                .flat_map(|date| expand_time_components(rule, time, date, anchor_components))
                .collect()
        }
        PeriodType::Monthly => {
            let c = time.components(period_anchor);
            dates_for_monthly(rule, time, c.year, c.month)
                .into_iter()
                .flat_map(|date| expand_time_components(rule, time, date, anchor_components))
                .collect()
        }
        PeriodType::Weekly => dates_for_weekly(rule, time, period_anchor.date())
            .into_iter()
            .flat_map(|date| expand_time_components(rule, time, date, anchor_components))
            .collect(),
        PeriodType::Daily => {
            let date = period_anchor.date();
            if date_passes_daily_limiters(rule, time, date) {
                expand_time_components(rule, time, date, anchor_components)
            } else {
                Vec::new()
            }
        }
        PeriodType::Hourly | PeriodType::Minutely | PeriodType::Secondly => {
            sub_daily_candidates(rule, time, period_anchor, anchor_components)
        }
        PeriodType::None => vec![period_anchor],
    };

    candidates.sort_unstable();
    candidates.dedup();
    apply_by_set_pos(rule, candidates)
}

fn apply_by_set_pos(rule: &RecurrenceRule, candidates: Vec<Instant>) -> Vec<Instant> {
    if rule.by_set_pos.is_empty() {
        return candidates;
    }
    let len = i64::try_from(candidates.len()).unwrap_or(0);
    let mut selected: Vec<Instant> = rule
        .by_set_pos
        .iter()
        .filter_map(|&pos| {
            let index = if pos > 0 { i64::from(pos) - 1 } else { len + i64::from(pos) };
            if index >= 0 && index < len {
                usize::try_from(index).ok().map(|i| candidates[i])
            } else {
                None
            }
        })
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}

// ---------------------------------------------------------------------
// YEARLY
// ---------------------------------------------------------------------

fn dates_for_yearly<T: TimeProvider>(rule: &RecurrenceRule, time: &T, year: i32) -> Vec<Date> {
    let anchor_c = time.components(rule.start_instant);

    let months: Vec<u32> = if rule.by_month.is_empty() {
        vec![anchor_c.month]
    } else {
        rule.by_month.iter().map(|&m| u32::from(m)).collect()
    };

    if !rule.by_year_day.is_empty() {
        let days_in_year = time.days_in_year(year);
        let mut dates: Vec<Date> = rule
            .by_year_day
            .iter()
            .filter_map(|&yd| resolve_ordinal(yd, days_in_year))
            .filter_map(|ordinal| day_of_year_to_date(year, ordinal))
            .collect();
        if !rule.by_month.is_empty() {
            dates.retain(|d| months.contains(&d.0.month()));
        }
        if !rule.by_month_day.is_empty() {
            dates.retain(|d| {
                let days_in_month = time.days_in_month(d.0.year(), d.0.month());
                rule.by_month_day
                    .iter()
                    .any(|&md| resolve_ordinal(i16::from(md), days_in_month) == Some(d.0.day()))
            });
        }
        if !rule.by_day.is_empty() {
            dates.retain(|d| {
                let weekday = Weekday::from(d.0.weekday());
                rule.by_day.iter().any(|wp| wp.weekday == weekday)
            });
        }
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    if !rule.by_week_number.is_empty() {
        let mut dates = Vec::new();
        for &week_no in &rule.by_week_number {
            let Some(week_start) = iso_week_start(year, week_no, rule.week_start) else {
                continue;
            };
            for day_offset in 0..7i64 {
                let date = week_start.0 + chrono::Duration::days(day_offset);
                let weekday = Weekday::from(date.weekday());
                let keep = if rule.by_day.is_empty() {
                    weekday == Weekday::from(rule.start_instant.date().0.weekday())
                } else {
                    rule.by_day.iter().any(|wp| wp.weekday == weekday)
                };
                if keep {
                    dates.push(Date(date));
                }
            }
        }
        if !rule.by_month.is_empty() {
            dates.retain(|d| months.contains(&d.0.month()));
        }
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    if !rule.by_month_day.is_empty() {
        let mut dates = Vec::new();
        for &month in &months {
            let days_in_month = time.days_in_month(year, month);
            for &md in &rule.by_month_day {
                if let Some(day) = resolve_ordinal(i16::from(md), days_in_month) {
                    if let Some(date) = Date::from_ymd(year, month, day) {
                        dates.push(date);
                    }
                }
            }
        }
        if !rule.by_day.is_empty() {
            dates.retain(|d| {
                let weekday = Weekday::from(d.0.weekday());
                rule.by_day.iter().any(|wp| wp.weekday == weekday)
            });
        }
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    if !rule.by_day.is_empty() {
        let mut dates = Vec::new();
        for wp in &rule.by_day {
            if !rule.by_month.is_empty() {
                for &month in &months {
                    collect_weekday_in_month(time, year, month, *wp, &mut dates);
                }
            } else {
                collect_weekday_in_year(time, year, *wp, &mut dates);
            }
        }
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    // No expanding filter at all: default is the anchor's day-of-month,
    // once per selected month.
    months
        .into_iter()
        .filter_map(|month| Date::from_ymd(year, month, anchor_c.day.min(time.days_in_month(year, month))))
        .collect()
}

fn collect_weekday_in_month<T: TimeProvider>(
    time: &T,
    year: i32,
    month: u32,
    wp: WeekdayPosition,
    out: &mut Vec<Date>,
) {
    if wp.offset == 0 {
        let days_in_month = time.days_in_month(year, month);
        for day in 1..=days_in_month {
            if let Some(date) = Date::from_ymd(year, month, day) {
                if Weekday::from(date.0.weekday()) == wp.weekday {
                    out.push(date);
                }
            }
        }
    } else if let Some(date) = time.nth_weekday_of_month(year, month, wp.weekday, i32::from(wp.offset)) {
        out.push(date);
    }
}

fn collect_weekday_in_year<T: TimeProvider>(time: &T, year: i32, wp: WeekdayPosition, out: &mut Vec<Date>) {
    if wp.offset == 0 {
        for month in 1..=12u32 {
            collect_weekday_in_month(time, year, month, WeekdayPosition::every(wp.weekday), out);
        }
    } else if let Some(date) = time.nth_weekday_of_year(year, wp.weekday, i32::from(wp.offset)) {
        out.push(date);
    }
}

// ---------------------------------------------------------------------
// MONTHLY
// ---------------------------------------------------------------------

fn dates_for_monthly<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &T,
    year: i32,
    month: u32,
) -> Vec<Date> {
    if !rule.by_month.is_empty() && !rule.by_month.iter().any(|&m| u32::from(m) == month) {
        return Vec::new();
    }

    if !rule.by_month_day.is_empty() {
        let days_in_month = time.days_in_month(year, month);
        let mut dates: Vec<Date> = rule
            .by_month_day
            .iter()
            .filter_map(|&md| resolve_ordinal(i16::from(md), days_in_month))
            .filter_map(|day| Date::from_ymd(year, month, day))
            .collect();
        if !rule.by_day.is_empty() {
            dates.retain(|d| {
                let weekday = Weekday::from(d.0.weekday());
                rule.by_day.iter().any(|wp| wp.weekday == weekday)
            });
        }
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    if !rule.by_day.is_empty() {
        let mut dates = Vec::new();
        for wp in &rule.by_day {
            collect_weekday_in_month(time, year, month, *wp, &mut dates);
        }
        dates.sort_unstable();
        dates.dedup();
        return dates;
    }

    let anchor_c = time.components(rule.start_instant);
    Date::from_ymd(year, month, anchor_c.day.min(time.days_in_month(year, month)))
        .into_iter()
        .collect()
}

// ---------------------------------------------------------------------
// WEEKLY
// ---------------------------------------------------------------------

fn dates_for_weekly<T: TimeProvider>(rule: &RecurrenceRule, time: &T, week_start: Date) -> Vec<Date> {
    let mut dates: Vec<Date> = if rule.by_day.is_empty() {
        let anchor_weekday = Weekday::from(rule.start_instant.date().0.weekday());
        let offset = anchor_weekday.offset_from(rule.week_start);
        vec![Date(week_start.0 + chrono::Duration::days(i64::from(offset)))]
    } else {
        rule.by_day
            .iter()
            .map(|wp| {
                let offset = wp.weekday.offset_from(rule.week_start);
                Date(week_start.0 + chrono::Duration::days(i64::from(offset)))
            })
            .collect()
    };

    if !rule.by_month.is_empty() {
        dates.retain(|d| rule.by_month.iter().any(|&m| u32::from(m) == d.0.month()));
    }

    dates.sort_unstable();
    dates.dedup();
    dates
}

// ---------------------------------------------------------------------
// DAILY
// ---------------------------------------------------------------------

fn date_passes_daily_limiters<T: TimeProvider>(rule: &RecurrenceRule, time: &T, date: Date) -> bool {
    if !rule.by_month.is_empty() && !rule.by_month.iter().any(|&m| u32::from(m) == date.0.month()) {
        return false;
    }
    if !rule.by_month_day.is_empty() {
        let days_in_month = time.days_in_month(date.0.year(), date.0.month());
        let matches = rule.by_month_day.iter().any(|&md| {
            resolve_ordinal(i16::from(md), days_in_month) == Some(date.0.day())
        });
        if !matches {
            return false;
        }
    }
    if !rule.by_year_day.is_empty() {
        let days_in_year = time.days_in_year(date.0.year());
        let ordinal = date.0.ordinal();
        let matches = rule
            .by_year_day
            .iter()
            .any(|&yd| resolve_ordinal(yd, days_in_year) == Some(ordinal));
        if !matches {
            return false;
        }
    }
    if !rule.by_day.is_empty() {
        let weekday = Weekday::from(date.0.weekday());
        if !rule.by_day.iter().any(|wp| wp.weekday == weekday) {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------
// Sub-daily (HOURLY / MINUTELY / SECONDLY)
// ---------------------------------------------------------------------

fn sub_daily_candidates<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    period_anchor: Instant,
    anchor_components: Components,
) -> Vec<Instant> {
    let date = period_anchor.date();
    if !date_passes_daily_limiters(rule, time, date) {
        return Vec::new();
    }

    let base = time.components(period_anchor);

    let hours: Vec<u32> = if limits(rule.period, PeriodType::Hourly) {
        if rule.by_hour.is_empty() || rule.by_hour.iter().any(|&h| u32::from(h) == base.hour) {
            vec![base.hour]
        } else {
            Vec::new()
        }
    } else if rule.by_hour.is_empty() {
        vec![anchor_components.hour]
    } else {
        rule.by_hour.iter().map(|&h| u32::from(h)).collect()
    };

    let minutes: Vec<u32> = if limits(rule.period, PeriodType::Minutely) {
        if rule.by_minute.is_empty() || rule.by_minute.iter().any(|&m| u32::from(m) == base.minute) {
            vec![base.minute]
        } else {
            Vec::new()
        }
    } else if rule.by_minute.is_empty() {
        vec![anchor_components.minute]
    } else {
        rule.by_minute.iter().map(|&m| u32::from(m)).collect()
    };

    let seconds: Vec<u32> = if limits(rule.period, PeriodType::Secondly) {
        if rule.by_second.is_empty() || rule.by_second.iter().any(|&s| u32::from(s) == base.second) {
            vec![base.second]
        } else {
            Vec::new()
        }
    } else if rule.by_second.is_empty() {
        vec![anchor_components.second]
    } else {
        rule.by_second.iter().map(|&s| u32::from(s)).collect()
    };

    let mut out = Vec::new();
    for &h in &hours {
        for &m in &minutes {
            for &s in &seconds {
                if let Some(instant) =
                    build_instant(rule, time, date.0.year(), date.0.month(), date.0.day(), h, m, s)
                {
                    out.push(instant);
                }
            }
        }
    }
    out
}

/// True if a BY-filter at `filter_unit`'s natural period limits (rather
/// than expands) a rule running at `period`, per RFC 5545's
/// expand/limit table: a filter finer-or-equal to the rule's own
/// frequency limits; one coarser expands.
fn limits(period: PeriodType, filter_unit: PeriodType) -> bool {
    period.rank() >= filter_unit.rank()
}

// ---------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------

fn expand_time_components<T: TimeProvider>(
    rule: &RecurrenceRule,
    time: &mut T,
    date: Date,
    anchor_components: Components,
) -> Vec<Instant> {
    if rule.all_day {
        return vec![Instant::AllDay(date)];
    }

    let hours: Vec<u32> = if rule.by_hour.is_empty() {
        vec![anchor_components.hour]
    } else {
        rule.by_hour.iter().map(|&h| u32::from(h)).collect()
    };
    let minutes: Vec<u32> = if rule.by_minute.is_empty() {
        vec![anchor_components.minute]
    } else {
        rule.by_minute.iter().map(|&m| u32::from(m)).collect()
    };
    let seconds: Vec<u32> = if rule.by_second.is_empty() {
        vec![anchor_components.second]
    } else {
        rule.by_second.iter().map(|&s| u32::from(s)).collect()
    };

    let mut out = Vec::with_capacity(hours.len() * minutes.len() * seconds.len());
    for &h in &hours {
        for &m in &minutes {
            for &s in &seconds {
                if let Some(instant) =
                    build_instant(rule, time, date.0.year(), date.0.month(), date.0.day(), h, m, s)
                {
                    out.push(instant);
                }
            }
        }
    }
    out
}

/// Resolves a possibly-negative 1-based ordinal (as used by
/// BYMONTHDAY/BYYEARDAY/BYWEEKNO) against a unit of size `len`. Returns
/// `None` if the resolved position falls outside `1..=len` (e.g.
/// BYMONTHDAY=31 in a 30-day month).
fn resolve_ordinal(value: i16, len: u32) -> Option<u32> {
    let len = i32::try_from(len).ok()?;
    let value = i32::from(value);
    let resolved = if value > 0 { value } else { len + value + 1 };
    if resolved >= 1 && resolved <= len {
        u32::try_from(resolved).ok()
    } else {
        None
    }
}

fn day_of_year_to_date(year: i32, ordinal: u32) -> Option<Date> {
    chrono::NaiveDate::from_yo_opt(year, ordinal).map(Date)
}

/// The Monday (or `week_start`-aligned day) that begins ISO-ish week
/// `week_no` of `year`, counting from either end (`week_no` ranges over
/// `[-53..-1] ∪ [1..53]`).
fn iso_week_start(year: i32, week_no: i8, week_start: Weekday) -> Option<Date> {
    let jan1 = chrono::NaiveDate::from_ymd_opt(year, 1, 1)?;
    let jan1_weekday = Weekday::from(jan1.weekday());
    let offset_to_week_start = jan1_weekday.offset_from(week_start);
    let first_week_start = jan1 - chrono::Duration::days(i64::from(offset_to_week_start));
    // If fewer than 4 days of the first week fall in `year`, ISO 8601
    // treats that week as belonging to the previous year; approximate
    // this the same way for BYWEEKNO's week 1.
    let first_week_start = if (jan1 - first_week_start).num_days() > 3 {
        first_week_start + chrono::Duration::days(7)
    } else {
        first_week_start
    };

    let weeks_in_year = if chrono::NaiveDate::from_ymd_opt(year, 12, 31)?
        .iso_week()
        .week()
        == 53
    {
        53
    } else {
        52
    };

    let index = if week_no > 0 {
        i64::from(week_no) - 1
    } else {
        i64::from(weeks_in_year) + i64::from(week_no)
    };
    if index < 0 || index >= i64::from(weeks_in_year) {
        return None;
    }
    Some(Date(first_week_start + chrono::Duration::weeks(index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Weekday;
    use crate::rule::RecurrenceRule;
    use crate::time::ChronoTime;
    use chrono_tz::Tz;

    fn instant(time: &mut ChronoTime, y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Instant {
        time.construct(y, mo, d, h, mi, s, Tz::UTC).unwrap()
    }

    #[test]
    fn resolve_ordinal_rejects_31_in_30_day_month() {
        assert_eq!(resolve_ordinal(31, 30), None);
    }

    #[test]
    fn resolve_ordinal_negative_counts_from_end() {
        assert_eq!(resolve_ordinal(-1, 31), Some(31));
        assert_eq!(resolve_ordinal(-31, 31), Some(1));
    }

    #[test]
    fn yearly_byyearday_combines_with_byday() {
        let mut time = ChronoTime::new();
        let anchor = instant(&mut time, 2023, 1, 1, 0, 0, 0);
        let rule = RecurrenceRule::builder(PeriodType::Yearly, 1, anchor)
            .by_year_day(vec![1, 100, 200])
            .by_day(vec![WeekdayPosition::every(Weekday::Monday)])
            .count(1)
            .build()
            .unwrap();
        let limits = EngineLimits::default();
        let occurrences = occurrences_upto(&rule, &mut time, None, None, &limits);
        let dates: Vec<String> = occurrences.iter().map(|i| i.date().to_string()).collect();
        assert_eq!(dates, vec!["2023-04-10"]);
    }

    #[test]
    fn weekly_byday_five_occurrences() {
        let mut time = ChronoTime::new();
        let anchor = instant(&mut time, 2020, 1, 6, 9, 0, 0);
        let rule = RecurrenceRule::builder(PeriodType::Weekly, 1, anchor)
            .by_day(vec![WeekdayPosition::every(Weekday::Monday)])
            .count(5)
            .build()
            .unwrap();
        let limits = EngineLimits::default();
        let occurrences = occurrences_upto(&rule, &mut time, None, None, &limits);
        assert_eq!(occurrences.len(), 5);
        assert_eq!(occurrences[4].date().to_string(), "2020-02-03");
    }

    #[test]
    fn monthly_last_friday_until() {
        let mut time = ChronoTime::new();
        let anchor = instant(&mut time, 2021, 1, 29, 12, 0, 0);
        let until = instant(&mut time, 2021, 6, 30, 23, 59, 0);
        let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, anchor)
            .by_day(vec![WeekdayPosition::nth(-1, Weekday::Friday)])
            .until(until)
            .build()
            .unwrap();
        let limits = EngineLimits::default();
        let occurrences = occurrences_upto(&rule, &mut time, None, None, &limits);
        let dates: Vec<String> = occurrences.iter().map(|i| i.date().to_string()).collect();
        assert_eq!(
            dates,
            vec![
                "2021-01-29",
                "2021-02-26",
                "2021-03-26",
                "2021-04-30",
                "2021-05-28",
                "2021-06-25",
            ]
        );
    }

    #[test]
    fn bysetpos_last_weekday_of_month() {
        let mut time = ChronoTime::new();
        let anchor = instant(&mut time, 2023, 1, 31, 17, 0, 0);
        let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, anchor)
            .by_day(vec![
                WeekdayPosition::every(Weekday::Monday),
                WeekdayPosition::every(Weekday::Tuesday),
                WeekdayPosition::every(Weekday::Wednesday),
                WeekdayPosition::every(Weekday::Thursday),
                WeekdayPosition::every(Weekday::Friday),
            ])
            .by_set_pos(vec![-1])
            .count(3)
            .build()
            .unwrap();
        let limits = EngineLimits::default();
        let occurrences = occurrences_upto(&rule, &mut time, None, None, &limits);
        let dates: Vec<String> = occurrences.iter().map(|i| i.date().to_string()).collect();
        assert_eq!(dates, vec!["2023-01-31", "2023-02-28", "2023-03-31"]);
    }

    #[test]
    fn yearly_feb29_all_day() {
        let time = ChronoTime::new();
        let anchor = Instant::AllDay(Date::from_ymd(2020, 2, 29).unwrap());
        let rule = RecurrenceRule::builder(PeriodType::Yearly, 1, anchor)
            .all_day(true)
            .by_month(vec![2])
            .by_month_day(vec![29])
            .build()
            .unwrap();
        let mut time = time;
        let limits = EngineLimits::tight(50);
        let upper = Instant::AllDay(Date::from_ymd(2024, 12, 31).unwrap());
        let occurrences = occurrences_upto(&rule, &mut time, Some(upper), None, &limits);
        let dates: Vec<String> = occurrences.iter().map(|i| i.date().to_string()).collect();
        assert_eq!(dates, vec!["2020-02-29", "2024-02-29"]);
    }
}
